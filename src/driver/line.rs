//! Line state machine
//!
//! The heart of the framing engine: a per-port state machine that
//! sequences break, mark-after-break and slot transmission, receives
//! slot runs delimited by breaks or line idle, and handles the RDM
//! turnaround from transmit to the response window.
//!
//! The machine is advanced by three inputs only: [`BusEvent`]s pulled
//! from the bus driver, one-shot timer expiry, and the driver calls
//! that begin a transmit or a receive. RX events are ignored in every
//! `Tx*` state and TX events in every `Rx*` state.

use super::frame::FrameBuffer;
use crate::constants::{RDM_RESPONSE_TIMEOUT_US, RX_IDLE_TIMEOUT_US};
use crate::driver::error::IoError;
use crate::hal::bus::{BusDriver, BusEvent, Direction};
use crate::hal::timer::TimingSource;

// =============================================================================
// Line State
// =============================================================================

/// The states of the per-port line engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineState {
    /// No frame in flight
    #[default]
    Idle,
    /// Driving the break pulse
    TxBreak,
    /// Driving the mark-after-break
    TxMab,
    /// Feeding slots to the transmit FIFO
    TxSlots,
    /// Final byte left the shifter
    TxDone,
    /// Listening for the first byte or break of an inbound frame
    RxWait,
    /// Accumulating inbound slots
    RxSlots,
    /// A complete inbound frame is available
    RxDone,
    /// A framing error or timeout occurred; awaiting acknowledgement
    Error,
}

/// Timing parameters the engine needs when transmitting.
#[derive(Debug, Clone, Copy)]
pub struct LineTimings {
    /// Break duration in microseconds
    pub break_us: u32,
    /// Mark-after-break duration in microseconds
    pub mab_us: u32,
}

// =============================================================================
// Line Engine
// =============================================================================

/// Per-port line engine state.
///
/// The engine borrows the port's frame buffer, bus driver and timing
/// source on every call rather than owning them, so the port can hand
/// the same resources to the codec and parameter layers.
pub struct LineEngine {
    state: LineState,
    /// Next frame byte to push into the TX FIFO
    tx_head: usize,
    /// Whether the current transmit turns the line around for a reply
    expect_response: bool,
    /// Error that moved the engine into `LineState::Error`
    error: Option<IoError>,
}

impl LineEngine {
    /// Create an idle engine.
    pub const fn new() -> Self {
        Self {
            state: LineState::Idle,
            tx_head: 0,
            expect_response: false,
            error: None,
        }
    }

    /// Current state.
    #[inline(always)]
    pub fn state(&self) -> LineState {
        self.state
    }

    /// The error that moved the engine into [`LineState::Error`].
    pub fn error(&self) -> Option<IoError> {
        self.error
    }

    /// Whether the engine is in any transmit state.
    pub fn is_transmitting(&self) -> bool {
        matches!(
            self.state,
            LineState::TxBreak | LineState::TxMab | LineState::TxSlots | LineState::TxDone
        )
    }

    // =========================================================================
    // Driver Entry Points
    // =========================================================================

    /// Begin transmitting the frame currently latched in `frame`.
    ///
    /// With `with_break` the engine drives break then mark-after-break
    /// before the first slot; without it (discovery responses) slots
    /// start immediately. `expect_response` turns the line around into
    /// the response window after the final byte.
    pub fn begin_tx<B: BusDriver, T: TimingSource>(
        &mut self,
        frame: &FrameBuffer,
        bus: &mut B,
        timer: &mut T,
        timings: &LineTimings,
        with_break: bool,
        expect_response: bool,
    ) -> Result<(), IoError> {
        if self.state != LineState::Idle {
            return Err(IoError::InvalidState);
        }
        self.tx_head = 0;
        self.expect_response = expect_response;
        self.error = None;

        bus.flush();
        bus.set_direction(Direction::Tx);
        if with_break {
            bus.set_break(true);
            timer.arm_one_shot(timings.break_us);
            self.state = LineState::TxBreak;
        } else {
            self.state = LineState::TxSlots;
            self.push_chunk(frame, bus);
        }
        Ok(())
    }

    /// Begin listening for an inbound frame.
    pub fn begin_rx<B: BusDriver, T: TimingSource>(
        &mut self,
        frame: &mut FrameBuffer,
        bus: &mut B,
        timer: &mut T,
    ) -> Result<(), IoError> {
        if self.state != LineState::Idle {
            return Err(IoError::InvalidState);
        }
        timer.cancel();
        bus.set_direction(Direction::Rx);
        frame.begin_rx();
        self.error = None;
        self.state = LineState::RxWait;
        Ok(())
    }

    /// Consume a completed inbound frame, returning to idle.
    pub fn consume_rx(&mut self) -> Result<(), IoError> {
        if self.state != LineState::RxDone {
            return Err(IoError::InvalidState);
        }
        self.state = LineState::Idle;
        Ok(())
    }

    /// Acknowledge an error, returning the engine to idle.
    pub fn acknowledge_error(&mut self) -> Option<IoError> {
        if self.state == LineState::Error {
            self.state = LineState::Idle;
        }
        self.error.take()
    }

    /// Abandon whatever is in flight and force the engine idle.
    ///
    /// In-flight bus I/O completes on its own; its events are ignored
    /// once the engine is idle.
    pub fn abort<T: TimingSource>(&mut self, timer: &mut T) {
        timer.cancel();
        self.state = LineState::Idle;
        self.error = None;
    }

    // =========================================================================
    // Event Handling
    // =========================================================================

    /// Advance on a bus event.
    pub fn on_bus_event<B: BusDriver, T: TimingSource>(
        &mut self,
        event: BusEvent,
        frame: &mut FrameBuffer,
        bus: &mut B,
        timer: &mut T,
    ) {
        match (self.state, event) {
            // --- Transmit path ---------------------------------------------
            (LineState::TxSlots, BusEvent::TxFifoEmpty) => {
                if self.tx_head < frame.len() {
                    self.push_chunk(frame, bus);
                }
            }
            (LineState::TxSlots, BusEvent::TxComplete) => {
                if self.tx_head < frame.len() {
                    self.push_chunk(frame, bus);
                } else {
                    self.finish_tx(frame, bus, timer);
                }
            }

            // --- Receive path ----------------------------------------------
            (LineState::RxWait, BusEvent::RxByte(byte)) => {
                frame.begin_rx();
                frame.push_rx(byte);
                timer.arm_one_shot(RX_IDLE_TIMEOUT_US);
                self.state = LineState::RxSlots;
            }
            (LineState::RxWait, BusEvent::Break) => {
                frame.begin_rx();
                timer.arm_one_shot(RX_IDLE_TIMEOUT_US);
                self.state = LineState::RxSlots;
            }
            (LineState::RxSlots, BusEvent::RxByte(byte)) => {
                if frame.push_rx(byte) {
                    timer.arm_one_shot(RX_IDLE_TIMEOUT_US);
                } else {
                    // Buffer full terminates the frame
                    timer.cancel();
                    self.state = LineState::RxDone;
                }
            }
            (LineState::RxSlots, BusEvent::Break) => {
                // A break inside a frame run completes the current
                // frame; an empty run just restarts.
                if frame.is_empty() {
                    timer.arm_one_shot(RX_IDLE_TIMEOUT_US);
                } else {
                    timer.cancel();
                    self.state = LineState::RxDone;
                }
            }
            (LineState::RxWait | LineState::RxSlots, BusEvent::FramingError) => {
                timer.cancel();
                self.fail(IoError::BusError);
            }

            // TX states ignore RX events and vice versa; stale events
            // in idle or terminal states are dropped.
            _ => {}
        }
    }

    /// Advance on one-shot timer expiry.
    pub fn on_timer_expired<B: BusDriver, T: TimingSource>(
        &mut self,
        frame: &mut FrameBuffer,
        bus: &mut B,
        timer: &mut T,
        timings: &LineTimings,
    ) {
        match self.state {
            LineState::TxBreak => {
                bus.set_break(false);
                timer.arm_one_shot(timings.mab_us);
                self.state = LineState::TxMab;
            }
            LineState::TxMab => {
                self.state = LineState::TxSlots;
                self.push_chunk(frame, bus);
            }
            LineState::RxWait => {
                // The armed response window elapsed with nothing heard
                self.fail(IoError::Timeout);
            }
            LineState::RxSlots => {
                // Inter-slot gap exceeded: the frame is complete
                self.state = LineState::RxDone;
            }
            _ => {}
        }
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn push_chunk<B: BusDriver>(&mut self, frame: &FrameBuffer, bus: &mut B) {
        let accepted = bus.write_fifo(&frame.as_slice()[self.tx_head..]);
        self.tx_head += accepted;
    }

    fn finish_tx<B: BusDriver, T: TimingSource>(
        &mut self,
        frame: &mut FrameBuffer,
        bus: &mut B,
        timer: &mut T,
    ) {
        self.state = LineState::TxDone;
        frame.clear_written();
        if self.expect_response {
            bus.set_direction(Direction::Rx);
            frame.begin_rx();
            timer.arm_one_shot(RDM_RESPONSE_TIMEOUT_US);
            self.state = LineState::RxWait;
        } else {
            self.state = LineState::Idle;
        }
    }

    fn fail(&mut self, error: IoError) {
        self.error = Some(error);
        self.state = LineState::Error;
    }
}

impl Default for LineEngine {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
