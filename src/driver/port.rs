//! Core DMX/RDM port implementation.
//!
//! This module contains the main [`DmxPort`] structure and core
//! operations:
//!
//! - Initialization and configuration
//! - DMX slot access, transmit and receive
//! - The event pump connecting the bus driver and timing source to the
//!   line state machine
//! - Transaction bookkeeping shared by the RDM controller layer
//!
//! The RDM request, discovery and responder operations live in the
//! [`rdm`](crate::rdm) module as further `impl` blocks on [`DmxPort`].

use embedded_hal::delay::DelayNs;

use super::config::{DmxConfig, State};
use super::error::{ConfigError, IoError, Result};
use super::frame::FrameBuffer;
use super::line::{LineEngine, LineState, LineTimings};
use crate::constants::{
    DMX_SLOT_COUNT, MAX_FRAME_SIZE, SC_RDM, SLOT_TIME_US, WAIT_POLL_INTERVAL_US,
};
use crate::hal::bus::BusDriver;
use crate::hal::persist::ParameterStore;
use crate::hal::timer::TimingSource;
use crate::rdm::pids::{CommandClass, Pid};
use crate::rdm::table::ParameterTable;
use crate::rdm::uid::{Uid, bind_uid};

/// Worst-case software backstop for draining a full frame out of the
/// transmitter, in microseconds.
const TX_DRAIN_TIMEOUT_US: u32 = MAX_FRAME_SIZE as u32 * SLOT_TIME_US * 2;

// =============================================================================
// Helper Types
// =============================================================================

/// Summary of one received frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PacketInfo {
    /// Frame length in bytes, including the start code
    pub size: usize,
    /// The frame's start code (first preamble byte for discovery
    /// responses, which carry none)
    pub start_code: u8,
    /// Whether the frame is RDM traffic
    pub is_rdm: bool,
}

/// The pending controller transaction of a port.
///
/// Exactly one transaction may be pending per port; the send lock
/// enforces it.
#[derive(Debug, Clone, Copy)]
pub struct TransactionState {
    /// Whether a response is still outstanding
    pub pending: bool,
    /// Transaction number placed on the wire
    pub tn: u8,
    /// Command class of the request
    pub cc: CommandClass,
    /// Parameter id of the request
    pub pid: Pid,
    /// Destination the request was addressed to
    pub dest_uid: Uid,
    /// Source UID the request carried
    pub src_uid: Uid,
}

impl TransactionState {
    const fn idle() -> Self {
        Self {
            pending: false,
            tn: 0,
            cc: CommandClass::DiscoveryCommand,
            pid: 0,
            dest_uid: Uid::NULL,
            src_uid: Uid::NULL,
        }
    }
}

// =============================================================================
// DMX Port
// =============================================================================

/// A logical DMX/RDM bus instance.
///
/// The port owns its bus driver, timing source and persistence
/// provider, one 513-byte frame buffer, the line state machine, the
/// RDM parameter table and the controller transaction state.
///
/// # Type Parameters
/// * `B` - Bus driver (half-duplex UART abstraction)
/// * `T` - Timing source (one-shot microsecond timer)
/// * `S` - Persistent parameter store
/// * `PIDS` - Parameter table capacity (typically 16)
///
/// # Event delivery
///
/// The port pulls line events from the bus driver and timer inside
/// [`DmxPort::poll`]; every blocking operation polls internally. ISR
/// integrations enqueue events from interrupt context inside their
/// [`BusDriver`] implementation.
pub struct DmxPort<B: BusDriver, T: TimingSource, S: ParameterStore, const PIDS: usize> {
    pub(crate) bus: B,
    pub(crate) timer: T,
    pub(crate) store: S,
    pub(crate) config: DmxConfig,
    state: State,
    port_index: u8,
    pub(crate) uid: Uid,
    pub(crate) frame: FrameBuffer,
    pub(crate) line: LineEngine,
    pub(crate) table: ParameterTable<PIDS>,
    pub(crate) transaction: TransactionState,
    /// Next transaction number to place on the wire
    pub(crate) tn: u8,
    /// Zero-wait send lock serializing controller transactions
    pub(crate) send_lock: bool,
    /// Whether discovery responses are currently muted
    pub(crate) muted: bool,
    /// Raised when a persistent store rejected a write
    pub(crate) boot_loader_required: bool,
}

impl<B: BusDriver, T: TimingSource, S: ParameterStore, const PIDS: usize> DmxPort<B, T, S, PIDS> {
    /// Create a new port over the given hardware resources.
    ///
    /// The port is created in the `Uninitialized` state; call
    /// [`DmxPort::init`] before any bus operation.
    pub const fn new(port_index: u8, bus: B, timer: T, store: S) -> Self {
        Self {
            bus,
            timer,
            store,
            config: DmxConfig::new(),
            state: State::Uninitialized,
            port_index,
            uid: Uid::NULL,
            frame: FrameBuffer::new(),
            line: LineEngine::new(),
            table: ParameterTable::new(),
            transaction: TransactionState::idle(),
            tn: 0,
            send_lock: false,
            muted: false,
            boot_loader_required: false,
        }
    }

    // =========================================================================
    // State Accessors
    // =========================================================================

    /// Get the current lifecycle state.
    #[inline(always)]
    pub fn state(&self) -> State {
        self.state
    }

    /// This port's UID.
    #[inline(always)]
    pub fn uid(&self) -> Uid {
        self.uid
    }

    /// This port's index.
    #[inline(always)]
    pub fn port_index(&self) -> u8 {
        self.port_index
    }

    /// The active configuration.
    pub fn config(&self) -> &DmxConfig {
        &self.config
    }

    /// The current line state.
    pub fn line_state(&self) -> LineState {
        self.line.state()
    }

    /// Whether this responder's discovery replies are muted.
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Whether a persistent-store failure has been recorded.
    pub fn boot_loader_required(&self) -> bool {
        self.boot_loader_required
    }

    /// The pending controller transaction, if any.
    pub fn transaction(&self) -> Option<TransactionState> {
        self.transaction.pending.then_some(self.transaction)
    }

    /// The transaction number the next request will carry.
    pub fn next_tn(&self) -> u8 {
        self.tn
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize the port with the given configuration.
    ///
    /// This validates the configuration, establishes the process-wide
    /// binding UID (deriving the device id from the MAC when
    /// configured to), derives this port's UID, registers the default
    /// RDM parameters and restores persisted parameter values.
    ///
    /// # Errors
    /// - `AlreadyInitialized` - the port was already initialized
    /// - `InvalidConfig` - the configuration fails validation, or the
    ///   derived port UID is a null or broadcast UID
    pub fn init(&mut self, config: DmxConfig) -> Result<()> {
        if self.state != State::Uninitialized {
            return Err(ConfigError::AlreadyInitialized.into());
        }
        if !config.is_valid() {
            return Err(ConfigError::InvalidConfig.into());
        }

        let binding = bind_uid(config.manufacturer_id, config.device_id, &config.mac);
        let uid = binding.for_port(self.port_index);
        if uid.is_null() || uid.is_broadcast() {
            return Err(ConfigError::InvalidConfig.into());
        }

        self.config = config;
        self.uid = uid;
        self.frame.reset_dmx();
        self.register_default_parameters()?;
        self.restore_persistent_parameters();
        self.state = State::Ready;

        #[cfg(feature = "defmt")]
        defmt::info!("dmx port {} ready, uid {}", self.port_index, self.uid);

        Ok(())
    }

    // =========================================================================
    // Event Pump
    // =========================================================================

    /// Drain pending bus events and timer expiry into the line state
    /// machine.
    ///
    /// Blocking operations call this internally; integrations that
    /// block elsewhere should call it often enough to honor the
    /// protocol's turnaround windows.
    pub fn poll(&mut self) {
        loop {
            let Some(event) = self.bus.poll_event() else {
                break;
            };
            self.line
                .on_bus_event(event, &mut self.frame, &mut self.bus, &mut self.timer);
        }
        if self.timer.poll_expired() {
            let timings = self.line_timings();
            self.line
                .on_timer_expired(&mut self.frame, &mut self.bus, &mut self.timer, &timings);
        }
    }

    pub(crate) fn line_timings(&self) -> LineTimings {
        LineTimings {
            break_us: self.config.break_us,
            mab_us: self.config.mab_us,
        }
    }

    // =========================================================================
    // DMX Slot Access
    // =========================================================================

    /// Write `data` into consecutive slots starting at `slot`
    /// (slot 0 is the start code). Returns the number of bytes stored.
    ///
    /// Writes are not observable on the wire until [`DmxPort::send`].
    pub fn write_slots(&mut self, slot: usize, data: &[u8]) -> usize {
        self.frame.write_slots(slot, data)
    }

    /// Read consecutive slots of the buffered frame into `out`.
    pub fn read_slots(&self, slot: usize, out: &mut [u8]) -> usize {
        self.frame.read_slots(slot, out)
    }

    /// Whether data slot `slot` (1..=512) has been written since the
    /// last send.
    pub fn is_slot_written(&self, slot: usize) -> bool {
        self.frame.is_slot_written(slot)
    }

    // =========================================================================
    // DMX Transmit / Receive
    // =========================================================================

    /// Transmit the buffered frame as `slots` data slots plus the
    /// start code.
    ///
    /// Returns immediately once the line state machine owns the frame;
    /// use [`DmxPort::wait_sent`] to block until the line is idle
    /// again.
    pub fn send(&mut self, slots: usize) -> Result<()> {
        self.ensure_ready()?;
        let slots = slots.min(DMX_SLOT_COUNT);
        self.frame.set_len(slots + 1);
        self.send_frame(true, false)
    }

    /// Start transmitting whatever frame is latched in the buffer.
    pub(crate) fn send_frame(&mut self, with_break: bool, expect_response: bool) -> Result<()> {
        let timings = self.line_timings();
        self.line
            .begin_tx(
                &self.frame,
                &mut self.bus,
                &mut self.timer,
                &timings,
                with_break,
                expect_response,
            )
            .map_err(Into::into)
    }

    /// Block until the frame in flight has fully left the transmitter.
    ///
    /// # Errors
    /// - `Timeout` if the drain exceeds the worst-case frame time
    /// - `BusError` if the line faulted mid-frame
    pub fn wait_sent<D: DelayNs>(&mut self, delay: &mut D) -> Result<()> {
        let mut elapsed = 0u32;
        loop {
            self.poll();
            if !self.line.is_transmitting() {
                break;
            }
            if elapsed >= TX_DRAIN_TIMEOUT_US {
                self.line.abort(&mut self.timer);
                return Err(IoError::Timeout.into());
            }
            delay.delay_us(WAIT_POLL_INTERVAL_US);
            elapsed += WAIT_POLL_INTERVAL_US;
        }
        if self.line.state() == LineState::Error {
            let err = self.line.acknowledge_error().unwrap_or(IoError::BusError);
            return Err(err.into());
        }
        Ok(())
    }

    /// Receive one frame, blocking up to `timeout_us`.
    ///
    /// Inbound RDM requests addressed to this port are answered by the
    /// responder engine before this returns. DMX frames stay readable
    /// through [`DmxPort::read_slots`]; a frame the responder answered
    /// does not, because the reply reuses the buffer.
    ///
    /// # Errors
    /// - `Timeout` if no complete frame arrives in time
    /// - `BusError` on a line fault
    pub fn receive<D: DelayNs>(&mut self, delay: &mut D, timeout_us: u32) -> Result<PacketInfo> {
        self.ensure_ready()?;
        if self.line.state() == LineState::Idle {
            self.line
                .begin_rx(&mut self.frame, &mut self.bus, &mut self.timer)?;
        }

        let mut elapsed = 0u32;
        loop {
            self.poll();
            match self.line.state() {
                LineState::RxDone => break,
                LineState::Error => {
                    let err = self.line.acknowledge_error().unwrap_or(IoError::BusError);
                    return Err(err.into());
                }
                _ => {}
            }
            if elapsed >= timeout_us {
                self.line.abort(&mut self.timer);
                return Err(IoError::Timeout.into());
            }
            delay.delay_us(WAIT_POLL_INTERVAL_US);
            elapsed += WAIT_POLL_INTERVAL_US;
        }

        self.line.consume_rx()?;
        let info = PacketInfo {
            size: self.frame.len(),
            start_code: self.frame.start_code(),
            is_rdm: self.frame.start_code() == SC_RDM,
        };
        if info.is_rdm {
            self.respond_if_addressed(delay)?;
        }
        Ok(info)
    }

    pub(crate) fn ensure_ready(&self) -> Result<()> {
        if self.state != State::Ready {
            return Err(ConfigError::NotReady.into());
        }
        Ok(())
    }
}

// =============================================================================
// Type Aliases
// =============================================================================

/// A port with the default 16-entry parameter table.
pub type DmxPortDefault<B, T, S> = DmxPort<B, T, S, { crate::constants::RESPONDER_MAX_PIDS }>;

/// A small port for memory-constrained responders (8 parameters).
pub type DmxPortSmall<B, T, S> = DmxPort<B, T, S, 8>;

/// A large port for parameter-rich responders (32 parameters).
pub type DmxPortLarge<B, T, S> = DmxPort<B, T, S, 32>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SC_DMX;
    use crate::driver::config::DmxConfig;
    use crate::driver::error::Error;
    use crate::test_utils::{MemStore, NoopDelay, SimBus, SimPort, SimTimer, binding_guard, ready_port};

    #[test]
    fn init_rejects_invalid_config() {
        let _guard = binding_guard();
        let mut port = SimPort::new(0, SimBus::new(), SimTimer::new(), MemStore::new());
        let config = DmxConfig::new().with_manufacturer_id(0x8000);
        assert_eq!(
            port.init(config).unwrap_err(),
            Error::Config(ConfigError::InvalidConfig)
        );
        assert_eq!(port.state(), State::Uninitialized);
    }

    #[test]
    fn init_rejects_double_init() {
        let (_guard, mut port) = ready_port();
        assert_eq!(
            port.init(DmxConfig::new()).unwrap_err(),
            Error::Config(ConfigError::AlreadyInitialized)
        );
    }

    #[test]
    fn init_derives_port_uid_and_registers_defaults() {
        let (_guard, port) = ready_port();
        assert_eq!(port.state(), State::Ready);
        assert!(!port.uid().is_null());
        assert!(!port.uid().is_broadcast());
        // The default responder parameter set is in place
        assert!(port.table.find(crate::rdm::pids::pid::DEVICE_INFO).is_some());
        assert!(port.table.find(crate::rdm::pids::pid::DMX_START_ADDRESS).is_some());
    }

    #[test]
    fn operations_require_init() {
        let _guard = binding_guard();
        let mut port = SimPort::new(0, SimBus::new(), SimTimer::new(), MemStore::new());
        assert!(port.send(8).is_err());
        assert!(port.receive(&mut NoopDelay, 1_000).is_err());
    }

    #[test]
    fn dmx_send_puts_full_frame_on_the_wire() {
        let (_guard, mut port) = ready_port();
        port.write_slots(1, &[10, 20, 30]);
        port.send(512).unwrap();
        port.wait_sent(&mut NoopDelay).unwrap();

        let frames = port.bus.take_tx_frames();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].with_break);
        assert_eq!(frames[0].bytes.len(), 513);
        assert_eq!(frames[0].bytes[0], SC_DMX);
        assert_eq!(&frames[0].bytes[1..4], &[10, 20, 30]);
        assert_eq!(port.line_state(), LineState::Idle);
    }

    #[test]
    fn dmx_send_clears_slot_cache() {
        let (_guard, mut port) = ready_port();
        port.write_slots(1, &[0xFF]);
        assert!(port.is_slot_written(1));

        port.send(8).unwrap();
        port.wait_sent(&mut NoopDelay).unwrap();
        assert!(!port.is_slot_written(1));
    }

    #[test]
    fn dmx_receive_roundtrip() {
        let (_guard, mut port) = ready_port();
        let mut frame = [0u8; 9];
        frame[1..].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        port.bus.inject_frame(&frame, true);

        let info = port.receive(&mut NoopDelay, 10_000).unwrap();
        assert_eq!(info.size, 9);
        assert_eq!(info.start_code, SC_DMX);
        assert!(!info.is_rdm);

        let mut slots = [0u8; 8];
        assert_eq!(port.read_slots(1, &mut slots), 8);
        assert_eq!(slots, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn dmx_receive_times_out_on_silence() {
        let (_guard, mut port) = ready_port();
        assert_eq!(
            port.receive(&mut NoopDelay, 1_000).unwrap_err(),
            Error::Io(IoError::Timeout)
        );
        assert_eq!(port.line_state(), LineState::Idle);
    }

    #[test]
    fn dmx_receive_surfaces_framing_errors() {
        let (_guard, mut port) = ready_port();
        port.bus.inject_frame(&[0x00, 0x01], true);
        port.bus.inject_framing_error();

        assert_eq!(
            port.receive(&mut NoopDelay, 10_000).unwrap_err(),
            Error::Io(IoError::BusError)
        );
        assert_eq!(port.line_state(), LineState::Idle);
    }

    #[test]
    fn back_to_back_frames_split_on_break() {
        let (_guard, mut port) = ready_port();
        // Two frames in one injected run, delimited by the second break
        port.bus.inject_frame(&[0x00, 0xAA, 0xBB], true);
        port.bus.inject_frame(&[0x00, 0xCC], true);

        let info = port.receive(&mut NoopDelay, 10_000).unwrap();
        assert_eq!(info.size, 3);
        let mut out = [0u8; 2];
        port.read_slots(1, &mut out);
        assert_eq!(out, [0xAA, 0xBB]);
    }

    #[test]
    fn transaction_accessor_reflects_pending_state() {
        let (_guard, port) = ready_port();
        assert!(port.transaction().is_none());
        assert_eq!(port.next_tn(), 0);
    }
}
