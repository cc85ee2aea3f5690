//! Bus driver abstraction
//!
//! The DMX line is a half-duplex differential bus driven by a UART that
//! can generate break and mark conditions. This module defines the
//! [`BusDriver`] trait the line state machine talks to, keeping register
//! access out of the core driver entirely.
//!
//! # Interrupt integration
//!
//! The state machine pulls events with [`BusDriver::poll_event`]. On
//! real hardware the UART ISR pushes into a small queue that
//! `poll_event` drains; on the host, test doubles synthesize events.
//! Break-detected events must be delivered promptly relative to the
//! protocol's microsecond-scale turnaround windows, so implementations
//! should enqueue from the ISR rather than poll status registers
//! lazily. Framing errors are reported as events, never masked.

// =============================================================================
// Direction
// =============================================================================

/// Transceiver direction for the half-duplex line.
///
/// Implementations drive the transceiver's driver-enable GPIO when the
/// direction changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Receiving: driver disabled, line owned by the far end
    #[default]
    Rx,
    /// Transmitting: driver enabled, this port owns the line
    Tx,
}

// =============================================================================
// Bus Events
// =============================================================================

/// Line-level events produced by the bus driver.
///
/// Events carry everything the line state machine needs to sequence
/// frames; their order must match the order conditions occurred on the
/// wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusEvent {
    /// A data byte arrived
    RxByte(u8),
    /// A break condition was detected on the line
    Break,
    /// A framing error was detected (reported, not masked)
    FramingError,
    /// The TX FIFO has room for more bytes
    TxFifoEmpty,
    /// The final byte (including stop bits) has left the shifter
    TxComplete,
}

// =============================================================================
// Bus Driver Trait
// =============================================================================

/// Trait for half-duplex DMX bus access.
///
/// This trait can be implemented over any UART with break/mark
/// generation and an adjustable baud rate, allowing the core driver to
/// run against real hardware or a host-side simulation.
pub trait BusDriver {
    /// Push bytes into the TX FIFO without blocking.
    ///
    /// Returns the number of bytes accepted; the state machine feeds
    /// the remainder on subsequent [`BusEvent::TxFifoEmpty`] events.
    fn write_fifo(&mut self, bytes: &[u8]) -> usize;

    /// Discard any buffered TX and RX state.
    fn flush(&mut self);

    /// Set the transceiver direction.
    fn set_direction(&mut self, direction: Direction);

    /// Assert or release a break condition on the line.
    ///
    /// The duration of the break is timed by the
    /// [`TimingSource`](crate::hal::timer::TimingSource), not the bus.
    fn set_break(&mut self, asserted: bool);

    /// Pop the next pending line event, if any.
    fn poll_event(&mut self) -> Option<BusEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_default_is_rx() {
        assert_eq!(Direction::default(), Direction::Rx);
    }

    #[test]
    fn bus_event_equality() {
        assert_eq!(BusEvent::RxByte(0xCC), BusEvent::RxByte(0xCC));
        assert_ne!(BusEvent::RxByte(0xCC), BusEvent::RxByte(0x00));
        assert_ne!(BusEvent::Break, BusEvent::FramingError);
    }
}
