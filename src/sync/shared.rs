//! ISR-safe port wrapper using critical sections.
//!
//! Provides [`SharedDmxPort`] so interrupt shims and callers observe
//! the frame buffer, parameter table, transaction state and line state
//! consistently, per the driver's concurrency model.

use super::primitives::CriticalSectionCell;
use crate::driver::port::DmxPort;
use crate::hal::bus::BusDriver;
use crate::hal::persist::ParameterStore;
use crate::hal::timer::TimingSource;

/// ISR-safe DMX port wrapper using critical sections.
///
/// All access goes through `critical_section::with()`, disabling
/// interrupts for the duration of the closure. Keep closures short:
/// slot writes, event pumping, state queries. Blocking operations
/// (requests, discovery) belong on a task that owns the port
/// exclusively, with interrupts feeding the bus driver's event queue
/// underneath.
///
/// # Example
///
/// ```ignore
/// static PORT: SharedDmxPort<MyBus, MyTimer, MyStore, 16> =
///     SharedDmxPort::new(0, MyBus::new(), MyTimer::new(), MyStore::new());
///
/// // From the UART ISR shim:
/// PORT.with(|port| port.poll());
///
/// // From task context:
/// PORT.with(|port| port.write_slots(1, &levels));
/// PORT.with(|port| port.send(512)).ok();
/// ```
pub struct SharedDmxPort<B: BusDriver, T: TimingSource, S: ParameterStore, const PIDS: usize> {
    inner: CriticalSectionCell<DmxPort<B, T, S, PIDS>>,
}

impl<B: BusDriver, T: TimingSource, S: ParameterStore, const PIDS: usize>
    SharedDmxPort<B, T, S, PIDS>
{
    /// Create a new shared port (const, suitable for static
    /// initialization).
    pub const fn new(port_index: u8, bus: B, timer: T, store: S) -> Self {
        Self {
            inner: CriticalSectionCell::new(DmxPort::new(port_index, bus, timer, store)),
        }
    }

    /// Execute a closure with exclusive access to the port.
    ///
    /// Interrupts are disabled for the duration of the closure.
    #[inline]
    pub fn with<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut DmxPort<B, T, S, PIDS>) -> R,
    {
        self.inner.with(f)
    }

    /// Try to execute a closure, returning `None` if already borrowed.
    #[inline]
    pub fn try_with<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut DmxPort<B, T, S, PIDS>) -> R,
    {
        self.inner.try_with(f)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
