//! Hardware Abstraction Layer
//!
//! The core driver never touches registers. Everything
//! hardware-specific sits behind the traits in this module:
//!
//! - [`bus::BusDriver`]: half-duplex UART byte I/O, break/mark pulses,
//!   direction control and line events
//! - [`timer::TimingSource`]: the per-port one-shot microsecond timer
//! - [`persist::ParameterStore`]: typed key-value persistence for
//!   parameters flagged persistent
//!
//! Blocking delays use `embedded_hal::delay::DelayNs`, supplied by the
//! integration at each call site.

pub mod bus;
pub mod persist;
pub mod timer;

pub use bus::{BusDriver, BusEvent, Direction};
pub use persist::{NullStore, ParameterStore};
pub use timer::TimingSource;
