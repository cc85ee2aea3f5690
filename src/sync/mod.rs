//! Interrupt-safe synchronization layer.
//!
//! The driver's concurrency model names two primitives: a per-port
//! critical section guarding everything the line state machine and
//! callers both touch, and a zero-wait send lock serializing
//! controller transactions (carried inside
//! [`DmxPort`](crate::driver::DmxPort) itself).
//!
//! This module provides the critical-section side:
//!
//! - [`primitives::CriticalSectionCell`]: the underlying cell
//! - [`shared::SharedDmxPort`]: an ISR-safe wrapper around a port

pub mod primitives;
pub mod shared;

pub use primitives::CriticalSectionCell;
pub use shared::SharedDmxPort;
