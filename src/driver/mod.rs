//! Core DMX/RDM driver components.
//!
//! This module contains the building blocks for operating a DMX512 bus
//! with RDM:
//!
//! - [`config`]: Configuration types and builder patterns
//! - [`error`]: Error types and result aliases
//! - [`frame`]: The per-port frame buffer and slot cache
//! - [`line`]: The line-level state machine
//! - [`port`]: The main [`DmxPort`] implementation
//!
//! # Usage
//!
//! ```ignore
//! use ph_esp32_dmx::driver::{DmxConfig, DmxPortDefault};
//!
//! let config = DmxConfig::new()
//!     .with_manufacturer_id(0x05E0)
//!     .with_mac(mac);
//! let mut port: DmxPortDefault<MyBus, MyTimer, MyStore> =
//!     DmxPortDefault::new(0, bus, timer, store);
//! port.init(config)?;
//! ```
//!
//! # See Also
//!
//! - The RDM controller, discovery and responder operations in
//!   [`crate::rdm`]

// Submodules
pub mod config;
pub mod error;
pub mod frame;
pub mod line;
pub mod port;

// Re-exports for convenience
pub use config::{DmxConfig, Personality, State};
pub use error::{
    CodecError, CodecResult, ConfigError, ConfigResult, Error, IoError, IoResult, Result,
    TableError,
};
pub use frame::FrameBuffer;
pub use line::{LineEngine, LineState, LineTimings};
pub use port::{DmxPort, DmxPortDefault, DmxPortLarge, DmxPortSmall, PacketInfo, TransactionState};
