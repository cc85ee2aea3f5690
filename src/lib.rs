//! ESP32-class DMX512/RDM Driver
//!
//! A `no_std`, `no_alloc` Rust implementation of a DMX512 (ANSI E1.11)
//! and RDM (ANSI E1.20) driver core for microcontroller UARTs capable
//! of break/mark generation.
//!
//! # Architecture
//!
//! The driver is organized into three layers:
//!
//! 1. **Port Layer** ([`driver::port`]): The main [`DmxPort`] with DMX
//!    transmit/receive and the interrupt-driven line state machine
//! 2. **RDM Layer** ([`rdm`]): Packet codec, parameter marshalling,
//!    controller transactions, binary-tree discovery and the
//!    table-driven responder
//! 3. **HAL Layer** ([`hal`]): Traits abstracting the UART bus,
//!    one-shot timing and key-value persistence
//!
//! ## Standard Compliance
//!
//! - **ANSI E1.11 (DMX512-A)**: 250 kbit/s 8N2 framing, break and
//!   mark-after-break timing, 513-slot frames
//! - **ANSI E1.20 (RDM)**: packet format and checksums, discovery
//!   response encoding, transaction rules, mandatory parameter set
//!
//! # Hardware Abstraction
//!
//! The core never touches registers. Implement [`BusDriver`] over your
//! UART (enqueueing line events from its ISR), [`TimingSource`] over a
//! one-shot timer, and [`ParameterStore`] over non-volatile storage
//! (or use [`NullStore`]). Blocking operations take any
//! `embedded_hal::delay::DelayNs`.
//!
//! # Example
//!
//! ```ignore
//! use ph_esp32_dmx::{DmxConfig, DmxPortDefault, AckStatus, RdmHeader};
//! use ph_esp32_dmx::rdm::pids::{pid, CommandClass};
//!
//! let config = DmxConfig::new()
//!     .with_mac(efuse_mac)
//!     .with_personality(3, "RGB");
//! let mut port: DmxPortDefault<MyBus, MyTimer, MyStore> =
//!     DmxPortDefault::new(0, bus, timer, store);
//! port.init(config)?;
//!
//! // Plain DMX: write slots, send a frame
//! port.write_slots(1, &[255, 128, 0]);
//! port.send(512)?;
//! port.wait_sent(&mut delay)?;
//!
//! // RDM: discover the bus, then address a responder
//! let mut found = [ph_esp32_dmx::Uid::NULL; 32];
//! let n = port.discover(&mut delay, &mut found)?;
//!
//! let mut header = RdmHeader::request(
//!     found[0], CommandClass::GetCommand, pid::DEVICE_INFO, 0);
//! let mut ack = AckStatus::new();
//! let mut pd = [0u8; 231];
//! if port.send_request(&mut delay, &mut header, &[], &mut pd, &mut ack) {
//!     // 19-byte device info block in pd
//! }
//! ```
//!
//! # Features
//!
//! - `defmt`: Enable defmt logging and formatting for driver types

#![no_std]
#![deny(missing_docs)]
#![allow(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]
// Clippy lint levels live here; thresholds and config are in clippy.toml.
#![deny(clippy::correctness)]
#![warn(
    clippy::suspicious,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::cloned_instead_of_copied,
    clippy::explicit_iter_loop,
    clippy::implicit_clone,
    clippy::inconsistent_struct_constructor,
    clippy::manual_assert,
    clippy::manual_let_else,
    clippy::match_same_arms,
    clippy::needless_pass_by_value,
    clippy::semicolon_if_nothing_returned,
    clippy::uninlined_format_args,
    clippy::unnested_or_patterns,
    clippy::std_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::alloc_instead_of_core
)]
#![allow(
    clippy::mod_module_files,
    clippy::self_named_module_files,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::struct_excessive_bools,
    clippy::fn_params_excessive_bools,
    clippy::type_complexity,
    clippy::must_use_candidate,
    clippy::assertions_on_constants,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    clippy::panic_in_result_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::module_name_repetitions,
    clippy::wildcard_imports,
    clippy::items_after_statements
)]

// =============================================================================
// Modules
// =============================================================================

pub mod constants;
pub mod driver;
pub mod hal;
pub mod rdm;
pub mod sync;

// Test utilities (only available during testing)
#[cfg(test)]
pub mod test_utils;

// =============================================================================
// Re-exports
// =============================================================================

pub use driver::config::{DmxConfig, Personality, State};
pub use driver::error::{
    CodecError, CodecResult, ConfigError, ConfigResult, Error, IoError, IoResult, Result,
    TableError,
};
pub use driver::line::LineState;
pub use driver::port::{
    DmxPort, DmxPortDefault, DmxPortLarge, DmxPortSmall, PacketInfo, TransactionState,
};

pub use hal::bus::{BusDriver, BusEvent, Direction};
pub use hal::persist::{NullStore, ParameterStore};
pub use hal::timer::TimingSource;

pub use rdm::controller::{AckStatus, AckType};
pub use rdm::discovery::{DiscoveredDevice, MuteParams};
pub use rdm::packet::RdmHeader;
pub use rdm::pids::{CommandClass, NackReason, Pid, ResponseType};
pub use rdm::table::{CommandClassMask, ParameterDescriptor, ParameterTable};
pub use rdm::uid::{Uid, binding_uid};

pub use sync::{CriticalSectionCell, SharedDmxPort};

// =============================================================================
// Macro Helpers
// =============================================================================

/// Declare a static, ISR-safe DMX port.
///
/// This macro expands to a [`SharedDmxPort`] static, reducing
/// boilerplate for interrupt-driven bring-up.
///
/// # Examples
///
/// ```ignore
/// ph_esp32_dmx::dmx_port_static!(PORT, MyBus, MyTimer, MyStore,
///     0, MyBus::new(), MyTimer::new(), MyStore::new());
///
/// PORT.with(|port| {
///     port.init(DmxConfig::new().with_mac(mac)).unwrap();
/// });
/// ```
#[macro_export]
macro_rules! dmx_port_static {
    ($name:ident, $bus:ty, $timer:ty, $store:ty, $index:expr, $bus_init:expr, $timer_init:expr, $store_init:expr) => {
        $crate::dmx_port_static!(
            $name, $bus, $timer, $store, 16, $index, $bus_init, $timer_init, $store_init
        );
    };
    ($name:ident, $bus:ty, $timer:ty, $store:ty, $pids:expr, $index:expr, $bus_init:expr, $timer_init:expr, $store_init:expr) => {
        static $name: $crate::SharedDmxPort<$bus, $timer, $store, { $pids }> =
            $crate::SharedDmxPort::new($index, $bus_init, $timer_init, $store_init);
    };
}
