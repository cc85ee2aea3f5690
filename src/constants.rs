//! Centralized Constants
//!
//! This module provides a single source of truth for the protocol magic
//! numbers and timing constants used throughout the DMX/RDM driver.
//!
//! # Organization
//!
//! Constants are grouped by category:
//! - **Frame sizes**: DMX slot counts and RDM packet dimensions
//! - **Wire timing**: break, mark-after-break, turnaround and idle windows
//! - **RDM wire format**: start codes, preamble bytes, header offsets
//! - **Default configuration**: manufacturer id, capacities, namespaces
//!
//! # Note
//!
//! RDM parameter ids, command classes and NACK reason codes live in
//! [`crate::rdm::pids`], next to the types that interpret them.

// =============================================================================
// Frame Sizes
// =============================================================================

/// Maximum DMX frame size: one start code plus 512 data slots
pub const MAX_FRAME_SIZE: usize = 513;

/// Number of addressable DMX data slots (slot 0 is the start code)
pub const DMX_SLOT_COUNT: usize = 512;

/// DMX null start code (dimmer data)
pub const SC_DMX: u8 = 0x00;

/// RDM start code
pub const SC_RDM: u8 = 0xCC;

/// RDM sub-start code
pub const SC_SUB_MESSAGE: u8 = 0x01;

/// RDM header size on the wire, excluding the trailing checksum
pub const RDM_HEADER_SIZE: usize = 24;

/// Smallest valid RDM packet: header plus 16-bit checksum
pub const RDM_BASE_PACKET_SIZE: usize = RDM_HEADER_SIZE + 2;

/// Maximum RDM parameter data length
pub const RDM_PDL_MAX: usize = 231;

/// Largest RDM packet that can appear on the wire
pub const RDM_MAX_PACKET_SIZE: usize = RDM_BASE_PACKET_SIZE + RDM_PDL_MAX;

// =============================================================================
// Discovery Response Encoding
// =============================================================================

/// Discovery response preamble byte
pub const DISC_PREAMBLE_BYTE: u8 = 0xFE;

/// Discovery response preamble delimiter
pub const DISC_PREAMBLE_DELIMITER: u8 = 0xAA;

/// Maximum number of preamble bytes before the delimiter
pub const DISC_PREAMBLE_MAX_LEN: usize = 7;

/// Encoded UID length in a discovery response (6 bytes, 2 wire bytes each)
pub const DISC_ENCODED_UID_LEN: usize = 12;

/// Encoded checksum length in a discovery response
pub const DISC_ENCODED_CHECKSUM_LEN: usize = 4;

/// Full discovery response length: preamble, delimiter, UID, checksum
pub const DISC_RESPONSE_MAX_LEN: usize =
    DISC_PREAMBLE_MAX_LEN + 1 + DISC_ENCODED_UID_LEN + DISC_ENCODED_CHECKSUM_LEN;

// =============================================================================
// Wire Timing (ANSI E1.11 / E1.20)
// =============================================================================

/// Default transmitted break duration in microseconds
pub const BREAK_US_DEFAULT: u32 = 176;

/// Minimum legal transmitted break duration in microseconds
pub const BREAK_US_MIN: u32 = 92;

/// Default mark-after-break duration in microseconds
pub const MAB_US_DEFAULT: u32 = 12;

/// Minimum legal mark-after-break duration in microseconds
pub const MAB_US_MIN: u32 = 12;

/// Time for one slot (one byte at 250 kbit/s, 8N2) in microseconds
pub const SLOT_TIME_US: u32 = 44;

/// Receive idle window that terminates an in-progress frame, in microseconds
pub const RX_IDLE_TIMEOUT_US: u32 = 2_000;

/// Worst-case responder turnaround before a reply appears, in microseconds
pub const RDM_RESPONSE_TIMEOUT_US: u32 = 2_800;

/// Minimum controller-to-responder turnaround in microseconds
pub const RDM_TURNAROUND_MIN_US: u32 = 176;

/// Poll granularity of the blocking wait loops, in microseconds
pub const WAIT_POLL_INTERVAL_US: u32 = 10;

/// One responder ACK_TIMER tick expressed in milliseconds
pub const ACK_TIMER_TICK_MS: u32 = 10;

// =============================================================================
// Default Configuration
// =============================================================================

/// Default manufacturer id (ESTA-style, valid range 0x0001..=0x7FFF)
pub const MANUFACTURER_ID_DEFAULT: u16 = 0x05E0;

/// Device id sentinel meaning "derive from the hardware MAC"
pub const DEVICE_ID_DEFAULT: u32 = 0xFFFF_FFFF;

/// Maximum number of DMX personalities a device may declare
pub const MAX_PERSONALITIES: usize = 16;

/// Default parameter table capacity
pub const RESPONDER_MAX_PIDS: usize = 16;

/// Per-port backing arena for registered parameter storage, in bytes
pub const PD_ARENA_SIZE: usize = 256;

/// Namespace under which persistent parameters are stored
pub const PERSISTENCE_NAMESPACE: &str = "nvs";

/// Maximum ASCII field length in RDM parameter data
pub const RDM_ASCII_MAX_LEN: usize = 32;

/// Worst-case discovery branch stack depth for the 48-bit UID space
pub const DISCOVERY_STACK_DEPTH: usize = 49;

/// Retries for each discovery branch broadcast or mute attempt
pub const DISCOVERY_ATTEMPTS: u32 = 3;
