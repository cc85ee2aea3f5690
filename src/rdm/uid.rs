//! RDM unique identifiers
//!
//! Every RDM device is addressed by a 48-bit UID: a 16-bit ESTA
//! manufacturer id followed by a 32-bit device id. This module provides
//! the [`Uid`] value type, broadcast/null classification, the wire and
//! 48-bit integer conversions discovery arithmetic relies on, and the
//! process-wide *binding UID* from which each port derives its own
//! address.

use crate::constants::{DEVICE_ID_DEFAULT, MANUFACTURER_ID_DEFAULT};
use crate::sync::primitives::CriticalSectionCell;

// =============================================================================
// UID Type
// =============================================================================

/// A 48-bit RDM unique identifier.
///
/// Ordering is lexicographic with the manufacturer id most
/// significant, matching the ordering of the flat 48-bit integer form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Uid {
    /// ESTA manufacturer id (`0x0001..=0x7FFF` for real devices)
    pub man_id: u16,
    /// Device id, unique within a manufacturer
    pub dev_id: u32,
}

impl Uid {
    /// The all-zero null UID.
    pub const NULL: Uid = Uid::new(0x0000, 0x0000_0000);

    /// The broadcast-to-all-devices UID.
    pub const BROADCAST_ALL: Uid = Uid::new(0xFFFF, 0xFFFF_FFFF);

    /// The greatest UID a real device can own, used as the root of the
    /// discovery search space.
    pub const MAX: Uid = Uid::new(0x7FFF, 0xFFFF_FFFF);

    /// Create a UID from its parts.
    pub const fn new(man_id: u16, dev_id: u32) -> Self {
        Self { man_id, dev_id }
    }

    /// The broadcast UID addressing every device of one manufacturer.
    pub const fn broadcast_to(man_id: u16) -> Self {
        Self::new(man_id, 0xFFFF_FFFF)
    }

    /// Whether this is the all-zero null UID.
    pub const fn is_null(&self) -> bool {
        self.man_id == 0 && self.dev_id == 0
    }

    /// Whether this UID is a broadcast address (all devices, or all
    /// devices of one manufacturer).
    pub const fn is_broadcast(&self) -> bool {
        self.dev_id == 0xFFFF_FFFF
    }

    /// Whether a packet addressed to `dest` addresses a device owning
    /// this UID, either exactly or through a broadcast alias.
    pub const fn accepts(&self, dest: &Uid) -> bool {
        (dest.man_id == self.man_id || dest.man_id == 0xFFFF) && (dest.dev_id == 0xFFFF_FFFF)
            || (dest.man_id == self.man_id && dest.dev_id == self.dev_id)
    }

    /// Parse from the 6-byte big-endian wire form.
    pub const fn from_bytes(bytes: [u8; 6]) -> Self {
        Self {
            man_id: u16::from_be_bytes([bytes[0], bytes[1]]),
            dev_id: u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]),
        }
    }

    /// Serialize to the 6-byte big-endian wire form.
    pub const fn to_bytes(self) -> [u8; 6] {
        let man = self.man_id.to_be_bytes();
        let dev = self.dev_id.to_be_bytes();
        [man[0], man[1], dev[0], dev[1], dev[2], dev[3]]
    }

    /// The flat 48-bit integer form used for discovery arithmetic.
    pub const fn to_u48(self) -> u64 {
        ((self.man_id as u64) << 32) | self.dev_id as u64
    }

    /// Build a UID from a flat 48-bit integer (upper 16 bits ignored).
    pub const fn from_u48(value: u64) -> Self {
        Self {
            man_id: (value >> 32) as u16,
            dev_id: value as u32,
        }
    }

    /// The byte-reversed rendition of this UID.
    ///
    /// Some responders in the field answer discovery with their UID
    /// byte-swapped; muting that rendition is the standard workaround.
    pub const fn flipped(self) -> Self {
        let b = self.to_bytes();
        Self::from_bytes([b[5], b[4], b[3], b[2], b[1], b[0]])
    }

    /// Derive the UID of a port from a binding UID.
    ///
    /// Ports of a multi-port device share the binding UID with the
    /// least-significant octet XOR'd by the port index.
    pub const fn for_port(self, port: u8) -> Self {
        Self {
            man_id: self.man_id,
            dev_id: self.dev_id ^ port as u32,
        }
    }
}

impl core::fmt::Display for Uid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:04X}:{:08X}", self.man_id, self.dev_id)
    }
}

// =============================================================================
// Binding UID
// =============================================================================

/// Process-wide binding UID, set on first port initialization.
static BINDING_UID: CriticalSectionCell<Option<Uid>> = CriticalSectionCell::new(None);

/// Return the process-wide binding UID, if one has been established.
pub fn binding_uid() -> Option<Uid> {
    BINDING_UID.with(|slot| *slot)
}

/// Establish the process-wide binding UID, lazily.
///
/// The first caller wins; later calls return the UID already bound.
/// A `dev_id` equal to [`DEVICE_ID_DEFAULT`] is the sentinel for
/// "derive from the hardware MAC": the device id becomes the last four
/// MAC octets.
pub fn bind_uid(man_id: u16, dev_id: u32, mac: &[u8; 6]) -> Uid {
    BINDING_UID.with(|slot| {
        if let Some(uid) = *slot {
            return uid;
        }
        let man_id = if man_id == 0 { MANUFACTURER_ID_DEFAULT } else { man_id };
        let dev_id = if dev_id == DEVICE_ID_DEFAULT {
            u32::from_be_bytes([mac[2], mac[3], mac[4], mac[5]])
        } else {
            dev_id
        };
        let uid = Uid::new(man_id, dev_id);
        *slot = Some(uid);
        uid
    })
}

#[cfg(test)]
pub(crate) fn reset_binding_uid_for_test() {
    BINDING_UID.with(|slot| *slot = None);
}

// =============================================================================
// Unit Tests
// =============================================================================
