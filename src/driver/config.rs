//! Configuration types for the DMX/RDM driver

use crate::constants::{
    BREAK_US_DEFAULT, BREAK_US_MIN, DEVICE_ID_DEFAULT, DMX_SLOT_COUNT, MAB_US_DEFAULT, MAB_US_MIN,
    MANUFACTURER_ID_DEFAULT, MAX_PERSONALITIES,
};

/// One DMX personality: a footprint and a human-readable description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Personality {
    /// Number of consecutive DMX slots the personality occupies
    pub footprint: u16,
    /// Short description shown to controllers
    pub description: &'static str,
}

impl Personality {
    /// Create a personality.
    pub const fn new(footprint: u16, description: &'static str) -> Self {
        Self {
            footprint,
            description,
        }
    }
}

/// Complete driver configuration for one port.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmxConfig {
    /// ESTA manufacturer id, `0x0001..=0x7FFF`
    pub manufacturer_id: u16,
    /// Device id; [`DEVICE_ID_DEFAULT`] derives it from `mac`
    pub device_id: u32,
    /// Hardware MAC used to derive the device id
    pub mac: [u8; 6],
    /// Transmitted break duration in microseconds
    pub break_us: u32,
    /// Transmitted mark-after-break duration in microseconds
    pub mab_us: u32,
    /// Device model id reported in `DEVICE_INFO`
    pub model_id: u16,
    /// Product category reported in `DEVICE_INFO`
    pub product_category: u16,
    /// Software version id reported in `DEVICE_INFO`
    pub software_version_id: u32,
    /// Software version label (up to 32 ASCII characters)
    pub software_version_label: &'static str,
    /// Initial device label before a controller sets one
    pub device_label: &'static str,
    /// Declared personalities; entries beyond `personality_count` are
    /// ignored
    pub personalities: [Personality; MAX_PERSONALITIES],
    /// Number of valid entries in `personalities`
    pub personality_count: u8,
    /// Current personality, 1-based
    pub current_personality: u8,
    /// Initial DMX start address, `1..=512`
    pub dmx_start_address: u16,
    /// Skip the single-device fast path during discovery and always
    /// bisect colliding branches
    pub discovery_force_bisect: bool,
    /// Personalities declared through the builder; the first
    /// declaration replaces the built-in default
    declared_personalities: u8,
}

impl Default for DmxConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DmxConfig {
    /// Create a configuration with defaults: one 1-slot personality,
    /// start address 1, device id derived from the MAC.
    pub const fn new() -> Self {
        Self {
            manufacturer_id: MANUFACTURER_ID_DEFAULT,
            device_id: DEVICE_ID_DEFAULT,
            mac: [0; 6],
            break_us: BREAK_US_DEFAULT,
            mab_us: MAB_US_DEFAULT,
            model_id: 0,
            product_category: 0x0100,
            software_version_id: 0x0001_0000,
            software_version_label: "1.0.0",
            device_label: "",
            personalities: [Personality::new(1, "Default"); MAX_PERSONALITIES],
            personality_count: 1,
            current_personality: 1,
            dmx_start_address: 1,
            discovery_force_bisect: cfg!(debug_assertions),
            declared_personalities: 0,
        }
    }

    // =========================================================================
    // Builder Methods
    // =========================================================================

    /// Set the manufacturer id.
    #[must_use]
    pub const fn with_manufacturer_id(mut self, manufacturer_id: u16) -> Self {
        self.manufacturer_id = manufacturer_id;
        self
    }

    /// Set an explicit device id instead of deriving it from the MAC.
    #[must_use]
    pub const fn with_device_id(mut self, device_id: u32) -> Self {
        self.device_id = device_id;
        self
    }

    /// Set the hardware MAC the device id is derived from.
    #[must_use]
    pub const fn with_mac(mut self, mac: [u8; 6]) -> Self {
        self.mac = mac;
        self
    }

    /// Set the transmitted break duration.
    #[must_use]
    pub const fn with_break_us(mut self, break_us: u32) -> Self {
        self.break_us = break_us;
        self
    }

    /// Set the transmitted mark-after-break duration.
    #[must_use]
    pub const fn with_mab_us(mut self, mab_us: u32) -> Self {
        self.mab_us = mab_us;
        self
    }

    /// Set the model id reported in `DEVICE_INFO`.
    #[must_use]
    pub const fn with_model_id(mut self, model_id: u16) -> Self {
        self.model_id = model_id;
        self
    }

    /// Set the software version id and label.
    #[must_use]
    pub const fn with_software_version(mut self, id: u32, label: &'static str) -> Self {
        self.software_version_id = id;
        self.software_version_label = label;
        self
    }

    /// Declare a personality. Declarations beyond
    /// [`MAX_PERSONALITIES`] overwrite the last entry.
    #[must_use]
    pub const fn with_personality(mut self, footprint: u16, description: &'static str) -> Self {
        let index = if (self.declared_personalities as usize) < MAX_PERSONALITIES {
            self.declared_personalities as usize
        } else {
            MAX_PERSONALITIES - 1
        };
        self.personalities[index] = Personality::new(footprint, description);
        self.declared_personalities = index as u8 + 1;
        self.personality_count = self.declared_personalities;
        self
    }

    /// Set the current personality (1-based).
    #[must_use]
    pub const fn with_current_personality(mut self, personality: u8) -> Self {
        self.current_personality = personality;
        self
    }

    /// Set the initial DMX start address.
    #[must_use]
    pub const fn with_dmx_start_address(mut self, address: u16) -> Self {
        self.dmx_start_address = address;
        self
    }

    /// Control the discovery fast path explicitly.
    #[must_use]
    pub const fn with_discovery_force_bisect(mut self, force: bool) -> Self {
        self.discovery_force_bisect = force;
        self
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Whether the configuration satisfies the protocol's limits.
    pub fn is_valid(&self) -> bool {
        (0x0001..=0x7FFF).contains(&self.manufacturer_id)
            && self.break_us >= BREAK_US_MIN
            && self.mab_us >= MAB_US_MIN
            && self.personality_count >= 1
            && self.personality_count as usize <= MAX_PERSONALITIES
            && (1..=self.personality_count).contains(&self.current_personality)
            && (1..=DMX_SLOT_COUNT as u16).contains(&self.dmx_start_address)
    }

    /// Footprint of the current personality.
    pub fn current_footprint(&self) -> u16 {
        self.personalities[self.current_personality as usize - 1].footprint
    }
}

/// Driver lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Not initialized
    #[default]
    Uninitialized,
    /// Initialized; DMX and RDM operations permitted
    Ready,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_values() {
        let config = DmxConfig::new();

        assert_eq!(config.manufacturer_id, MANUFACTURER_ID_DEFAULT);
        assert_eq!(config.device_id, DEVICE_ID_DEFAULT);
        assert_eq!(config.break_us, BREAK_US_DEFAULT);
        assert_eq!(config.mab_us, MAB_US_DEFAULT);
        assert_eq!(config.personality_count, 1);
        assert_eq!(config.current_personality, 1);
        assert_eq!(config.dmx_start_address, 1);
    }

    #[test]
    fn config_default_trait_matches_new() {
        let from_default = DmxConfig::default();
        let from_new = DmxConfig::new();

        assert_eq!(from_default.manufacturer_id, from_new.manufacturer_id);
        assert_eq!(from_default.break_us, from_new.break_us);
        assert_eq!(from_default.dmx_start_address, from_new.dmx_start_address);
    }

    #[test]
    fn config_default_is_valid() {
        assert!(DmxConfig::new().is_valid());
    }

    #[test]
    fn config_builder_chaining() {
        let config = DmxConfig::new()
            .with_manufacturer_id(0x1234)
            .with_device_id(0xAABBCCDD)
            .with_break_us(200)
            .with_mab_us(16)
            .with_model_id(0x0042)
            .with_software_version(0x0002_0000, "2.0.0")
            .with_dmx_start_address(17);

        assert_eq!(config.manufacturer_id, 0x1234);
        assert_eq!(config.device_id, 0xAABBCCDD);
        assert_eq!(config.break_us, 200);
        assert_eq!(config.mab_us, 16);
        assert_eq!(config.model_id, 0x0042);
        assert_eq!(config.software_version_label, "2.0.0");
        assert_eq!(config.dmx_start_address, 17);
        assert!(config.is_valid());
    }

    #[test]
    fn config_personality_declaration() {
        let config = DmxConfig::new()
            .with_personality(3, "RGB")
            .with_personality(5, "RGB + strobe + dim")
            .with_current_personality(2);

        assert_eq!(config.personality_count, 2);
        assert_eq!(config.personalities[0].footprint, 3);
        assert_eq!(config.personalities[1].footprint, 5);
        assert_eq!(config.current_footprint(), 5);
        assert!(config.is_valid());
    }

    #[test]
    fn config_first_declared_personality_replaces_builtin_default() {
        let config = DmxConfig::new()
            .with_personality(1, "Dimmer")
            .with_personality(4, "RGBW");

        assert_eq!(config.personality_count, 2);
        assert_eq!(config.personalities[0].description, "Dimmer");
        assert_eq!(config.personalities[1].footprint, 4);
    }

    #[test]
    fn config_rejects_invalid_manufacturer_id() {
        assert!(!DmxConfig::new().with_manufacturer_id(0).is_valid());
        assert!(!DmxConfig::new().with_manufacturer_id(0x8000).is_valid());
        assert!(DmxConfig::new().with_manufacturer_id(0x7FFF).is_valid());
    }

    #[test]
    fn config_rejects_short_break_and_mab() {
        assert!(!DmxConfig::new().with_break_us(50).is_valid());
        assert!(!DmxConfig::new().with_mab_us(4).is_valid());
        assert!(DmxConfig::new().with_break_us(BREAK_US_MIN).is_valid());
    }

    #[test]
    fn config_rejects_bad_start_address() {
        assert!(!DmxConfig::new().with_dmx_start_address(0).is_valid());
        assert!(!DmxConfig::new().with_dmx_start_address(513).is_valid());
        assert!(DmxConfig::new().with_dmx_start_address(512).is_valid());
    }

    #[test]
    fn config_rejects_bad_personality_selection() {
        let config = DmxConfig::new().with_current_personality(2);
        assert!(!config.is_valid());
    }

    #[test]
    fn state_default() {
        assert_eq!(State::default(), State::Uninitialized);
    }
}
