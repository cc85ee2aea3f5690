//! RDM protocol identifiers
//!
//! Parameter ids, command classes, response types, NACK reasons and the
//! other small enumerations of ANSI E1.20, with their wire conversions.

/// An RDM parameter id.
pub type Pid = u16;

/// Standard parameter ids used by this driver.
pub mod pid {
    use super::Pid;

    /// Binary-tree discovery probe
    pub const DISC_UNIQUE_BRANCH: Pid = 0x0001;
    /// Mute a responder's discovery replies
    pub const DISC_MUTE: Pid = 0x0002;
    /// Un-mute all responders
    pub const DISC_UN_MUTE: Pid = 0x0003;
    /// List of PIDs the responder supports beyond the mandatory set
    pub const SUPPORTED_PARAMETERS: Pid = 0x0050;
    /// Descriptor for a manufacturer-specific PID
    pub const PARAMETER_DESCRIPTION: Pid = 0x0051;
    /// The 19-byte device information block
    pub const DEVICE_INFO: Pid = 0x0060;
    /// ASCII software version label
    pub const SOFTWARE_VERSION_LABEL: Pid = 0x00C0;
    /// User-assigned device label
    pub const DEVICE_LABEL: Pid = 0x0082;
    /// DMX512 start address
    pub const DMX_START_ADDRESS: Pid = 0x00F0;
    /// Identify-device state (lamp flash etc.)
    pub const IDENTIFY_DEVICE: Pid = 0x1000;
}

/// Sub-device field values.
pub mod sub_device {
    /// The root device
    pub const ROOT: u16 = 0x0000;
    /// All sub-devices (not legal with GET)
    pub const ALL: u16 = 0xFFFF;
    /// Highest addressable sub-device number
    pub const MAX: u16 = 0x0200;
}

/// Discovery-mute control field bits.
pub mod control_field {
    /// Responder is a managed proxy
    pub const MANAGED_PROXY: u16 = 0x0001;
    /// Responder has sub-devices
    pub const SUB_DEVICE: u16 = 0x0002;
    /// Responder requires a boot-loader (failed persistent write)
    pub const BOOT_LOADER: u16 = 0x0004;
    /// Responder is reached through a proxy
    pub const PROXIED_DEVICE: u16 = 0x0008;
}

/// RDM protocol version reported in `DEVICE_INFO` (1.0).
pub const RDM_PROTOCOL_VERSION: u16 = 0x0100;

// =============================================================================
// Command Class
// =============================================================================

/// RDM command class.
///
/// Responses carry the request's class plus one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CommandClass {
    /// Discovery request
    DiscoveryCommand = 0x10,
    /// Discovery response
    DiscoveryResponse = 0x11,
    /// Get request
    GetCommand = 0x20,
    /// Get response
    GetResponse = 0x21,
    /// Set request
    SetCommand = 0x30,
    /// Set response
    SetResponse = 0x31,
}

impl CommandClass {
    /// Parse a wire value.
    pub const fn from_wire(value: u8) -> Option<Self> {
        match value {
            0x10 => Some(CommandClass::DiscoveryCommand),
            0x11 => Some(CommandClass::DiscoveryResponse),
            0x20 => Some(CommandClass::GetCommand),
            0x21 => Some(CommandClass::GetResponse),
            0x30 => Some(CommandClass::SetCommand),
            0x31 => Some(CommandClass::SetResponse),
            _ => None,
        }
    }

    /// The wire value.
    pub const fn to_wire(self) -> u8 {
        self as u8
    }

    /// Whether this is a request class (DISC, GET or SET).
    pub const fn is_request(self) -> bool {
        matches!(
            self,
            CommandClass::DiscoveryCommand | CommandClass::GetCommand | CommandClass::SetCommand
        )
    }

    /// The response class answering this request class.
    ///
    /// Response classes map to themselves.
    pub const fn response(self) -> Self {
        match self {
            CommandClass::DiscoveryCommand | CommandClass::DiscoveryResponse => {
                CommandClass::DiscoveryResponse
            }
            CommandClass::GetCommand | CommandClass::GetResponse => CommandClass::GetResponse,
            CommandClass::SetCommand | CommandClass::SetResponse => CommandClass::SetResponse,
        }
    }
}

// =============================================================================
// Response Type
// =============================================================================

/// Response type carried in the port-id field of an RDM response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ResponseType {
    /// Request fulfilled
    Ack = 0x00,
    /// Request deferred; retry after the advertised delay
    AckTimer = 0x01,
    /// Request declined with a reason code
    NackReason = 0x02,
    /// Response larger than one packet; more data remains
    AckOverflow = 0x03,
}

impl ResponseType {
    /// Parse a wire value.
    pub const fn from_wire(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(ResponseType::Ack),
            0x01 => Some(ResponseType::AckTimer),
            0x02 => Some(ResponseType::NackReason),
            0x03 => Some(ResponseType::AckOverflow),
            _ => None,
        }
    }

    /// The wire value.
    pub const fn to_wire(self) -> u8 {
        self as u8
    }
}

// =============================================================================
// NACK Reason
// =============================================================================

/// Reason code carried in a `NACK_REASON` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NackReason {
    /// Responder does not support the requested PID
    UnknownPid,
    /// Parameter data was malformed
    FormatError,
    /// Responder hardware fault
    HardwareFault,
    /// Proxy declined to relay
    ProxyReject,
    /// Parameter is write-protected
    WriteProtect,
    /// PID exists but not for this command class
    UnsupportedCommandClass,
    /// Value outside the allowed range
    DataOutOfRange,
    /// Responder cannot buffer the request
    BufferFull,
    /// Packet exceeds the responder's capacity
    PacketSizeUnsupported,
    /// Sub-device out of range or unsupported
    SubDeviceOutOfRange,
    /// Proxy queue is full
    ProxyBufferFull,
    /// A reason code this driver does not enumerate
    Other(u16),
}

impl NackReason {
    /// The 16-bit wire code.
    pub const fn code(self) -> u16 {
        match self {
            NackReason::UnknownPid => 0x0000,
            NackReason::FormatError => 0x0001,
            NackReason::HardwareFault => 0x0002,
            NackReason::ProxyReject => 0x0003,
            NackReason::WriteProtect => 0x0004,
            NackReason::UnsupportedCommandClass => 0x0005,
            NackReason::DataOutOfRange => 0x0006,
            NackReason::BufferFull => 0x0007,
            NackReason::PacketSizeUnsupported => 0x0008,
            NackReason::SubDeviceOutOfRange => 0x0009,
            NackReason::ProxyBufferFull => 0x000A,
            NackReason::Other(code) => code,
        }
    }

    /// Decode a 16-bit wire code.
    pub const fn from_code(code: u16) -> Self {
        match code {
            0x0000 => NackReason::UnknownPid,
            0x0001 => NackReason::FormatError,
            0x0002 => NackReason::HardwareFault,
            0x0003 => NackReason::ProxyReject,
            0x0004 => NackReason::WriteProtect,
            0x0005 => NackReason::UnsupportedCommandClass,
            0x0006 => NackReason::DataOutOfRange,
            0x0007 => NackReason::BufferFull,
            0x0008 => NackReason::PacketSizeUnsupported,
            0x0009 => NackReason::SubDeviceOutOfRange,
            0x000A => NackReason::ProxyBufferFull,
            other => NackReason::Other(other),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_class_wire_roundtrip() {
        let classes = [
            CommandClass::DiscoveryCommand,
            CommandClass::DiscoveryResponse,
            CommandClass::GetCommand,
            CommandClass::GetResponse,
            CommandClass::SetCommand,
            CommandClass::SetResponse,
        ];
        for cc in classes {
            assert_eq!(CommandClass::from_wire(cc.to_wire()), Some(cc));
        }
        assert_eq!(CommandClass::from_wire(0x40), None);
    }

    #[test]
    fn command_class_response_is_request_plus_one() {
        assert_eq!(
            CommandClass::DiscoveryCommand.response().to_wire(),
            CommandClass::DiscoveryCommand.to_wire() + 1
        );
        assert_eq!(
            CommandClass::GetCommand.response().to_wire(),
            CommandClass::GetCommand.to_wire() + 1
        );
        assert_eq!(
            CommandClass::SetCommand.response().to_wire(),
            CommandClass::SetCommand.to_wire() + 1
        );
    }

    #[test]
    fn command_class_request_predicate() {
        assert!(CommandClass::GetCommand.is_request());
        assert!(CommandClass::SetCommand.is_request());
        assert!(CommandClass::DiscoveryCommand.is_request());
        assert!(!CommandClass::GetResponse.is_request());
    }

    #[test]
    fn response_type_wire_roundtrip() {
        let types = [
            ResponseType::Ack,
            ResponseType::AckTimer,
            ResponseType::NackReason,
            ResponseType::AckOverflow,
        ];
        for rt in types {
            assert_eq!(ResponseType::from_wire(rt.to_wire()), Some(rt));
        }
        assert_eq!(ResponseType::from_wire(0x04), None);
    }

    #[test]
    fn nack_reason_code_roundtrip() {
        for code in 0x0000..=0x000A {
            assert_eq!(NackReason::from_code(code).code(), code);
        }
        assert_eq!(NackReason::from_code(0x8001), NackReason::Other(0x8001));
        assert_eq!(NackReason::Other(0x8001).code(), 0x8001);
    }

    #[test]
    fn well_known_pids() {
        assert_eq!(pid::DISC_UNIQUE_BRANCH, 0x0001);
        assert_eq!(pid::DEVICE_INFO, 0x0060);
        assert_eq!(pid::DMX_START_ADDRESS, 0x00F0);
        assert_eq!(pid::IDENTIFY_DEVICE, 0x1000);
    }
}
