//! Error types for the DMX/RDM driver
//!
//! Errors are organized by domain for better diagnostics:
//! - [`ConfigError`]: Initialization and configuration failures
//! - [`CodecError`]: RDM wire-format and parameter-marshalling failures
//! - [`IoError`]: Runtime line-level TX/RX failures
//! - [`TableError`]: Parameter table registration and storage issues
//!
//! The unified [`Error`] enum wraps all domain errors and is returned
//! by most driver methods.

// =============================================================================
// Configuration Errors
// =============================================================================

/// Configuration and initialization errors
///
/// These errors occur during driver setup or when a caller hands an
/// operation arguments that fail pre-validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Driver already initialized
    AlreadyInitialized,
    /// Invalid configuration parameter
    InvalidConfig,
    /// Manufacturer id outside 0x0001..=0x7FFF
    InvalidManufacturerId,
    /// Operation argument failed pre-validation
    InvalidArgument,
    /// Driver is not in a state that permits the operation
    NotReady,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConfigError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConfigError::AlreadyInitialized => "already initialized",
            ConfigError::InvalidConfig => "invalid configuration",
            ConfigError::InvalidManufacturerId => "invalid manufacturer id",
            ConfigError::InvalidArgument => "invalid argument",
            ConfigError::NotReady => "driver not ready",
        }
    }
}

// =============================================================================
// Codec Errors
// =============================================================================

/// RDM wire-format and parameter-marshalling errors
///
/// These errors relate to packet encode/decode and the format-string
/// parameter codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodecError {
    /// Start code or sub-start code mismatch
    Malformed,
    /// Length fields exceed the available bytes
    Truncated,
    /// Additive checksum did not match
    ChecksumMismatch,
    /// Response header fields did not match the pending request
    UnexpectedResponseShape,
    /// Parameter body would exceed the 231-byte ceiling
    ParameterTooLarge,
}

impl core::fmt::Display for CodecError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CodecError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            CodecError::Malformed => "malformed packet",
            CodecError::Truncated => "truncated packet",
            CodecError::ChecksumMismatch => "checksum mismatch",
            CodecError::UnexpectedResponseShape => "unexpected response shape",
            CodecError::ParameterTooLarge => "parameter data too large",
        }
    }
}

// =============================================================================
// I/O Errors
// =============================================================================

/// Runtime line-level TX/RX errors
///
/// These errors occur while the line state machine is driving or
/// listening to the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoError {
    /// No response (or terminal line condition) within the expected window
    Timeout,
    /// Framing error or break-in-data detected by the line
    BusError,
    /// A controller transaction is already in flight on this port
    SendBusy,
    /// Line state machine is not in a state that permits the operation
    InvalidState,
    /// Persistent store rejected a write; boot-loader flag raised
    PersistenceFailed,
}

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl IoError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            IoError::Timeout => "operation timed out",
            IoError::BusError => "bus framing error",
            IoError::SendBusy => "transaction already pending",
            IoError::InvalidState => "invalid line state for operation",
            IoError::PersistenceFailed => "persistent store failed",
        }
    }
}

// =============================================================================
// Parameter Table Errors
// =============================================================================

/// Parameter table registration and storage errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TableError {
    /// PID not known to the responder
    NotRegistered,
    /// Parameter table or its backing arena is full
    CapacityExceeded,
}

impl core::fmt::Display for TableError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TableError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            TableError::NotRegistered => "pid not registered",
            TableError::CapacityExceeded => "parameter table full",
        }
    }
}

// =============================================================================
// Unified Error Type
// =============================================================================

/// This enum wraps all domain-specific errors for unified error handling.
///
/// Match on the inner domain error for specific handling:
/// ```ignore
/// match result {
///     Err(Error::Codec(CodecError::ChecksumMismatch)) => { /* ... */ }
///     Err(Error::Io(IoError::Timeout)) => { /* ... */ }
///     _ => {}
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Configuration error
    Config(ConfigError),
    /// Codec error
    Codec(CodecError),
    /// I/O error
    Io(IoError),
    /// Parameter table error
    Table(TableError),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Config(e) => write!(f, "config: {}", e.as_str()),
            Error::Codec(e) => write!(f, "codec: {}", e.as_str()),
            Error::Io(e) => write!(f, "io: {}", e.as_str()),
            Error::Table(e) => write!(f, "table: {}", e.as_str()),
        }
    }
}

// From impls for automatic conversion
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Error::Codec(e)
    }
}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Error::Io(e)
    }
}

impl From<TableError> for Error {
    fn from(e: TableError) -> Self {
        Error::Table(e)
    }
}

/// Result type alias for driver operations
pub type Result<T> = core::result::Result<T, Error>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = core::result::Result<T, ConfigError>;

/// Result type alias for codec operations
pub type CodecResult<T> = core::result::Result<T, CodecError>;

/// Result type alias for I/O operations
pub type IoResult<T> = core::result::Result<T, IoError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    extern crate std;
    use std::format;

    use super::*;

    #[test]
    fn config_error_as_str_non_empty() {
        let variants = [
            ConfigError::AlreadyInitialized,
            ConfigError::InvalidConfig,
            ConfigError::InvalidManufacturerId,
            ConfigError::InvalidArgument,
            ConfigError::NotReady,
        ];

        for variant in variants {
            let s = variant.as_str();
            assert!(!s.is_empty(), "ConfigError::{:?} has empty string", variant);
        }
    }

    #[test]
    fn codec_error_as_str_non_empty() {
        let variants = [
            CodecError::Malformed,
            CodecError::Truncated,
            CodecError::ChecksumMismatch,
            CodecError::UnexpectedResponseShape,
            CodecError::ParameterTooLarge,
        ];

        for variant in variants {
            let s = variant.as_str();
            assert!(!s.is_empty(), "CodecError::{:?} has empty string", variant);
        }
    }

    #[test]
    fn io_error_as_str_non_empty() {
        let variants = [
            IoError::Timeout,
            IoError::BusError,
            IoError::SendBusy,
            IoError::InvalidState,
            IoError::PersistenceFailed,
        ];

        for variant in variants {
            let s = variant.as_str();
            assert!(!s.is_empty(), "IoError::{:?} has empty string", variant);
        }
    }

    #[test]
    fn codec_error_display() {
        let err = CodecError::ChecksumMismatch;
        let display = format!("{}", err);
        assert_eq!(display, "checksum mismatch");
    }

    #[test]
    fn io_error_display() {
        let err = IoError::Timeout;
        let display = format!("{}", err);
        assert_eq!(display, "operation timed out");
    }

    #[test]
    fn error_from_config_error() {
        let config_err = ConfigError::InvalidArgument;
        let err: Error = config_err.into();

        match err {
            Error::Config(e) => assert_eq!(e, ConfigError::InvalidArgument),
            _ => panic!("Expected Error::Config"),
        }
    }

    #[test]
    fn error_from_codec_error() {
        let codec_err = CodecError::Truncated;
        let err: Error = codec_err.into();

        match err {
            Error::Codec(e) => assert_eq!(e, CodecError::Truncated),
            _ => panic!("Expected Error::Codec"),
        }
    }

    #[test]
    fn error_from_io_error() {
        let io_err = IoError::BusError;
        let err: Error = io_err.into();

        match err {
            Error::Io(e) => assert_eq!(e, IoError::BusError),
            _ => panic!("Expected Error::Io"),
        }
    }

    #[test]
    fn error_from_table_error() {
        let table_err = TableError::CapacityExceeded;
        let err: Error = table_err.into();

        match err {
            Error::Table(e) => assert_eq!(e, TableError::CapacityExceeded),
            _ => panic!("Expected Error::Table"),
        }
    }

    #[test]
    fn error_display_prefixes_domain() {
        let display = format!("{}", Error::Codec(CodecError::Malformed));
        assert!(display.contains("codec"));
        assert!(display.contains("malformed"));

        let display = format!("{}", Error::Io(IoError::SendBusy));
        assert!(display.contains("io"));
        assert!(display.contains("pending"));
    }

    #[test]
    fn error_equality() {
        let err1 = Error::Io(IoError::Timeout);
        let err2 = Error::Io(IoError::Timeout);
        let err3 = Error::Io(IoError::BusError);

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }

    #[test]
    fn result_type_works() {
        fn test_fn() -> Result<u32> {
            Ok(42)
        }

        assert_eq!(test_fn().unwrap(), 42);
    }

    #[test]
    fn io_result_type_works() {
        fn test_fn() -> IoResult<u32> {
            Err(IoError::Timeout)
        }

        assert!(test_fn().is_err());
    }
}
