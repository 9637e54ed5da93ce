//! Error types for the AVDECC entity stack

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Entity model error: {0}")]
    Entity(#[from] EntityError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Worker error: {0}")]
    Worker(String),
}

/// Entity model construction and lookup errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntityError {
    #[error("Descriptor tree has no configurations")]
    NoConfigurations,

    #[error("Current configuration {current} out of range ({count} configurations)")]
    CurrentConfigurationOutOfRange { current: u16, count: usize },

    #[error("Too many configurations: {0}")]
    TooManyConfigurations(usize),

    #[error("{0} descriptor is not allowed inside a configuration")]
    MisplacedDescriptor(&'static str),

    #[error("{0} descriptor has a wire format and must be declared with its fields")]
    OpaqueDescriptor(&'static str),

    #[error("Too many {kind} descriptors in configuration {configuration}")]
    TooManyDescriptors { configuration: u16, kind: &'static str },

    #[error("String field {field} is {len} bytes (max 64)")]
    StringTooLong { field: &'static str, len: usize },

    #[error("Array {field} has {len} entries (max {max})")]
    ArrayTooLong { field: &'static str, len: usize, max: usize },

    #[error("{kind} descriptor {index} serializes to {len} bytes (max {max})")]
    DescriptorTooLarge { kind: &'static str, index: u16, len: usize, max: usize },

    #[error("No stream output with unique id {unique_id} in configuration {configuration}")]
    TalkerStreamNotFound { configuration: u16, unique_id: u16 },

    #[error("No stream input with unique id {unique_id} in configuration {configuration}")]
    ListenerStreamNotFound { configuration: u16, unique_id: u16 },
}

/// Wire decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("Not an AVTP control frame")]
    NotControl,

    #[error("Unexpected subtype: {0:#04x}")]
    UnexpectedSubtype(u8),

    #[error("Unsupported AVTP version: {0}")]
    UnsupportedVersion(u8),

    #[error("Unknown message type: {0}")]
    UnknownMessageType(u8),

    #[error("Unknown descriptor type: {0:#06x}")]
    UnknownDescriptorType(u16),

    #[error("Descriptor type {0:#06x} has no wire format")]
    UnsupportedDescriptor(u16),

    #[error("Field {field} at offset {found}, expected {expected}")]
    BadOffset { field: &'static str, found: u16, expected: u16 },

    #[error("Invalid MAC address: {0}")]
    InvalidMac(String),

    #[error("Invalid EUI-64: {0}")]
    InvalidEui64(String),
}

/// Transport (raw Ethernet) errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("Failed to open socket: {0}")]
    OpenFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Link state query failed: {0}")]
    LinkQueryFailed(String),

    #[error("Frame too large: {0} bytes")]
    FrameTooLarge(usize),

    #[error("Transport closed")]
    Closed,
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("No configuration directory available")]
    NoConfigDir,
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subsystem_errors_convert() {
        let err: Error = EntityError::TalkerStreamNotFound { configuration: 0, unique_id: 3 }.into();
        assert!(matches!(err, Error::Entity(EntityError::TalkerStreamNotFound { unique_id: 3, .. })));
        assert_eq!(
            err.to_string(),
            "Entity model error: No stream output with unique id 3 in configuration 0"
        );

        let err: Error = TransportError::Closed.into();
        assert!(matches!(err, Error::Transport(TransportError::Closed)));

        let err: Error = ConfigError::NoConfigDir.into();
        assert_eq!(err.to_string(), "Configuration error: No configuration directory available");
    }
}
