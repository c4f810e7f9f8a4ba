// collectd-emitter - collectd network protocol client
// Copyright (c) 2025 The collectd-emitter contributors
//
// Licensed under the MIT License.
// See LICENSE file for details.

//! Error types for collectd-emitter
//!
//! Each layer has its own error enum; [`CollectdError`] folds them together.

use crate::security::SecurityLevel;
use thiserror::Error;

/// Result type alias for collectd-emitter operations
pub type Result<T> = std::result::Result<T, CollectdError>;

/// Main error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollectdError {
    /// Encoding error
    #[error("Encoding error: {0}")]
    Encode(#[from] EncodeError),

    /// Decoding error
    #[error("Decoding error: {0}")]
    Decode(#[from] DecodeError),

    /// Envelope error
    #[error("Security error: {0}")]
    Security(#[from] SecurityError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Errors while writing parts into a packet buffer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    /// The part does not fit in the remaining buffer space
    #[error("Packet overflow: need {needed} bytes, have {available}")]
    Overflow { needed: usize, available: usize },

    /// Unsupported value kind
    #[error("Invalid value kind: {0}")]
    InvalidValueKind(String),
}

impl EncodeError {
    /// Whether this is the recoverable overflow signal
    pub fn is_overflow(&self) -> bool {
        matches!(self, EncodeError::Overflow { .. })
    }
}

/// Errors while parsing a received packet
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Buffer too short
    #[error("Buffer too short: need at least {needed} bytes, got {available}")]
    BufferTooShort { needed: usize, available: usize },

    /// Part length field is smaller than the header or runs past the end
    #[error("Invalid part length {length} at offset {offset}")]
    InvalidPartLength { offset: usize, length: usize },

    /// Value type tag outside the known set
    #[error("Unknown value kind tag: {0}")]
    UnknownValueKind(u8),

    /// String part without terminator or with invalid UTF-8
    #[error("Invalid string part at offset {offset}")]
    InvalidString { offset: usize },

    /// Numeric or values part with an inconsistent payload
    #[error("Malformed part 0x{id:04x} at offset {offset}")]
    MalformedPart { id: u16, offset: usize },
}

/// Errors from sealing or opening an envelope
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SecurityError {
    /// OpenSSL reported an error
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// HMAC did not verify
    #[error("Signature mismatch")]
    SignatureMismatch,

    /// SHA-1 of the decrypted payload did not match
    #[error("Integrity check failed")]
    IntegrityCheckFailed,

    /// Credentials required to open this packet
    #[error("Missing credentials")]
    MissingCredentials,

    /// Outer packet type is not what this envelope produces
    #[error("Unexpected packet type: 0x{0:04x}")]
    UnexpectedPacketType(u16),

    /// Envelope header truncated or inconsistent
    #[error("Truncated envelope")]
    Truncated,
}

impl From<openssl::error::ErrorStack> for SecurityError {
    fn from(err: openssl::error::ErrorStack) -> Self {
        SecurityError::Crypto(err.to_string())
    }
}

/// Errors in client configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Security level not one of none/sign/encrypt
    #[error("Invalid security level: {0}")]
    InvalidSecurityLevel(String),

    /// Username and password are mandatory above level none
    #[error("Security level {0} requires username and password")]
    MissingCredentials(SecurityLevel),

    /// No destination configured
    #[error("At least one destination is required")]
    NoDestinations,

    /// Interval must be non-zero
    #[error("Interval must be greater than zero")]
    InvalidInterval,

    /// Username leaves no room for payload
    #[error("Username too long: {len} bytes (max: {max})")]
    UsernameTooLong { len: usize, max: usize },
}

/// Errors reported by a transport
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Socket error
    #[error("Send to {destination} failed: {reason}")]
    Io { destination: String, reason: String },

    /// Destination did not resolve to any address
    #[error("Could not resolve {0}")]
    Unresolved(String),

    /// Transport closed
    #[error("Transport closed")]
    Closed,
}
