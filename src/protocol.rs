//! Protocol definitions for the collectd binary network format
//!
//! Every packet is a sequence of parts:
//!
//! ```text
//! [id: 2 BE] [length: 2 BE, includes this header] [payload: length - 4]
//! ```
//!
//! String parts carry UTF-8 bytes plus a trailing zero, numeric parts a
//! big-endian `u64`, and the values part a count, a block of type tags and
//! then the values themselves.

use crate::error::EncodeError;
use std::fmt;
use std::str::FromStr;

/// Hard ceiling for one datagram, envelope included
pub const MAX_PACKET_SIZE: usize = 1024;

/// Size of the id + length header of every part
pub const PART_HEADER_SIZE: usize = 4;

/// Total size of a numeric part
pub const NUMERIC_PART_SIZE: usize = PART_HEADER_SIZE + 8;

/// Fixed bytes of a values part (header + count)
pub const VALUES_PART_BASE: usize = PART_HEADER_SIZE + 2;

/// Bytes per value in a values part (tag + 8 data bytes)
pub const VALUE_SIZE: usize = 9;

/// Part identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum PartType {
    /// Reporting host
    Host = 0x0000,
    /// Seconds since epoch
    Time = 0x0001,
    /// Plugin name
    Plugin = 0x0002,
    /// Plugin instance
    PluginInstance = 0x0003,
    /// Type name
    Type = 0x0004,
    /// Type instance
    TypeInstance = 0x0005,
    /// Values array
    Values = 0x0006,
    /// Reporting interval in seconds
    Interval = 0x0007,
    /// Notification message
    Message = 0x0100,
    /// Notification severity
    Severity = 0x0101,
    /// HMAC-signed envelope
    Signature = 0x0200,
    /// Encrypted envelope
    Encryption = 0x0210,
}

impl PartType {
    /// Convert from the wire id
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0000 => Some(PartType::Host),
            0x0001 => Some(PartType::Time),
            0x0002 => Some(PartType::Plugin),
            0x0003 => Some(PartType::PluginInstance),
            0x0004 => Some(PartType::Type),
            0x0005 => Some(PartType::TypeInstance),
            0x0006 => Some(PartType::Values),
            0x0007 => Some(PartType::Interval),
            0x0100 => Some(PartType::Message),
            0x0101 => Some(PartType::Severity),
            0x0200 => Some(PartType::Signature),
            0x0210 => Some(PartType::Encryption),
            _ => None,
        }
    }

    /// Wire id
    pub fn id(self) -> u16 {
        self as u16
    }
}

/// Data source type tag in a values part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueKind {
    /// Cumulative unsigned counter
    Counter = 0,
    /// Floating point gauge
    Gauge = 1,
}

impl ValueKind {
    /// Convert from the wire tag
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ValueKind::Counter),
            1 => Some(ValueKind::Gauge),
            _ => None,
        }
    }
}

impl FromStr for ValueKind {
    type Err = EncodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "counter" => Ok(ValueKind::Counter),
            "gauge" => Ok(ValueKind::Gauge),
            _ => Err(EncodeError::InvalidValueKind(s.to_string())),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Counter => write!(f, "counter"),
            ValueKind::Gauge => write!(f, "gauge"),
        }
    }
}

/// One value inside a values part
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Counter, encoded as `u64` big-endian
    Counter(u64),
    /// Gauge, encoded as `f64` little-endian
    Gauge(f64),
}

impl Value {
    /// Kind tag of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Counter(_) => ValueKind::Counter,
            Value::Gauge(_) => ValueKind::Gauge,
        }
    }

    /// The 8 data bytes as they appear on the wire
    pub fn to_wire_bytes(&self) -> [u8; 8] {
        match self {
            Value::Counter(v) => v.to_be_bytes(),
            Value::Gauge(v) => v.to_le_bytes(),
        }
    }
}

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum Severity {
    /// Failure
    Failure = 1,
    /// Warning
    Warning = 2,
    /// Everything fine
    #[default]
    Okay = 4,
}

impl Severity {
    /// Convert from the wire value
    pub fn from_u64(value: u64) -> Option<Self> {
        match value {
            1 => Some(Severity::Failure),
            2 => Some(Severity::Warning),
            4 => Some(Severity::Okay),
            _ => None,
        }
    }

    /// Wire value
    pub fn as_u64(self) -> u64 {
        self as u64
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Failure => write!(f, "FAILURE"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Okay => write!(f, "OKAY"),
        }
    }
}

/// Clamp a signed reading into the unsigned numeric part domain
pub fn clamp_numeric(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Encoded size of a string part
pub fn string_part_size(text: &str) -> usize {
    PART_HEADER_SIZE + text.len() + 1
}

/// Encoded size of a values part
pub fn values_part_size(count: usize) -> usize {
    VALUES_PART_BASE + VALUE_SIZE * count
}
