//! Decoder module
//!
//! Parses collectd packets back into [`Part`]s. This is the receiving side
//! of the protocol; the client itself never decodes, but collectors, relays
//! and the test suite do.

use crate::error::{DecodeError, Result, SecurityError};
use crate::protocol::{PartType, Value, ValueKind, PART_HEADER_SIZE};
use crate::security::{Credentials, Envelope, SecurityLevel, SIGN_OVERHEAD};

/// One decoded part
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    /// Reporting host
    Host(String),
    /// Seconds since epoch
    Time(u64),
    /// Reporting interval in seconds
    Interval(u64),
    /// Plugin name
    Plugin(String),
    /// Plugin instance
    PluginInstance(String),
    /// Type name
    Type(String),
    /// Type instance
    TypeInstance(String),
    /// Values array
    Values(Vec<Value>),
    /// Notification message
    Message(String),
    /// Notification severity
    Severity(u64),
    /// Part id this decoder does not interpret
    Unknown { id: u16, payload: Vec<u8> },
}

impl Part {
    /// Wire id of this part
    pub fn id(&self) -> u16 {
        match self {
            Part::Host(_) => PartType::Host.id(),
            Part::Time(_) => PartType::Time.id(),
            Part::Interval(_) => PartType::Interval.id(),
            Part::Plugin(_) => PartType::Plugin.id(),
            Part::PluginInstance(_) => PartType::PluginInstance.id(),
            Part::Type(_) => PartType::Type.id(),
            Part::TypeInstance(_) => PartType::TypeInstance.id(),
            Part::Values(_) => PartType::Values.id(),
            Part::Message(_) => PartType::Message.id(),
            Part::Severity(_) => PartType::Severity.id(),
            Part::Unknown { id, .. } => *id,
        }
    }
}

/// Decoder for collectd packets
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    credentials: Option<Credentials>,
}

impl Decoder {
    /// Create a decoder for plain (and unverified signed) packets
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder that verifies signatures and decrypts
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            credentials: Some(credentials),
        }
    }

    /// Decode a datagram, opening its envelope first when there is one
    pub fn decode(&self, packet: &[u8]) -> Result<Vec<Part>> {
        let payload = self.open(packet)?;
        Ok(parse_parts(&payload)?)
    }

    fn open(&self, packet: &[u8]) -> Result<Vec<u8>> {
        if packet.len() < 2 {
            return Ok(packet.to_vec());
        }
        let packet_type = u16::from_be_bytes([packet[0], packet[1]]);
        let level = match PartType::from_u16(packet_type) {
            Some(PartType::Signature) => SecurityLevel::Sign,
            Some(PartType::Encryption) => SecurityLevel::Encrypt,
            _ => return Ok(packet.to_vec()),
        };

        match (&self.credentials, level) {
            (Some(credentials), level) => {
                let envelope = Envelope::new(level, Some(credentials.clone()))?;
                Ok(envelope.open(packet)?)
            }
            // Signed packets are still readable without the secret
            (None, SecurityLevel::Sign) => Ok(strip_signature(packet)?.to_vec()),
            (None, _) => Err(SecurityError::MissingCredentials.into()),
        }
    }
}

fn strip_signature(packet: &[u8]) -> std::result::Result<&[u8], SecurityError> {
    if packet.len() < PART_HEADER_SIZE {
        return Err(SecurityError::Truncated);
    }
    let header_len = u16::from_be_bytes([packet[2], packet[3]]) as usize;
    if header_len < SIGN_OVERHEAD || header_len > packet.len() {
        return Err(SecurityError::Truncated);
    }
    Ok(&packet[header_len..])
}

/// Parse a plain payload into parts
pub fn parse_parts(payload: &[u8]) -> std::result::Result<Vec<Part>, DecodeError> {
    let mut parts = Vec::new();
    let mut offset = 0;

    while offset < payload.len() {
        if offset + PART_HEADER_SIZE > payload.len() {
            return Err(DecodeError::BufferTooShort {
                needed: offset + PART_HEADER_SIZE,
                available: payload.len(),
            });
        }
        let id = u16::from_be_bytes([payload[offset], payload[offset + 1]]);
        let length = u16::from_be_bytes([payload[offset + 2], payload[offset + 3]]) as usize;
        if length < PART_HEADER_SIZE || offset + length > payload.len() {
            return Err(DecodeError::InvalidPartLength { offset, length });
        }

        let body = &payload[offset + PART_HEADER_SIZE..offset + length];
        parts.push(parse_part(id, body, offset)?);
        offset += length;
    }

    Ok(parts)
}

fn parse_part(id: u16, body: &[u8], offset: usize) -> std::result::Result<Part, DecodeError> {
    let part = match PartType::from_u16(id) {
        Some(PartType::Host) => Part::Host(parse_string(body, offset)?),
        Some(PartType::Plugin) => Part::Plugin(parse_string(body, offset)?),
        Some(PartType::PluginInstance) => Part::PluginInstance(parse_string(body, offset)?),
        Some(PartType::Type) => Part::Type(parse_string(body, offset)?),
        Some(PartType::TypeInstance) => Part::TypeInstance(parse_string(body, offset)?),
        Some(PartType::Message) => Part::Message(parse_string(body, offset)?),
        Some(PartType::Time) => Part::Time(parse_numeric(id, body, offset)?),
        Some(PartType::Interval) => Part::Interval(parse_numeric(id, body, offset)?),
        Some(PartType::Severity) => Part::Severity(parse_numeric(id, body, offset)?),
        Some(PartType::Values) => Part::Values(parse_values(body, offset)?),
        _ => Part::Unknown {
            id,
            payload: body.to_vec(),
        },
    };
    Ok(part)
}

fn parse_string(body: &[u8], offset: usize) -> std::result::Result<String, DecodeError> {
    match body.split_last() {
        Some((&0, text)) => String::from_utf8(text.to_vec())
            .map_err(|_| DecodeError::InvalidString { offset }),
        _ => Err(DecodeError::InvalidString { offset }),
    }
}

fn parse_numeric(id: u16, body: &[u8], offset: usize) -> std::result::Result<u64, DecodeError> {
    let bytes: [u8; 8] = body
        .try_into()
        .map_err(|_| DecodeError::MalformedPart { id, offset })?;
    Ok(u64::from_be_bytes(bytes))
}

fn parse_values(body: &[u8], offset: usize) -> std::result::Result<Vec<Value>, DecodeError> {
    let malformed = DecodeError::MalformedPart {
        id: PartType::Values.id(),
        offset,
    };
    if body.len() < 2 {
        return Err(malformed);
    }
    let count = u16::from_be_bytes([body[0], body[1]]) as usize;
    if body.len() != 2 + count * 9 {
        return Err(malformed);
    }

    let tags = &body[2..2 + count];
    let data = &body[2 + count..];
    tags.iter()
        .zip(data.chunks_exact(8))
        .map(|(&tag, chunk)| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            match ValueKind::from_u8(tag) {
                Some(ValueKind::Counter) => Ok(Value::Counter(u64::from_be_bytes(raw))),
                Some(ValueKind::Gauge) => Ok(Value::Gauge(f64::from_le_bytes(raw))),
                None => Err(DecodeError::UnknownValueKind(tag)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::PacketBuffer;
    use crate::error::CollectdError;

    fn sample_payload() -> Vec<u8> {
        let mut buffer = PacketBuffer::default();
        buffer.add_string(PartType::Host, "gandalf").unwrap();
        buffer.add_numeric(PartType::Time, 1_700_000_000).unwrap();
        buffer.add_string(PartType::Plugin, "cpu").unwrap();
        buffer
            .add_values(&[Value::Counter(7), Value::Gauge(0.25)])
            .unwrap();
        buffer.take()
    }

    #[test]
    fn test_parse_parts() {
        let parts = parse_parts(&sample_payload()).unwrap();
        assert_eq!(
            parts,
            vec![
                Part::Host("gandalf".into()),
                Part::Time(1_700_000_000),
                Part::Plugin("cpu".into()),
                Part::Values(vec![Value::Counter(7), Value::Gauge(0.25)]),
            ]
        );
    }

    #[test]
    fn test_unknown_part_is_kept() {
        let payload = [0x12, 0x34, 0x00, 0x06, 0xaa, 0xbb];
        let parts = parse_parts(&payload).unwrap();
        assert_eq!(
            parts,
            vec![Part::Unknown {
                id: 0x1234,
                payload: vec![0xaa, 0xbb]
            }]
        );
        assert_eq!(parts[0].id(), 0x1234);
    }

    #[test]
    fn test_invalid_length() {
        let payload = [0x00, 0x00, 0x00, 0x02];
        assert!(matches!(
            parse_parts(&payload),
            Err(DecodeError::InvalidPartLength { offset: 0, length: 2 })
        ));

        let payload = [0x00, 0x00, 0x00, 0x20, b'a', 0];
        assert!(matches!(
            parse_parts(&payload),
            Err(DecodeError::InvalidPartLength { .. })
        ));
    }

    #[test]
    fn test_truncated_header() {
        assert!(matches!(
            parse_parts(&[0x00, 0x01]),
            Err(DecodeError::BufferTooShort { .. })
        ));
    }

    #[test]
    fn test_unknown_value_kind() {
        let mut payload = vec![0x00, 0x06, 0x00, 0x0f, 0x00, 0x01, 0x07];
        payload.extend_from_slice(&[0u8; 8]);
        assert_eq!(parse_parts(&payload), Err(DecodeError::UnknownValueKind(7)));
    }

    #[test]
    fn test_string_without_terminator() {
        let payload = [0x00, 0x02, 0x00, 0x06, b'a', b'b'];
        assert_eq!(
            parse_parts(&payload),
            Err(DecodeError::InvalidString { offset: 0 })
        );
    }

    #[test]
    fn test_decode_signed_without_credentials() {
        let envelope = Envelope::new(
            SecurityLevel::Sign,
            Some(Credentials::new("alice", "secret")),
        )
        .unwrap();
        let packet = envelope.seal(&sample_payload()).unwrap();

        let parts = Decoder::new().decode(&packet).unwrap();
        assert_eq!(parts.len(), 4);
    }

    #[test]
    fn test_decode_encrypted() {
        let creds = Credentials::new("alice", "secret");
        let envelope = Envelope::new(SecurityLevel::Encrypt, Some(creds.clone())).unwrap();
        let packet = envelope.seal(&sample_payload()).unwrap();

        assert_eq!(
            Decoder::new().decode(&packet),
            Err(CollectdError::Security(SecurityError::MissingCredentials))
        );
        let parts = Decoder::with_credentials(creds).decode(&packet).unwrap();
        assert_eq!(parts[0], Part::Host("gandalf".into()));
    }
}
