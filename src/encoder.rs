//! Encoder module
//!
//! [`PacketBuffer`] appends protocol parts into a bounded byte buffer. Every
//! `add_*` call checks the full part size up front and returns
//! [`EncodeError::Overflow`] without touching the buffer when it would not
//! fit, so callers can roll back and retry in a fresh packet.

use crate::error::EncodeError;
use crate::protocol::{
    string_part_size, values_part_size, PartType, Value, MAX_PACKET_SIZE, NUMERIC_PART_SIZE,
};

/// Bounded packet buffer with a write cursor
#[derive(Debug, Clone)]
pub struct PacketBuffer {
    buf: Vec<u8>,
    capacity: usize,
}

impl PacketBuffer {
    /// Create a buffer holding at most `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Maximum number of bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes written so far (the cursor)
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if nothing has been written
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Free space left
    pub fn remaining(&self) -> usize {
        self.capacity - self.buf.len()
    }

    /// Written bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Current cursor position, for [`PacketBuffer::rollback`]
    pub fn mark(&self) -> usize {
        self.buf.len()
    }

    /// Move the cursor back to a previous mark
    pub fn rollback(&mut self, mark: usize) {
        self.buf.truncate(mark);
    }

    /// Reset the cursor to zero
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Take the written bytes, leaving an empty buffer of the same capacity
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::replace(&mut self.buf, Vec::with_capacity(self.capacity))
    }

    fn reserve(&self, needed: usize) -> Result<(), EncodeError> {
        let available = self.remaining();
        if needed > available {
            return Err(EncodeError::Overflow { needed, available });
        }
        Ok(())
    }

    fn put_header(&mut self, id: u16, len: usize) {
        self.buf.extend_from_slice(&id.to_be_bytes());
        // Bounded by capacity, which never exceeds MAX_PACKET_SIZE in practice
        self.buf.extend_from_slice(&(len as u16).to_be_bytes());
    }

    /// Append a zero-terminated string part
    pub fn add_string(&mut self, part: PartType, text: &str) -> Result<(), EncodeError> {
        let len = string_part_size(text);
        self.reserve(len)?;

        self.put_header(part.id(), len);
        self.buf.extend_from_slice(text.as_bytes());
        self.buf.push(0);
        Ok(())
    }

    /// Append a 64-bit big-endian numeric part
    pub fn add_numeric(&mut self, part: PartType, value: u64) -> Result<(), EncodeError> {
        self.reserve(NUMERIC_PART_SIZE)?;

        self.put_header(part.id(), NUMERIC_PART_SIZE);
        self.buf.extend_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Append a values part
    ///
    /// All type tags are written as one block before the value data.
    pub fn add_values(&mut self, values: &[Value]) -> Result<(), EncodeError> {
        let len = values_part_size(values.len());
        self.reserve(len)?;

        self.put_header(PartType::Values.id(), len);
        self.buf
            .extend_from_slice(&(values.len() as u16).to_be_bytes());
        for value in values {
            self.buf.push(value.kind() as u8);
        }
        for value in values {
            self.buf.extend_from_slice(&value.to_wire_bytes());
        }
        Ok(())
    }
}

impl Default for PacketBuffer {
    fn default() -> Self {
        Self::new(MAX_PACKET_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_part_layout() {
        let mut buffer = PacketBuffer::default();
        buffer.add_string(PartType::Plugin, "cpu").unwrap();

        assert_eq!(buffer.as_bytes(), &[0x00, 0x02, 0x00, 0x08, b'c', b'p', b'u', 0x00]);
    }

    #[test]
    fn test_string_part_size() {
        let text = "some plugin instance";
        let mut buffer = PacketBuffer::default();
        buffer.add_string(PartType::PluginInstance, text).unwrap();

        let bytes = buffer.as_bytes();
        assert_eq!(bytes.len(), 4 + text.len() + 1);
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]) as usize, 5 + text.len());
        assert_eq!(*bytes.last().unwrap(), 0);
    }

    #[test]
    fn test_multibyte_string_uses_byte_length() {
        let mut buffer = PacketBuffer::default();
        buffer.add_string(PartType::Host, "h\u{e9}te").unwrap();
        assert_eq!(buffer.len(), 4 + 5 + 1);
    }

    #[test]
    fn test_numeric_part_layout() {
        let mut buffer = PacketBuffer::default();
        buffer
            .add_numeric(PartType::Time, 0x0102_0304_0506_0708)
            .unwrap();

        assert_eq!(
            buffer.as_bytes(),
            &[0x00, 0x01, 0x00, 0x0c, 1, 2, 3, 4, 5, 6, 7, 8]
        );
    }

    #[test]
    fn test_numeric_part_max_value() {
        let mut buffer = PacketBuffer::default();
        buffer.add_numeric(PartType::Interval, u64::MAX).unwrap();
        assert_eq!(&buffer.as_bytes()[4..], &[0xff; 8]);
    }

    #[test]
    fn test_values_part_layout() {
        let mut buffer = PacketBuffer::default();
        buffer
            .add_values(&[Value::Counter(5), Value::Gauge(1.5)])
            .unwrap();

        let mut expected = vec![0x00, 0x06, 0x00, 0x18, 0x00, 0x02, 0x00, 0x01];
        expected.extend_from_slice(&5u64.to_be_bytes());
        expected.extend_from_slice(&1.5f64.to_le_bytes());
        assert_eq!(buffer.as_bytes(), expected.as_slice());
    }

    #[test]
    fn test_overflow_leaves_buffer_intact() {
        let mut buffer = PacketBuffer::new(40);
        // 4 + 24 + 1 = 29 bytes, leaving 11
        buffer
            .add_string(PartType::Host, "abcdefghijklmnopqrstuvwx")
            .unwrap();
        let before = buffer.as_bytes().to_vec();

        let err = buffer.add_numeric(PartType::Time, 42).unwrap_err();
        assert_eq!(
            err,
            EncodeError::Overflow {
                needed: 12,
                available: 11
            }
        );
        assert_eq!(buffer.as_bytes(), before.as_slice());

        // Retry into a fresh buffer
        let sent = buffer.take();
        assert_eq!(sent, before);
        assert!(buffer.is_empty());
        buffer.add_numeric(PartType::Time, 42).unwrap();
        assert_eq!(buffer.len(), 12);
    }

    #[test]
    fn test_exact_fit() {
        let mut buffer = PacketBuffer::new(12);
        buffer.add_numeric(PartType::Time, 1).unwrap();
        assert_eq!(buffer.remaining(), 0);
        assert!(buffer.add_string(PartType::Host, "").is_err());
    }

    #[test]
    fn test_rollback() {
        let mut buffer = PacketBuffer::default();
        buffer.add_string(PartType::Host, "a").unwrap();
        let mark = buffer.mark();
        buffer.add_string(PartType::Plugin, "b").unwrap();
        buffer.rollback(mark);
        assert_eq!(buffer.len(), mark);
    }

    #[test]
    fn test_values_overflow() {
        let mut buffer = PacketBuffer::new(20);
        let values = vec![Value::Counter(1); 2]; // 24 bytes
        assert!(buffer.add_values(&values).unwrap_err().is_overflow());
        assert!(buffer.is_empty());
    }
}
