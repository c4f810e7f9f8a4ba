//! Packet writer
//!
//! Drives a [`PacketBuffer`] across many metrics in one flush pass:
//!
//! - Preamble parts (host, time, interval, plugin, plugin instance, type,
//!   type instance) are only written when they differ from the value last
//!   written into the current packet.
//! - A metric is written atomically. On overflow the partial write is
//!   rolled back, the packet is closed, and the metric is retried once in a
//!   fresh packet with every preamble field re-emitted.

use crate::encoder::PacketBuffer;
use crate::error::EncodeError;
use crate::protocol::{PartType, Value};
use crate::store::MetricKey;

/// Context shared by every metric in one flush pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassContext<'a> {
    /// Reporting host
    pub host: &'a str,
    /// Seconds since epoch, captured once per pass
    pub time: u64,
    /// Interval in seconds
    pub interval: u64,
}

/// Last value written for each preamble field in the current packet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Preamble {
    host: Option<String>,
    time: Option<u64>,
    interval: Option<u64>,
    plugin: Option<String>,
    plugin_instance: Option<String>,
    type_name: Option<String>,
    type_instance: Option<String>,
}

fn write_string(
    buffer: &mut PacketBuffer,
    cached: &mut Option<String>,
    part: PartType,
    value: &str,
) -> Result<(), EncodeError> {
    if cached.as_deref() != Some(value) {
        buffer.add_string(part, value)?;
        *cached = Some(value.to_string());
    }
    Ok(())
}

fn write_numeric(
    buffer: &mut PacketBuffer,
    cached: &mut Option<u64>,
    part: PartType,
    value: u64,
) -> Result<(), EncodeError> {
    if *cached != Some(value) {
        buffer.add_numeric(part, value)?;
        *cached = Some(value);
    }
    Ok(())
}

/// Writes metrics into a sequence of packet payloads
#[derive(Debug)]
pub struct PacketWriter {
    buffer: PacketBuffer,
    preamble: Preamble,
    finished: Vec<Vec<u8>>,
}

impl PacketWriter {
    /// Create a writer whose payloads hold at most `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: PacketBuffer::new(capacity),
            preamble: Preamble::default(),
            finished: Vec::new(),
        }
    }

    /// Bytes in the packet being built
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Write one metric, opening a new packet once if the current one is full
    ///
    /// Returns the overflow error when the metric does not even fit into an
    /// empty packet; the writer is left as it was before the call.
    pub fn write(
        &mut self,
        context: &PassContext<'_>,
        key: &MetricKey,
        values: &[Value],
    ) -> Result<(), EncodeError> {
        match self.try_write(context, key, values) {
            Err(err) if err.is_overflow() && !self.buffer.is_empty() => {
                self.finish_packet();
                self.try_write(context, key, values)
            }
            other => other,
        }
    }

    fn try_write(
        &mut self,
        context: &PassContext<'_>,
        key: &MetricKey,
        values: &[Value],
    ) -> Result<(), EncodeError> {
        let mark = self.buffer.mark();
        let saved = self.preamble.clone();

        let result = self
            .write_preamble(context, key)
            .and_then(|_| self.buffer.add_values(values));
        if result.is_err() {
            self.buffer.rollback(mark);
            self.preamble = saved;
        }
        result
    }

    fn write_preamble(
        &mut self,
        context: &PassContext<'_>,
        key: &MetricKey,
    ) -> Result<(), EncodeError> {
        let buffer = &mut self.buffer;
        let p = &mut self.preamble;
        write_string(buffer, &mut p.host, PartType::Host, context.host)?;
        write_numeric(buffer, &mut p.time, PartType::Time, context.time)?;
        write_numeric(buffer, &mut p.interval, PartType::Interval, context.interval)?;
        write_string(buffer, &mut p.plugin, PartType::Plugin, &key.plugin)?;
        write_string(
            buffer,
            &mut p.plugin_instance,
            PartType::PluginInstance,
            &key.plugin_instance,
        )?;
        write_string(buffer, &mut p.type_name, PartType::Type, &key.type_name)?;
        write_string(
            buffer,
            &mut p.type_instance,
            PartType::TypeInstance,
            &key.type_instance,
        )?;
        Ok(())
    }

    /// Close the current packet (if it holds anything) and reset the preamble
    pub fn finish_packet(&mut self) {
        if !self.buffer.is_empty() {
            self.finished.push(self.buffer.take());
        }
        self.buffer.reset();
        self.preamble = Preamble::default();
    }

    /// Remove the payloads closed so far, leaving the open packet in place
    pub fn take_finished(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.finished)
    }

    /// Close the last packet and return every payload not yet taken
    pub fn finish(mut self) -> Vec<Vec<u8>> {
        self.finish_packet();
        self.finished
    }
}
