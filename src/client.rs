// collectd-emitter - collectd network protocol client
// Copyright (c) 2025 The collectd-emitter contributors
//
// Licensed under the MIT License.
// See LICENSE file for details.

//! The collectd client
//!
//! [`Collectd`] owns the metric store and turns it into packets:
//!
//! 1. Capture the wall clock once for the whole pass
//! 2. Drain the store (counters as they stand, gauges averaged and reset)
//! 3. Write every series with delta-encoded preambles, opening new packets
//!    on overflow
//! 4. Seal each payload with the configured envelope and send it to every
//!    destination
//!
//! Per-metric and per-send failures are logged and counted; they never
//! abort the pass.

use crate::config::ClientConfig;
use crate::encoder::PacketBuffer;
use crate::error::{EncodeError, Result};
use crate::metrics::{FlushReport, TransmitStats};
use crate::notification::{present, Notification};
use crate::protocol::{clamp_numeric, PartType};
use crate::security::Envelope;
use crate::store::{MetricStore, PluginInstance};
use crate::system::{local_hostname, Clock, SystemClock};
use crate::transport::{Transport, UdpTransport};
use crate::writer::{PacketWriter, PassContext};
use log::{debug, error, warn};

/// What happened to a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Sealed and handed to the transport
    Sent,
    /// Did not fit into a packet and was discarded
    Dropped,
}

/// collectd network protocol client
pub struct Collectd<T: Transport = UdpTransport, C: Clock = SystemClock> {
    config: ClientConfig,
    hostname: String,
    store: MetricStore,
    envelope: Envelope,
    transport: T,
    clock: C,
    stats: TransmitStats,
}

impl Collectd {
    /// Create a client sending over UDP with the system clock
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_parts(config, UdpTransport::new(), SystemClock)
    }
}

impl<T: Transport, C: Clock> Collectd<T, C> {
    /// Create a client with explicit transport and clock
    pub fn with_parts(config: ClientConfig, transport: T, clock: C) -> Result<Self> {
        config.validate()?;
        let envelope = config.envelope()?;
        let hostname = config.hostname.clone().unwrap_or_else(local_hostname);

        Ok(Self {
            config,
            hostname,
            store: MetricStore::new(),
            envelope,
            transport,
            clock,
            stats: TransmitStats::new(),
        })
    }

    /// Get or create the aggregation handle for (plugin, instance)
    pub fn plugin_instance(&mut self, plugin: &str, instance: &str) -> &mut PluginInstance {
        self.store.plugin_instance(plugin, instance)
    }

    /// The metric store
    pub fn store(&self) -> &MetricStore {
        &self.store
    }

    /// Active configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Host name written into packets
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// The transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The clock
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Cumulative statistics
    pub fn stats(&self) -> &TransmitStats {
        &self.stats
    }

    /// Encode the store into packets and send them to every destination
    pub fn flush(&mut self) -> FlushReport {
        let mut report = FlushReport::default();
        let time = clamp_numeric(self.clock.now());
        let context = PassContext {
            host: &self.hostname,
            time,
            interval: self.config.interval_seconds(),
        };

        let mut writer = PacketWriter::new(self.envelope.capacity());
        for sample in self.store.drain_snapshot() {
            match writer.write(&context, &sample.key, &sample.values) {
                Ok(()) => report.metrics_written += 1,
                Err(e) => {
                    warn!(
                        "Dropping metric {}/{}/{}/{}: {}",
                        sample.key.plugin,
                        sample.key.plugin_instance,
                        sample.key.type_name,
                        sample.key.type_instance,
                        e
                    );
                    report.metrics_dropped += 1;
                }
            }

            // Send full packets as soon as they close
            for payload in writer.take_finished() {
                Self::transmit(
                    &self.envelope,
                    &mut self.transport,
                    &self.config,
                    &payload,
                    &mut report,
                );
            }
        }

        for payload in writer.finish() {
            Self::transmit(
                &self.envelope,
                &mut self.transport,
                &self.config,
                &payload,
                &mut report,
            );
        }

        debug!(
            "Flushed {} metrics ({} dropped) in {} packets, {} bytes",
            report.metrics_written, report.metrics_dropped, report.packets, report.bytes_sent
        );
        self.stats.record_flush(&report);
        report
    }

    fn transmit(
        envelope: &Envelope,
        transport: &mut T,
        config: &ClientConfig,
        payload: &[u8],
        report: &mut FlushReport,
    ) {
        let packet = match envelope.seal(payload) {
            Ok(packet) => packet,
            Err(e) => {
                error!("Failed to seal packet of {} bytes: {}", payload.len(), e);
                report.seal_failures += 1;
                return;
            }
        };
        report.packets += 1;

        for destination in &config.destinations {
            match transport.send(&packet, destination) {
                Ok(()) => report.bytes_sent += packet.len() as u64,
                Err(e) => {
                    error!("Failed to send packet to {}: {}", destination, e);
                    report.send_failures += 1;
                }
            }
        }
    }

    /// Send a notification immediately in a packet of its own
    ///
    /// A notification that does not fit into one packet is dropped and
    /// logged; only sealing errors are returned.
    pub fn send_notification(&mut self, notification: &Notification) -> Result<Delivery> {
        let mut buffer = PacketBuffer::new(self.envelope.capacity());
        match self.encode_notification(&mut buffer, notification) {
            Ok(()) => {}
            Err(e) if e.is_overflow() => {
                warn!(
                    "Dropping notification \"{}\": {}",
                    notification.preview(),
                    e
                );
                self.stats.record_notification(false);
                return Ok(Delivery::Dropped);
            }
            Err(e) => return Err(e.into()),
        }

        let packet = self.envelope.seal(buffer.as_bytes()).map_err(|e| {
            error!("Failed to seal notification: {}", e);
            e
        })?;

        let mut report = FlushReport::default();
        for destination in &self.config.destinations {
            match self.transport.send(&packet, destination) {
                Ok(()) => report.bytes_sent += packet.len() as u64,
                Err(e) => {
                    error!("Failed to send notification to {}: {}", destination, e);
                    report.send_failures += 1;
                }
            }
        }
        self.stats.packets += 1;
        self.stats.bytes_sent += report.bytes_sent;
        self.stats.send_failures += report.send_failures;
        self.stats.record_notification(true);
        Ok(Delivery::Sent)
    }

    fn encode_notification(
        &self,
        buffer: &mut PacketBuffer,
        notification: &Notification,
    ) -> std::result::Result<(), EncodeError> {
        buffer.add_numeric(PartType::Time, clamp_numeric(self.clock.now()))?;
        buffer.add_numeric(PartType::Severity, notification.severity().as_u64())?;

        if let Some(host) = notification.resolved_host(&self.hostname) {
            buffer.add_string(PartType::Host, host)?;
        }
        let optional = [
            (PartType::Plugin, &notification.plugin),
            (PartType::PluginInstance, &notification.plugin_instance),
            (PartType::Type, &notification.type_name),
            (PartType::TypeInstance, &notification.type_instance),
        ];
        for (part, field) in optional {
            if let Some(text) = present(field) {
                buffer.add_string(part, text)?;
            }
        }

        buffer.add_string(PartType::Message, &notification.message)
    }
}

impl<T: Transport, C: Clock> std::fmt::Debug for Collectd<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collectd")
            .field("hostname", &self.hostname)
            .field("destinations", &self.config.destinations)
            .field("security_level", &self.envelope.level())
            .field("plugin_instances", &self.store.len())
            .field("stats", &self.stats)
            .finish()
    }
}
