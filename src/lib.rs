//! # collectd-emitter - collectd network protocol client
//!
//! Aggregates counters and gauges in-process and ships them to collectd
//! collectors over the binary network protocol (version 5), optionally
//! signed (HMAC-SHA256) or encrypted (AES-256-OFB).
//!
//! ## Key Features
//!
//! - **Aggregation**: cumulative counters, gauges averaged per interval
//! - **Compact packets**: unchanged preamble fields are not repeated
//! - **Packet splitting**: metrics never straddle the 1024 byte limit
//! - **Security envelopes**: sign or encrypt with username and password
//! - **Notifications**: out-of-band messages with severity
//!
//! ## Quick Start
//!
//! ```rust
//! use collectd_emitter::{ClientConfig, Collectd, FixedClock, MemoryTransport};
//!
//! let config = ClientConfig::new()
//!     .with_destination("127.0.0.1", 25826)
//!     .with_hostname("gandalf");
//! let mut client =
//!     Collectd::with_parts(config, MemoryTransport::new(), FixedClock::new(1_700_000_000))
//!         .unwrap();
//!
//! client.plugin_instance("sysconfig", "").add_counter("foobar", "", 5u64);
//! client.plugin_instance("memory", "").set_gauge("memory", "used", 512.0f64);
//!
//! let report = client.flush();
//! assert_eq!(report.metrics_written, 2);
//! assert_eq!(client.transport().sent().len(), 1);
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: Part identifiers, value kinds, and wire constants
//! - [`encoder`]: Bounded packet buffer
//! - [`writer`]: Delta-encoded preambles and packet splitting
//! - [`security`]: Sign and encrypt envelopes
//! - [`decoder`]: Packet parsing for collectors and tests
//! - [`store`]: Counter and gauge aggregation
//! - [`client`]: The flush driver and notifications
//! - [`scheduler`]: Background periodic flush
//! - [`metrics`]: Transmission statistics

// Modules
pub mod client;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod metrics;
pub mod notification;
pub mod protocol;
pub mod scheduler;
pub mod security;
pub mod store;
pub mod system;
pub mod transport;
pub mod writer;

// Re-exports for convenient access
pub use client::{Collectd, Delivery};
pub use config::{ClientConfig, Destination};
pub use decoder::{Decoder, Part};
pub use encoder::PacketBuffer;
pub use error::{CollectdError, Result};
pub use metrics::{FlushReport, TransmitStats};
pub use notification::Notification;
pub use protocol::{PartType, Severity, Value, ValueKind, MAX_PACKET_SIZE};
pub use scheduler::Reporter;
pub use security::{Credentials, Envelope, SecurityLevel};
pub use store::{MetricKey, MetricStore, PluginInstance};
pub use system::{Clock, FixedClock, SystemClock};
pub use transport::{MemoryTransport, Transport, UdpTransport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// collectd network protocol version produced
pub const PROTOCOL_VERSION: u8 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_basic_flush() {
        let config = ClientConfig::new()
            .with_destination("127.0.0.1", 25826)
            .with_hostname("gandalf");
        let mut client =
            Collectd::with_parts(config, MemoryTransport::new(), FixedClock::new(0)).unwrap();
        client.plugin_instance("cpu", "0").add_counter("cpu", "idle", 100u64);

        let report = client.flush();
        assert_eq!(report.packets, 1);

        let parts = Decoder::new()
            .decode(&client.transport().sent()[0].bytes)
            .unwrap();
        assert_eq!(parts.last(), Some(&Part::Values(vec![Value::Counter(100)])));
    }
}
