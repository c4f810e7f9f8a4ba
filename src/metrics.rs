//! Transmission statistics
//!
//! Every flush returns a [`FlushReport`]; the client folds them into
//! [`TransmitStats`] for the lifetime of the process.

/// Outcome of one flush pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Metrics written into a packet
    pub metrics_written: u64,
    /// Metrics dropped because they did not fit an empty packet
    pub metrics_dropped: u64,
    /// Sealed packets produced
    pub packets: u64,
    /// Bytes of sealed packets, counted once per destination send
    pub bytes_sent: u64,
    /// Sends the transport reported as failed
    pub send_failures: u64,
    /// Packets that could not be sealed
    pub seal_failures: u64,
}

impl FlushReport {
    /// Whether nothing was lost in this pass
    pub fn is_clean(&self) -> bool {
        self.metrics_dropped == 0 && self.send_failures == 0 && self.seal_failures == 0
    }
}

/// Cumulative statistics of a client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransmitStats {
    /// Completed flush passes
    pub flushes: u64,
    /// Metrics written
    pub metrics_written: u64,
    /// Metrics dropped
    pub metrics_dropped: u64,
    /// Packets produced (metrics and notifications)
    pub packets: u64,
    /// Bytes handed to the transport successfully
    pub bytes_sent: u64,
    /// Failed sends
    pub send_failures: u64,
    /// Failed seals
    pub seal_failures: u64,
    /// Notifications sent
    pub notifications_sent: u64,
    /// Notifications dropped on overflow
    pub notifications_dropped: u64,
}

impl TransmitStats {
    /// Create empty statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one flush report in
    pub fn record_flush(&mut self, report: &FlushReport) {
        self.flushes += 1;
        self.metrics_written += report.metrics_written;
        self.metrics_dropped += report.metrics_dropped;
        self.packets += report.packets;
        self.bytes_sent += report.bytes_sent;
        self.send_failures += report.send_failures;
        self.seal_failures += report.seal_failures;
    }

    /// Record a notification outcome
    pub fn record_notification(&mut self, sent: bool) {
        if sent {
            self.notifications_sent += 1;
        } else {
            self.notifications_dropped += 1;
        }
    }

    /// Fraction of metrics dropped (0.0 - 1.0)
    pub fn drop_rate(&self) -> f64 {
        let total = self.metrics_written + self.metrics_dropped;
        if total == 0 {
            return 0.0;
        }
        self.metrics_dropped as f64 / total as f64
    }

    /// Reset all counters
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
