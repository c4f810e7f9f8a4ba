// collectd-emitter - collectd network protocol client
// Copyright (c) 2025 The collectd-emitter contributors
//
// Licensed under the MIT License.
// See LICENSE file for details.

//! Configuration types for the client

use crate::error::ConfigError;
use crate::security::{Credentials, Envelope, SecurityLevel};
use std::fmt;
use std::time::Duration;

/// Default collectd multicast group (IPv6, site-local scope)
pub const DEFAULT_HOST: &str = "ff18::efc0:4a42";

/// Default collectd network port
pub const DEFAULT_PORT: u16 = 25826;

/// Default flush interval in milliseconds
pub const DEFAULT_INTERVAL_MS: u64 = 10_000;

/// One collector endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    /// Host name or address
    pub host: String,
    /// UDP port
    pub port: u16,
}

impl Destination {
    /// Create a destination
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for Destination {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Client-level configuration
#[derive(Clone)]
pub struct ClientConfig {
    /// Flush interval (default: 10 s)
    pub interval: Duration,

    /// Collectors every packet is sent to
    pub destinations: Vec<Destination>,

    /// Reporting host name (default: local host name)
    pub hostname: Option<String>,

    /// Envelope level
    pub security_level: SecurityLevel,

    /// Username for sign/encrypt
    pub username: Option<String>,

    /// Password for sign/encrypt
    pub password: Option<String>,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("interval", &self.interval)
            .field("destinations", &self.destinations)
            .field("hostname", &self.hostname)
            .field("security_level", &self.security_level)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            destinations: vec![Destination::default()],
            hostname: None,
            security_level: SecurityLevel::None,
            username: None,
            password: None,
        }
    }
}

impl ClientConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flush interval in milliseconds
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval = Duration::from_millis(interval_ms);
        self
    }

    /// Replace the destinations with a single one
    pub fn with_destination(mut self, host: impl Into<String>, port: u16) -> Self {
        self.destinations = vec![Destination::new(host, port)];
        self
    }

    /// Add another destination
    pub fn add_destination(mut self, host: impl Into<String>, port: u16) -> Self {
        self.destinations.push(Destination::new(host, port));
        self
    }

    /// Report under an explicit host name
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Sign or encrypt packets
    pub fn with_security(
        mut self,
        level: SecurityLevel,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.security_level = level;
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Interval part value: whole seconds, rounded up
    pub fn interval_seconds(&self) -> u64 {
        let millis = self.interval.as_millis();
        u64::try_from((millis + 999) / 1000).unwrap_or(u64::MAX)
    }

    fn credentials(&self) -> Option<Credentials> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some(Credentials::new(user.clone(), pass.clone())),
            _ => None,
        }
    }

    /// Check the configuration and build the envelope it describes
    pub fn envelope(&self) -> Result<Envelope, ConfigError> {
        Envelope::new(self.security_level, self.credentials())
    }

    /// Validate everything the client needs at construction
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::InvalidInterval);
        }
        if self.destinations.is_empty() {
            return Err(ConfigError::NoDestinations);
        }
        self.envelope().map(|_| ())
    }
}
