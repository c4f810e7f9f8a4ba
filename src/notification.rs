//! Out-of-band notifications
//!
//! A notification bypasses aggregation and goes out as a single packet:
//!
//! ```text
//! time, severity, [host], [plugin], [plugin instance], [type], [type instance], message
//! ```
//!
//! Optional fields distinguish "omitted" (`None`) from "present but empty"
//! (`Some("")`). An empty host stands for the client's own host name; the
//! other optional fields are only written when non-empty.

use crate::protocol::Severity;

/// Notification request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Notification {
    /// Severity, `Okay` when unset
    pub severity: Option<Severity>,
    /// Free text message
    pub message: String,
    /// Host; `Some("")` means the local host name
    pub host: Option<String>,
    /// Plugin name
    pub plugin: Option<String>,
    /// Plugin instance
    pub plugin_instance: Option<String>,
    /// Type name
    pub type_name: Option<String>,
    /// Type instance
    pub type_instance: Option<String>,
}

impl Notification {
    /// Notification carrying only a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Set the severity
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Set the host (empty for the local host name)
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the plugin name
    pub fn with_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    /// Set the plugin instance
    pub fn with_plugin_instance(mut self, instance: impl Into<String>) -> Self {
        self.plugin_instance = Some(instance.into());
        self
    }

    /// Set the type name
    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Set the type instance
    pub fn with_type_instance(mut self, instance: impl Into<String>) -> Self {
        self.type_instance = Some(instance.into());
        self
    }

    /// Effective severity
    pub fn severity(&self) -> Severity {
        self.severity.unwrap_or_default()
    }

    /// Host to report, resolving `Some("")` to `local`
    pub fn resolved_host<'a>(&'a self, local: &'a str) -> Option<&'a str> {
        match self.host.as_deref() {
            Some("") => Some(local),
            other => other,
        }
    }

    /// Short preview of the message for log lines
    pub fn preview(&self) -> String {
        const PREVIEW_CHARS: usize = 32;
        let mut chars = self.message.chars();
        let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
        if chars.next().is_some() {
            format!("{}...", head)
        } else {
            head
        }
    }
}

/// Non-empty value of an optional field
pub(crate) fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}
