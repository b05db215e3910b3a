// Probe result messages

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a probe finding, ordered from least to most severe
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// One observed problem on one monitored target.
///
/// Messages are created fresh each monitor cycle by a probe and consumed by
/// the notification state machine. Two messages are equal iff all four
/// fields are equal, so a different body for the same service counts as a
/// distinct down-entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub service: String,
    pub body: String,
    pub severity: Severity,
    pub header: Option<String>,
}

impl Message {
    /// Create a message without a header annotation
    pub fn new(service: impl Into<String>, body: impl Into<String>, severity: Severity) -> Self {
        Self {
            service: service.into(),
            body: body.into(),
            severity,
            header: None,
        }
    }

    /// Create a message carrying a header annotation (e.g. "back online")
    pub fn with_header(
        service: impl Into<String>,
        body: impl Into<String>,
        severity: Severity,
        header: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            body: body.into(),
            severity,
            header: Some(header.into()),
        }
    }

    /// Derive the "back online" recovery message for this message
    pub fn back_online(&self) -> Self {
        Self::with_header(
            self.service.clone(),
            self.body.clone(),
            self.severity,
            "back online",
        )
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref header) = self.header {
            write!(f, "[{}] {}: {}", header, self.service, self.body)
        } else {
            write!(f, "{}: {}", self.service, self.body)
        }
    }
}
