// ProbeRun - Availability and certificate monitoring daemon
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

//! ProbeRun periodically probes external services (ICMP ping, raw TCP,
//! HTTPS, SMTP+STARTTLS, DNS/DNSSEC) and raises deduplicated email alerts
//! when a service transitions between healthy and unhealthy states.
//! HTTPS and SMTP probes can additionally pin the remote certificate
//! against DNS-published DANE/TLSA records.

pub mod cli;
pub mod config;
pub mod error;
pub mod message;
pub mod metrics;
pub mod monitor;
pub mod notification;
pub mod probes;
pub mod tls;

// Re-export commonly used types
pub use crate::cli::Args;
pub use crate::config::MonitorConfig;
pub use crate::error::MonitorError;
pub use crate::message::{Message, Severity};

/// Result type for ProbeRun operations
pub type Result<T> = anyhow::Result<T>;

/// Error type for ProbeRun operations
pub use anyhow::Error;
