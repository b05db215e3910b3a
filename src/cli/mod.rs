// CLI module - Command line interface and argument parsing
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0

use clap::Parser;
use std::path::PathBuf;

/// ProbeRun - Availability and certificate monitoring daemon
#[derive(Parser, Debug, Clone)]
#[command(name = "proberun")]
#[command(author, version)]
#[command(about = "Availability and certificate monitoring daemon", long_about = None)]
pub struct Args {
    /// Path to a single config file (one worker)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory of worker config files (*.yaml), one worker per file
    #[arg(long = "config-dir", value_name = "DIR", default_value = "/config")]
    pub config_dir: PathBuf,

    /// Set log level to DEBUG (default to INFO)
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Don't send notification messages
    #[arg(short = 'n', long = "no-notification")]
    pub no_notification: bool,

    /// Port for the Prometheus metrics endpoint
    #[arg(long = "metrics-port", value_name = "PORT", default_value_t = 8000)]
    pub metrics_port: u16,

    /// Send a test email through each configured channel and exit
    #[arg(long = "test-alert")]
    pub test_alert: bool,
}
