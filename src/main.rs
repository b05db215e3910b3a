// ProbeRun - Availability and certificate monitoring daemon
// Copyright (C) 2025 Marc Rivero (@seifreed)
// Licensed under GPL-3.0
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.

use anyhow::Result;
use clap::Parser;
use proberun::config::MonitorConfig;
use proberun::metrics::{self, AppMetrics};
use proberun::monitor::worker::{now_secs, MonitorWorker};
use proberun::notification::email;
use proberun::Args;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn, Instrument};
use tracing_subscriber::EnvFilter;

/// A worker is considered dead once its watchdog timestamp is older than
/// its cycle delay plus this grace period.
const WATCHDOG_GRACE_SECS: u64 = 60;

/// Seconds between supervisor liveness checks
const SUPERVISION_INTERVAL_SECS: u64 = 30;

struct WorkerHandle {
    path: PathBuf,
    delay: u64,
    watchdog: Arc<AtomicU64>,
    handle: tokio::task::JoinHandle<()>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (required for rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let args = Args::parse();

    // Load configurations before logging is up so the config-level debug
    // flag can raise the log level; fatal problems go to stderr
    let config_files: Vec<PathBuf> = if let Some(ref path) = args.config {
        vec![path.clone()]
    } else {
        match MonitorConfig::discover_files(&args.config_dir) {
            Ok(files) => files,
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(2);
            }
        }
    };

    let mut configs: Vec<(PathBuf, MonitorConfig)> = Vec::new();
    let mut failures = Vec::new();
    for path in config_files {
        match MonitorConfig::from_file(&path) {
            Ok(config) => configs.push((path, config)),
            Err(e) => failures.push(e),
        }
    }

    // Initialize logging - respect RUST_LOG, -d or a config debug flag
    // forces DEBUG
    let debug = args.debug || configs.iter().any(|(_, c)| c.common.debug);
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("ProbeRun v{}", env!("CARGO_PKG_VERSION"));

    for failure in &failures {
        warn!("{}: ignored", failure);
    }

    if configs.is_empty() {
        error!("No configuration found");
        std::process::exit(2);
    }

    // Test alert channels and exit
    if args.test_alert {
        for (path, config) in &configs {
            match config.notifications {
                Some(ref notifications) => {
                    match email::send_email(
                        "ProbeRun test alert",
                        "This is a test alert",
                        &notifications.email.config,
                    )
                    .await
                    {
                        Ok(()) => info!("[{}] test alert sent", path.display()),
                        Err(e) => error!("[{}] test alert failed: {}", path.display(), e),
                    }
                }
                None => info!("[{}] no notification channel configured", path.display()),
            }
        }
        return Ok(());
    }

    // Shutdown signal shared by all workers
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_signal_handler(shutdown_tx);

    // Metrics endpoint
    let app_metrics = Arc::new(AppMetrics::new()?);
    {
        let app_metrics = Arc::clone(&app_metrics);
        let port = args.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = metrics::serve(app_metrics, port).await {
                error!("Metrics server failed: {}", e);
            }
        });
    }

    // One worker per configuration
    let mut workers = Vec::new();
    for (path, config) in configs {
        info!("Starting worker for {}...", path.display());

        let delay = config.common.delay;
        let worker = MonitorWorker::new(
            path.clone(),
            config,
            Arc::clone(&app_metrics),
            shutdown_rx.clone(),
            !args.no_notification,
        );
        let watchdog = worker.watchdog();

        let span = tracing::info_span!("worker", config = %path.display());
        let handle = tokio::spawn(worker.run().instrument(span));

        workers.push(WorkerHandle {
            path,
            delay,
            watchdog,
            handle,
        });
    }

    // Supervise: exit 1 as soon as any worker stops updating its watchdog
    let mut shutdown = shutdown_rx;
    let mut check = tokio::time::interval(Duration::from_secs(SUPERVISION_INTERVAL_SECS));
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = check.tick() => {
                let now = now_secs();
                for worker in &workers {
                    let last_seen = worker.watchdog.load(Ordering::SeqCst);
                    if now.saturating_sub(last_seen) > worker.delay + WATCHDOG_GRACE_SECS {
                        error!(
                            "Exiting because worker for {} is dead",
                            worker.path.display()
                        );
                        std::process::exit(1);
                    }
                }
            }
        }
    }

    // Let workers finish any in-flight dispatch before exiting
    info!("Exiting gracefully now...");
    for worker in workers {
        let _ = worker.handle.await;
    }

    Ok(())
}

/// Propagate SIGINT/SIGTERM into the shutdown channel
fn spawn_signal_handler(shutdown: watch::Sender<bool>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm =
                signal(SignalKind::terminate()).expect("Failed to setup SIGTERM handler");
            let mut sigint =
                signal(SignalKind::interrupt()).expect("Failed to setup SIGINT handler");

            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM"),
                _ = sigint.recv() => info!("Received SIGINT"),
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to setup Ctrl+C handler");
            info!("Received Ctrl+C");
        }

        let _ = shutdown.send(true);
    });
}
