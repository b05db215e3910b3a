// Monitor worker - the per-configuration scheduling loop
//
// Cycle: run every configured probe through the retry controller, sort the
// findings by severity, log them, reconcile against the down-set, dispatch
// notifications, update the watchdog timestamp, then sleep until the next
// cycle or until shutdown is requested.

use crate::config::MonitorConfig;
use crate::message::{Message, Severity};
use crate::metrics::AppMetrics;
use crate::monitor::notifier::NotificationState;
use crate::monitor::retry::RetryPolicy;
use crate::notification::email;
use crate::probes;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;

/// Seconds since the unix epoch; used for the liveness watchdog
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// One monitoring worker, owning the state for one configuration file
pub struct MonitorWorker {
    config_path: PathBuf,
    config: MonitorConfig,
    state: NotificationState,
    retry: RetryPolicy,
    metrics: Arc<AppMetrics>,
    watchdog: Arc<AtomicU64>,
    shutdown: watch::Receiver<bool>,
    send_notification: bool,
}

impl MonitorWorker {
    pub fn new(
        config_path: PathBuf,
        config: MonitorConfig,
        metrics: Arc<AppMetrics>,
        shutdown: watch::Receiver<bool>,
        notifications_allowed: bool,
    ) -> Self {
        let send_notification = notifications_allowed && config.notifications_enabled();
        Self {
            config_path,
            config,
            state: NotificationState::new(),
            retry: RetryPolicy::default(),
            metrics,
            watchdog: Arc::new(AtomicU64::new(now_secs())),
            shutdown,
            send_notification,
        }
    }

    /// Shared liveness timestamp, read by the supervisor
    pub fn watchdog(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.watchdog)
    }

    /// Run until a shutdown signal arrives
    pub async fn run(mut self) {
        // Wait for a delay at startup if configured
        let delay_at_startup = self.config.common.delay_at_startup;
        if delay_at_startup > 0 {
            tracing::info!(
                "Waiting for {} seconds before starting...",
                delay_at_startup
            );
            if !self
                .sleep_interruptible(Duration::from_secs(delay_at_startup))
                .await
            {
                tracing::info!("Exited");
                return;
            }
        }

        // Send a test message at startup if configured
        if self.send_notification && self.config.common.email_at_startup {
            if let Some(ref notifications) = self.config.notifications {
                if let Err(e) = email::send_email(
                    "Monitoring started",
                    "This is a message sent at startup",
                    &notifications.email.config,
                )
                .await
                {
                    tracing::error!("Fail to send startup mail: {}", e);
                }
            }
        }

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            self.cycle().await;
            self.watchdog.store(now_secs(), Ordering::SeqCst);

            tracing::debug!("Waiting...");
            if !self
                .sleep_interruptible(Duration::from_secs(self.config.common.delay))
                .await
            {
                break;
            }
        }

        tracing::info!("Exited");
    }

    /// Run one monitoring cycle: probe everything, log, notify
    async fn cycle(&mut self) {
        let mut notifications: Vec<Message> = Vec::new();

        let probes_config = self.config.probes.clone();
        for (name_value, targets_value) in &probes_config {
            let Some(probe_name) = name_value.as_str() else {
                tracing::warn!("invalid probe name {:?}: ignored", name_value);
                continue;
            };
            let Some(probe) = probes::by_name(probe_name) else {
                tracing::warn!("unknown probe type {}: ignored", probe_name);
                continue;
            };
            let Some(targets) = targets_value.as_sequence() else {
                tracing::warn!("targets for {} are not a list: ignored", probe_name);
                continue;
            };

            for spec in targets {
                tracing::debug!("{} probe for {}", probe_name, probe.target_label(spec));
                let results = self.retry.run(probe, spec, &self.metrics).await;
                notifications.extend(results);
            }
        }

        // Sort notifications by severity
        notifications.sort_by(|a, b| b.severity.cmp(&a.severity));

        // Log notification messages
        if notifications.is_empty() {
            tracing::info!("All services are up");
        } else {
            for message in &notifications {
                match message.severity {
                    Severity::Warning => {
                        tracing::warn!("{}: {}", message.service, message.body)
                    }
                    Severity::Error => {
                        tracing::error!("{}: {}", message.service, message.body)
                    }
                    Severity::Info => {}
                }
            }
        }

        // Send notifications
        if self.send_notification {
            self.dispatch(&notifications).await;
        }
    }

    /// Reconcile the cycle's findings against the down-set and mail
    /// whatever is new. A mail failure is logged but does not roll back
    /// the down-set.
    async fn dispatch(&mut self, notifications: &[Message]) {
        let to_send = self.state.reconcile(notifications);

        if to_send.is_empty() {
            tracing::debug!("notifications_to_send is empty");
            return;
        }

        let mut message_body = String::new();
        for message in &to_send {
            message_body.push_str(&format!("{}\n---\n", message));
        }

        let Some(ref notifications_config) = self.config.notifications else {
            return;
        };

        match email::send_email(
            "Monitoring alert!",
            &message_body,
            &notifications_config.email.config,
        )
        .await
        {
            Ok(()) => tracing::info!("Notification mail sent"),
            Err(e) => tracing::error!("Fail to send notification mail: {}", e),
        }
    }

    /// Sleep for `duration` or until shutdown, whichever comes first.
    /// Returns false when interrupted by shutdown.
    async fn sleep_interruptible(&mut self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.shutdown.changed() => false,
        }
    }

    /// Path of the configuration this worker was built from
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }
}
