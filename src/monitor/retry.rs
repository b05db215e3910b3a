// Retry controller - probe dampening
//
// Wraps a probe invocation with a bounded-retry, fixed-delay policy so a
// one-time failure does not raise a notification. The result of the LAST
// attempt wins: earlier findings are discarded, not accumulated.

use crate::message::{Message, Severity};
use crate::metrics::AppMetrics;
use crate::probes::{Probe, TargetSpec};
use std::time::{Duration, Instant};

/// Bounded-retry, fixed-delay dampening policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of probe invocations (not retries on top)
    pub max_attempts: usize,
    /// Delay between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Run one probe against one target with dampening.
    ///
    /// A probe that returns `Err` is converted to a single generic ERROR
    /// message carrying the error text; it never propagates. Each attempt
    /// increments the success or failure counter, and the duration gauge
    /// records the last completed invocation.
    pub async fn run(
        &self,
        probe: &dyn Probe,
        spec: &TargetSpec,
        metrics: &AppMetrics,
    ) -> Vec<Message> {
        let target = probe.target_label(spec);
        let mut results = Vec::new();

        for attempt in 1..=self.max_attempts.max(1) {
            let start = Instant::now();
            results = match probe.probe(spec).await {
                Ok(results) => {
                    metrics
                        .probe_duration
                        .with_label_values(&[probe.name(), &target])
                        .set(start.elapsed().as_secs_f64());
                    results
                }
                Err(probe_error) => {
                    tracing::error!(
                        "Exception {} in {} probe for {}",
                        probe_error,
                        probe.name(),
                        target
                    );
                    vec![Message::new(
                        probe.name(),
                        format!("Exception: {}", probe_error),
                        Severity::Error,
                    )]
                }
            };

            if results.is_empty() {
                metrics
                    .probe_success_total
                    .with_label_values(&[probe.name(), &target])
                    .inc();
                break;
            }

            metrics
                .probe_failures_total
                .with_label_values(&[probe.name(), &target])
                .inc();

            tracing::info!(
                "{} probe for {} returns {:?}",
                probe.name(),
                target,
                results
            );

            if attempt < self.max_attempts {
                tokio::time::sleep(self.delay).await;
            }
        }

        results
    }
}
