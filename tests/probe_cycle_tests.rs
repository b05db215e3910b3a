// Probe registry and retry controller end-to-end
//
// Drives real probes (against loopback listeners) through the retry
// controller the same way the monitor worker does, and checks the metrics
// side effects.

use proberun::metrics::AppMetrics;
use proberun::monitor::RetryPolicy;
use proberun::probes::{self, TargetSpec};
use proberun::Severity;
use std::time::Duration;
use tokio::net::TcpListener;

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1))
}

#[tokio::test]
async fn open_tcp_port_counts_one_success() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let spec: TargetSpec =
        serde_yaml::from_str(&format!("host: 127.0.0.1\nport: {}\n", port)).unwrap();
    let probe = probes::by_name("raw_tcp").unwrap();
    let metrics = AppMetrics::new().unwrap();

    let results = fast_retry().run(probe, &spec, &metrics).await;

    assert!(results.is_empty());
    assert_eq!(
        metrics
            .probe_success_total
            .with_label_values(&["raw_tcp", "127.0.0.1"])
            .get(),
        1
    );
    assert_eq!(
        metrics
            .probe_failures_total
            .with_label_values(&["raw_tcp", "127.0.0.1"])
            .get(),
        0
    );
}

#[tokio::test]
async fn closed_tcp_port_exhausts_attempts_and_reports() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let spec: TargetSpec =
        serde_yaml::from_str(&format!("host: 127.0.0.1\nport: {}\n", port)).unwrap();
    let probe = probes::by_name("raw_tcp").unwrap();
    let metrics = AppMetrics::new().unwrap();

    let results = fast_retry().run(probe, &spec, &metrics).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].severity, Severity::Error);
    assert_eq!(results[0].service, format!("[raw_tcp] 127.0.0.1:{}", port));
    assert_eq!(
        metrics
            .probe_failures_total
            .with_label_values(&["raw_tcp", "127.0.0.1"])
            .get(),
        3
    );
}

#[tokio::test]
async fn malformed_target_spec_surfaces_as_generic_error() {
    // The raw_tcp probe rejects a spec without a port; the retry
    // controller converts that into a generic ERROR finding named after
    // the probe, not the target
    let spec: TargetSpec = serde_yaml::from_str("host: example.com\n").unwrap();
    let probe = probes::by_name("raw_tcp").unwrap();
    let metrics = AppMetrics::new().unwrap();

    let results = fast_retry().run(probe, &spec, &metrics).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].service, "raw_tcp");
    assert!(results[0].body.starts_with("Exception: "));
    assert_eq!(results[0].severity, Severity::Error);
}

#[test]
fn registry_resolves_every_configured_probe_type() {
    for name in ["ping", "raw_tcp", "smtp", "https", "dns"] {
        assert!(probes::by_name(name).is_some(), "missing probe {}", name);
    }
    assert!(probes::by_name("icmp").is_none());
}
