// ICMP reachability probe
//
// Target spec: a plain host string (hostname or IP address).
//
// Shells out to the system `ping` binary (3 packets, 3 second timeout per
// packet). Exit code 1 means no reply, 2 means the host could not be
// resolved.

use super::{Probe, TargetSpec};
use crate::message::{Message, Severity};
use crate::Result;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

pub struct PingProbe;

#[async_trait]
impl Probe for PingProbe {
    fn name(&self) -> &'static str {
        "ping"
    }

    fn target_label(&self, spec: &TargetSpec) -> String {
        spec.as_str()
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("{:?}", spec))
    }

    async fn probe(&self, spec: &TargetSpec) -> Result<Vec<Message>> {
        let host: String = serde_yaml::from_value(spec.clone())?;
        let service_name = format!("[ping] {}", host);

        let status = Command::new("ping")
            .args(["-c", "3", "-W", "3", &host])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;

        match status.code() {
            Some(1) => Ok(vec![Message::new(
                service_name,
                "Host is not reachable",
                Severity::Error,
            )]),
            Some(2) => Ok(vec![Message::new(
                service_name,
                "Invalid host",
                Severity::Error,
            )]),
            _ => Ok(vec![]),
        }
    }
}
