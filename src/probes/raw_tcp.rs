// Raw TCP connect probe
//
// Target spec:
//   host: hostname or IP address
//   port: port to check
//   timeout: seconds (optional, default 1)
//
// An empty result means the port is open.

use super::{label_field, Probe, TargetSpec};
use crate::message::{Message, Severity};
use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

#[derive(Debug, Deserialize)]
struct RawTcpTarget {
    host: String,
    port: u16,
    #[serde(default = "default_timeout")]
    timeout: u64,
}

fn default_timeout() -> u64 {
    1
}

pub struct RawTcpProbe;

#[async_trait]
impl Probe for RawTcpProbe {
    fn name(&self) -> &'static str {
        "raw_tcp"
    }

    fn target_label(&self, spec: &TargetSpec) -> String {
        label_field(spec, "host")
    }

    async fn probe(&self, spec: &TargetSpec) -> Result<Vec<Message>> {
        let target: RawTcpTarget = serde_yaml::from_value(spec.clone())?;
        let service_name = format!("[raw_tcp] {}:{}", target.host, target.port);

        let connect = TcpStream::connect((target.host.as_str(), target.port));
        match timeout(Duration::from_secs(target.timeout), connect).await {
            Ok(Ok(_stream)) => Ok(vec![]),
            Ok(Err(e)) => Ok(vec![Message::new(
                service_name,
                e.to_string(),
                Severity::Error,
            )]),
            Err(_) => Ok(vec![Message::new(
                service_name,
                "Connection timed out",
                Severity::Error,
            )]),
        }
    }
}
