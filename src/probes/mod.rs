// Probe implementations and registry
//
// Every probe takes one target spec from the config and returns a list of
// messages; an empty list means the target is healthy. Failures must be
// reported as messages (or an Err for genuinely unexpected conditions,
// which the retry controller converts to a generic ERROR message) so a
// broken service can never crash its worker.

pub mod dns;
pub mod https;
pub mod ping;
pub mod raw_tcp;
pub mod smtp;

use crate::message::Message;
use crate::Result;
use async_trait::async_trait;

/// Raw target specification from the `probes` section of the config.
/// Each probe deserializes the shape it expects (a plain host string for
/// ping, a mapping for everything else).
pub type TargetSpec = serde_yaml::Value;

/// Uniform probe contract
#[async_trait]
pub trait Probe: Send + Sync {
    /// Probe type identifier as used in config files and metrics labels
    fn name(&self) -> &'static str;

    /// Metrics label identifying one target of this probe
    fn target_label(&self, spec: &TargetSpec) -> String;

    /// Run the probe once. Must not block indefinitely: every network
    /// operation carries its own bounded timeout.
    async fn probe(&self, spec: &TargetSpec) -> Result<Vec<Message>>;
}

static PING: ping::PingProbe = ping::PingProbe;
static RAW_TCP: raw_tcp::RawTcpProbe = raw_tcp::RawTcpProbe;
static SMTP: smtp::SmtpProbe = smtp::SmtpProbe;
static HTTPS: https::HttpsProbe = https::HttpsProbe;
static DNS: dns::DnsProbe = dns::DnsProbe;

/// Statically-constructed probe registry
pub fn registry() -> &'static [&'static dyn Probe] {
    static REGISTRY: [&(dyn Probe); 5] = [&PING, &RAW_TCP, &SMTP, &HTTPS, &DNS];
    &REGISTRY
}

/// Look up a probe implementation by its config name
pub fn by_name(name: &str) -> Option<&'static dyn Probe> {
    registry().iter().copied().find(|p| p.name() == name)
}

/// Helper shared by the mapping-shaped probes: extract a string field from
/// a target spec for the metrics label, falling back to a debug rendering.
fn label_field(spec: &TargetSpec, field: &str) -> String {
    spec.get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("{:?}", spec))
}
