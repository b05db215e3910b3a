// DNS resolution probe
//
// Target spec:
//   domain: domain to check
//   ns_IPs: nameserver IPs to check (optional; autodiscovered from the
//           domain's NS records when absent)
//   dnssec: check DNSSEC-validating resolution (default false)
//
// Resolves the domain's A record directly against every nameserver, over
// UDP and over TCP. Each failing query yields one ERROR message.

use super::{label_field, Probe, TargetSpec};
use crate::message::{Message, Severity};
use crate::Result;
use async_trait::async_trait;
use hickory_resolver::config::{
    NameServerConfig, Protocol, ResolverConfig, ResolverOpts,
};
use hickory_resolver::proto::rr::RecordType;
use hickory_resolver::TokioAsyncResolver;
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct DnsTarget {
    domain: String,
    #[serde(rename = "ns_IPs", default)]
    ns_ips: Option<Vec<String>>,
    #[serde(default)]
    dnssec: bool,
}

pub struct DnsProbe;

#[async_trait]
impl Probe for DnsProbe {
    fn name(&self) -> &'static str {
        "dns"
    }

    fn target_label(&self, spec: &TargetSpec) -> String {
        label_field(spec, "domain")
    }

    async fn probe(&self, spec: &TargetSpec) -> Result<Vec<Message>> {
        let target: DnsTarget = serde_yaml::from_value(spec.clone())?;
        let service_name = format!("[dns] {}", target.domain);

        // Auto-discover NS servers if not given
        let ns_ips = match target.ns_ips {
            Some(ips) => ips,
            None => discover_nameservers(&target.domain).await?,
        };

        let mut results = Vec::new();

        for ns_ip in &ns_ips {
            let ip: IpAddr = match ns_ip.parse() {
                Ok(ip) => ip,
                Err(_) => {
                    results.push(Message::new(
                        service_name.clone(),
                        format!("Invalid nameserver IP: {}", ns_ip),
                        Severity::Error,
                    ));
                    continue;
                }
            };

            for (protocol, mode) in [(Protocol::Udp, "UDP"), (Protocol::Tcp, "TCP")] {
                if let Err(e) = query_a(&target.domain, ip, protocol, target.dnssec).await {
                    results.push(Message::new(
                        service_name.clone(),
                        format!("Failed to resolv domain ({} mode): {}", mode, e),
                        Severity::Error,
                    ));
                }
            }
        }

        Ok(results)
    }
}

/// All IPs of the nameservers of the given domain
async fn discover_nameservers(domain: &str) -> Result<Vec<String>> {
    tracing::debug!("Autodiscovering NS servers...");
    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());

    let mut ns_ips = Vec::new();
    let ns_response = resolver.ns_lookup(domain).await?;
    for ns in ns_response.iter() {
        let ns_hostname = ns.0.to_utf8();
        let ip_response = resolver.lookup_ip(ns_hostname.as_str()).await?;
        for ip in ip_response.iter() {
            tracing::debug!("NS server: {} ({})", ns_hostname, ip);
            ns_ips.push(ip.to_string());
        }
    }

    Ok(ns_ips)
}

/// Resolve the domain's A record against one specific nameserver
async fn query_a(domain: &str, ns: IpAddr, protocol: Protocol, dnssec: bool) -> Result<()> {
    let mut config = ResolverConfig::new();
    config.add_name_server(NameServerConfig::new(SocketAddr::new(ns, 53), protocol));

    let mut opts = ResolverOpts::default();
    opts.recursion_desired = false;
    opts.attempts = 1;
    opts.timeout = Duration::from_secs(5);
    opts.validate = dnssec;

    let resolver = TokioAsyncResolver::tokio(config, opts);
    resolver.lookup(domain, RecordType::A).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_parsing() {
        let target: DnsTarget = serde_yaml::from_str(
            "domain: example.com\nns_IPs:\n  - 192.0.2.1\n  - 192.0.2.2\ndnssec: true\n",
        )
        .unwrap();
        assert_eq!(target.domain, "example.com");
        assert_eq!(target.ns_ips.as_ref().unwrap().len(), 2);
        assert!(target.dnssec);
    }

    #[test]
    fn test_ns_ips_default_to_autodiscovery() {
        let target: DnsTarget = serde_yaml::from_str("domain: example.com\n").unwrap();
        assert!(target.ns_ips.is_none());
        assert!(!target.dnssec);
    }

    #[tokio::test]
    async fn test_invalid_nameserver_ip_reported() {
        let spec: TargetSpec = serde_yaml::from_str(
            "domain: example.com\nns_IPs:\n  - not-an-ip\n",
        )
        .unwrap();

        let results = DnsProbe.probe(&spec).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].severity, Severity::Error);
        assert!(results[0].body.contains("not-an-ip"));
    }
}
