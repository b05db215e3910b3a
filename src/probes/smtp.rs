// SMTP STARTTLS probe
//
// Target spec:
//   host: host to check
//   port: port to check (default 25)
//   check_tlsa: check validity of the SMTP TLSA record (default false)
//
// Negotiates STARTTLS, fetches the peer certificate, and checks that the
// common name matches the host and that the certificate is not expired or
// about to expire. Optionally pins the certificate against TLSA records.

use super::{label_field, Probe, TargetSpec};
use crate::message::{Message, Severity};
use crate::tls;
use crate::tls::tlsa::TlsaVerifier;
use crate::Result;
use async_trait::async_trait;
use chrono::Duration;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

const CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct SmtpTarget {
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    check_tlsa: bool,
}

fn default_port() -> u16 {
    25
}

pub struct SmtpProbe;

#[async_trait]
impl Probe for SmtpProbe {
    fn name(&self) -> &'static str {
        "smtp"
    }

    fn target_label(&self, spec: &TargetSpec) -> String {
        label_field(spec, "host")
    }

    async fn probe(&self, spec: &TargetSpec) -> Result<Vec<Message>> {
        let target: SmtpTarget = serde_yaml::from_value(spec.clone())?;
        let service_name = format!("[smtp] {}:{}", target.host, target.port);

        let mut results = Vec::new();

        // Fetch certificate
        let cert = match fetch_peer_certificate(&target.host, target.port).await {
            Ok(cert) => cert,
            Err(e) => {
                results.push(Message::new(
                    service_name,
                    format!("Failed to connect: {}", e),
                    Severity::Error,
                ));
                return Ok(results); // Future tests will necessarily fail
            }
        };

        // Check if hostname is correct
        match tls::common_name(&cert)? {
            Some(common_name) => {
                if !common_name_matches(&common_name, &target.host) {
                    results.push(Message::new(
                        service_name.clone(),
                        format!(
                            "Common name {} does not match host {}",
                            common_name, target.host
                        ),
                        Severity::Error,
                    ));
                }
            }
            None => {
                results.push(Message::new(
                    service_name.clone(),
                    "Certificate has no common name",
                    Severity::Error,
                ));
            }
        }

        // Check if certificate has expired or will expire soon
        results.extend(tls::check_expiry(
            &service_name,
            &cert,
            &[tls::ExpiryThreshold {
                within: Duration::hours(72),
                severity: Severity::Error,
                label: "72 hours",
            }],
        )?);

        if target.check_tlsa {
            let verifier = TlsaVerifier::new(service_name.clone());
            results.extend(verifier.check_tlsa(&target.host, target.port, &cert).await);
        }

        Ok(results)
    }
}

/// Connect, negotiate STARTTLS, and return the peer's leaf certificate DER
async fn fetch_peer_certificate(host: &str, port: u16) -> Result<Vec<u8>> {
    let mut stream = timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port)))
        .await
        .map_err(|_| anyhow::anyhow!("Connection timeout"))??;

    timeout(CONNECT_TIMEOUT, negotiate_starttls(&mut stream, host))
        .await
        .map_err(|_| anyhow::anyhow!("STARTTLS negotiation timeout"))??;

    tls::handshake_certificate(host, stream).await
}

/// Negotiate STARTTLS on a fresh SMTP connection: greeting, EHLO,
/// STARTTLS. Leaves the stream ready for the TLS handshake.
async fn negotiate_starttls(stream: &mut TcpStream, hostname: &str) -> Result<()> {
    let mut reader = BufReader::new(stream);

    // 1. Read server greeting (220)
    let (code, _response) = read_response(&mut reader).await?;
    if code != 220 {
        return Err(anyhow::anyhow!(
            "SMTP greeting failed: expected 220, got {}",
            code
        ));
    }

    // 2. Send EHLO
    let ehlo_cmd = format!("EHLO {}\r\n", hostname);
    reader.get_mut().write_all(ehlo_cmd.as_bytes()).await?;
    reader.get_mut().flush().await?;

    // 3. Read EHLO response (250), possibly multi-line (250-... then 250 ...)
    let mut starttls_supported = false;
    loop {
        let (code, line) = read_response(&mut reader).await?;
        if code != 250 {
            return Err(anyhow::anyhow!(
                "SMTP EHLO failed: expected 250, got {}",
                code
            ));
        }

        if line.to_uppercase().contains("STARTTLS") {
            starttls_supported = true;
        }

        // The last line of a multi-line response has a space after the code
        if line.len() >= 4 && &line[3..4] == " " {
            break;
        }
    }

    if !starttls_supported {
        return Err(anyhow::anyhow!("SMTP server does not support STARTTLS"));
    }

    // 4. Send STARTTLS command
    reader.get_mut().write_all(b"STARTTLS\r\n").await?;
    reader.get_mut().flush().await?;

    // 5. Read STARTTLS response (220)
    let (code, _) = read_response(&mut reader).await?;
    if code != 220 {
        return Err(anyhow::anyhow!(
            "SMTP STARTTLS failed: expected 220, got {}",
            code
        ));
    }

    Ok(())
}

/// Read one SMTP response line and parse its status code
async fn read_response<S>(reader: &mut BufReader<&mut S>) -> Result<(u16, String)>
where
    S: AsyncRead + Unpin,
{
    let mut line = String::new();
    reader.read_line(&mut line).await?;

    if line.len() < 3 {
        return Err(anyhow::anyhow!("Invalid SMTP response: too short"));
    }

    let code: u16 = line[0..3]
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid SMTP status code"))?;

    Ok((code, line))
}

/// Check a certificate common name against the probed host. A wildcard
/// common name matches any single extra label.
fn common_name_matches(common_name: &str, host: &str) -> bool {
    if let Some(suffix) = common_name.strip_prefix('*') {
        // "*.example.com" matches "mail.example.com" but not "example.com"
        host.len() > suffix.len() && host.ends_with(suffix)
    } else {
        common_name == host
    }
}
