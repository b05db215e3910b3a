// TLS connection tools
//
// Fetches peer certificates for inspection (expiry, common name, DANE
// pinning). The handshake skips chain validation; CA validation happens
// at the probe layer (e.g. the HTTPS probe's request client) and this
// module only needs the certificate bytes.

pub mod tlsa;

use crate::message::{Message, Severity};
use crate::Result;
use anyhow::{anyhow, Context};
use chrono::{DateTime, Duration, Utc};
use rustls::pki_types::ServerName;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use x509_parser::prelude::*;

const CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);
const HANDSHAKE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Fetch the peer's leaf certificate in DER form (f.i. for https or smtps)
pub async fn get_certificate(hostname: &str, port: u16) -> Result<Vec<u8>> {
    let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect((hostname, port)))
        .await
        .context("Connection timeout")??;

    handshake_certificate(hostname, stream).await
}

/// Complete a TLS handshake over an established stream (SNI set to
/// `hostname`) and return the peer's leaf certificate in DER form.
///
/// Used directly by the SMTP probe after STARTTLS negotiation.
pub async fn handshake_certificate(hostname: &str, stream: TcpStream) -> Result<Vec<u8>> {
    let config = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(NoVerification))
        .with_no_client_auth();

    let connector = TlsConnector::from(Arc::new(config));
    let server_name = ServerName::try_from(hostname.to_string())
        .map_err(|_| anyhow!("Invalid DNS name: {}", hostname))?;

    let tls_stream = timeout(HANDSHAKE_TIMEOUT, connector.connect(server_name, stream))
        .await
        .context("TLS handshake timeout")??;

    let (_io, connection) = tls_stream.into_inner();
    let certs = connection
        .peer_certificates()
        .ok_or_else(|| anyhow!("No certificates received from server"))?;
    let leaf = certs
        .first()
        .ok_or_else(|| anyhow!("Empty certificate chain"))?;

    Ok(leaf.as_ref().to_vec())
}

/// Certificate validity window as UTC timestamps
pub fn parse_validity(cert_der: &[u8]) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| anyhow!("Failed to parse certificate: {:?}", e))?;

    let not_before = DateTime::<Utc>::from_timestamp(cert.validity().not_before.timestamp(), 0)
        .ok_or_else(|| anyhow!("Invalid notBefore timestamp"))?;
    let not_after = DateTime::<Utc>::from_timestamp(cert.validity().not_after.timestamp(), 0)
        .ok_or_else(|| anyhow!("Invalid notAfter timestamp"))?;

    Ok((not_before, not_after))
}

/// Subject common name, if the certificate carries one
pub fn common_name(cert_der: &[u8]) -> Result<Option<String>> {
    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| anyhow!("Failed to parse certificate: {:?}", e))?;

    let cn = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(|s| s.to_string());
    Ok(cn)
}

/// SubjectPublicKeyInfo in DER form (the input to TLSA selector 1 hashing)
pub fn public_key_der(cert_der: &[u8]) -> Result<Vec<u8>> {
    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| anyhow!("Failed to parse certificate: {:?}", e))?;

    Ok(cert.tbs_certificate.subject_pki.raw.to_vec())
}

/// An expiry check threshold: a finding of `severity` is raised when the
/// certificate expires within `within`.
pub struct ExpiryThreshold {
    pub within: Duration,
    pub severity: Severity,
    pub label: &'static str,
}

/// Check the certificate validity window against the current time.
///
/// Returns at most one message: "Certificate has expired" if outside the
/// validity window, otherwise the first matching threshold (narrowest
/// first in `thresholds`).
pub fn check_expiry(
    service_name: &str,
    cert_der: &[u8],
    thresholds: &[ExpiryThreshold],
) -> Result<Vec<Message>> {
    let (not_before, not_after) = parse_validity(cert_der)?;
    tracing::debug!(
        "Certificate: not_before: {}, not_after: {}",
        not_before,
        not_after
    );

    let now = Utc::now();

    if now < not_before || now > not_after {
        return Ok(vec![Message::new(
            service_name,
            "Certificate has expired",
            Severity::Error,
        )]);
    }

    for threshold in thresholds {
        if now + threshold.within > not_after {
            return Ok(vec![Message::new(
                service_name,
                format!("Certificate will expire in less than {}", threshold.label),
                threshold.severity,
            )]);
        }
    }

    Ok(vec![])
}

/// No-op certificate verifier: the handshake is only used to obtain the
/// peer certificate, validation happens elsewhere
#[derive(Debug)]
struct NoVerification;

impl rustls::client::danger::ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ED25519,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_validity_rejects_garbage() {
        assert!(parse_validity(b"not a certificate").is_err());
    }

    #[test]
    fn test_common_name_rejects_garbage() {
        assert!(common_name(&[0u8; 16]).is_err());
    }

    #[test]
    fn test_check_expiry_rejects_garbage() {
        assert!(check_expiry("test", b"junk", &[]).is_err());
    }
}
