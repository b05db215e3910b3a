// DANE/TLSA record verification
//
// Fetches the `_{port}._tcp.{host}` TLSA records for a service and checks
// whether any of them matches the live certificate. Records are handled in
// their four-field text form ("usage selector matching_type hexdata");
// malformed records are skipped with a warning, they never fail the check
// on their own. The check succeeds (empty message list) iff at least one
// record matches.

use crate::message::{Message, Severity};
use crate::tls;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::proto::rr::{RData, RecordType};
use hickory_resolver::TokioAsyncResolver;
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// TLSA verifier for one service.
///
/// Only hash comparison is supported: certificate usages 1 and 3 are
/// accepted, but the CA trust chain required by usage 1 is not verified.
pub struct TlsaVerifier {
    service_name: String,
    messages: Vec<Message>,
}

impl TlsaVerifier {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            messages: Vec::new(),
        }
    }

    /// Check whether a TLSA record published for `host:port` matches the
    /// given certificate. An empty result means all tests succeeded.
    pub async fn check_tlsa(mut self, host: &str, port: u16, cert_der: &[u8]) -> Vec<Message> {
        if let Some(records) = self.fetch_records(host, port).await {
            self.match_records(&records, cert_der);
        }
        self.messages
    }

    /// Match already-fetched records (text form) against a certificate.
    /// Exposed separately so the matching protocol can be exercised
    /// without DNS.
    pub fn check_records(mut self, records: &[String], cert_der: &[u8]) -> Vec<Message> {
        self.match_records(records, cert_der);
        self.messages
    }

    async fn fetch_records(&mut self, host: &str, port: u16) -> Option<Vec<String>> {
        let name = format!("_{}._tcp.{}.", port, host);
        let resolver =
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());

        match resolver.lookup(name, RecordType::TLSA).await {
            Ok(lookup) => Some(
                lookup
                    .iter()
                    .filter_map(|rdata| match rdata {
                        RData::TLSA(tlsa) => Some(format!(
                            "{} {} {} {}",
                            u8::from(tlsa.cert_usage()),
                            u8::from(tlsa.selector()),
                            u8::from(tlsa.matching()),
                            hex::encode(tlsa.cert_data())
                        )),
                        _ => None,
                    })
                    .collect(),
            ),
            Err(e) => {
                let body = match e.kind() {
                    ResolveErrorKind::NoRecordsFound {
                        response_code: ResponseCode::NXDomain,
                        ..
                    } => "TLSA record does not exist".to_string(),
                    _ => format!("Failed to fetch TLSA record: {}", e),
                };
                self.messages
                    .push(Message::new(self.service_name.as_str(), body, Severity::Error));
                None
            }
        }
    }

    fn match_records(&mut self, records: &[String], cert_der: &[u8]) {
        let mut one_match = false;
        tracing::debug!("dns_records: {:?}", records);

        for record in records {
            tracing::debug!("[TLSA] checking '{}'", record);
            let fields: Vec<&str> = record.split(' ').collect();

            if fields.len() != 4 {
                tracing::warn!(
                    "[{}] TLSA record is malformed (not 4 fields): ignored",
                    self.service_name
                );
                continue;
            }

            let parsed: Result<Vec<u8>, _> =
                fields[..3].iter().map(|f| f.parse::<u8>()).collect();
            let Ok(params) = parsed else {
                tracing::warn!("[{}] TLSA record is malformed: ignored", self.service_name);
                continue;
            };
            let (certificate_usage, selector, matching_type) =
                (params[0], params[1], params[2]);

            // Only comparison of hashes is supported (no CA trust)
            if certificate_usage != 1 && certificate_usage != 3 {
                tracing::warn!("[{}] TLSA record is malformed: ignored", self.service_name);
                continue;
            }

            if certificate_usage == 1 {
                // cert must be trusted by a CA
                tracing::debug!(
                    "certificate usage is 1 but the validity of the \
                     certificate will not be verified (not implemented)"
                );
            }

            let Some(cert_hash) = self.compute_hash(cert_der, selector, matching_type) else {
                continue;
            };

            // DNS data may come back uppercase, the digest is lowercase
            let is_matching = fields[3].to_ascii_lowercase() == cert_hash;
            tracing::debug!("TLSA record matches cert: {}", is_matching);

            one_match |= is_matching;
        }

        if !one_match {
            self.messages.push(Message::new(
                self.service_name.as_str(),
                "No TLSA record matches the certificate",
                Severity::Error,
            ));
        }
    }

    /// Compute the hash of the certificate (or its public key) selected by
    /// the record. Returns None when the record carries an unsupported
    /// selector or matching type, after appending the matching error.
    fn compute_hash(
        &mut self,
        cert_der: &[u8],
        selector: u8,
        matching_type: u8,
    ) -> Option<String> {
        let dump = match selector {
            0 => {
                tracing::debug!("Hashing entire cert");
                cert_der.to_vec()
            }
            1 => {
                tracing::debug!("Hashing public key only");
                match tls::public_key_der(cert_der) {
                    Ok(spki) => spki,
                    Err(e) => {
                        tracing::warn!(
                            "[{}] failed to extract public key: {}",
                            self.service_name,
                            e
                        );
                        return None;
                    }
                }
            }
            _ => {
                tracing::debug!("Invalid selector: {}", selector);
                self.messages.push(Message::new(
                    self.service_name.as_str(),
                    "Invalid selector in TLSA record",
                    Severity::Error,
                ));
                return None;
            }
        };

        let digest = match matching_type {
            1 => {
                tracing::debug!("Hashing with sha256");
                hex::encode(Sha256::digest(&dump))
            }
            2 => {
                tracing::debug!("Hashing with sha1");
                hex::encode(Sha1::digest(&dump))
            }
            _ => {
                tracing::debug!("Invalid matching type: {}", matching_type);
                self.messages.push(Message::new(
                    self.service_name.as_str(),
                    "Invalid matching type in TLSA record",
                    Severity::Error,
                ));
                return None;
            }
        };

        tracing::debug!("hexdigest: {}", digest);
        Some(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Matching against real certificate bytes is covered by
    // tests/tlsa_tests.rs; these exercise the record protocol itself.

    #[test]
    fn test_wrong_field_count_is_skipped() {
        let records = vec!["3 1 1".to_string()];
        let messages = TlsaVerifier::new("test").check_records(&records, b"dummy");

        // The malformed record is skipped, leaving a vacuous non-match
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].body, "No TLSA record matches the certificate");
        assert_eq!(messages[0].severity, Severity::Error);
    }

    #[test]
    fn test_non_integer_fields_are_skipped() {
        let records = vec!["three 1 1 abcdef".to_string()];
        let messages = TlsaVerifier::new("test").check_records(&records, b"dummy");

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].body, "No TLSA record matches the certificate");
    }

    #[test]
    fn test_unsupported_usage_is_skipped() {
        // Usages 0 and 2 require CA trust anchors, not supported
        let records = vec![
            "0 0 1 abcdef".to_string(),
            "2 0 1 abcdef".to_string(),
        ];
        let messages = TlsaVerifier::new("test").check_records(&records, b"dummy");

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].body, "No TLSA record matches the certificate");
    }

    #[test]
    fn test_invalid_selector_reported() {
        let records = vec!["3 7 1 abcdef".to_string()];
        let messages = TlsaVerifier::new("test").check_records(&records, b"dummy");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].body, "Invalid selector in TLSA record");
        assert_eq!(messages[1].body, "No TLSA record matches the certificate");
    }

    #[test]
    fn test_invalid_matching_type_reported() {
        // Selector 0 hashes the raw DER, so no certificate parsing happens
        // before the matching type is rejected
        let records = vec!["3 0 9 abcdef".to_string()];
        let messages = TlsaVerifier::new("test").check_records(&records, b"dummy");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].body, "Invalid matching type in TLSA record");
    }

    #[test]
    fn test_no_records_is_vacuous_non_match() {
        let messages = TlsaVerifier::new("test").check_records(&[], b"dummy");

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].body, "No TLSA record matches the certificate");
    }

    #[test]
    fn test_matching_raw_der_with_sha256() {
        // Selector 0 / matching type 1 hashes the DER bytes directly, so a
        // fabricated "certificate" is enough to exercise the comparison
        let cert = b"fake certificate bytes";
        let digest = hex::encode(Sha256::digest(cert));

        let records = vec![format!("3 0 1 {}", digest)];
        let messages = TlsaVerifier::new("test").check_records(&records, cert);
        assert!(messages.is_empty());
    }

    #[test]
    fn test_uppercase_hex_from_dns_still_matches() {
        let cert = b"fake certificate bytes";
        let digest = hex::encode(Sha256::digest(cert)).to_ascii_uppercase();

        let records = vec![format!("3 0 1 {}", digest)];
        let messages = TlsaVerifier::new("test").check_records(&records, cert);
        assert!(messages.is_empty());
    }

    #[test]
    fn test_one_match_among_bad_records_succeeds() {
        let cert = b"fake certificate bytes";
        let digest = hex::encode(Sha256::digest(cert));

        let records = vec![
            "malformed".to_string(),
            "3 0 1 0000000000000000000000000000000000000000000000000000000000000000"
                .to_string(),
            format!("3 0 1 {}", digest),
        ];
        let messages = TlsaVerifier::new("test").check_records(&records, cert);
        assert!(messages.is_empty());
    }

    #[test]
    fn test_sha1_matching_type() {
        let cert = b"fake certificate bytes";
        let digest = hex::encode(Sha1::digest(cert));

        let records = vec![format!("3 0 2 {}", digest)];
        let messages = TlsaVerifier::new("test").check_records(&records, cert);
        assert!(messages.is_empty());
    }
}
