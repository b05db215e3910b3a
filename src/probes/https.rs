// HTTPS endpoint probe
//
// Target spec:
//   url: url to check (http or https)
//   verify_certificate: check validity of the TLS certificate (default true)
//   check_tlsa: check validity of the TLSA record (default false)
//   redirection: require the url to answer with a 3XX (default false)
//   expected_status_code: exact status code to expect (optional)
//   user_agent: request user agent (optional)
//   headers: extra request headers (optional)
//   pattern: regex the response body must match (optional)
//
// Checks the status code (2XX/3XX unless an exact code is expected), then
// the optional redirection, pattern, certificate expiry and TLSA tests.

use super::{label_field, Probe, TargetSpec};
use crate::message::{Message, Severity};
use crate::tls;
use crate::tls::tlsa::TlsaVerifier;
use crate::Result;
use async_trait::async_trait;
use chrono::Duration;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use serde::Deserialize;
use std::collections::HashMap;

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct HttpsTarget {
    url: String,
    #[serde(default = "default_true")]
    verify_certificate: bool,
    #[serde(default)]
    check_tlsa: bool,
    #[serde(default)]
    redirection: bool,
    #[serde(default)]
    expected_status_code: Option<u16>,
    #[serde(default = "default_user_agent")]
    user_agent: String,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default)]
    pattern: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    format!("proberun/v{}", env!("CARGO_PKG_VERSION"))
}

pub struct HttpsProbe;

#[async_trait]
impl Probe for HttpsProbe {
    fn name(&self) -> &'static str {
        "https"
    }

    fn target_label(&self, spec: &TargetSpec) -> String {
        label_field(spec, "url")
    }

    async fn probe(&self, spec: &TargetSpec) -> Result<Vec<Message>> {
        let target: HttpsTarget = serde_yaml::from_value(spec.clone())?;
        let service_name = format!("[https] {}", target.url);

        let mut results = Vec::new();

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(&target.user_agent)?);
        for (name, value) in &target.headers {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes())?,
                HeaderValue::from_str(value)?,
            );
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(!target.verify_certificate)
            .default_headers(headers.clone())
            .build()?;

        let response = match client.get(&target.url).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                results.push(Message::new(service_name, "Time out", Severity::Error));
                return Ok(results);
            }
            Err(e) => {
                results.push(Message::new(
                    service_name,
                    format!("Exception: {}", e),
                    Severity::Error,
                ));
                return Ok(results);
            }
        };

        let status = response.status();

        if let Some(expected) = target.expected_status_code {
            if status.as_u16() != expected {
                results.push(Message::new(
                    service_name.clone(),
                    format!(
                        "HTTP Status code different than expected (status code: {})",
                        status.as_u16()
                    ),
                    Severity::Error,
                ));
            }
        } else if !status.is_success() && !status.is_redirection() {
            results.push(Message::new(
                service_name.clone(),
                format!("Request failed (status code: {})", status.as_u16()),
                Severity::Error,
            ));
        }

        // Check if the url redirects to another url (3XX codes). The main
        // client follows redirects, so this needs its own request.
        if target.redirection {
            let no_redirect_client = reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .danger_accept_invalid_certs(!target.verify_certificate)
                .default_headers(headers)
                .redirect(reqwest::redirect::Policy::none())
                .build()?;

            match no_redirect_client.get(&target.url).send().await {
                Ok(first_response) if first_response.status().is_redirection() => {}
                Ok(_) => {
                    results.push(Message::new(
                        service_name.clone(),
                        "Not a redirection",
                        Severity::Error,
                    ));
                }
                Err(e) => {
                    results.push(Message::new(
                        service_name.clone(),
                        format!("Exception: {}", e),
                        Severity::Error,
                    ));
                }
            }
        }

        if let Some(ref pattern) = target.pattern {
            let regex = Regex::new(pattern)?;
            let body = response.text().await.unwrap_or_default();
            if !regex.is_match(&body) {
                results.push(Message::new(
                    service_name.clone(),
                    format!("Does not match pattern '{}'", pattern),
                    Severity::Error,
                ));
            }
        }

        // For https, check certificate expiration date and TLSA (if requested)
        let parsed_url = url::Url::parse(&target.url)?;
        if parsed_url.scheme() == "https" && target.verify_certificate {
            let host = parsed_url
                .host_str()
                .ok_or_else(|| anyhow::anyhow!("No hostname in URL: {}", target.url))?;
            let port = parsed_url.port().unwrap_or(443);

            let cert = tls::get_certificate(host, port).await?;

            results.extend(tls::check_expiry(
                &service_name,
                &cert,
                &[
                    tls::ExpiryThreshold {
                        within: Duration::hours(48),
                        severity: Severity::Error,
                        label: "48 hours",
                    },
                    tls::ExpiryThreshold {
                        within: Duration::days(7),
                        severity: Severity::Warning,
                        label: "7 days",
                    },
                ],
            )?);

            if target.check_tlsa {
                let verifier = TlsaVerifier::new(service_name.clone());
                results.extend(verifier.check_tlsa(host, port, &cert).await);
            }
        }

        Ok(results)
    }
}
