// Email notification channel - Using lettre

use crate::config::EmailConfig;
use crate::Result;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message as EmailMessage, SmtpTransport, Transport};

/// Send a plain-text notification email.
///
/// The transport talks plain SMTP to the configured relay (typically a
/// local or trusted submission host); credentials are used when both user
/// and password are set. The blocking SMTP I/O runs on the blocking pool.
pub async fn send_email(subject: &str, body: &str, config: &EmailConfig) -> Result<()> {
    let message = EmailMessage::builder()
        .from(config.sender_address.parse()?)
        .to(config.recipient_address.parse()?)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())?;

    let mut builder = SmtpTransport::builder_dangerous(config.host.as_str()).port(config.port);
    if let (Some(user), Some(password)) = (&config.user, &config.password) {
        builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
    }
    let transport = builder.build();

    tokio::task::spawn_blocking(move || {
        transport
            .send(&message)
            .map_err(|e| anyhow::anyhow!("Failed to send email: {}", e))
    })
    .await??;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> EmailConfig {
        EmailConfig {
            host: "smtp.example.com".to_string(),
            port: 25,
            user: None,
            password: None,
            sender_address: "monitoring@example.com".to_string(),
            recipient_address: "admin@example.com".to_string(),
        }
    }

    #[test]
    fn test_message_builds_from_config() {
        let config = test_config();
        let message = EmailMessage::builder()
            .from(config.sender_address.parse().unwrap())
            .to(config.recipient_address.parse().unwrap())
            .subject("Monitoring alert!")
            .header(ContentType::TEXT_PLAIN)
            .body("svc: down\n---\n".to_string());
        assert!(message.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_sender_address_is_rejected() {
        let mut config = test_config();
        config.sender_address = "not an address".to_string();
        let result = send_email("subject", "body", &config).await;
        assert!(result.is_err());
    }
}
