use crate::config::Config;
use crate::decoder::NormalizedMessage;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::time::Duration;

const TICKET_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("SMTP authentication failed: {0}")]
    Auth(String),
    #[error("invalid alert address {0:?}")]
    Address(String),
    #[error("alert send failed: {0}")]
    Send(String),
    #[error("ticket creation failed: {0}")]
    Ticket(String),
}

/// Outbound side of the scan loop: an email alert plus an issue-tracker
/// ticket per matching message. Tests substitute their own implementation.
pub trait NotificationChannel {
    fn send_alert(&mut self, message: &NormalizedMessage, uid: u32) -> Result<(), NotifyError>;
    fn create_ticket(&mut self, title: &str, body: &str) -> Result<(), NotifyError>;
    fn close(&mut self);
}

/// SMTP (STARTTLS) alert sender plus HTTP issue creation.
pub struct SmtpNotifier {
    transport: SmtpTransport,
    http: reqwest::blocking::Client,
    sender: Mailbox,
    receivers: Vec<Mailbox>,
    issue_url: String,
    token: Option<String>,
}

impl SmtpNotifier {
    /// Build the transport and verify the SMTP login up front; an
    /// unauthenticated notifier must fail the pass before any message is
    /// fetched, not halfway through it.
    pub fn connect(config: &Config) -> Result<Self, NotifyError> {
        let creds = Credentials::new(
            config.smtp.account.clone(),
            config.smtp.password.clone(),
        );
        let transport = SmtpTransport::starttls_relay(&config.smtp.server)
            .map_err(|e| NotifyError::Auth(e.to_string()))?
            .port(config.smtp.port)
            .credentials(creds)
            .build();
        match transport.test_connection() {
            Ok(true) => {}
            Ok(false) => {
                return Err(NotifyError::Auth("SMTP connection test failed".to_string()))
            }
            Err(e) => return Err(NotifyError::Auth(e.to_string())),
        }

        let sender = parse_mailbox(&config.alert.sender)?;
        let receivers = config
            .alert
            .receivers
            .iter()
            .map(|r| parse_mailbox(r))
            .collect::<Result<Vec<_>, _>>()?;

        let http = reqwest::blocking::Client::builder()
            .timeout(TICKET_TIMEOUT)
            .build()
            .map_err(|e| NotifyError::Ticket(e.to_string()))?;

        Ok(SmtpNotifier {
            transport,
            http,
            sender,
            receivers,
            issue_url: config.tracker.issue_url(),
            token: config.tracker.token.clone(),
        })
    }
}

impl NotificationChannel for SmtpNotifier {
    fn send_alert(&mut self, message: &NormalizedMessage, uid: u32) -> Result<(), NotifyError> {
        // Header values must not carry raw line breaks.
        let subject = strip_header_breaks(&message.subject);
        let content_type = match message.body_kind.as_deref() {
            Some("html") => ContentType::TEXT_HTML,
            _ => ContentType::TEXT_PLAIN,
        };

        let mut builder = Message::builder()
            .from(self.sender.clone())
            .subject(subject);
        for receiver in &self.receivers {
            builder = builder.to(receiver.clone());
        }
        let alert = builder
            .singlepart(
                SinglePart::builder()
                    .header(content_type)
                    .body(message.body.clone()),
            )
            .map_err(|e| NotifyError::Send(e.to_string()))?;

        self.transport
            .send(&alert)
            .map_err(|e| NotifyError::Send(e.to_string()))?;
        log::info!("Alert sent for uid {uid}");
        Ok(())
    }

    fn create_ticket(&mut self, title: &str, body: &str) -> Result<(), NotifyError> {
        let payload = serde_json::json!({ "title": title, "body": body });
        let mut request = self.http.post(&self.issue_url).json(&payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .map_err(|e| NotifyError::Ticket(e.to_string()))?;
        if response.status() != reqwest::StatusCode::CREATED {
            return Err(NotifyError::Ticket(format!(
                "unexpected status {} from {}",
                response.status(),
                self.issue_url
            )));
        }
        Ok(())
    }

    fn close(&mut self) {
        // The pooled SMTP connection is torn down on drop; nothing left to
        // flush here, and a dead connection at this point is not an error.
        log::info!("Closing notification channel");
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address
        .parse()
        .map_err(|_| NotifyError::Address(address.to_string()))
}

pub(crate) fn strip_header_breaks(value: &str) -> String {
    value.replace(['\n', '\r'], "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_header_breaks() {
        assert_eq!(strip_header_breaks("one\ntwo\rthree"), "onetwothree");
        assert_eq!(strip_header_breaks("plain"), "plain");
    }

    #[test]
    fn test_parse_mailbox_accepts_display_names() {
        assert!(parse_mailbox("Oncall <oncall@example.com>").is_ok());
        assert!(parse_mailbox("oncall@example.com").is_ok());
        assert!(parse_mailbox("not an address").is_err());
    }
}
