//! SMTP transport over lettre (STARTTLS submission, pooled, one connection).

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::PoolConfig;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::MailerConfig;
use crate::error::{DeliveryError, FailureKind, NotifierError};
use crate::message::OutgoingMessage;
use crate::transport::MailTransport;

/// SMTP reply codes that mean the account credentials were refused.
const AUTH_REPLY_CODES: [&str; 3] = ["530", "534", "535"];

/// How long the pooled connection may sit idle before lettre closes it.
/// Dispatches are sporadic, so the session is not held open between them.
const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(1);

pub struct SmtpMailTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
    port: u16,
    deadline: Duration,
    idle_timeout: Duration,
}

impl SmtpMailTransport {
    /// Build the transport from configuration. No connection is opened here.
    ///
    /// Credentials are attached only if both are configured; the dispatcher
    /// refuses to send without them anyway.
    pub fn new(config: &MailerConfig) -> Result<Self, NotifierError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| {
                NotifierError::Transport(format!("Failed to create SMTP transport: {}", e))
            })?
            .port(config.port)
            .timeout(Some(config.socket_timeout))
            .pool_config(
                PoolConfig::new()
                    .max_size(1)
                    .min_idle(0)
                    .idle_timeout(SESSION_IDLE_TIMEOUT),
            );

        if let Ok(creds) = config.credentials() {
            builder = builder.credentials(Credentials::new(
                creds.address.to_string(),
                creds.password.to_string(),
            ));
        }

        tracing::info!(host = %config.host, port = config.port, "SMTP transport configured");

        Ok(Self {
            transport: builder.build(),
            host: config.host.clone(),
            port: config.port,
            deadline: config.send_deadline(),
            idle_timeout: SESSION_IDLE_TIMEOUT,
        })
    }

    fn build_message(message: &OutgoingMessage) -> Result<Message, DeliveryError> {
        let from_address: Address = message.from_address.parse().map_err(|e| {
            DeliveryError::Message(format!("Invalid sender '{}': {}", message.from_address, e))
        })?;
        let from = Mailbox::new(Some(message.from_name.clone()), from_address);

        let to: Mailbox = message.to.parse().map_err(|e| {
            DeliveryError::Message(format!("Invalid recipient '{}': {}", message.to, e))
        })?;

        let builder = Message::builder()
            .from(from)
            .to(to)
            .subject(message.subject.clone());

        let built = match &message.html {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(
                message.text.clone(),
                html.clone(),
            )),
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(message.text.clone()),
        };

        built.map_err(|e| DeliveryError::Message(format!("Failed to build email: {}", e)))
    }
}

/// Map an SMTP reply code to a failure class.
fn classify_reply(code: &str) -> FailureKind {
    if AUTH_REPLY_CODES.contains(&code) {
        FailureKind::Authentication
    } else {
        FailureKind::Unclassified
    }
}

fn classify(err: &lettre::transport::smtp::Error) -> DeliveryError {
    let detail = err.to_string();

    if err.is_timeout() {
        return DeliveryError::Timeout(detail);
    }

    match err.status() {
        Some(code) => match classify_reply(&code.to_string()) {
            FailureKind::Authentication => DeliveryError::Authentication(detail),
            _ => DeliveryError::Unclassified(detail),
        },
        // No reply at all: the failure happened on the wire or in TLS.
        None if !err.is_client() => DeliveryError::Connection(detail),
        None => DeliveryError::Unclassified(detail),
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(&self, message: &OutgoingMessage) -> Result<String, DeliveryError> {
        let email = Self::build_message(message)?;

        match tokio::time::timeout(self.deadline, self.transport.send(email)).await {
            Err(_) => Err(DeliveryError::Timeout(format!(
                "No response from {}:{} within {}ms",
                self.host,
                self.port,
                self.deadline.as_millis()
            ))),
            Ok(Err(e)) => Err(classify(&e)),
            Ok(Ok(response)) => Ok(format!(
                "{} {}",
                response.code(),
                response.first_line().unwrap_or_default()
            )),
        }
    }
}

// AsyncSmtpTransport has no Debug impl
impl std::fmt::Debug for SmtpMailTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailTransport")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use prescripto_common::types::MessageRequest;

    use super::*;
    use crate::dispatcher::Dispatcher;
    use crate::retry::DispatchState;

    fn message(to: &str, html: Option<&str>) -> OutgoingMessage {
        OutgoingMessage {
            from_name: "Prescripto Admin".to_string(),
            from_address: "clinic@example.com".to_string(),
            to: to.to_string(),
            subject: "Appointment confirmed".to_string(),
            text: "See you at 10:00".to_string(),
            html: html.map(str::to_string),
        }
    }

    #[test]
    fn test_plain_message() {
        let email = SmtpMailTransport::build_message(&message("pat@example.com", None)).unwrap();
        let raw = String::from_utf8(email.formatted()).unwrap();
        assert!(raw.contains("Prescripto Admin"));
        assert!(raw.contains("<clinic@example.com>"));
        assert!(raw.contains("To: pat@example.com"));
        assert!(raw.contains("Subject: Appointment confirmed"));
        assert!(raw.contains("Content-Type: text/plain"));
        assert!(!raw.contains("multipart/alternative"));
    }

    #[test]
    fn test_html_message_is_alternative() {
        let email = SmtpMailTransport::build_message(&message(
            "pat@example.com",
            Some("<p>See you at 10:00</p>"),
        ))
        .unwrap();
        let raw = String::from_utf8(email.formatted()).unwrap();
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/html"));
    }

    #[test]
    fn test_invalid_recipient_is_fatal() {
        let err = SmtpMailTransport::build_message(&message("not-an-address", None)).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_classify_reply() {
        assert_eq!(classify_reply("535"), FailureKind::Authentication);
        assert_eq!(classify_reply("530"), FailureKind::Authentication);
        assert_eq!(classify_reply("550"), FailureKind::Unclassified);
        assert_eq!(classify_reply("421"), FailureKind::Unclassified);
    }

    #[tokio::test]
    async fn test_new_does_not_connect() {
        let config = MailerConfig::default().with_credentials("clinic@example.com", "app-pass");
        let transport = SmtpMailTransport::new(&config).unwrap();
        assert_eq!(transport.port, 587);
        assert_eq!(transport.deadline, Duration::from_secs(25));
        assert_eq!(transport.idle_timeout, Duration::from_secs(1));
        assert!(format!("{:?}", transport).contains("smtp.gmail.com"));
    }

    #[tokio::test]
    async fn test_malformed_recipient_is_rejected_without_retry() {
        let config = MailerConfig::default().with_credentials("clinic@example.com", "app-pass");
        let transport = SmtpMailTransport::new(&config).unwrap();
        let dispatcher = Dispatcher::new(config, Arc::new(transport));

        let report = dispatcher
            .deliver(MessageRequest::new("not-an-address", "Hi").text("x"))
            .await
            .unwrap();

        assert_eq!(report.state, DispatchState::Rejected);
        assert_eq!(report.attempts, 1);
        let snap = dispatcher.stats().snapshot();
        assert_eq!(snap.rejected, 1);
        assert_eq!(snap.retried, 0);
    }
}
