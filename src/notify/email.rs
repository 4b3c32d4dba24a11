// Mail transport - lettre SMTP behind a trait
//
// The core composes textual messages and hands them to a MailTransport;
// SMTP session mechanics live entirely in the lettre transport. Tests use a
// mock implementation of the same trait.

use crate::config::EmailConfig;
use crate::error::NotifyError;
use async_trait::async_trait;
use lettre::message::header;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

/// A composed, ready-to-send message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub subject: String,
    pub body: String,
    pub recipients: Vec<String>,
}

/// Outbound mail seam. One call sends one message to all its recipients.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), NotifyError>;

    /// Transport name for logging
    fn transport_name(&self) -> &str;
}

/// SMTP mailer built on lettre
pub struct SmtpMailer {
    config: EmailConfig,
}

impl SmtpMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, message: &OutboundMessage) -> Result<Message, NotifyError> {
        let mut builder = Message::builder()
            .from(self.config.sender().parse()?)
            .subject(message.subject.clone());

        for recipient in &message.recipients {
            builder = builder.to(recipient.parse()?);
        }

        let email = builder
            .header(header::ContentType::TEXT_PLAIN)
            .body(message.body.clone())?;

        Ok(email)
    }

    fn build_transport(&self) -> Result<SmtpTransport, NotifyError> {
        let transport = if self.config.use_tls {
            SmtpTransport::starttls_relay(&self.config.smtp_server)?
        } else {
            SmtpTransport::relay(&self.config.smtp_server)?
        };

        let mut transport = transport.port(self.config.smtp_port);

        if !self.config.username.is_empty() {
            transport = transport.credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ));
        }

        Ok(transport.build())
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, message: &OutboundMessage) -> Result<(), NotifyError> {
        let email = self.build_message(message)?;
        let transport = self.build_transport()?;

        // lettre's sync transport blocks on the SMTP session
        tokio::task::spawn_blocking(move || transport.send(&email))
            .await
            .map_err(|e| NotifyError::Transport(format!("send task failed: {}", e)))??;

        Ok(())
    }

    fn transport_name(&self) -> &str {
        "smtp"
    }
}
