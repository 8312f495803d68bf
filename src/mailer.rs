use crate::{config::SmtpConfig, error::MailError};
use email_address::EmailAddress;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use tracing::info;

pub trait Mailer: Send + Sync {
    fn send_email_to_recipient(
        &self,
        recipient: &EmailAddress,
        subject: String,
        body: String,
    ) -> Result<(), MailError>;
}

pub struct SmtpManager {
    sender: Mailbox,
    transport: SmtpTransport,
}

impl SmtpManager {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let sender: Mailbox = config
            .sender_address
            .parse()
            .map_err(|_| MailError::InvalidMailbox(config.sender_address.to_owned()))?;
        let transport = SmtpTransport::relay(&config.server)?
            .credentials(Credentials::new(
                config.username.to_owned(),
                config.password.to_owned(),
            ))
            .build();
        Ok(Self { sender, transport })
    }
}

impl Mailer for SmtpManager {
    fn send_email_to_recipient(
        &self,
        recipient: &EmailAddress,
        subject: String,
        body: String,
    ) -> Result<(), MailError> {
        let to: Mailbox = recipient
            .as_str()
            .parse()
            .map_err(|_| MailError::InvalidMailbox(recipient.to_string()))?;
        let email = Message::builder()
            .from(self.sender.to_owned())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;
        let _ = self.transport.send(&email)?;
        Ok(())
    }
}

/// Used when no SMTP server is configured. Mail bodies end up in the log.
#[derive(Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send_email_to_recipient(
        &self,
        recipient: &EmailAddress,
        subject: String,
        body: String,
    ) -> Result<(), MailError> {
        info!("Mail to {} ({}): {}", recipient, subject, body);
        Ok(())
    }
}
