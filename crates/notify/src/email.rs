use async_trait::async_trait;
use keiho_core::config::EmailConfig;
use keiho_core::notify::error::NotifyError;
use keiho_core::notify::port::{Channel, Notifier};
use lettre::message::{Mailbox, Message, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

/// # Summary
/// A notifier that delivers trigger emails over SMTP.
///
/// # Invariants
/// - The `AsyncSmtpTransport` is built once and reused for every message.
/// - The sender address is validated at construction; recipients are validated per call.
pub struct EmailNotifier {
    /// The asynchronous SMTP transport.
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    /// The sender mailbox.
    from: Mailbox,
}

impl EmailNotifier {
    /// # Summary
    /// Creates a new `EmailNotifier` from the `[notify.email]` settings.
    ///
    /// # Logic
    /// 1. Parses the sender address.
    /// 2. Configures the relay transport (submission port with TLS) and authentication.
    ///
    /// # Returns
    /// * `NotifyError::Config` if the host or sender address is invalid.
    pub fn new(config: &EmailConfig) -> Result<Self, NotifyError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| NotifyError::Config(format!("Invalid from address: {}", e)))?;

        let creds = Credentials::new(config.user.clone(), config.pass.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| NotifyError::Config(format!("Invalid SMTP host: {}", e)))?
            .credentials(creds)
            .build();

        Ok(Self { mailer, from })
    }

    /// # Summary
    /// Builds the plain-text message without sending it.
    pub(crate) fn build_message(
        &self,
        recipient: &str,
        subject: &str,
        content: &str,
    ) -> Result<Message, NotifyError> {
        let to: Mailbox = recipient
            .parse()
            .map_err(|e| NotifyError::Config(format!("Invalid to address: {}", e)))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(content.to_string())
            .map_err(|e| NotifyError::Platform(format!("Failed to build email: {}", e)))
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    /// # Summary
    /// Sends one notification email.
    ///
    /// # Returns
    /// * `Err(NotifyError::Config)` for an unparsable recipient.
    /// * `Err(NotifyError::Network)` if the SMTP exchange fails.
    async fn notify(
        &self,
        recipient: &str,
        subject: &str,
        content: &str,
    ) -> Result<(), NotifyError> {
        let email = self.build_message(recipient, subject, content)?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| NotifyError::Network(format!("SMTP error: {}", e)))?;

        Ok(())
    }
}
