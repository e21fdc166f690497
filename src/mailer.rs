//! Outbound email for the account flows.
//!
//! [`SmtpMailer`] delivers through `lettre`'s async STARTTLS transport when
//! `SMTP_HOST` is configured. Without it, [`LogMailer`] writes the message to
//! the log so local setups can still follow verification and reset links.

use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox}, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use crate::config::SmtpConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()>;
}

pub const VERIFICATION_SUBJECT: &str = "Verify your email address";
pub const RESET_SUBJECT: &str = "Reset your password";

pub fn verification_email(base_url: &str, to: &str, token: &str) -> OutgoingEmail {
    let link = format!("{base_url}/verify-email/{token}");
    OutgoingEmail {
        to: to.to_string(),
        subject: VERIFICATION_SUBJECT.into(),
        body: format!(
            "Welcome to the support portal.\n\nPlease confirm your email address by opening:\n{link}\n"
        ),
    }
}

pub fn password_reset_email(base_url: &str, to: &str, token: &str) -> OutgoingEmail {
    let link = format!("{base_url}/reset-password?token={token}");
    OutgoingEmail {
        to: to.to_string(),
        subject: RESET_SUBJECT.into(),
        body: format!(
            "A password reset was requested for your account.\n\nOpen the link below within one hour to choose a new password:\n{link}\n\nIf you did not request this, you can ignore this email.\n"
        ),
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .with_context(|| format!("smtp relay {}", config.host))?
            .port(config.port);

        if let (Some(user), Some(pass)) = (&config.user, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from_address.parse::<Mailbox>().context("parse from address")?)
            .to(email.to.parse::<Mailbox>().context("parse recipient address")?)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)
            .context("build email")?;

        self.transport.send(message).await.context("smtp send")?;
        info!(to = %email.to, subject = %email.subject, "email sent");
        Ok(())
    }
}

/// Development fallback: logs instead of sending.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()> {
        info!(to = %email.to, subject = %email.subject, body = %email.body, "smtp not configured; email logged");
        Ok(())
    }
}
