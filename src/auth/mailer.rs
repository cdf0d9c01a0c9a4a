//! Outbound Mail
//! Mission: Deliver password reset links over SMTP

use crate::config::MailConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use parking_lot::Mutex;
use tracing::{info, warn};

/// A single plain-text email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mail transport seam. One attempt per call, no retries.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<()>;
}

/// SMTP delivery through lettre
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(host: &str, config: &MailConfig) -> Result<Self> {
        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(config.smtp_port);

        if let (Some(user), Some(pass)) = (&config.smtp_user, &config.smtp_pass) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        // Reject a bad sender address at startup rather than on first send
        config
            .from
            .parse::<lettre::message::Mailbox>()
            .with_context(|| format!("Invalid MAIL_FROM address: {}", config.from))?;

        Ok(Self {
            transport: builder.build(),
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        let message = Message::builder()
            .from(self.from.parse().context("Invalid sender address")?)
            .to(mail.to.parse().context("Invalid recipient address")?)
            .subject(mail.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body)
            .context("Failed to build email")?;

        self.transport
            .send(message)
            .await
            .context("SMTP delivery failed")?;

        info!("Email sent to {}", mail.to);
        Ok(())
    }
}

/// Used when no SMTP host is configured: every send fails
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        warn!("Mail transport not configured; dropping email to {}", mail.to);
        anyhow::bail!("mail transport not configured")
    }
}

/// Pick the transport described by the configuration
pub fn from_config(config: &MailConfig) -> Result<Box<dyn Mailer>> {
    match config.smtp_host.as_deref().filter(|h| !h.trim().is_empty()) {
        Some(host) => {
            info!("SMTP mailer configured for {}:{}", host, config.smtp_port);
            Ok(Box::new(SmtpMailer::new(host, config)?))
        }
        None => {
            warn!("SMTP_HOST not set - password reset emails are disabled");
            Ok(Box::new(DisabledMailer))
        }
    }
}

/// Keeps every message in memory; optionally fails every send
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    fail: bool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        if self.fail {
            anyhow::bail!("simulated SMTP failure");
        }
        self.sent.lock().push(mail);
        Ok(())
    }
}
