use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{MessageKind, OutboundMessage, Publisher};

pub struct EmailPublisher {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl EmailPublisher {
    /// `Ok(None)` when `SMTP_HOST` is unset; an error when it is set but the
    /// rest of the configuration is missing or invalid.
    pub fn from_env() -> Result<Option<Self>> {
        let Some(host) = env_nonempty("SMTP_HOST") else {
            return Ok(None);
        };
        let user = env_nonempty("SMTP_USER").context("SMTP_USER missing")?;
        let pass = env_nonempty("SMTP_PASS").context("SMTP_PASS missing")?;
        let from_addr = env_nonempty("NOTIFY_EMAIL_FROM").context("NOTIFY_EMAIL_FROM missing")?;
        let to_addr = env_nonempty("NOTIFY_EMAIL_TO").context("NOTIFY_EMAIL_TO missing")?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
            .context("invalid SMTP_HOST")?
            .credentials(Credentials::new(user, pass))
            .build();
        let from = from_addr.parse().context("invalid NOTIFY_EMAIL_FROM")?;
        let to = to_addr.parse().context("invalid NOTIFY_EMAIL_TO")?;
        Ok(Some(Self { mailer, from, to }))
    }
}

fn subject(msg: &OutboundMessage) -> String {
    match msg.kind {
        MessageKind::Review => format!("[feed-curator] {}", msg.title),
        MessageKind::Post => format!("[feed-curator] posted: {}", msg.title),
    }
}

#[async_trait::async_trait]
impl Publisher for EmailPublisher {
    async fn publish(&self, msg: &OutboundMessage) -> Result<()> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject(msg))
            .header(header::ContentType::TEXT_PLAIN)
            .body(msg.plain_text())
            .context("build email")?;

        self.mailer.send(email).await.context("send email")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "email"
    }
}
