use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{OutboundMessage, Publisher};

/// Discord embed descriptions are capped at 4096 chars.
const MAX_DESCRIPTION: usize = 4096;

#[derive(Clone)]
pub struct DiscordPublisher {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordPublisher {
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("DISCORD_WEBHOOK_URL").ok().filter(|u| !u.trim().is_empty())?;
        Some(Self::new(url))
    }

    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }
}

#[async_trait::async_trait]
impl Publisher for DiscordPublisher {
    async fn publish(&self, msg: &OutboundMessage) -> Result<()> {
        let payload = DiscordWebhookPayload::from_message(msg);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status_ref() {
                    Ok(_) => return Ok(()),
                    Err(e) => anyhow!("Discord webhook HTTP error: {e}"),
                },
                Err(e) => anyhow!("Discord webhook request failed: {e}"),
            };
            if attempt >= self.max_retries {
                return Err(err);
            }
            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
        }
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

#[derive(Serialize, Debug, PartialEq)]
struct DiscordEmbed {
    title: String,
    description: String,
    url: String,
}

#[derive(Serialize, Debug, PartialEq)]
struct DiscordWebhookPayload {
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

impl DiscordWebhookPayload {
    fn from_message(msg: &OutboundMessage) -> Self {
        Self {
            content: None,
            embeds: vec![DiscordEmbed {
                title: msg.title.chars().take(256).collect(),
                description: msg.body.chars().take(MAX_DESCRIPTION).collect(),
                url: msg.url.clone(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MessageKind;

    #[test]
    fn embed_is_capped() {
        let m = OutboundMessage {
            kind: MessageKind::Review,
            title: "t".repeat(300),
            body: "b".into(),
            url: "https://a.example".into(),
        };
        let p = DiscordWebhookPayload::from_message(&m);
        assert_eq!(p.embeds[0].title.chars().count(), 256);
        assert_eq!(p.embeds[0].url, "https://a.example");
    }
}
