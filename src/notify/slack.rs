use anyhow::{Context, Result};
use reqwest::Client;

use super::{MessageKind, OutboundMessage, Publisher};
use crate::ingest::providers::USER_AGENT;

pub struct SlackPublisher {
    webhook_url: String,
    client: Client,
}

impl SlackPublisher {
    /// `None` when `SLACK_WEBHOOK_URL` is unset or empty.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("SLACK_WEBHOOK_URL").ok().filter(|u| !u.trim().is_empty())?;
        Some(Self::new(url))
    }

    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            client: Client::builder()
                .user_agent(USER_AGENT)
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }
}

fn slack_text(msg: &OutboundMessage) -> String {
    match msg.kind {
        MessageKind::Review => format!("*{}*\n>{}\n<{}>", msg.title, msg.body.replace('\n', "\n>"), msg.url),
        MessageKind::Post => format!("{}\n{}", msg.body, msg.url),
    }
}

#[async_trait::async_trait]
impl Publisher for SlackPublisher {
    async fn publish(&self, msg: &OutboundMessage) -> Result<()> {
        let body = serde_json::json!({ "text": slack_text(msg) });
        self.client
            .post(&self.webhook_url)
            .json(&body)
            .send()
            .await
            .context("slack post")?
            .error_for_status()
            .context("slack non-2xx")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_quotes_body() {
        let m = OutboundMessage {
            kind: MessageKind::Review,
            title: "New draft".into(),
            body: "line one\nline two".into(),
            url: "https://a.example".into(),
        };
        assert_eq!(slack_text(&m), "*New draft*\n>line one\n>line two\n<https://a.example>");
    }
}
