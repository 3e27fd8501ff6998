//! Outbound channels: review digests for new drafts and published posts.
//!
//! Every channel sits behind [`Publisher`]. A failed send is logged and never
//! stops the run; messages are paced by a fixed delay for channel rate limits.

pub mod discord;
pub mod email;
pub mod slack;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::drafts::DraftRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// A new draft waiting for human review.
    Review,
    /// A draft being published.
    Post,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    pub kind: MessageKind,
    pub title: String,
    pub body: String,
    pub url: String,
}

impl OutboundMessage {
    pub fn review(draft: &DraftRecord) -> Self {
        Self {
            kind: MessageKind::Review,
            title: format!(
                "New draft [{}] from {} ({})",
                draft.item.category.as_str(),
                draft.item.origin_label(),
                draft.id
            ),
            body: draft.generated_text.clone(),
            url: draft.item.canonical_url.clone(),
        }
    }

    pub fn post(draft: &DraftRecord) -> Self {
        Self {
            kind: MessageKind::Post,
            title: draft.item.title.clone(),
            body: draft.generated_text.clone(),
            url: draft.item.canonical_url.clone(),
        }
    }

    /// Plain-text rendering shared by the webhook and mail channels.
    pub fn plain_text(&self) -> String {
        match self.kind {
            MessageKind::Review => format!("{}\n\n{}\n\nSource: {}", self.title, self.body, self.url),
            MessageKind::Post => format!("{}\n\n{}", self.body, self.url),
        }
    }
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, msg: &OutboundMessage) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Fan-out over every configured channel.
pub struct ChannelMux {
    channels: Vec<Arc<dyn Publisher>>,
    delay: Duration,
}

impl ChannelMux {
    pub fn new(channels: Vec<Arc<dyn Publisher>>, delay: Duration) -> Self {
        Self { channels, delay }
    }

    /// Channels whose credentials are present in the environment.
    pub fn from_env(delay: Duration) -> Self {
        let mut channels: Vec<Arc<dyn Publisher>> = Vec::new();
        if let Some(s) = slack::SlackPublisher::from_env() {
            channels.push(Arc::new(s));
        }
        if let Some(d) = discord::DiscordPublisher::from_env() {
            channels.push(Arc::new(d));
        }
        match email::EmailPublisher::from_env() {
            Ok(Some(e)) => channels.push(Arc::new(e)),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "email channel misconfigured, disabled"),
        }
        if channels.is_empty() {
            tracing::info!("no outbound channels configured");
        }
        Self::new(channels, delay)
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Send to every channel; true if at least one accepted the message.
    pub async fn publish(&self, msg: &OutboundMessage) -> bool {
        let mut delivered = false;
        for ch in &self.channels {
            match ch.publish(msg).await {
                Ok(()) => delivered = true,
                Err(e) => tracing::warn!(channel = ch.name(), url = %msg.url, error = %e, "publish failed"),
            }
        }
        delivered
    }

    /// Fixed inter-message pause.
    pub async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    /// Send messages in order with the fixed pause between them.
    /// Returns how many reached at least one channel.
    pub async fn publish_all(&self, msgs: &[OutboundMessage]) -> usize {
        if self.channels.is_empty() {
            return 0;
        }
        let mut sent = 0;
        for (i, m) in msgs.iter().enumerate() {
            if i > 0 {
                self.pause().await;
            }
            if self.publish(m).await {
                sent += 1;
            }
        }
        sent
    }
}

/// In-memory channel that records every message; optionally fails.
#[derive(Default)]
pub struct RecordingPublisher {
    sent: Mutex<Vec<OutboundMessage>>,
    fail: bool,
}

impl RecordingPublisher {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, msg: &OutboundMessage) -> Result<()> {
        if self.fail {
            anyhow::bail!("channel down");
        }
        if let Ok(mut s) = self.sent.lock() {
            s.push(msg.clone());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(url: &str) -> OutboundMessage {
        OutboundMessage {
            kind: MessageKind::Post,
            title: "t".into(),
            body: "b".into(),
            url: url.into(),
        }
    }

    #[tokio::test]
    async fn one_failing_channel_does_not_block_others() {
        let ok = Arc::new(RecordingPublisher::default());
        let channels: Vec<Arc<dyn Publisher>> = vec![Arc::new(RecordingPublisher::failing()), ok.clone()];
        let mux = ChannelMux::new(channels, Duration::from_millis(1));
        assert_eq!(mux.publish_all(&[msg("a"), msg("b")]).await, 2);
        assert_eq!(ok.sent().len(), 2);
    }

    #[tokio::test]
    async fn all_failing_reports_nothing_sent() {
        let channels: Vec<Arc<dyn Publisher>> = vec![Arc::new(RecordingPublisher::failing())];
        let mux = ChannelMux::new(channels, Duration::ZERO);
        assert!(!mux.publish(&msg("a")).await);
        assert_eq!(ChannelMux::new(Vec::new(), Duration::ZERO).publish_all(&[msg("a")]).await, 0);
    }

    #[test]
    fn plain_text_by_kind() {
        assert_eq!(msg("u").plain_text(), "b\n\nu");
    }
}
