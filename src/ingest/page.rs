// src/ingest/page.rs
//! Monitored pages, compared by content hash rather than by time.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::analyze::scoring::feed_raw_score;
use crate::config::{PageConfig, ScoringConfig};
use crate::cursor::CursorStore;
use crate::ingest::providers::web::html_to_text;
use crate::ingest::types::{CandidateItem, Category, ItemDetail, PageClient, SourceKind};
use crate::ingest::{record_source_error, CollectStats};

pub fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

pub struct PageCollector<'a> {
    pages: &'a [PageConfig],
    scoring: &'a ScoringConfig,
    client: &'a dyn PageClient,
}

impl<'a> PageCollector<'a> {
    pub fn new(pages: &'a [PageConfig], scoring: &'a ScoringConfig, client: &'a dyn PageClient) -> Self {
        Self {
            pages,
            scoring,
            client,
        }
    }

    /// The first observation of a page only records a baseline.
    pub async fn collect(
        &self,
        cursors: &mut CursorStore,
        now: DateTime<Utc>,
        stats: &mut CollectStats,
    ) -> Vec<CandidateItem> {
        let mut out = Vec::new();
        for page in self.pages {
            let body = match self.client.fetch_page(&page.url).await {
                Ok(b) => b,
                Err(e) => {
                    record_source_error(stats, SourceKind::MonitoredPage, &page.name, &e);
                    continue;
                }
            };
            stats.fetched += 1;
            let hash = content_hash(&html_to_text(&body));

            let previous = cursors.page(&page.url).and_then(|c| c.content_hash.clone());
            match previous {
                None => {
                    stats.pages_baseline += 1;
                    tracing::info!(page = %page.name, "page baseline recorded");
                }
                Some(prev) if prev == hash => {
                    tracing::debug!(page = %page.name, "page unchanged");
                }
                Some(_) => {
                    stats.pages_changed += 1;
                    tracing::info!(page = %page.name, url = %page.url, "page changed");
                    let raw = feed_raw_score(self.scoring.page_base_score, page.priority_bonus);
                    out.push(CandidateItem {
                        source: SourceKind::MonitoredPage,
                        title: format!("{} updated", page.name),
                        canonical_url: page.url.clone(),
                        published_at: now,
                        raw_score: raw,
                        score: raw,
                        category: Category::Unknown,
                        detail: ItemDetail::Page {
                            page_url: page.url.clone(),
                            page_name: page.name.clone(),
                            content_hash: hash.clone(),
                            official: page.official,
                        },
                    });
                }
            }
            cursors.set_page(&page.url, &hash, now);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use chrono::TimeZone;
    use std::sync::Mutex;

    struct Scripted(Mutex<Vec<Result<String>>>);

    #[async_trait::async_trait]
    impl PageClient for Scripted {
        async fn fetch_page(&self, _url: &str) -> Result<String> {
            self.0.lock().unwrap().remove(0)
        }
    }

    fn err() -> Result<String> {
        bail!("timeout")
    }

    #[tokio::test]
    async fn baseline_then_unchanged_then_changed() {
        let pages = vec![PageConfig {
            url: "https://acme.example/changelog".into(),
            name: "Acme changelog".into(),
            priority_bonus: 200,
            official: true,
        }];
        let scoring = ScoringConfig::default();
        let client = Scripted(Mutex::new(vec![
            Ok("<html><body><p>v1</p></body></html>".into()),
            // markup-only change hashes the same text
            Ok("<html><body><div>v1</div></body></html>".into()),
            err(),
            Ok("<html><body><p>v2</p></body></html>".into()),
        ]));
        let pc = PageCollector::new(&pages, &scoring, &client);
        let mut cursors = CursorStore::in_memory();
        let mut stats = CollectStats::default();
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();

        assert!(pc.collect(&mut cursors, now, &mut stats).await.is_empty());
        assert_eq!(stats.pages_baseline, 1);
        assert!(pc.collect(&mut cursors, now, &mut stats).await.is_empty());
        assert!(pc.collect(&mut cursors, now, &mut stats).await.is_empty());
        assert_eq!(stats.source_errors, 1);

        let items = pc.collect(&mut cursors, now, &mut stats).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].raw_score, 700);
        assert_eq!(items[0].source, SourceKind::MonitoredPage);
        assert_eq!(stats.pages_changed, 1);
    }
}
