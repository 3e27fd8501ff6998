//! Canonical-URL deduplication, within a run and against recent history.

use metrics::counter;
use std::collections::{HashMap, HashSet};
use url::Url;

use crate::ingest::types::CandidateItem;

#[derive(Debug, Clone, Default)]
pub struct UrlCanonicalizer {
    host_aliases: HashMap<String, String>,
}

impl UrlCanonicalizer {
    pub fn new(host_aliases: &HashMap<String, String>) -> Self {
        Self {
            host_aliases: host_aliases
                .iter()
                .map(|(a, c)| (a.to_ascii_lowercase(), c.to_ascii_lowercase()))
                .collect(),
        }
    }

    /// https, lowercase host without `www.`, aliases folded, fragment and
    /// `utm_*` parameters dropped, trailing slash trimmed. Unparsable input is
    /// returned trimmed.
    pub fn canonicalize(&self, raw: &str) -> String {
        let raw = raw.trim();
        let Ok(mut url) = Url::parse(raw) else {
            return raw.to_string();
        };
        if url.scheme() == "http" {
            let _ = url.set_scheme("https");
        }
        if let Some(host) = url.host_str() {
            let mut h = host.to_ascii_lowercase();
            if let Some(stripped) = h.strip_prefix("www.") {
                h = stripped.to_string();
            }
            if let Some(alias) = self.host_aliases.get(&h) {
                h = alias.clone();
            }
            let _ = url.set_host(Some(&h));
        }
        url.set_fragment(None);

        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !k.to_ascii_lowercase().starts_with("utm_"))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }

        let mut out = url.to_string();
        if out.ends_with('/') && url.query().is_none() {
            out.pop();
        }
        out
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupStats {
    pub same_run: usize,
    pub lookback: usize,
}

/// Rewrite every `canonical_url` to canonical form, then drop items already in
/// `history` and later repeats of a URL seen earlier in this run.
pub fn dedup_candidates(
    items: Vec<CandidateItem>,
    canon: &UrlCanonicalizer,
    history: &HashSet<String>,
) -> (Vec<CandidateItem>, DedupStats) {
    let history: HashSet<String> = history.iter().map(|u| canon.canonicalize(u)).collect();
    let mut stats = DedupStats::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(items.len());

    for mut item in items {
        item.canonical_url = canon.canonicalize(&item.canonical_url);
        if history.contains(&item.canonical_url) {
            stats.lookback += 1;
            tracing::info!(url = %item.canonical_url, reason = "lookback", "duplicate removed");
            continue;
        }
        if !seen.insert(item.canonical_url.clone()) {
            stats.same_run += 1;
            tracing::info!(url = %item.canonical_url, reason = "same_run", "duplicate removed");
            continue;
        }
        out.push(item);
    }

    counter!("curator_dedup_removed_total", "reason" => "same_run").increment(stats.same_run as u64);
    counter!("curator_dedup_removed_total", "reason" => "lookback").increment(stats.lookback as u64);
    (out, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DedupConfig;
    use crate::ingest::types::{Category, ItemDetail, SourceKind};
    use chrono::Utc;

    fn canon() -> UrlCanonicalizer {
        UrlCanonicalizer::new(&DedupConfig::default().host_aliases)
    }

    fn item(url: &str, score: i64) -> CandidateItem {
        CandidateItem {
            source: SourceKind::Feed,
            title: url.into(),
            canonical_url: url.into(),
            published_at: Utc::now(),
            raw_score: score,
            score,
            category: Category::Unknown,
            detail: ItemDetail::Feed {
                feed_url: "f".into(),
                feed_name: "F".into(),
                summary: String::new(),
                official: false,
            },
        }
    }

    #[test]
    fn canonical_forms() {
        let c = canon();
        assert_eq!(
            c.canonicalize("http://WWW.Acme.example/post/?utm_source=x&id=3#top"),
            "https://acme.example/post/?id=3"
        );
        assert_eq!(c.canonicalize("https://acme.example/post/"), "https://acme.example/post");
        assert_eq!(
            c.canonicalize("https://mobile.twitter.com/acme/status/1"),
            "https://x.com/acme/status/1"
        );
        assert_eq!(c.canonicalize("https://twitter.com/acme/status/1"), "https://x.com/acme/status/1");
        assert_eq!(c.canonicalize("not a url "), "not a url");
    }

    #[test]
    fn first_occurrence_wins_and_history_is_subtracted() {
        let items = vec![
            item("https://twitter.com/acme/status/1", 10),
            item("https://x.com/acme/status/1", 20),
            item("https://acme.example/a?utm_medium=rss", 5),
            item("https://acme.example/b", 7),
        ];
        let history: HashSet<String> = ["http://www.acme.example/a/".to_string()].into();
        let (out, stats) = dedup_candidates(items, &canon(), &history);
        let urls: Vec<_> = out.iter().map(|i| i.canonical_url.as_str()).collect();
        assert_eq!(urls, vec!["https://x.com/acme/status/1", "https://acme.example/b"]);
        assert_eq!(out[0].score, 10);
        assert_eq!(stats, DedupStats { same_run: 1, lookback: 1 });
    }
}
