//! Final candidate selection.
//!
//! Quota mode reserves slots per source pool in priority order (must-include,
//! feed, stream) and fills the remaining capacity from the leftovers of every
//! pool, newest first. An unmet quota never blocks the fill.

use std::cmp::Reverse;
use std::collections::HashMap;

use crate::config::SelectionConfig;
use crate::ingest::types::{CandidateItem, SourcePool};

fn by_score_desc(items: &mut [CandidateItem]) {
    items.sort_by_key(|i| Reverse(i.score));
}

fn by_recency_then_score(items: &mut [CandidateItem]) {
    items.sort_by(|a, b| {
        b.published_at
            .cmp(&a.published_at)
            .then_with(|| b.score.cmp(&a.score))
    });
}

/// Split off the first `n` items.
fn take_front(mut items: Vec<CandidateItem>, n: usize) -> (Vec<CandidateItem>, Vec<CandidateItem>) {
    let rest = items.split_off(n.min(items.len()));
    (items, rest)
}

/// Round-robin across feeds: one item per feed (walking `priority`, then any
/// unlisted feeds by their best score) before a second item from any feed.
/// Within a feed, higher scores go first. Returns (chosen, rest).
pub fn select_diverse_feeds(
    mut items: Vec<CandidateItem>,
    priority: &[String],
    n: usize,
) -> (Vec<CandidateItem>, Vec<CandidateItem>) {
    by_score_desc(&mut items);

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<CandidateItem>> = HashMap::new();
    for item in items {
        let key = item.feed_key().unwrap_or_default().to_string();
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(item);
    }
    // listed feeds first in priority order; unlisted keep best-score order
    let rank = |k: &String| priority.iter().position(|p| p == k).unwrap_or(usize::MAX);
    order.sort_by_key(rank);

    let mut queues: Vec<std::vec::IntoIter<CandidateItem>> = order
        .iter()
        .filter_map(|k| groups.remove(k))
        .map(Vec::into_iter)
        .collect();

    let mut chosen = Vec::with_capacity(n);
    let mut rest = Vec::new();
    loop {
        let mut progressed = false;
        for q in queues.iter_mut() {
            if chosen.len() >= n {
                break;
            }
            if let Some(item) = q.next() {
                chosen.push(item);
                progressed = true;
            }
        }
        if !progressed || chosen.len() >= n {
            break;
        }
    }
    for q in queues {
        rest.extend(q);
    }
    (chosen, rest)
}

/// Pick the final ranked list.
pub fn select(items: Vec<CandidateItem>, cfg: &SelectionConfig, feed_priority: &[String]) -> Vec<CandidateItem> {
    if !cfg.quota_mode {
        let mut items = items;
        by_score_desc(&mut items);
        items.truncate(cfg.max_items);
        return items;
    }

    let mut must = Vec::new();
    let mut feeds = Vec::new();
    let mut streams = Vec::new();
    for item in items {
        match item.source.pool() {
            SourcePool::MustInclude => must.push(item),
            SourcePool::Feed => feeds.push(item),
            SourcePool::Stream => streams.push(item),
        }
    }

    by_recency_then_score(&mut must);
    let mut selected = must;
    let remaining = |selected: &Vec<CandidateItem>| cfg.max_items.saturating_sub(selected.len());

    let feed_n = cfg.feed_quota.min(remaining(&selected));
    let (feed_pick, feed_rest) = if cfg.feed_diversity {
        select_diverse_feeds(feeds, feed_priority, feed_n)
    } else {
        by_score_desc(&mut feeds);
        take_front(feeds, feed_n)
    };
    selected.extend(feed_pick);

    let stream_n = cfg.stream_quota.min(remaining(&selected));
    by_score_desc(&mut streams);
    let (stream_pick, stream_rest) = take_front(streams, stream_n);
    selected.extend(stream_pick);

    let mut leftovers: Vec<CandidateItem> = feed_rest.into_iter().chain(stream_rest).collect();
    by_recency_then_score(&mut leftovers);
    let fill = remaining(&selected);
    selected.extend(leftovers.into_iter().take(fill));

    tracing::info!(selected = selected.len(), capacity = cfg.max_items, "selection finished");
    selected
}
