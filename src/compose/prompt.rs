//! Prompt assembly for drafting.

use super::article::Article;
use super::lint::LintDetection;
use crate::ingest::types::{CandidateItem, ItemDetail};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You write short posts for a product news account.\n\
Summarize the item in two to four plain sentences for developers who use the product.\n\
Use only names, versions and features that appear in the source material.\n\
Lead with what changed and who it affects. No hashtags, no emoji, no marketing language.\n\
Output the post text only.";

/// Source material handed to the drafting prompt.
pub struct PromptInput<'a> {
    pub item: &'a CandidateItem,
    pub article: Option<&'a Article>,
}

fn source_line(item: &CandidateItem) -> String {
    match &item.detail {
        ItemDetail::Stream {
            author_handle, thread, ..
        } if !thread.is_empty() => format!("thread by @{author_handle} ({} posts)", thread.len()),
        ItemDetail::Stream { author_handle, .. } => format!("post by @{author_handle}"),
        ItemDetail::Feed { feed_name, .. } => format!("feed: {feed_name}"),
        ItemDetail::Page { page_name, .. } => format!("page update: {page_name}"),
    }
}

pub fn user_prompt(input: &PromptInput<'_>) -> String {
    let item = input.item;
    let mut out = format!(
        "Title: {}\nURL: {}\nSource: {}\nPublished: {}\n",
        item.title,
        item.canonical_url,
        source_line(item),
        item.published_at.to_rfc3339()
    );
    let body = item.body();
    if !body.trim().is_empty() {
        out.push_str("\nContent:\n");
        out.push_str(body.trim());
        out.push('\n');
    }
    if let Some(a) = input.article.filter(|a| !a.text.trim().is_empty()) {
        out.push_str("\nLinked article");
        if !a.title.is_empty() {
            out.push_str(&format!(" ({})", a.title));
        }
        out.push_str(":\n");
        out.push_str(a.text.trim());
        out.push('\n');
    }
    out.push_str("\nWrite the post.");
    out
}

/// Append correction instructions for the worst lint detections.
pub fn with_corrections(prompt: &str, detections: &[LintDetection], n: usize) -> String {
    if detections.is_empty() || n == 0 {
        return prompt.to_string();
    }
    let mut out = format!("{prompt}\n\nThe previous draft used stock phrasing. Rewrite it and fix:\n");
    for d in detections.iter().take(n) {
        out.push_str(&format!("- \"{}\" ({}): {}\n", d.matched_text, d.rule_id, d.suggestion));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::lint::Severity;
    use crate::ingest::types::{Category, SourceKind};
    use chrono::{TimeZone, Utc};

    fn item() -> CandidateItem {
        CandidateItem {
            source: SourceKind::Feed,
            title: "Acme 2.1 released".into(),
            canonical_url: "https://acme.example/2-1".into(),
            published_at: Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap(),
            raw_score: 0,
            score: 0,
            category: Category::Practical,
            detail: ItemDetail::Feed {
                feed_url: "https://acme.example/feed".into(),
                feed_name: "Acme Blog".into(),
                summary: "Streaming responses.".into(),
                official: true,
            },
        }
    }

    #[test]
    fn includes_source_and_article() {
        let it = item();
        let art = Article {
            title: "Changelog".into(),
            text: "Full notes".into(),
        };
        let p = user_prompt(&PromptInput {
            item: &it,
            article: Some(&art),
        });
        assert!(p.contains("Title: Acme 2.1 released"));
        assert!(p.contains("Source: feed: Acme Blog"));
        assert!(p.contains("Content:\nStreaming responses."));
        assert!(p.contains("Linked article (Changelog):\nFull notes"));
    }

    #[test]
    fn corrections_are_capped() {
        let d = |id: &str| LintDetection {
            rule_id: id.into(),
            severity: Severity::High,
            matched_text: "x".into(),
            position: 0,
            suggestion: "y".into(),
        };
        let out = with_corrections("P", &[d("A"), d("B"), d("C")], 2);
        assert!(out.contains("(A)") && out.contains("(B)"));
        assert!(!out.contains("(C)"));
        assert_eq!(with_corrections("P", &[], 3), "P");
    }
}
