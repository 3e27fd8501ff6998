//! Secondary fact-check: a second generative call compares the draft against
//! the source title. Unavailable or unreadable reviews pass when `fail_open`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use super::validate::ValidationResult;
use crate::analyze::ai_adapter::{DynBackend, GenerationError};

static RE_JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("json object regex"));

const REVIEW_SYSTEM: &str = "You fact-check short social posts against the article they summarize.\n\
Flag every proper noun, product name, version string or feature name that appears in the post but not in the article title.\n\
Flag any information that cannot be inferred from the title, including old names or aliases added by the writer.\n\
Answer with JSON only:\n\
{\"is_valid\": true|false, \"issues\": [\"...\"], \"explanation\": \"...\"}\n\
is_valid is false when at least one such term is present.";

#[derive(Debug, Deserialize)]
struct ReviewVerdict {
    /// `None` when the answer omits the verdict; treated as unparsable.
    #[serde(default)]
    is_valid: Option<bool>,
    #[serde(default)]
    issues: Vec<String>,
    #[serde(default)]
    explanation: String,
}

/// Parse the first JSON object in a model answer.
fn parse_verdict(answer: &str) -> Option<ReviewVerdict> {
    let m = RE_JSON_OBJECT.find(answer)?;
    serde_json::from_str(m.as_str()).ok()
}

pub struct ReviewGate {
    backend: Option<DynBackend>,
    enabled: bool,
    fail_open: bool,
}

impl ReviewGate {
    pub fn new(backend: Option<DynBackend>, enabled: bool, fail_open: bool) -> Self {
        Self {
            backend,
            enabled,
            fail_open,
        }
    }

    pub fn disabled() -> Self {
        Self::new(None, false, true)
    }

    pub fn is_active(&self) -> bool {
        self.enabled && self.backend.is_some()
    }

    fn unavailable(&self, why: &str) -> ValidationResult {
        if self.fail_open {
            tracing::warn!(reason = why, "review unavailable, passing draft");
            ValidationResult::pass()
        } else {
            ValidationResult::reject(format!("review unavailable: {why}"), vec!["review_unavailable".into()])
        }
    }

    pub async fn review(&self, text: &str, title: &str, url: &str) -> ValidationResult {
        if !self.enabled {
            return ValidationResult::pass();
        }
        let Some(backend) = &self.backend else {
            return self.unavailable("no review backend");
        };
        let user = format!(
            "Article title:\n{title}\n\nSource URL:\n{url}\n\nPost:\n{text}\n\n\
             Check the post for terms or claims not present in the title and answer in JSON."
        );
        let answer = match backend.generate(REVIEW_SYSTEM, &user).await {
            Ok(a) => a,
            Err(GenerationError::MissingCredentials(_)) => return self.unavailable("missing credentials"),
            Err(e) => {
                tracing::warn!(error = %e, url, "review call failed");
                return self.unavailable("call failed");
            }
        };
        let Some(verdict) = parse_verdict(&answer) else {
            return self.unavailable("unparsable answer");
        };
        match verdict.is_valid {
            Some(true) => ValidationResult::pass(),
            Some(false) => {
                ValidationResult::reject(format!("review rejected: {}", verdict.explanation), verdict.issues)
            }
            None => self.unavailable("unparsable answer"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::ai_adapter::{DisabledBackend, ScriptedBackend};
    use std::sync::Arc;

    fn gate(answers: Vec<Result<String, GenerationError>>, fail_open: bool) -> ReviewGate {
        ReviewGate::new(Some(Arc::new(ScriptedBackend::new(answers))), true, fail_open)
    }

    #[test]
    fn parses_embedded_json() {
        let v = parse_verdict("Sure.\n{\"is_valid\": false, \"issues\": [\"Acme Turbo\"]}\nDone").unwrap();
        assert_eq!(v.is_valid, Some(false));
        assert_eq!(v.issues, vec!["Acme Turbo"]);
        assert!(parse_verdict("no json").is_none());
    }

    #[tokio::test]
    async fn explicit_invalid_rejects() {
        let g = gate(
            vec![Ok(r#"{"is_valid": false, "issues": ["v3"], "explanation": "v3 not in title"}"#.into())],
            true,
        );
        let r = g.review("Acme v3 is out", "Acme v2 released", "https://acme.example").await;
        assert!(!r.is_valid);
        assert_eq!(r.detected_issues, vec!["v3"]);
        assert_eq!(r.rejection_reason.as_deref(), Some("review rejected: v3 not in title"));
    }

    #[tokio::test]
    async fn failures_pass_when_fail_open() {
        assert!(gate(vec![Ok("looks fine".into())], true).review("t", "t", "u").await.is_valid);
        assert!(gate(vec![Err(GenerationError::EmptyResponse)], true).review("t", "t", "u").await.is_valid);
        let missing = ReviewGate::new(Some(Arc::new(DisabledBackend)), true, true);
        assert!(missing.review("t", "t", "u").await.is_valid);
    }

    #[tokio::test]
    async fn failures_reject_when_fail_closed() {
        let r = gate(vec![Ok("looks fine".into())], false).review("t", "t", "u").await;
        assert_eq!(r.detected_issues, vec!["review_unavailable"]);
    }

    #[tokio::test]
    async fn verdict_without_is_valid_is_not_a_pass() {
        let answer = r#"{"issues": [], "explanation": "nothing to flag"}"#;
        let closed = gate(vec![Ok(answer.into())], false).review("t", "t", "u").await;
        assert!(!closed.is_valid);
        assert_eq!(closed.detected_issues, vec!["review_unavailable"]);
        assert_eq!(closed.rejection_reason.as_deref(), Some("review unavailable: unparsable answer"));

        let open = gate(vec![Ok(answer.into())], true).review("t", "t", "u").await;
        assert!(open.is_valid);
    }
}
