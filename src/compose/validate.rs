//! Deterministic reject rules for generated drafts. Any hit is final.

use serde::{Deserialize, Serialize};

use crate::analyze::keywords::KeywordSet;
use crate::config::ComposeConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub rejection_reason: Option<String>,
    pub detected_issues: Vec<String>,
}

impl ValidationResult {
    pub fn pass() -> Self {
        Self {
            is_valid: true,
            ..Self::default()
        }
    }

    pub fn reject(reason: impl Into<String>, issues: Vec<String>) -> Self {
        Self {
            is_valid: false,
            rejection_reason: Some(reason.into()),
            detected_issues: issues,
        }
    }
}

fn issue_label(code: &str) -> &'static str {
    match code {
        "meta_message" => "draft describes the task instead of performing it",
        "lawsuit" => "litigation topic",
        "political" => "political controversy",
        "too_short" => "draft too short",
        _ => "rejected",
    }
}

pub struct ContentValidator {
    meta: KeywordSet,
    legal: KeywordSet,
    political: KeywordSet,
    min_length: usize,
}

impl ContentValidator {
    pub fn from_config(cfg: &ComposeConfig) -> Self {
        Self {
            meta: KeywordSet::compile("meta_message", &cfg.meta_patterns),
            legal: KeywordSet::compile("lawsuit", &cfg.legal_patterns),
            political: KeywordSet::compile("political", &cfg.political_patterns),
            min_length: cfg.min_length,
        }
    }

    /// Meta phrasing is checked on the draft only; topic filters also see the source title.
    pub fn validate(&self, text: &str, title: &str) -> ValidationResult {
        let combined = format!("{title} {text}");
        let mut issues: Vec<String> = Vec::new();
        if self.meta.is_match(text) {
            issues.push("meta_message".into());
        }
        if self.legal.is_match(&combined) {
            issues.push("lawsuit".into());
        }
        if self.political.is_match(&combined) {
            issues.push("political".into());
        }
        if text.trim().chars().count() < self.min_length {
            issues.push("too_short".into());
        }
        if issues.is_empty() {
            return ValidationResult::pass();
        }
        let reason = issues.iter().map(|i| issue_label(i)).collect::<Vec<_>>().join(" / ");
        ValidationResult::reject(reason, issues)
    }
}
