//! Deterministic, severity-weighted style linter for generated drafts.
//!
//! Each rule is a regex; every match is a [`LintDetection`] and adds the
//! severity's impact to the score. A rule may carry an `exclude` pattern which
//! suppresses a match when it also matches at the same position.

use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn impact(self) -> u32 {
        match self {
            Severity::Critical => 10,
            Severity::High => 7,
            Severity::Medium => 4,
            Severity::Low => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LintDetection {
    pub rule_id: String,
    pub severity: Severity,
    pub matched_text: String,
    /// Byte offset of the match.
    pub position: usize,
    pub suggestion: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LintResult {
    pub score: u32,
    /// Most severe first; ties keep rule order.
    pub detections: Vec<LintDetection>,
    pub total: usize,
    /// Length of the checked text in chars.
    pub text_len: usize,
}

impl LintResult {
    /// Detections per 1000 chars.
    pub fn density(&self) -> f64 {
        if self.text_len == 0 {
            0.0
        } else {
            self.total as f64 / self.text_len as f64 * 1000.0
        }
    }
}

/// Rule as written in a rules file.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleSpec {
    pub id: String,
    pub severity: Severity,
    pub pattern: String,
    #[serde(default)]
    pub exclude: Option<String>,
    #[serde(default)]
    pub suggestion: String,
}

#[derive(Debug, Deserialize)]
struct RulesFile {
    #[serde(default)]
    rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone)]
struct CompiledRule {
    id: String,
    severity: Severity,
    pattern: Regex,
    exclude: Option<Regex>,
    suggestion: String,
}

impl CompiledRule {
    fn compile(spec: &RuleSpec) -> Result<Self, regex::Error> {
        Ok(Self {
            id: spec.id.clone(),
            severity: spec.severity,
            pattern: Regex::new(&spec.pattern)?,
            exclude: spec
                .exclude
                .as_deref()
                .filter(|e| !e.is_empty())
                .map(|e| Regex::new(&format!("^(?:{e})")))
                .transpose()?,
            suggestion: spec.suggestion.clone(),
        })
    }
}

fn rule(id: &str, severity: Severity, pattern: &str, exclude: Option<&str>, suggestion: &str) -> RuleSpec {
    RuleSpec {
        id: id.into(),
        severity,
        pattern: pattern.into(),
        exclude: exclude.map(str::to_string),
        suggestion: suggestion.into(),
    }
}

/// Built-in English rules for stock generative phrasing.
pub fn builtin_rules() -> Vec<RuleSpec> {
    use Severity::*;
    vec![
        rule("AI-TONE-001", Critical, r"(?i)\bdelv(?:e|es|ed|ing) (?:into|deeper)\b", None, "State the finding directly"),
        rule(
            "AI-TONE-002",
            Critical,
            r"(?i)\bin today's (?:fast-paced|rapidly evolving|digital|ever-changing) (?:world|landscape|era)\b",
            None,
            "Drop the scene-setting opener",
        ),
        rule("AI-TONE-003", High, r"(?i)\bgame[- ]chang(?:er|ing)\b", None, "Name the concrete change instead"),
        rule("AI-TONE-004", High, r"(?i)\b(?:let's|let us) dive (?:in|into)\b", None, "Start with the news itself"),
        rule(
            "AI-TONE-005",
            High,
            r"(?i)\bunlock(?:s|ing)? (?:the )?(?:full |true )?potential\b",
            None,
            "Say what becomes possible",
        ),
        rule(
            "AI-TONE-006",
            Medium,
            r"(?i)\bit(?:'s| is) (?:worth noting|important to note)\b",
            None,
            "Just state the point",
        ),
        rule(
            "AI-TONE-007",
            Medium,
            r"(?i)\b(?:seamless(?:ly)?|cutting-edge|state-of-the-art|groundbreaking)\b",
            None,
            "Use a specific, verifiable detail",
        ),
        rule(
            "AI-TONE-008",
            Medium,
            r"(?i)\bleverag(?:e|es|ed|ing)\b",
            Some(r"(?i)leverage ratio"),
            "Prefer 'use'",
        ),
        rule("AI-TONE-009", Low, r"(?i)\b(?:stay tuned|exciting news)\b", None, "Cut the filler"),
        rule("AI-SYNTAX-001", Low, r"!{2,}", None, "Use a single exclamation mark at most"),
        rule("AI-SYNTAX-002", Low, r"(?i)\bin conclusion\b", None, "Short posts need no summary marker"),
    ]
}

/// Read `[[rules]]` entries from a TOML file.
pub fn load_rules_file(path: &Path) -> Result<Vec<RuleSpec>> {
    let s = std::fs::read_to_string(path).with_context(|| format!("reading lint rules {}", path.display()))?;
    let file: RulesFile = toml::from_str(&s).with_context(|| format!("parsing lint rules {}", path.display()))?;
    Ok(file.rules)
}

#[derive(Debug, Clone)]
pub struct LintChecker {
    rules: Vec<CompiledRule>,
}

impl LintChecker {
    /// Compile `specs`; invalid rules are skipped with a warning.
    pub fn new(specs: &[RuleSpec]) -> Self {
        let rules = specs
            .iter()
            .filter_map(|s| match CompiledRule::compile(s) {
                Ok(r) => Some(r),
                Err(e) => {
                    tracing::warn!(rule = %s.id, error = %e, "lint rule skipped");
                    None
                }
            })
            .collect();
        Self { rules }
    }

    pub fn builtin() -> Self {
        Self::new(&builtin_rules())
    }

    /// Built-in rules plus those from `rules_path`, when set.
    pub fn with_rules_file(rules_path: Option<&Path>) -> Result<Self> {
        let mut specs = builtin_rules();
        if let Some(p) = rules_path {
            let extra = load_rules_file(p)?;
            tracing::info!(path = %p.display(), rules = extra.len(), "lint rules loaded");
            specs.extend(extra);
        }
        Ok(Self::new(&specs))
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn check(&self, text: &str) -> LintResult {
        let mut detections = Vec::new();
        for r in &self.rules {
            for m in r.pattern.find_iter(text) {
                if let Some(ex) = &r.exclude {
                    if ex.is_match(&text[m.start()..]) {
                        continue;
                    }
                }
                detections.push(LintDetection {
                    rule_id: r.id.clone(),
                    severity: r.severity,
                    matched_text: m.as_str().to_string(),
                    position: m.start(),
                    suggestion: r.suggestion.clone(),
                });
            }
        }
        detections.sort_by_key(|d| std::cmp::Reverse(d.severity.impact()));
        LintResult {
            score: detections.iter().map(|d| d.severity.impact()).sum(),
            total: detections.len(),
            text_len: text.chars().count(),
            detections,
        }
    }
}

/// Human-readable report: totals plus the ten worst detections.
pub fn format_report(result: &LintResult) -> String {
    if result.score == 0 {
        return "OK: no stock phrasing detected".to_string();
    }
    let mut lines = vec![
        format!("lint score: {}", result.score),
        format!("  detections: {}", result.total),
        format!("  density: {:.2} per 1000 chars", result.density()),
        String::new(),
    ];
    for (i, d) in result.detections.iter().take(10).enumerate() {
        lines.push(format!("{}. [{}] {}", i + 1, d.severity.as_str(), d.rule_id));
        lines.push(format!("   matched: \"{}\"", d.matched_text));
        lines.push(format!("   suggestion: {}", d.suggestion));
        lines.push(String::new());
    }
    if result.total > 10 {
        lines.push(format!("... and {} more", result.total - 10));
    }
    lines.join("\n")
}
