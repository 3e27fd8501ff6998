// src/config/mod.rs
//! Loaded configuration. One document, read once at process start and treated
//! as immutable input afterwards (feed priorities, keyword lists, quotas).

pub mod ai;
pub mod keywords;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub use ai::{GenerationConfig, ReviewConfig};
pub use keywords::KeywordConfig;

const ENV_PATH: &str = "CURATOR_CONFIG_PATH";
const DEFAULT_TOML: &str = "config/curator.toml";
const DEFAULT_JSON: &str = "config/curator.json";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub stream: StreamConfig,
    pub feeds: Vec<FeedConfig>,
    pub pages: Vec<PageConfig>,
    pub feed_policy: FeedPolicyConfig,
    pub classifier: ClassifierConfig,
    pub scoring: ScoringConfig,
    pub dedup: DedupConfig,
    pub selection: SelectionConfig,
    pub compose: ComposeConfig,
    pub generation: GenerationConfig,
    pub review: ReviewConfig,
    pub publish: PublishConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub state_path: PathBuf,
    pub drafts_path: PathBuf,
    /// Prometheus textfile written at the end of a run (optional).
    pub metrics_textfile: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from("data/state.json"),
            drafts_path: PathBuf::from("data/drafts.json"),
            metrics_textfile: None,
        }
    }
}

/// A minimum-threshold admission filter that can be switched off on its own.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct ThresholdFilter {
    #[serde(default)]
    pub enabled: bool,
    pub min: u64,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngagementWeights {
    pub like: i64,
    pub share: i64,
    pub reply: i64,
}

impl Default for EngagementWeights {
    fn default() -> Self {
        Self {
            like: 1,
            share: 3,
            reply: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Account handles polled each cycle (without `@`).
    pub accounts: Vec<String>,
    /// Search terms polled each cycle.
    pub searches: Vec<String>,
    /// Per-cycle cap on items taken from account polling.
    pub limit_accounts: usize,
    /// Per-cycle cap on items taken from search.
    pub limit_search: usize,
    pub max_results_per_source: usize,
    /// Lookback used when no last-seen id is stored yet.
    pub cold_start_hours: i64,
    pub reach_filter: ThresholdFilter,
    pub engagement_filter: ThresholdFilter,
    /// Authors whose multi-post threads are merged into one candidate.
    pub thread_authors: Vec<String>,
    pub weights: EngagementWeights,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            searches: Vec::new(),
            limit_accounts: 50,
            limit_search: 30,
            max_results_per_source: 10,
            cold_start_hours: 24,
            reach_filter: ThresholdFilter {
                enabled: false,
                min: 1_000,
            },
            engagement_filter: ThresholdFilter {
                enabled: false,
                min: 10,
            },
            thread_authors: Vec::new(),
            weights: EngagementWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FeedConfig {
    pub url: String,
    pub name: String,
    /// Added on top of `scoring.feed_base_score`. High-trust feeds carry a larger bonus.
    #[serde(default)]
    pub priority_bonus: i64,
    #[serde(default)]
    pub official: bool,
    /// Fresh entries of this feed are always selected.
    #[serde(default)]
    pub must_include: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PageConfig {
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub priority_bonus: i64,
    #[serde(default)]
    pub official: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedPolicyConfig {
    /// Entries older than this are dropped even when newly observed.
    pub cutoff_hours: i64,
    /// Offset used to compute "local midnight" for must-include feeds.
    pub local_utc_offset_hours: i32,
}

impl Default for FeedPolicyConfig {
    fn default() -> Self {
        Self {
            cutoff_hours: 24,
            local_utc_offset_hours: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub target_language: String,
    /// Shorter texts are indeterminate for the language gate.
    pub min_detect_chars: usize,
    pub min_confidence: f64,
    /// Host suffixes (e.g. `.jp`, `example.co.jp`) treated as excluded origin.
    pub excluded_origin_domains: Vec<String>,
    /// Path fragments (e.g. `/ja/`) treated as excluded origin.
    pub excluded_origin_paths: Vec<String>,
    pub require_multiple_groups: bool,
    pub min_practical_groups: usize,
    pub keywords: KeywordConfig,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            target_language: "english".to_string(),
            min_detect_chars: 30,
            min_confidence: 0.65,
            excluded_origin_domains: vec![".jp".to_string()],
            excluded_origin_paths: vec!["/ja/".to_string(), "/ja-jp/".to_string()],
            require_multiple_groups: false,
            min_practical_groups: 2,
            keywords: KeywordConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CategoryBonuses {
    pub practical_official: i64,
    pub practical: i64,
    pub technical: i64,
    pub general: i64,
    pub marketing: i64,
    pub unknown: i64,
    pub excluded: i64,
    pub personal_usage: i64,
    pub low_credibility: i64,
    pub non_english: i64,
    pub excluded_origin: i64,
}

impl Default for CategoryBonuses {
    fn default() -> Self {
        Self {
            practical_official: 700,
            practical: 300,
            technical: 400,
            general: 0,
            marketing: -300,
            unknown: 0,
            excluded: -1_000,
            personal_usage: -800,
            low_credibility: -800,
            non_english: -1_000,
            excluded_origin: -1_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub feed_base_score: i64,
    pub page_base_score: i64,
    pub bonuses: CategoryBonuses,
    /// Keyed by source kind (`stream_account`, `feed`, ...); missing kinds use 1.0.
    pub source_multipliers: HashMap<String, f64>,
    /// Stream accounts treated as official sources.
    pub official_accounts: Vec<String>,
    /// Alternative handle spellings mapped to a canonical official handle.
    pub account_aliases: HashMap<String, String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            feed_base_score: 500,
            page_base_score: 500,
            bonuses: CategoryBonuses::default(),
            source_multipliers: HashMap::new(),
            official_accounts: Vec::new(),
            account_aliases: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Drafts created within this window block the same URL.
    pub lookback_days: i64,
    pub posted_ttl_hours: i64,
    pub thread_ttl_days: i64,
    /// Most-recent N article URLs kept per feed.
    pub seen_url_cap: usize,
    /// Hostnames folded onto one canonical hostname before comparison.
    pub host_aliases: HashMap<String, String>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        let host_aliases = [
            ("twitter.com", "x.com"),
            ("mobile.twitter.com", "x.com"),
            ("mobile.x.com", "x.com"),
        ]
        .into_iter()
        .map(|(a, c)| (a.to_string(), c.to_string()))
        .collect();
        Self {
            lookback_days: 3,
            posted_ttl_hours: 24,
            thread_ttl_days: 7,
            seen_url_cap: 500,
            host_aliases,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub max_items: usize,
    pub quota_mode: bool,
    pub feed_quota: usize,
    pub stream_quota: usize,
    /// Fill the feed quota round-robin across feeds instead of by score.
    pub feed_diversity: bool,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            max_items: 3,
            quota_mode: true,
            feed_quota: 2,
            stream_quota: 1,
            feed_diversity: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ComposeConfig {
    /// Lint scores above this trigger a redraft; equal passes.
    pub lint_threshold: u32,
    pub max_lint_retries: u32,
    /// How many top lint detections are fed back as corrections.
    pub correction_count: usize,
    pub min_length: usize,
    pub article_max_chars: usize,
    /// Extra lint rules (TOML) merged with the built-in set.
    pub lint_rules_path: Option<PathBuf>,
    pub system_prompt: Option<String>,
    pub meta_patterns: Vec<String>,
    pub legal_patterns: Vec<String>,
    pub political_patterns: Vec<String>,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            lint_threshold: 10,
            max_lint_retries: 1,
            correction_count: 3,
            min_length: 50,
            article_max_chars: 4_000,
            lint_rules_path: None,
            system_prompt: None,
            meta_patterns: keywords::default_meta_patterns(),
            legal_patterns: keywords::default_legal_patterns(),
            political_patterns: keywords::default_political_patterns(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Fixed pause between outbound messages (channel rate limit).
    pub inter_message_delay_ms: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            inter_message_delay_ms: 1_500,
        }
    }
}

impl AppConfig {
    /// Clamp values that would make the pipeline misbehave.
    fn sanitize(mut self) -> Self {
        if !(0.0..=1.0).contains(&self.classifier.min_confidence) {
            self.classifier.min_confidence = ClassifierConfig::default().min_confidence;
        }
        self.classifier.min_practical_groups = self.classifier.min_practical_groups.max(1);
        self.dedup.seen_url_cap = self.dedup.seen_url_cap.max(1);
        self.stream.max_results_per_source = self.stream.max_results_per_source.clamp(5, 100);
        self
    }

    /// Feed URLs ordered by priority (highest bonus first, config order on ties).
    pub fn feed_priority_order(&self) -> Vec<String> {
        let mut feeds: Vec<&FeedConfig> = self.feeds.iter().collect();
        feeds.sort_by(|a, b| b.priority_bonus.cmp(&a.priority_bonus));
        feeds.into_iter().map(|f| f.url.clone()).collect()
    }
}

/// Load configuration from an explicit path. Supports TOML or JSON formats.
pub fn load_from(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let cfg = match ext.as_str() {
        "json" => serde_json::from_str::<AppConfig>(&content)
            .with_context(|| format!("parsing {}", path.display()))?,
        _ => parse_toml(&content).with_context(|| format!("parsing {}", path.display()))?,
    };
    Ok(cfg.sanitize())
}

pub fn parse_toml(s: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(s)?;
    Ok(cfg.sanitize())
}

/// Load configuration using env var + fallbacks:
/// 1) $CURATOR_CONFIG_PATH
/// 2) config/curator.toml
/// 3) config/curator.json
/// 4) built-in defaults
pub fn load_default() -> Result<AppConfig> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        }
        return Err(anyhow!("{ENV_PATH} points to non-existent path"));
    }
    for candidate in [DEFAULT_TOML, DEFAULT_JSON] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return load_from(&p);
        }
    }
    tracing::warn!("no config file found, running with built-in defaults");
    Ok(AppConfig::default().sanitize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn toml_sections_override_defaults() {
        let toml = r#"
[stream]
accounts = ["acme"]
thread_authors = ["acme"]
reach_filter = { enabled = true, min = 500 }

[[feeds]]
url = "https://acme.example/feed.xml"
name = "Acme"
priority_bonus = 1000
official = true

[[feeds]]
url = "https://blog.example/rss"
name = "Blog"

[selection]
max_items = 5
"#;
        let cfg = parse_toml(toml).unwrap();
        assert_eq!(cfg.stream.accounts, vec!["acme".to_string()]);
        assert!(cfg.stream.reach_filter.enabled);
        assert_eq!(cfg.stream.reach_filter.min, 500);
        assert!(!cfg.stream.engagement_filter.enabled);
        assert_eq!(cfg.feeds.len(), 2);
        assert_eq!(cfg.feeds[1].priority_bonus, 0);
        assert_eq!(cfg.selection.max_items, 5);
        // untouched sections keep their defaults
        assert_eq!(cfg.scoring.feed_base_score, 500);
        assert_eq!(cfg.dedup.lookback_days, 3);
        assert_eq!(cfg.compose.max_lint_retries, 1);
    }

    #[test]
    fn feed_priority_order_is_bonus_desc_and_stable() {
        let cfg = parse_toml(
            r#"
[[feeds]]
url = "a"
name = "A"
priority_bonus = 600
[[feeds]]
url = "b"
name = "B"
priority_bonus = 1000
[[feeds]]
url = "c"
name = "C"
priority_bonus = 600
"#,
        )
        .unwrap();
        assert_eq!(cfg.feed_priority_order(), vec!["b", "a", "c"]);
    }

    #[test]
    fn out_of_range_values_are_sanitized() {
        let cfg = parse_toml(
            r#"
[classifier]
min_confidence = 4.0
min_practical_groups = 0
"#,
        )
        .unwrap();
        assert!((cfg.classifier.min_confidence - 0.65).abs() < 1e-9);
        assert_eq!(cfg.classifier.min_practical_groups, 1);
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_PATH);

        // No files in the temp CWD → defaults
        let cfg = load_default().unwrap();
        assert!(cfg.feeds.is_empty());

        // Fallback TOML in ./config/
        fs::create_dir_all(tmp.path().join("config")).unwrap();
        fs::write(
            tmp.path().join("config/curator.toml"),
            "[selection]\nmax_items = 7\n",
        )
        .unwrap();
        assert_eq!(load_default().unwrap().selection.max_items, 7);

        // Env wins
        let p_json = tmp.path().join("other.json");
        fs::write(&p_json, r#"{"selection": {"max_items": 9}}"#).unwrap();
        env::set_var(ENV_PATH, p_json.display().to_string());
        assert_eq!(load_default().unwrap().selection.max_items, 9);

        env::set_var(ENV_PATH, tmp.path().join("missing.toml"));
        assert!(load_default().is_err());
        env::remove_var(ENV_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
