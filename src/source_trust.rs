//! # Source Trust
//!
//! Maps sources to the two trust signals the scorer needs:
//!
//! - a per-kind multiplier (`stream_account`, `feed`, ...), defaulting to 1.0;
//! - whether a stream account is *official* (a trusted publisher).
//!
//! Handles are normalized (leading `@` stripped, lowercased, separators collapsed)
//! and aliases map alternative spellings to a canonical official handle.
//! Lookup order for officialness: alias → exact match → not official.

use std::collections::{HashMap, HashSet};

use crate::config::ScoringConfig;
use crate::ingest::types::SourceKind;

#[derive(Debug, Clone, Default)]
pub struct SourceTrust {
    multipliers: HashMap<String, f64>,
    official: HashSet<String>,
    aliases: HashMap<String, String>,
}

impl SourceTrust {
    pub fn from_config(cfg: &ScoringConfig) -> Self {
        let multipliers = cfg
            .source_multipliers
            .iter()
            .map(|(k, v)| (k.trim().to_ascii_lowercase(), sanitize_multiplier(*v)))
            .collect();
        let official = cfg.official_accounts.iter().map(|h| normalize(h)).collect();
        let aliases = cfg
            .account_aliases
            .iter()
            .map(|(a, c)| (normalize(a), normalize(c)))
            .collect();
        Self {
            multipliers,
            official,
            aliases,
        }
    }

    /// Multiplier for a source kind. Missing kinds use 1.0.
    pub fn multiplier(&self, kind: SourceKind) -> f64 {
        self.multipliers.get(kind.as_str()).copied().unwrap_or(1.0)
    }

    /// Canonical form of a handle after alias resolution.
    pub fn canonical_handle(&self, handle: &str) -> String {
        let h = normalize(handle);
        self.aliases.get(&h).cloned().unwrap_or(h)
    }

    pub fn is_official_account(&self, handle: &str) -> bool {
        self.official.contains(&self.canonical_handle(handle))
    }
}

/// Normalize a handle: trim, drop leading `@`, lowercase, dashes/dots to `_`.
pub fn normalize(s: &str) -> String {
    let out = s.trim().trim_start_matches('@').to_ascii_lowercase();
    out.replace(['-', '.', ' '], "_")
}

fn sanitize_multiplier(x: f64) -> f64 {
    if x.is_finite() && x >= 0.0 {
        x
    } else {
        tracing::warn!(value = x, "invalid source multiplier, using 1.0");
        1.0
    }
}
