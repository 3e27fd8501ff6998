//! Rank scoring.
//!
//! `final = (raw + category_bonus) * source_multiplier`, truncated toward zero.
//!
//! - stream items: `raw` is a weighted sum of like/share/reply counts;
//! - feed and page items: `raw` is a fixed base plus the per-feed priority bonus;
//! - must-include items are pinned to [`MUST_INCLUDE_SCORE`] and never rescored.

use crate::config::{CategoryBonuses, EngagementWeights};
use crate::ingest::types::{CandidateItem, Category};
use crate::source_trust::SourceTrust;

/// Reserved maximal score that guarantees a must-include entry survives ranking.
pub const MUST_INCLUDE_SCORE: i64 = 1_000_000_000;

/// Weighted engagement sum for one post (or the total of a thread).
pub fn engagement_score(w: &EngagementWeights, likes: u64, shares: u64, replies: u64) -> i64 {
    let c = |n: u64| i64::try_from(n).unwrap_or(i64::MAX);
    c(likes)
        .saturating_mul(w.like)
        .saturating_add(c(shares).saturating_mul(w.share))
        .saturating_add(c(replies).saturating_mul(w.reply))
}

/// Raw score of a feed or page entry.
pub fn feed_raw_score(base: i64, priority_bonus: i64) -> i64 {
    base.saturating_add(priority_bonus)
}

pub fn category_bonus(b: &CategoryBonuses, category: Category, is_official: bool) -> i64 {
    match category {
        Category::Practical if is_official => b.practical_official,
        Category::Practical => b.practical,
        Category::Technical => b.technical,
        Category::General => b.general,
        Category::Marketing => b.marketing,
        Category::Unknown => b.unknown,
        Category::Excluded => b.excluded,
        Category::PersonalUsage => b.personal_usage,
        Category::LowCredibility => b.low_credibility,
        Category::NonEnglish => b.non_english,
        Category::ExcludedOrigin => b.excluded_origin,
    }
}

#[derive(Debug, Clone)]
pub struct Scorer {
    bonuses: CategoryBonuses,
    trust: SourceTrust,
}

impl Scorer {
    pub fn new(bonuses: CategoryBonuses, trust: SourceTrust) -> Self {
        Self { bonuses, trust }
    }

    pub fn final_score(&self, item: &CandidateItem) -> i64 {
        if item.is_must_include() {
            return MUST_INCLUDE_SCORE;
        }
        let bonus = category_bonus(&self.bonuses, item.category, item.is_official());
        let mult = self.trust.multiplier(item.source);
        let v = (item.raw_score.saturating_add(bonus)) as f64 * mult;
        v.trunc() as i64
    }

    /// Score every item in place.
    pub fn score_all(&self, items: &mut [CandidateItem]) {
        for item in items.iter_mut() {
            item.score = self.final_score(item);
            tracing::debug!(
                url = %item.canonical_url,
                category = item.category.as_str(),
                raw = item.raw_score,
                score = item.score,
                "scored"
            );
        }
    }
}
