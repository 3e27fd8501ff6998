//! Draft composition: a bounded generate → lint → validate → review loop.
//!
//! ```text
//! Drafting → Linting ─┬─ score ≤ threshold ──────────────┐
//!                     ├─ retry left → Drafting (+fixes)   │
//!                     └─ budget spent → accept w/ warning ┤
//!                                                         ▼
//!                     Validating ─ reject (terminal) ─ or ─ Reviewing ─ accept / reject
//! ```
//!
//! Generation failures surface as `Err`; every other outcome is data.

pub mod article;
pub mod lint;
pub mod prompt;
pub mod review;
pub mod validate;

use std::sync::Arc;

use metrics::{counter, histogram};
use serde::Serialize;

use crate::analyze::ai_adapter::{DynBackend, GenerationError};
use crate::config::ComposeConfig;
use crate::ingest::types::{CandidateItem, ItemDetail};
use article::{article_link, truncate_chars, Article, ArticleFetcher};
use lint::{LintChecker, LintResult};
use prompt::{user_prompt, with_corrections, PromptInput, DEFAULT_SYSTEM_PROMPT};
use review::ReviewGate;
use validate::{ContentValidator, ValidationResult};

/// Stream posts up to this many chars get their linked article fetched.
pub const SHORT_POST_CHARS: usize = 280;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComposeStage {
    Drafting,
    Linting,
    Validating,
    Reviewing,
    Accepted,
    Rejected,
}

impl ComposeStage {
    pub fn as_str(self) -> &'static str {
        match self {
            ComposeStage::Drafting => "drafting",
            ComposeStage::Linting => "linting",
            ComposeStage::Validating => "validating",
            ComposeStage::Reviewing => "reviewing",
            ComposeStage::Accepted => "accepted",
            ComposeStage::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ComposeOutcome {
    Accepted {
        text: String,
        lint: LintResult,
        /// Drafting calls made (1 + lint retries).
        attempts: u32,
        trace: Vec<ComposeStage>,
    },
    Rejected {
        /// Gate that rejected: `Validating` or `Reviewing`.
        stage: ComposeStage,
        result: ValidationResult,
        text: String,
        trace: Vec<ComposeStage>,
    },
}

impl ComposeOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ComposeOutcome::Accepted { .. })
    }

    pub fn trace(&self) -> &[ComposeStage] {
        match self {
            ComposeOutcome::Accepted { trace, .. } | ComposeOutcome::Rejected { trace, .. } => trace,
        }
    }
}

pub struct Composer {
    cfg: ComposeConfig,
    system_prompt: String,
    backend: DynBackend,
    lint: LintChecker,
    validator: ContentValidator,
    review: ReviewGate,
    articles: Option<Arc<dyn ArticleFetcher>>,
}

impl Composer {
    pub fn new(cfg: &ComposeConfig, backend: DynBackend, lint: LintChecker, review: ReviewGate) -> Self {
        Self {
            system_prompt: cfg
                .system_prompt
                .clone()
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            validator: ContentValidator::from_config(cfg),
            cfg: cfg.clone(),
            backend,
            lint,
            review,
            articles: None,
        }
    }

    pub fn with_article_fetcher(mut self, fetcher: Arc<dyn ArticleFetcher>) -> Self {
        self.articles = Some(fetcher);
        self
    }

    /// Best-effort article body for short posts carrying an outside link.
    async fn linked_article(&self, item: &CandidateItem) -> Option<Article> {
        let fetcher = self.articles.as_ref()?;
        let ItemDetail::Stream {
            text, thread, links, ..
        } = &item.detail
        else {
            return None;
        };
        if !thread.is_empty() || text.chars().count() > SHORT_POST_CHARS {
            return None;
        }
        let link = article_link(links, text)?;
        match fetcher.fetch_article(&link).await {
            Ok(mut a) => {
                a.text = truncate_chars(&a.text, self.cfg.article_max_chars);
                tracing::debug!(url = %link, chars = a.text.chars().count(), "linked article fetched");
                Some(a)
            }
            Err(e) => {
                tracing::warn!(url = %link, error = %e, "linked article fetch failed, drafting without it");
                None
            }
        }
    }

    pub async fn compose(&self, item: &CandidateItem) -> Result<ComposeOutcome, GenerationError> {
        let article = self.linked_article(item).await;
        let base_prompt = user_prompt(&PromptInput {
            item,
            article: article.as_ref(),
        });

        let mut trace = Vec::new();
        let mut prompt = base_prompt.clone();
        let mut retries = 0u32;
        let (text, lint) = loop {
            trace.push(ComposeStage::Drafting);
            let text = self.backend.generate(&self.system_prompt, &prompt).await?;

            trace.push(ComposeStage::Linting);
            let lint = self.lint.check(&text);
            histogram!("curator_lint_score").record(f64::from(lint.score));
            if lint.score <= self.cfg.lint_threshold {
                break (text, lint);
            }
            if retries >= self.cfg.max_lint_retries {
                tracing::warn!(
                    url = %item.canonical_url,
                    score = lint.score,
                    threshold = self.cfg.lint_threshold,
                    "lint retries exhausted, accepting draft"
                );
                break (text, lint);
            }
            retries += 1;
            tracing::info!(
                url = %item.canonical_url,
                score = lint.score,
                retry = retries,
                "lint score over threshold, redrafting"
            );
            prompt = with_corrections(&base_prompt, &lint.detections, self.cfg.correction_count);
        };

        trace.push(ComposeStage::Validating);
        let verdict = self.validator.validate(&text, &item.title);
        if !verdict.is_valid {
            return Ok(self.rejected(item, ComposeStage::Validating, verdict, text, trace));
        }

        trace.push(ComposeStage::Reviewing);
        let verdict = self.review.review(&text, &item.title, &item.canonical_url).await;
        if !verdict.is_valid {
            return Ok(self.rejected(item, ComposeStage::Reviewing, verdict, text, trace));
        }

        trace.push(ComposeStage::Accepted);
        Ok(ComposeOutcome::Accepted {
            text,
            lint,
            attempts: retries + 1,
            trace,
        })
    }

    fn rejected(
        &self,
        item: &CandidateItem,
        stage: ComposeStage,
        result: ValidationResult,
        text: String,
        mut trace: Vec<ComposeStage>,
    ) -> ComposeOutcome {
        tracing::info!(
            url = %item.canonical_url,
            stage = stage.as_str(),
            issues = ?result.detected_issues,
            reason = result.rejection_reason.as_deref().unwrap_or(""),
            "draft rejected"
        );
        counter!("curator_compose_rejected_total", "stage" => stage.as_str()).increment(1);
        trace.push(ComposeStage::Rejected);
        ComposeOutcome::Rejected {
            stage,
            result,
            text,
            trace,
        }
    }
}
