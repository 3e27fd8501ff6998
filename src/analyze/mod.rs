//! Candidate analysis: classification gates, keyword matching, rank scoring and
//! the generative backend used by the compose loop.

pub mod ai_adapter;
pub mod classifier;
pub mod keywords;
pub mod scoring;

pub use classifier::{Classification, Classifier};
pub use scoring::{Scorer, MUST_INCLUDE_SCORE};
