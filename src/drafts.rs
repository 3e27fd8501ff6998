//! Draft store: one JSON document of generated drafts.
//!
//! Drafts are appended when a candidate clears every compose gate and move
//! from `pending` to `posted` exactly once.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ingest::types::CandidateItem;
use crate::persist;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftStatus {
    Pending,
    Posted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Candidate snapshot the draft was written from.
    pub item: CandidateItem,
    pub generated_text: String,
    pub status: DraftStatus,
    #[serde(default)]
    pub posted_at: Option<DateTime<Utc>>,
}

impl DraftRecord {
    pub fn new(item: CandidateItem, generated_text: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            item,
            generated_text,
            status: DraftStatus::Pending,
            posted_at: None,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("draft {0} not found")]
    NotFound(String),
    #[error("draft {0} already posted")]
    AlreadyPosted(Uuid),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DraftDocument {
    #[serde(default)]
    drafts: Vec<DraftRecord>,
}

#[derive(Debug)]
pub struct DraftStore {
    path: Option<PathBuf>,
    doc: DraftDocument,
}

impl DraftStore {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let doc = persist::read_json::<DraftDocument>(&path)?.unwrap_or_default();
        tracing::debug!(path = %path.display(), drafts = doc.drafts.len(), "draft store loaded");
        Ok(Self { path: Some(path), doc })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            doc: DraftDocument::default(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn all(&self) -> &[DraftRecord] {
        &self.doc.drafts
    }

    pub fn append(&mut self, record: DraftRecord) -> Uuid {
        let id = record.id;
        self.doc.drafts.push(record);
        id
    }

    pub fn save(&self) -> Result<()> {
        if let Some(path) = &self.path {
            persist::write_json_atomic(path, &self.doc)?;
        }
        Ok(())
    }

    pub fn pending(&self) -> impl Iterator<Item = &DraftRecord> {
        self.doc.drafts.iter().filter(|d| d.status == DraftStatus::Pending)
    }

    pub fn get(&self, id: &str) -> Option<&DraftRecord> {
        let id = Uuid::parse_str(id.trim()).ok()?;
        self.doc.drafts.iter().find(|d| d.id == id)
    }

    /// Canonical URLs of drafts created at or after `cutoff`, any status.
    pub fn urls_created_since(&self, cutoff: DateTime<Utc>) -> HashSet<String> {
        self.doc
            .drafts
            .iter()
            .filter(|d| d.created_at >= cutoff)
            .map(|d| d.item.canonical_url.clone())
            .collect()
    }

    pub fn mark_posted(&mut self, id: &str, now: DateTime<Utc>) -> Result<(), DraftError> {
        let parsed = Uuid::parse_str(id.trim()).map_err(|_| DraftError::NotFound(id.to_string()))?;
        let draft = self
            .doc
            .drafts
            .iter_mut()
            .find(|d| d.id == parsed)
            .ok_or_else(|| DraftError::NotFound(id.to_string()))?;
        if draft.status == DraftStatus::Posted {
            return Err(DraftError::AlreadyPosted(parsed));
        }
        draft.status = DraftStatus::Posted;
        draft.posted_at = Some(now);
        Ok(())
    }
}
