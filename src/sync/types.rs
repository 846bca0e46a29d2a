// src/sync/types.rs
use std::fmt;
use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};

/// One Reader item as returned by the remote source. `id` is opaque and
/// globally unique; `updated_at` only moves forward across edits.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Item {
    pub id: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub html_content: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn updated_epoch(&self) -> i64 {
        self.updated_at.timestamp()
    }

    /// Body used for materialization: `html_content` when non-blank, else
    /// `content`. `None` means nothing to materialize (a skip, not an error).
    pub fn body(&self) -> Option<&str> {
        for candidate in [self.html_content.as_deref(), self.content.as_deref()] {
            if let Some(s) = candidate {
                if !s.trim().is_empty() {
                    return Some(s);
                }
            }
        }
        None
    }
}

/// Fixed category set queried on the source. Iteration order of `ALL` is the
/// cross-category processing order and is part of the pipeline's observable
/// behavior (tie-break for equal timestamps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Pdf,
    Article,
    Email,
    Rss,
    Twitter,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Pdf,
        Category::Article,
        Category::Email,
        Category::Rss,
        Category::Twitter,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Pdf => "pdf",
            Category::Article => "article",
            Category::Email => "email",
            Category::Rss => "rss",
            Category::Twitter => "twitter",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Some(Category::Pdf),
            "article" => Some(Category::Article),
            "email" => Some(Category::Email),
            "rss" => Some(Category::Rss),
            "twitter" => Some(Category::Twitter),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger membership answer. `Unknown` means the check itself failed; the
/// orchestrator treats it as `Absent` but the distinction stays visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerStatus {
    Present,
    Absent,
    Unknown,
}

/// A materialized artifact: its local path and the name it is delivered
/// under. The remote name embeds the item id, so distinct items never collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    pub local_path: PathBuf,
    pub remote_name: String,
}

#[async_trait::async_trait]
pub trait ItemSource: Send + Sync {
    /// Fetch items of one category updated after the given instant. The
    /// source's own ordering is not trusted; the orchestrator re-sorts.
    async fn fetch(&self, category: Category, updated_after: DateTime<Utc>) -> Result<Vec<Item>>;
}

#[async_trait::async_trait]
pub trait ProcessedLedger: Send + Sync {
    async fn contains(&self, id: &str) -> LedgerStatus;
    async fn insert(&self, id: &str) -> Result<()>;
}

#[async_trait::async_trait]
pub trait WatermarkStore: Send + Sync {
    async fn get(&self) -> Result<Option<i64>>;
    async fn set(&self, epoch_seconds: i64) -> Result<()>;
}

#[async_trait::async_trait]
pub trait Materializer: Send + Sync {
    /// `Ok(None)` means the item has no usable body and is skipped.
    async fn materialize(&self, item: &Item, category: Category)
        -> Result<Option<ArtifactHandle>>;
}

#[async_trait::async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn deliver(&self, artifact: &ArtifactHandle) -> Result<()>;
}
