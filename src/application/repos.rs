//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::PostRecord;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }
}

/// Filters for published-post listings.
#[derive(Debug, Clone, Default)]
pub struct PostListOptions {
    /// Truncate to the N most recent posts.
    pub limit: Option<u32>,
    /// Keep only posts whose tag set contains this value.
    pub tag: Option<String>,
}

impl PostListOptions {
    pub fn limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn tag(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError>;

    /// Published posts ordered by creation date, newest first.
    async fn list_published(&self, options: &PostListOptions)
    -> Result<Vec<PostRecord>, RepoError>;

    /// Sorted, duplicate-free union of tags across published posts.
    async fn list_distinct_tags(&self) -> Result<Vec<String>, RepoError>;

    /// Cheap liveness probe for health checks.
    async fn ping(&self) -> Result<(), RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    /// Replace any existing rows sharing a record's path, then insert the
    /// batch, inside one transaction. A changed slug for a stable path is
    /// reflected; the store never holds two rows with the same path.
    async fn upsert_posts(&self, records: &[PostRecord]) -> Result<(), RepoError>;

    /// Remove rows matching the given paths. Unknown paths are a no-op.
    async fn delete_by_paths(&self, paths: &[String]) -> Result<(), RepoError>;

    /// Swap the entire table contents for the given set, transactionally.
    async fn replace_all(&self, records: &[PostRecord]) -> Result<(), RepoError>;
}
