//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::{Date, OffsetDateTime};

use crate::domain::types::PostStatus;

/// One blog post, keyed by its file path in the content repository.
///
/// The path is the stable identity of a post: the slug and title may change
/// over its lifetime, the path only changes when the file itself is renamed
/// (which the sync pipeline treats as a delete plus an insert).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    pub path: String,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub created_at: Date,
    pub tags: Vec<String>,
    pub status: PostStatus,
    pub content: String,
    /// `None` while the file has only ever been created, never modified.
    pub last_modified_at: Option<OffsetDateTime>,
}
