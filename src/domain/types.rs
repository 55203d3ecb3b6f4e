//! Shared domain enumerations aligned with persisted column values.

use serde::{Deserialize, Serialize};

/// Visibility of a post. `Unlisted` posts stay reachable by slug (preview
/// links) but never appear in listings, tag pages, feeds, or the sitemap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PostStatus {
    Published,
    Unlisted,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Published => "published",
            PostStatus::Unlisted => "unlisted",
        }
    }
}
