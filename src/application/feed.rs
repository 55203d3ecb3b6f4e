//! Read-path queries over the post store.
//!
//! The store may lag behind the content repository inside a push event's
//! propagation window, and slugs can be renamed outright, so a slug miss is
//! not immediately a 404: [`FeedService::get_post`] falls back to fetching
//! the same path from the content repository and reports where the post
//! lives now.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use time::{Date, OffsetDateTime};
use tracing::debug;

use crate::application::repos::{PostListOptions, PostsRepo, RepoError};
use crate::cache::PostCache;
use crate::domain::entities::PostRecord;
use crate::domain::types::PostStatus;
use crate::infra::github::{ContentRepo, POSTS_DIR, UpstreamError};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("content repository lookup failed: {0}")]
    Upstream(#[from] UpstreamError),
}

/// A post without its body, for listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostSummary {
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub created_at: Date,
    pub tags: Vec<String>,
    pub last_modified_at: Option<OffsetDateTime>,
}

impl From<PostRecord> for PostSummary {
    fn from(record: PostRecord) -> Self {
        Self {
            slug: record.slug,
            title: record.title,
            description: record.description,
            created_at: record.created_at,
            tags: record.tags,
            last_modified_at: record.last_modified_at,
        }
    }
}

/// Outcome of a slug lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum PostLookup {
    Found(PostRecord),
    /// The post still exists under the same path but its front matter now
    /// declares a different slug; callers issue a permanent redirect.
    Moved { slug: String },
    NotFound,
}

pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    content: Arc<dyn ContentRepo>,
    cache: Arc<PostCache>,
    resolve_unlisted: bool,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        content: Arc<dyn ContentRepo>,
        cache: Arc<PostCache>,
        resolve_unlisted: bool,
    ) -> Self {
        Self {
            posts,
            content,
            cache,
            resolve_unlisted,
        }
    }

    pub async fn list_published(
        &self,
        options: &PostListOptions,
    ) -> Result<Vec<PostSummary>, FeedError> {
        let records = self.posts.list_published(options).await?;
        Ok(records.into_iter().map(PostSummary::from).collect())
    }

    pub async fn list_tags(&self) -> Result<Vec<String>, FeedError> {
        Ok(self.posts.list_distinct_tags().await?)
    }

    /// Look a post up by slug, falling back to the content repository when
    /// the store misses.
    ///
    /// The fallback treats the requested slug as a file name under the posts
    /// directory and asks the source of truth what that file's current slug
    /// is. An upstream 404 means the post genuinely does not exist.
    pub async fn get_post(&self, slug: &str) -> Result<PostLookup, FeedError> {
        if let Some(record) = self.cache.get(slug) {
            return Ok(PostLookup::Found(record));
        }

        if let Some(record) = self.posts.find_by_slug(slug).await? {
            self.cache.insert(record.clone());
            return Ok(PostLookup::Found(record));
        }

        let path = format!("{POSTS_DIR}/{slug}");
        match self.content.get_post_by_path(&path).await {
            Ok(post) => {
                if post.status == PostStatus::Unlisted && !self.resolve_unlisted {
                    debug!(slug, "fallback hit an unlisted post; not revealing");
                    return Ok(PostLookup::NotFound);
                }
                debug!(slug, resolved = %post.slug, "resolved stale slug upstream");
                Ok(PostLookup::Moved { slug: post.slug })
            }
            Err(err) if err.is_not_found() => Ok(PostLookup::NotFound),
            Err(err) => Err(FeedError::Upstream(err)),
        }
    }
}
