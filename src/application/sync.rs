//! Reconciles the post store with the content repository.
//!
//! Two entry points: a full resync that rebuilds the table from a complete
//! listing, and an incremental sync driven by push events. Both treat the
//! content repository as the source of truth and the store as a cache.
//!
//! Overlapping deliveries racing against the same paths are a known gap:
//! the store transaction is the only serialization point, and this service
//! deliberately adds no cross-invocation locking.

use std::sync::Arc;

use futures::future::try_join_all;
use metrics::counter;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument};

use crate::application::repos::{PostsWriteRepo, RepoError};
use crate::cache::PostCache;
use crate::infra::github::{ContentRepo, UpstreamError};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// A push notification from the content repository, as delivered over the
/// webhook. Transient: reduced to a [`ChangeSet`] and discarded.
#[derive(Debug, Clone, Deserialize)]
pub struct PushEvent {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub commits: Vec<CommitChanges>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitChanges {
    pub id: String,
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub removed: Vec<String>,
    #[serde(default)]
    pub modified: Vec<String>,
}

/// The net effect of one push event on the store.
///
/// Produced by an ordered reduce over the event's commits, so the outcome is
/// deterministic and independent of how the sets are later applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub to_upsert: Vec<String>,
    pub to_remove: Vec<String>,
}

impl ChangeSet {
    /// Flatten per-commit change lists, in event order, into the paths to
    /// upsert and the paths to remove. Later commits win for a given path:
    /// a removal cancels a pending upsert (the file existed transiently
    /// within the push but is gone at HEAD), and a later re-add cancels a
    /// pending removal.
    pub fn from_commits(commits: &[CommitChanges]) -> Self {
        let mut set = ChangeSet::default();
        for commit in commits {
            for path in commit.added.iter().chain(&commit.modified) {
                set.mark_upsert(path);
            }
            for path in &commit.removed {
                set.mark_remove(path);
            }
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.to_upsert.is_empty() && self.to_remove.is_empty()
    }

    fn mark_upsert(&mut self, path: &str) {
        self.to_remove.retain(|existing| existing != path);
        if !self.to_upsert.iter().any(|existing| existing == path) {
            self.to_upsert.push(path.to_string());
        }
    }

    fn mark_remove(&mut self, path: &str) {
        self.to_upsert.retain(|existing| existing != path);
        if !self.to_remove.iter().any(|existing| existing == path) {
            self.to_remove.push(path.to_string());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    pub upserted: usize,
    pub removed: usize,
}

pub struct SyncService {
    content: Arc<dyn ContentRepo>,
    posts: Arc<dyn PostsWriteRepo>,
    cache: Arc<PostCache>,
}

impl SyncService {
    pub fn new(
        content: Arc<dyn ContentRepo>,
        posts: Arc<dyn PostsWriteRepo>,
        cache: Arc<PostCache>,
    ) -> Self {
        Self {
            content,
            posts,
            cache,
        }
    }

    /// Rebuild the store from a complete listing of the content repository.
    /// Used for cold-start and backfill, never triggered by user traffic.
    #[instrument(skip_all)]
    pub async fn full_resync(&self) -> Result<usize, SyncError> {
        let files = self.content.list_post_files().await?;
        let records = try_join_all(
            files
                .iter()
                .map(|path| self.content.get_post_by_path(path)),
        )
        .await?;

        self.posts.replace_all(&records).await?;
        self.cache.clear();

        counter!("folio_sync_full_resync_total").increment(1);
        info!(posts = records.len(), "full resync applied");
        Ok(records.len())
    }

    /// Apply one verified push event.
    ///
    /// Deletes are applied before fetching, unconditionally, so a path that
    /// appears on both sides of the reduce cannot race and a renamed file
    /// never exists under two paths at once. Any single fetch failure aborts
    /// the whole call before the upsert batch; the webhook handler turns
    /// that into a 5xx so the event gets redelivered.
    #[instrument(skip_all, fields(git_ref = %event.git_ref, commits = event.commits.len()))]
    pub async fn apply_push(&self, event: &PushEvent) -> Result<SyncOutcome, SyncError> {
        let changes = ChangeSet::from_commits(&event.commits);
        if changes.is_empty() {
            return Ok(SyncOutcome {
                upserted: 0,
                removed: 0,
            });
        }

        if !changes.to_remove.is_empty() {
            self.posts.delete_by_paths(&changes.to_remove).await?;
        }

        // Independent reads; fetch the changed files concurrently.
        let records = try_join_all(
            changes
                .to_upsert
                .iter()
                .map(|path| self.content.get_post_by_path(path)),
        )
        .await?;

        if !records.is_empty() {
            self.posts.upsert_posts(&records).await?;
        }

        self.cache.clear();

        let outcome = SyncOutcome {
            upserted: records.len(),
            removed: changes.to_remove.len(),
        };
        counter!("folio_sync_upsert_total").increment(outcome.upserted as u64);
        counter!("folio_sync_delete_total").increment(outcome.removed as u64);
        info!(
            upserted = outcome.upserted,
            removed = outcome.removed,
            "push event applied"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(id: &str, added: &[&str], removed: &[&str], modified: &[&str]) -> CommitChanges {
        let owned = |paths: &[&str]| paths.iter().map(|p| p.to_string()).collect();
        CommitChanges {
            id: id.to_string(),
            added: owned(added),
            removed: owned(removed),
            modified: owned(modified),
        }
    }

    #[test]
    fn removal_after_add_wins() {
        let commits = [
            commit("a", &["posts/a.md"], &[], &[]),
            commit("b", &[], &["posts/a.md"], &[]),
        ];
        let set = ChangeSet::from_commits(&commits);
        assert!(set.to_upsert.is_empty());
        assert_eq!(set.to_remove, vec!["posts/a.md"]);
    }

    #[test]
    fn re_add_after_removal_wins() {
        let commits = [
            commit("a", &[], &["posts/a.md"], &[]),
            commit("b", &["posts/a.md"], &[], &[]),
        ];
        let set = ChangeSet::from_commits(&commits);
        assert_eq!(set.to_upsert, vec!["posts/a.md"]);
        assert!(set.to_remove.is_empty());
    }

    #[test]
    fn repeated_changes_deduplicate_and_keep_first_seen_order() {
        let commits = [
            commit("a", &["posts/a.md"], &[], &["posts/b.md"]),
            commit("b", &[], &[], &["posts/a.md", "posts/c.md"]),
        ];
        let set = ChangeSet::from_commits(&commits);
        assert_eq!(set.to_upsert, vec!["posts/a.md", "posts/b.md", "posts/c.md"]);
        assert!(set.to_remove.is_empty());
    }

    #[test]
    fn mixed_event_partitions_paths() {
        let commits = [commit(
            "a",
            &["posts/new.md"],
            &["posts/gone.md"],
            &["posts/edited.md"],
        )];
        let set = ChangeSet::from_commits(&commits);
        assert_eq!(set.to_upsert, vec!["posts/new.md", "posts/edited.md"]);
        assert_eq!(set.to_remove, vec!["posts/gone.md"]);
    }

    #[test]
    fn empty_event_reduces_to_nothing() {
        let set = ChangeSet::from_commits(&[]);
        assert!(set.is_empty());
    }
}
