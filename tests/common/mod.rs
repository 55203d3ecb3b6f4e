//! Shared harness for integration tests: an in-memory SQLite store and a
//! stub content repository standing in for the GitHub API.

// Each test binary uses a different slice of this module.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use time::OffsetDateTime;
use url::Url;

use folio::application::feed::FeedService;
use folio::application::repos::{PostsRepo, PostsWriteRepo};
use folio::application::sitemap::SitemapService;
use folio::application::sync::SyncService;
use folio::application::syndication::SyndicationService;
use folio::cache::PostCache;
use folio::config::SiteSettings;
use folio::infra::db::SqliteRepositories;
use folio::infra::github::{ContentRepo, UpstreamError};
use folio::infra::http::signature::{compute_signature, format_signature_header};
use folio::infra::http::{HttpState, build_router};

pub const WEBHOOK_SECRET: &str = "test-webhook-secret";

/// In-memory stand-in for the content repository.
#[derive(Default)]
pub struct StubContentRepo {
    files: Mutex<HashMap<String, String>>,
    histories: Mutex<HashMap<String, Vec<Option<OffsetDateTime>>>>,
}

impl StubContentRepo {
    pub fn put_file(&self, path: &str, contents: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), contents.to_string());
    }

    pub fn remove_file(&self, path: &str) {
        self.files.lock().unwrap().remove(path);
    }

    pub fn put_history(&self, path: &str, dates: Vec<Option<OffsetDateTime>>) {
        self.histories
            .lock()
            .unwrap()
            .insert(path.to_string(), dates);
    }
}

#[async_trait]
impl ContentRepo for StubContentRepo {
    async fn list_post_files(&self) -> Result<Vec<String>, UpstreamError> {
        let mut paths: Vec<String> = self.files.lock().unwrap().keys().cloned().collect();
        paths.sort();
        Ok(paths)
    }

    async fn get_raw_file(&self, path: &str) -> Result<String, UpstreamError> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| UpstreamError::NotFound {
                path: path.to_string(),
            })
    }

    async fn get_file_history(
        &self,
        path: &str,
    ) -> Result<Vec<Option<OffsetDateTime>>, UpstreamError> {
        Ok(self
            .histories
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_default())
    }
}

/// Render a post source file with front matter in the shape the pipeline
/// expects.
pub fn post_file(slug: &str, title: &str, created: &str, tags: &[&str], body: &str) -> String {
    format!(
        "---\ntitle: {}\ncreatedAt: {}\ntags: {}\nslug: {}\n---\n{body}",
        serde_json::json!(title),
        serde_json::json!(created),
        serde_json::json!(tags),
        serde_json::json!(slug),
    )
}

pub fn unlisted_post_file(slug: &str, title: &str, created: &str, body: &str) -> String {
    format!(
        "---\ntitle: {}\ncreatedAt: {}\nslug: {}\nstatus: \"unlisted\"\n---\n{body}",
        serde_json::json!(title),
        serde_json::json!(created),
        serde_json::json!(slug),
    )
}

pub fn sign(body: &[u8]) -> String {
    format_signature_header(&compute_signature(body, WEBHOOK_SECRET.as_bytes()))
}

pub struct TestApp {
    pub router: Router,
    pub repo: Arc<SqliteRepositories>,
    pub content: Arc<StubContentRepo>,
    pub sync: Arc<SyncService>,
    pub feed: Arc<FeedService>,
}

pub async fn test_app() -> TestApp {
    test_app_with(true).await
}

pub async fn test_app_with(resolve_unlisted: bool) -> TestApp {
    // A single connection keeps every query on the same in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    SqliteRepositories::run_migrations(&pool)
        .await
        .expect("migrations apply");
    let repo = Arc::new(SqliteRepositories::new(pool));

    let content = Arc::new(StubContentRepo::default());
    let content_dyn: Arc<dyn ContentRepo> = content.clone();
    let posts: Arc<dyn PostsRepo> = repo.clone();
    let posts_write: Arc<dyn PostsWriteRepo> = repo.clone();
    let cache = Arc::new(PostCache::new(16));

    let sync = Arc::new(SyncService::new(
        content_dyn.clone(),
        posts_write,
        cache.clone(),
    ));
    let feed = Arc::new(FeedService::new(
        posts.clone(),
        content_dyn,
        cache,
        resolve_unlisted,
    ));

    let site = SiteSettings {
        public_url: Url::parse("https://example.com/").unwrap(),
        title: "Example Blog".to_string(),
        description: "Mostly incoherent ramblings.".to_string(),
        language: "en-gb".to_string(),
    };
    let syndication = Arc::new(SyndicationService::new(posts.clone(), site.clone()));
    let sitemap = Arc::new(SitemapService::new(posts.clone(), site));

    let router = build_router(HttpState {
        feed: feed.clone(),
        syndication,
        sitemap,
        sync: sync.clone(),
        posts,
        webhook_secret: WEBHOOK_SECRET.to_string(),
    });

    TestApp {
        router,
        repo,
        content,
        sync,
        feed,
    }
}
