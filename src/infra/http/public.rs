use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE, LOCATION},
    },
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use tracing::error;

use crate::application::{
    feed::{FeedError, FeedService, PostLookup, PostSummary},
    repos::{PostListOptions, PostsRepo},
    sitemap::SitemapService,
    sync::SyncService,
    syndication::SyndicationService,
};
use crate::domain::entities::PostRecord;
use crate::domain::types::PostStatus;

const RECENT_POSTS_LIMIT: u32 = 3;

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub syndication: Arc<SyndicationService>,
    pub sitemap: Arc<SitemapService>,
    pub sync: Arc<SyncService>,
    pub posts: Arc<dyn PostsRepo>,
    pub webhook_secret: String,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/blog", get(blog_index))
        .route("/blog/recent", get(recent_posts))
        .route("/blog/tags", get(tag_index))
        .route("/blog/tags/{tag}", get(posts_by_tag))
        .route("/blog/rss.xml", get(rss_feed))
        .route("/blog/{slug}", get(post_detail))
        .route("/sitemap.txt", get(sitemap_txt))
        .route("/healthz", get(health))
        .route("/webhooks/github", post(super::webhook::receive_push))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListQuery {
    limit: Option<u32>,
    tag: Option<String>,
}

#[derive(Debug, Serialize)]
struct BlogIndex {
    posts: Vec<PostSummary>,
    tags: Vec<String>,
}

/// The full post payload served on the detail route.
#[derive(Debug, Serialize)]
struct PostView {
    slug: String,
    title: String,
    description: Option<String>,
    created_at: Date,
    tags: Vec<String>,
    status: PostStatus,
    content: String,
    last_modified_at: Option<OffsetDateTime>,
}

impl From<PostRecord> for PostView {
    fn from(record: PostRecord) -> Self {
        Self {
            slug: record.slug,
            title: record.title,
            description: record.description,
            created_at: record.created_at,
            tags: record.tags,
            status: record.status,
            content: record.content,
            last_modified_at: record.last_modified_at,
        }
    }
}

async fn blog_index(State(state): State<HttpState>, Query(query): Query<ListQuery>) -> Response {
    let options = PostListOptions {
        limit: query.limit,
        tag: query.tag,
    };

    match tokio::try_join!(state.feed.list_published(&options), state.feed.list_tags()) {
        Ok((posts, tags)) => Json(BlogIndex { posts, tags }).into_response(),
        Err(err) => feed_error_response(err),
    }
}

async fn recent_posts(State(state): State<HttpState>) -> Response {
    match state
        .feed
        .list_published(&PostListOptions::limit(RECENT_POSTS_LIMIT))
        .await
    {
        Ok(posts) => Json(posts).into_response(),
        Err(err) => feed_error_response(err),
    }
}

async fn tag_index(State(state): State<HttpState>) -> Response {
    match state.feed.list_tags().await {
        Ok(tags) => Json(tags).into_response(),
        Err(err) => feed_error_response(err),
    }
}

async fn posts_by_tag(State(state): State<HttpState>, Path(tag): Path<String>) -> Response {
    match state.feed.list_published(&PostListOptions::tag(tag)).await {
        Ok(posts) => Json(posts).into_response(),
        Err(err) => feed_error_response(err),
    }
}

async fn post_detail(State(state): State<HttpState>, Path(slug): Path<String>) -> Response {
    match state.feed.get_post(&slug).await {
        Ok(PostLookup::Found(record)) => {
            let mut response = Json(PostView::from(record)).into_response();
            response.headers_mut().insert(
                CACHE_CONTROL,
                HeaderValue::from_static("public, max-age=30"),
            );
            response
        }
        Ok(PostLookup::Moved { slug }) => (
            StatusCode::MOVED_PERMANENTLY,
            [(LOCATION, format!("/blog/{slug}"))],
        )
            .into_response(),
        Ok(PostLookup::NotFound) => (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(err) => feed_error_response(err),
    }
}

async fn rss_feed(State(state): State<HttpState>) -> Response {
    match state.syndication.rss_feed().await {
        Ok(xml) => ([(CONTENT_TYPE, "application/xml")], xml).into_response(),
        Err(err) => {
            error!(error = %err, "rss generation failed");
            (StatusCode::SERVICE_UNAVAILABLE, "Service temporarily unavailable").into_response()
        }
    }
}

async fn sitemap_txt(State(state): State<HttpState>) -> Response {
    match state.sitemap.sitemap_txt().await {
        Ok(body) => ([(CONTENT_TYPE, "text/plain")], body).into_response(),
        Err(err) => {
            error!(error = %err, "sitemap generation failed");
            (StatusCode::SERVICE_UNAVAILABLE, "Service temporarily unavailable").into_response()
        }
    }
}

async fn health(State(state): State<HttpState>) -> Response {
    match state.posts.ping().await {
        Ok(()) => (StatusCode::OK, "ok").into_response(),
        Err(err) => {
            error!(error = %err, "database health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response()
        }
    }
}

fn feed_error_response(err: FeedError) -> Response {
    error!(error = %err, "feed query failed");
    match err {
        FeedError::Repo(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Service temporarily unavailable",
        )
            .into_response(),
        FeedError::Upstream(_) => {
            (StatusCode::BAD_GATEWAY, "Content repository unavailable").into_response()
        }
    }
}
