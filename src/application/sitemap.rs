//! Sitemap generation: a flat newline-separated URL list covering the home
//! page, the blog index, every published post, and every tag page.

use std::sync::Arc;

use thiserror::Error;

use crate::application::repos::{PostListOptions, PostsRepo, RepoError};
use crate::application::syndication::absolute;
use crate::config::SiteSettings;

#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("failed to list posts: {0}")]
    Posts(String),
}

impl From<RepoError> for SitemapError {
    fn from(err: RepoError) -> Self {
        SitemapError::Posts(err.to_string())
    }
}

#[derive(Clone)]
pub struct SitemapService {
    posts: Arc<dyn PostsRepo>,
    site: SiteSettings,
}

impl SitemapService {
    pub fn new(posts: Arc<dyn PostsRepo>, site: SiteSettings) -> Self {
        Self { posts, site }
    }

    pub async fn sitemap_txt(&self) -> Result<String, SitemapError> {
        let posts = self
            .posts
            .list_published(&PostListOptions::default())
            .await?;
        let tags = self.posts.list_distinct_tags().await?;

        let mut urls = vec![absolute(&self.site, "/"), absolute(&self.site, "/blog")];
        urls.extend(
            posts
                .iter()
                .map(|post| absolute(&self.site, &format!("/blog/{}", post.slug))),
        );
        urls.extend(
            tags.iter()
                .map(|tag| absolute(&self.site, &format!("/blog/tags/{tag}"))),
        );

        Ok(urls.join("\n"))
    }
}
