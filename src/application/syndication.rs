//! RSS feed generation.
//!
//! Kept at the data-contract level: the feed lists published posts newest
//! first with title, description, pubDate, link, and guid per item.

use std::sync::Arc;

use thiserror::Error;
use time::format_description::FormatItem;
use time::macros::format_description;

use crate::application::repos::{PostListOptions, PostsRepo, RepoError};
use crate::config::SiteSettings;

const PUB_DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const FEED_TTL_MINUTES: u32 = 40;

#[derive(Debug, Error)]
pub enum SyndicationError {
    #[error("failed to list posts: {0}")]
    Posts(String),
}

impl From<RepoError> for SyndicationError {
    fn from(err: RepoError) -> Self {
        SyndicationError::Posts(err.to_string())
    }
}

#[derive(Clone)]
pub struct SyndicationService {
    posts: Arc<dyn PostsRepo>,
    site: SiteSettings,
}

impl SyndicationService {
    pub fn new(posts: Arc<dyn PostsRepo>, site: SiteSettings) -> Self {
        Self { posts, site }
    }

    /// Generate RSS 2.0 feed XML over all published posts.
    pub async fn rss_feed(&self) -> Result<String, SyndicationError> {
        let posts = self
            .posts
            .list_published(&PostListOptions::default())
            .await?;

        let blog_url = absolute(&self.site, "/blog");

        let mut items = String::new();
        for post in posts {
            let link = format!("{blog_url}/{}", post.slug);
            let description = post
                .description
                .unwrap_or_else(|| format!("A new post on {}.", self.site.title));
            let pub_date = post
                .created_at
                .format(PUB_DATE_FORMAT)
                .unwrap_or_else(|_| post.created_at.to_string());
            items.push_str(&format!(
                "    <item>\n      <title>{}</title>\n      <description>{}</description>\n      <pubDate>{}</pubDate>\n      <link>{}</link>\n      <guid>{}</guid>\n    </item>\n",
                cdata(&post.title),
                cdata(&description),
                pub_date,
                link,
                link,
            ));
        }

        Ok(format!(
            "<rss xmlns:blogChannel=\"{blog_url}\" version=\"2.0\">\n  <channel>\n    <title>{}</title>\n    <link>{blog_url}</link>\n    <description>{}</description>\n    <language>{}</language>\n    <generator>Folio</generator>\n    <ttl>{FEED_TTL_MINUTES}</ttl>\n{items}  </channel>\n</rss>\n",
            cdata(&self.site.title),
            cdata(&self.site.description),
            self.site.language,
        ))
    }
}

pub(crate) fn absolute(site: &SiteSettings, path: &str) -> String {
    let base = site.public_url.as_str().trim_end_matches('/');
    if path == "/" {
        base.to_string()
    } else {
        format!("{base}{path}")
    }
}

fn cdata(input: &str) -> String {
    // A literal `]]>` inside the payload would close the section early.
    format!("<![CDATA[{}]]>", input.replace("]]>", "]]]]><![CDATA[>"))
}
