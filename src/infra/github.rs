//! GitHub contents API client for the post source repository.
//!
//! Read-only wrapper over three endpoints: the directory listing under
//! `posts/`, raw file contents (via `application/vnd.github.v3.raw` content
//! negotiation), and per-path commit history (to derive the last-modified
//! timestamp). The composite [`ContentRepo::get_post_by_path`] is what both
//! sync paths and the slug fallback consume.

use async_trait::async_trait;
use reqwest::{
    Client, StatusCode, Url,
    header::{ACCEPT, AUTHORIZATION},
};
use serde::Deserialize;
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::config::GithubSettings;
use crate::domain::entities::PostRecord;
use crate::domain::frontmatter::{self, FrontMatterError};

/// Directory of the content repository that holds post source files.
pub const POSTS_DIR: &str = "posts";

const JSON_ACCEPT: &str = "application/vnd.github.v3+json";
const RAW_ACCEPT: &str = "application/vnd.github.v3.raw";

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("content repository has no file at `{path}`")]
    NotFound { path: String },
    #[error("content repository request failed with status {status}")]
    Status { status: StatusCode },
    #[error("content repository transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("content repository returned an unexpected payload: {message}")]
    Malformed { message: String },
    #[error(transparent)]
    FrontMatter(#[from] FrontMatterError),
}

impl UpstreamError {
    /// A genuine upstream 404, as opposed to a hard failure. Callers doing
    /// slug fallback resolution recover from this locally.
    pub fn is_not_found(&self) -> bool {
        matches!(self, UpstreamError::NotFound { .. })
    }

    fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}

/// Read access to the content repository.
#[async_trait]
pub trait ContentRepo: Send + Sync {
    /// Paths of all files under [`POSTS_DIR`].
    async fn list_post_files(&self) -> Result<Vec<String>, UpstreamError>;

    /// Raw text contents of a single file.
    async fn get_raw_file(&self, path: &str) -> Result<String, UpstreamError>;

    /// Commit timestamps touching `path`, newest first. `None` entries are
    /// commits without a committer date.
    async fn get_file_history(&self, path: &str)
    -> Result<Vec<Option<OffsetDateTime>>, UpstreamError>;

    /// Fetch and parse one post file into a full record.
    async fn get_post_by_path(&self, path: &str) -> Result<PostRecord, UpstreamError> {
        let raw = self.get_raw_file(path).await?;
        let parsed = frontmatter::parse(&raw)?;

        let history = self.get_file_history(path).await?;
        // A file with a single commit has only ever been created.
        let last_modified_at = if history.len() < 2 {
            None
        } else {
            history.first().copied().flatten()
        };

        Ok(PostRecord {
            path: path.to_string(),
            slug: parsed.attributes.slug,
            title: parsed.attributes.title,
            description: parsed.attributes.description,
            created_at: parsed.attributes.created_at,
            tags: parsed.attributes.tags,
            status: parsed.attributes.status,
            content: parsed.body,
            last_modified_at,
        })
    }
}

#[derive(Clone)]
pub struct GithubContentRepo {
    http: Client,
    base_url: Url,
    owner: String,
    repo: String,
    token: Option<String>,
}

impl std::fmt::Debug for GithubContentRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubContentRepo")
            .field("base_url", &self.base_url)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ListingEntry {
    #[serde(rename = "type")]
    entry_type: String,
    path: String,
}

#[derive(Debug, Deserialize)]
struct CommitEntry {
    commit: CommitMeta,
}

#[derive(Debug, Deserialize)]
struct CommitMeta {
    committer: Option<CommitSignature>,
}

#[derive(Debug, Deserialize)]
struct CommitSignature {
    date: Option<String>,
}

impl GithubContentRepo {
    pub fn new(settings: &GithubSettings) -> Self {
        Self::with_base_url(settings, settings.api_base.clone())
    }

    /// Point the client at an alternative API origin. Test suites use this
    /// to run against a local stand-in server.
    pub fn with_base_url(settings: &GithubSettings, base_url: Url) -> Self {
        let http = Client::builder()
            .user_agent(concat!("folio/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("reqwest client");

        Self {
            http,
            base_url,
            owner: settings.owner.clone(),
            repo: settings.repo.clone(),
            token: settings.token.clone(),
        }
    }

    fn endpoint(&self, relative: &str) -> Result<Url, UpstreamError> {
        self.base_url
            .join(relative)
            .map_err(|err| UpstreamError::malformed(format!("invalid request path: {err}")))
    }

    fn get(&self, url: Url, accept: &'static str) -> reqwest::RequestBuilder {
        let mut request = self.http.get(url).header(ACCEPT, accept);
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("token {token}"));
        }
        request
    }

    fn check_status(status: StatusCode, path: &str) -> Result<(), UpstreamError> {
        if status == StatusCode::NOT_FOUND {
            return Err(UpstreamError::NotFound {
                path: path.to_string(),
            });
        }
        if !status.is_success() {
            return Err(UpstreamError::Status { status });
        }
        Ok(())
    }
}

#[async_trait]
impl ContentRepo for GithubContentRepo {
    async fn list_post_files(&self) -> Result<Vec<String>, UpstreamError> {
        let url = self.endpoint(&format!(
            "repos/{}/{}/contents/{POSTS_DIR}/",
            self.owner, self.repo
        ))?;
        let response = self.get(url, JSON_ACCEPT).send().await?;
        Self::check_status(response.status(), POSTS_DIR)?;

        let entries: Vec<ListingEntry> = response
            .json()
            .await
            .map_err(|err| UpstreamError::malformed(format!("listing did not decode: {err}")))?;

        // The posts directory is expected to be flat; anything that is not a
        // plain file means the listing is not what the pipeline understands.
        entries
            .into_iter()
            .map(|entry| {
                if entry.entry_type == "file" {
                    Ok(entry.path)
                } else {
                    Err(UpstreamError::malformed(format!(
                        "listing entry `{}` is a {}, not a file",
                        entry.path, entry.entry_type
                    )))
                }
            })
            .collect()
    }

    async fn get_raw_file(&self, path: &str) -> Result<String, UpstreamError> {
        let url = self.endpoint(&format!(
            "repos/{}/{}/contents/{path}",
            self.owner, self.repo
        ))?;
        let response = self.get(url, RAW_ACCEPT).send().await?;
        Self::check_status(response.status(), path)?;

        // A directory (or any other non-file entry) ignores the raw accept
        // header and comes back as a JSON document.
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));
        if is_json {
            return Err(UpstreamError::malformed(format!(
                "`{path}` is not a raw file"
            )));
        }

        Ok(response.text().await?)
    }

    async fn get_file_history(
        &self,
        path: &str,
    ) -> Result<Vec<Option<OffsetDateTime>>, UpstreamError> {
        let url = self.endpoint(&format!("repos/{}/{}/commits", self.owner, self.repo))?;
        let response = self
            .get(url, JSON_ACCEPT)
            .query(&[("path", path)])
            .send()
            .await?;
        Self::check_status(response.status(), path)?;

        let commits: Vec<CommitEntry> = response
            .json()
            .await
            .map_err(|err| UpstreamError::malformed(format!("history did not decode: {err}")))?;

        commits
            .into_iter()
            .map(|entry| {
                entry
                    .commit
                    .committer
                    .and_then(|committer| committer.date)
                    .map(|date| {
                        OffsetDateTime::parse(&date, &Rfc3339).map_err(|err| {
                            UpstreamError::malformed(format!("commit date `{date}`: {err}"))
                        })
                    })
                    .transpose()
            })
            .collect()
    }
}
