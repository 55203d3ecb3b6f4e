use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, Transaction};
use time::{Date, OffsetDateTime};

use crate::application::repos::{PostListOptions, PostsRepo, PostsWriteRepo, RepoError};
use crate::domain::entities::PostRecord;
use crate::domain::types::PostStatus;

use super::{SqliteRepositories, map_sqlx_error};

const POST_COLUMNS: &str =
    "path, slug, title, description, created_at, tags, status, content, last_modified_at";

#[derive(sqlx::FromRow)]
struct PostRow {
    path: String,
    slug: String,
    title: String,
    description: Option<String>,
    created_at: Date,
    tags: String,
    status: PostStatus,
    content: String,
    last_modified_at: Option<OffsetDateTime>,
}

impl TryFrom<PostRow> for PostRecord {
    type Error = RepoError;

    fn try_from(row: PostRow) -> Result<Self, RepoError> {
        let tags: Vec<String> = serde_json::from_str(&row.tags).map_err(|err| {
            RepoError::integrity(format!(
                "tags for `{}` are not a JSON string array: {err}",
                row.path
            ))
        })?;

        Ok(Self {
            path: row.path,
            slug: row.slug,
            title: row.title,
            description: row.description,
            created_at: row.created_at,
            tags,
            status: row.status,
            content: row.content,
            last_modified_at: row.last_modified_at,
        })
    }
}

fn encode_tags(tags: &[String]) -> String {
    serde_json::to_string(tags).expect("string array serializes")
}

async fn insert_records(
    tx: &mut Transaction<'_, Sqlite>,
    records: &[PostRecord],
) -> Result<(), RepoError> {
    for record in records {
        sqlx::query(
            "INSERT INTO posts \
             (path, slug, title, description, created_at, tags, status, content, last_modified_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.path)
        .bind(&record.slug)
        .bind(&record.title)
        .bind(&record.description)
        .bind(record.created_at)
        .bind(encode_tags(&record.tags))
        .bind(record.status)
        .bind(&record.content)
        .bind(record.last_modified_at)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;
    }
    Ok(())
}

async fn delete_paths(
    tx: &mut Transaction<'_, Sqlite>,
    paths: &[String],
) -> Result<(), RepoError> {
    let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM posts WHERE path IN (");
    let mut separated = qb.separated(", ");
    for path in paths {
        separated.push_bind(path);
    }
    separated.push_unseparated(")");

    qb.build()
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;
    Ok(())
}

#[async_trait]
impl PostsRepo for SqliteRepositories {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE slug = ?"
        ))
        .bind(slug)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(PostRecord::try_from).transpose()
    }

    async fn list_published(
        &self,
        options: &PostListOptions,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE status = 'published'"
        ));

        if let Some(tag) = &options.tag {
            // Tags are stored as a JSON string array; matching the quoted
            // value is how the source system filtered as well.
            qb.push(" AND tags LIKE ");
            qb.push_bind(format!("%\"{tag}\"%"));
        }

        qb.push(" ORDER BY created_at DESC, path ASC");

        if let Some(limit) = options.limit {
            qb.push(" LIMIT ");
            qb.push_bind(i64::from(limit));
        }

        let rows: Vec<PostRow> = qb
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(PostRecord::try_from).collect()
    }

    async fn list_distinct_tags(&self) -> Result<Vec<String>, RepoError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT path, tags FROM posts WHERE status = 'published'")
                .fetch_all(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        let mut tags = BTreeSet::new();
        for (path, raw) in rows {
            let parsed: Vec<String> = serde_json::from_str(&raw).map_err(|err| {
                RepoError::integrity(format!(
                    "tags for `{path}` are not a JSON string array: {err}"
                ))
            })?;
            tags.extend(parsed);
        }

        Ok(tags.into_iter().collect())
    }

    async fn ping(&self) -> Result<(), RepoError> {
        sqlx::query("SELECT 1")
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl PostsWriteRepo for SqliteRepositories {
    async fn upsert_posts(&self, records: &[PostRecord]) -> Result<(), RepoError> {
        if records.is_empty() {
            return Ok(());
        }

        let paths: Vec<String> = records.iter().map(|record| record.path.clone()).collect();

        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;
        delete_paths(&mut tx, &paths).await?;
        insert_records(&mut tx, records).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn delete_by_paths(&self, paths: &[String]) -> Result<(), RepoError> {
        if paths.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;
        delete_paths(&mut tx, paths).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn replace_all(&self, records: &[PostRecord]) -> Result<(), RepoError> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;
        sqlx::query("DELETE FROM posts")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        insert_records(&mut tx, records).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use time::macros::date;

    async fn setup() -> SqliteRepositories {
        // A single connection keeps every query on the same in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        SqliteRepositories::run_migrations(&pool)
            .await
            .expect("migrations apply");
        SqliteRepositories::new(pool)
    }

    fn record(path: &str, slug: &str, created: Date, tags: &[&str]) -> PostRecord {
        PostRecord {
            path: path.to_string(),
            slug: slug.to_string(),
            title: format!("Title for {slug}"),
            description: None,
            created_at: created,
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            status: PostStatus::Published,
            content: format!("Body of {slug}"),
            last_modified_at: None,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_the_row_sharing_a_path() {
        let repo = setup().await;

        let original = record("posts/a.md", "old-slug", date!(2023 - 01 - 01), &[]);
        repo.upsert_posts(&[original]).await.unwrap();

        let renamed = record("posts/a.md", "new-slug", date!(2023 - 01 - 01), &[]);
        repo.upsert_posts(&[renamed]).await.unwrap();

        assert!(repo.find_by_slug("old-slug").await.unwrap().is_none());
        let found = repo.find_by_slug("new-slug").await.unwrap().unwrap();
        assert_eq!(found.path, "posts/a.md");

        let all = repo.list_published(&PostListOptions::default()).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn listings_exclude_unlisted_posts_but_slug_lookup_finds_them() {
        let repo = setup().await;

        let mut hidden = record("posts/h.md", "hidden", date!(2023 - 02 - 01), &["secret"]);
        hidden.status = PostStatus::Unlisted;
        let visible = record("posts/v.md", "visible", date!(2023 - 01 - 01), &["open"]);
        repo.upsert_posts(&[hidden, visible]).await.unwrap();

        let listed = repo.list_published(&PostListOptions::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].slug, "visible");

        assert!(repo.find_by_slug("hidden").await.unwrap().is_some());
        assert_eq!(repo.list_distinct_tags().await.unwrap(), vec!["open"]);
    }

    #[tokio::test]
    async fn list_orders_newest_first_and_honors_limit_and_tag() {
        let repo = setup().await;

        repo.upsert_posts(&[
            record("posts/a.md", "a", date!(2022 - 01 - 01), &["rust"]),
            record("posts/b.md", "b", date!(2023 - 01 - 01), &["web"]),
            record("posts/c.md", "c", date!(2024 - 01 - 01), &["rust", "web"]),
        ])
        .await
        .unwrap();

        let all = repo.list_published(&PostListOptions::default()).await.unwrap();
        let slugs: Vec<_> = all.iter().map(|post| post.slug.as_str()).collect();
        assert_eq!(slugs, ["c", "b", "a"]);

        let limited = repo.list_published(&PostListOptions::limit(2)).await.unwrap();
        let slugs: Vec<_> = limited.iter().map(|post| post.slug.as_str()).collect();
        assert_eq!(slugs, ["c", "b"]);

        let tagged = repo.list_published(&PostListOptions::tag("rust")).await.unwrap();
        let slugs: Vec<_> = tagged.iter().map(|post| post.slug.as_str()).collect();
        assert_eq!(slugs, ["c", "a"]);
    }

    #[tokio::test]
    async fn distinct_tags_are_sorted_and_deduplicated() {
        let repo = setup().await;

        repo.upsert_posts(&[
            record("posts/a.md", "a", date!(2022 - 01 - 01), &["zeta", "alpha"]),
            record("posts/b.md", "b", date!(2023 - 01 - 01), &["alpha", "mid"]),
        ])
        .await
        .unwrap();

        assert_eq!(
            repo.list_distinct_tags().await.unwrap(),
            vec!["alpha", "mid", "zeta"]
        );
    }

    #[tokio::test]
    async fn deleting_unknown_paths_is_a_noop() {
        let repo = setup().await;

        repo.delete_by_paths(&["posts/missing.md".to_string()])
            .await
            .unwrap();
        repo.delete_by_paths(&[]).await.unwrap();
    }

    #[tokio::test]
    async fn replace_all_swaps_the_entire_table() {
        let repo = setup().await;

        repo.upsert_posts(&[record("posts/a.md", "a", date!(2022 - 01 - 01), &[])])
            .await
            .unwrap();
        repo.replace_all(&[
            record("posts/b.md", "b", date!(2023 - 01 - 01), &[]),
            record("posts/c.md", "c", date!(2024 - 01 - 01), &[]),
        ])
        .await
        .unwrap();

        assert!(repo.find_by_slug("a").await.unwrap().is_none());
        let all = repo.list_published(&PostListOptions::default()).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn round_trips_every_column() {
        let repo = setup().await;

        let mut full = record("posts/full.md", "full", date!(2024 - 06 - 30), &["x", "y"]);
        full.description = Some("a description".to_string());
        full.last_modified_at =
            Some(time::macros::datetime!(2024 - 07 - 01 12:30:00 UTC));
        repo.upsert_posts(&[full.clone()]).await.unwrap();

        let loaded = repo.find_by_slug("full").await.unwrap().unwrap();
        assert_eq!(loaded, full);
    }
}
