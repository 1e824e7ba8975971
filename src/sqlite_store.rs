//! SQLite-backed [`SnippetStore`] implementation.
//!
//! Snippets live in a single `snippets` table keyed by `(project, name)`.
//! Embeddings are stored as little-endian `f32` BLOBs and ranked by
//! brute-force cosine similarity within a project.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use snippy_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use snippy_core::models::Snippet;
use snippy_core::store::{ScoredSnippet, SnippetStore};

/// SQLite implementation of the [`SnippetStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_snippet(row: &SqliteRow) -> Result<Snippet> {
    let blob: Vec<u8> = row.try_get("embedding")?;
    Ok(Snippet {
        name: row.try_get("name")?,
        project: row.try_get("project")?,
        content: row.try_get("content")?,
        embedding: blob_to_vec(&blob),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl SnippetStore for SqliteStore {
    async fn upsert(&self, snippet: &Snippet) -> Result<Snippet> {
        let row = sqlx::query(
            r#"
            INSERT INTO snippets (project, name, content, embedding, dims, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(project, name) DO UPDATE SET
                content = excluded.content,
                embedding = excluded.embedding,
                dims = excluded.dims,
                updated_at = excluded.updated_at
            RETURNING project, name, content, embedding, created_at, updated_at
            "#,
        )
        .bind(&snippet.project)
        .bind(&snippet.name)
        .bind(&snippet.content)
        .bind(vec_to_blob(&snippet.embedding))
        .bind(snippet.embedding.len() as i64)
        .bind(snippet.created_at)
        .bind(snippet.updated_at)
        .fetch_one(&self.pool)
        .await?;

        row_to_snippet(&row)
    }

    async fn get(&self, project: &str, name: &str) -> Result<Option<Snippet>> {
        let row = sqlx::query(
            "SELECT project, name, content, embedding, created_at, updated_at FROM snippets WHERE project = ? AND name = ?",
        )
        .bind(project)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_snippet).transpose()
    }

    async fn list_names(&self, project: &str) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM snippets WHERE project = ? ORDER BY updated_at DESC, name ASC",
        )
        .bind(project)
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    async fn vector_search(
        &self,
        project: &str,
        query_vec: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredSnippet>> {
        let rows = sqlx::query(
            "SELECT project, name, content, embedding, created_at, updated_at FROM snippets WHERE project = ?",
        )
        .bind(project)
        .fetch_all(&self.pool)
        .await?;

        let mut scored = rows
            .iter()
            .map(|row| {
                let snippet = row_to_snippet(row)?;
                let score = cosine_similarity(query_vec, &snippet.embedding) as f64;
                Ok(ScoredSnippet { snippet, score })
            })
            .collect::<Result<Vec<_>>>()?;

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.snippet.name.cmp(&b.snippet.name))
        });
        scored.truncate(k);

        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::{db, migrate};
    use tempfile::TempDir;

    async fn open_store(tmp: &TempDir) -> SqliteStore {
        let config = Config::minimal(tmp.path().join("snippy.sqlite"));
        let pool = db::connect(&config).await.unwrap();
        migrate::migrate_pool(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    fn snippet(name: &str, content: &str, embedding: Vec<f32>, ts: i64) -> Snippet {
        Snippet {
            name: name.to_string(),
            project: "proj".to_string(),
            content: content.to_string(),
            embedding,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_keeps_created_at() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;

        store
            .upsert(&snippet("a", "fn one() {}", vec![1.0, 0.0], 100))
            .await
            .unwrap();
        let stored = store
            .upsert(&snippet("a", "fn two() {}", vec![0.0, 1.0], 200))
            .await
            .unwrap();

        assert_eq!(stored.content, "fn two() {}");
        assert_eq!(stored.embedding, vec![0.0, 1.0]);
        assert_eq!(stored.created_at, 100);
        assert_eq!(stored.updated_at, 200);
        assert_eq!(store.list_names("proj").await.unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        assert!(store.get("proj", "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_vector_search_orders_by_similarity() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        store.upsert(&snippet("far", "x", vec![0.0, 1.0], 1)).await.unwrap();
        store.upsert(&snippet("near", "y", vec![1.0, 0.1], 1)).await.unwrap();

        let hits = store.vector_search("proj", &[1.0, 0.0], 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].snippet.name, "near");
        assert!(hits[0].score > 0.9);

        assert!(store
            .vector_search("other", &[1.0, 0.0], 5)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_row_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp).await;
        sqlx::query(
            "INSERT INTO snippets (project, name, content, embedding, dims, created_at, updated_at) \
             VALUES ('proj', 'bad', 'x', x'', 0, 'yesterday', 'today')",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        assert!(store.get("proj", "bad").await.is_err());
        assert!(store.vector_search("proj", &[1.0], 5).await.is_err());
    }
}
