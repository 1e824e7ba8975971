//! Storage abstraction for snippets.
//!
//! The [`SnippetStore`] trait defines every storage operation the snippet
//! service needs, so the SQLite backend and the in-memory backend are
//! interchangeable.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Snippet;

/// A snippet paired with its cosine similarity to a query vector.
#[derive(Debug, Clone)]
pub struct ScoredSnippet {
    pub snippet: Snippet,
    pub score: f64,
}

/// Abstract storage backend for snippets.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](SnippetStore::upsert) | Insert or fully replace a snippet by `(project, name)` |
/// | [`get`](SnippetStore::get) | Exact-key lookup |
/// | [`list_names`](SnippetStore::list_names) | Names in a project, newest first |
/// | [`vector_search`](SnippetStore::vector_search) | Top-k by cosine similarity within a project |
#[async_trait]
pub trait SnippetStore: Send + Sync {
    /// Insert or replace a snippet.
    ///
    /// A replacement keeps the original `created_at`. Returns the snippet
    /// as stored.
    async fn upsert(&self, snippet: &Snippet) -> Result<Snippet>;

    /// Retrieve a snippet by key.
    async fn get(&self, project: &str, name: &str) -> Result<Option<Snippet>>;

    /// List snippet names in a project, most recently updated first.
    async fn list_names(&self, project: &str) -> Result<Vec<String>>;

    /// Rank the project's snippets by cosine similarity to `query_vec`,
    /// highest first, returning at most `k`.
    async fn vector_search(
        &self,
        project: &str,
        query_vec: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredSnippet>>;
}
