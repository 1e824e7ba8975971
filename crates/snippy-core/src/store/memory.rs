//! In-memory [`SnippetStore`] implementation for tests and embedding
//! into other binaries.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`. Vector search is
//! brute-force cosine similarity over the project's snippets.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::Snippet;

use super::{ScoredSnippet, SnippetStore};

type Key = (String, String);

/// In-memory snippet store.
pub struct InMemoryStore {
    snippets: RwLock<HashMap<Key, Snippet>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            snippets: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored snippets across all projects.
    pub fn len(&self) -> usize {
        self.snippets.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow::anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl SnippetStore for InMemoryStore {
    async fn upsert(&self, snippet: &Snippet) -> Result<Snippet> {
        let mut map = self.snippets.write().map_err(poisoned)?;
        let key = (snippet.project.clone(), snippet.name.clone());
        let mut stored = snippet.clone();
        if let Some(prev) = map.get(&key) {
            stored.created_at = prev.created_at;
        }
        map.insert(key, stored.clone());
        Ok(stored)
    }

    async fn get(&self, project: &str, name: &str) -> Result<Option<Snippet>> {
        let map = self.snippets.read().map_err(poisoned)?;
        Ok(map.get(&(project.to_string(), name.to_string())).cloned())
    }

    async fn list_names(&self, project: &str) -> Result<Vec<String>> {
        let map = self.snippets.read().map_err(poisoned)?;
        let mut in_project: Vec<&Snippet> =
            map.values().filter(|s| s.project == project).collect();
        in_project.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(in_project.into_iter().map(|s| s.name.clone()).collect())
    }

    async fn vector_search(
        &self,
        project: &str,
        query_vec: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredSnippet>> {
        let map = self.snippets.read().map_err(poisoned)?;
        let mut scored: Vec<ScoredSnippet> = map
            .values()
            .filter(|s| s.project == project)
            .map(|s| ScoredSnippet {
                score: cosine_similarity(query_vec, &s.embedding) as f64,
                snippet: s.clone(),
            })
            .collect();
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
