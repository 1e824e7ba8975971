//! Snippet save, lookup, and similarity search.
//!
//! [`SnippetService`] is the single entry point used by the CLI, the HTTP
//! routes, the tool registry, and the authoring agents. It owns the order
//! of operations for a save (validate → embed → write) so that a failed
//! embedding never leaves a partial record behind.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::sync::Arc;

use snippy_core::embedding::{embed_one, EmbeddingProvider};
use snippy_core::error::SnippetError;
use snippy_core::models::{require_text, resolve_project, Snippet, SnippetMatch, SnippetView};
use snippy_core::store::SnippetStore;

use crate::config::RetrievalConfig;

/// Input for [`SnippetService::save`].
///
/// Field names match the `save_snippet` tool schema and the
/// `POST /api/snippets` body.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveRequest {
    pub name: String,
    #[serde(default)]
    pub project: Option<String>,
    pub content: String,
}

/// Input for [`SnippetService::search`].
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub k: Option<usize>,
}

pub struct SnippetService {
    store: Arc<dyn SnippetStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    retrieval: RetrievalConfig,
}

impl SnippetService {
    pub fn new(
        store: Arc<dyn SnippetStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            retrieval,
        }
    }

    pub fn retrieval(&self) -> &RetrievalConfig {
        &self.retrieval
    }

    /// Embed and store a snippet, replacing any snippet with the same
    /// `(project, name)`.
    pub async fn save(&self, req: SaveRequest) -> Result<SnippetView> {
        require_text("name", &req.name)?;
        require_text("content", &req.content)?;
        let name = req.name.trim().to_string();
        let project = resolve_project(req.project.as_deref());

        let embedding = embed_one(self.embedder.as_ref(), &req.content)
            .await
            .map_err(|e| SnippetError::Upstream(format!("embedding failed: {:#}", e)))?;

        let now = chrono::Utc::now().timestamp();
        let stored = self
            .store
            .upsert(&Snippet {
                name,
                project,
                content: req.content,
                embedding,
                created_at: now,
                updated_at: now,
            })
            .await
            .map_err(|e| SnippetError::Upstream(format!("storage write failed: {:#}", e)))?;

        tracing::info!(
            name = %stored.name,
            project = %stored.project,
            bytes = stored.content.len(),
            "saved snippet"
        );
        Ok(SnippetView::from(&stored))
    }

    /// Fetch a snippet by exact key.
    pub async fn get(&self, name: &str, project: Option<&str>) -> Result<SnippetView> {
        require_text("name", name)?;
        let project = resolve_project(project);
        let name = name.trim();

        let found = self
            .store
            .get(&project, name)
            .await
            .map_err(|e| SnippetError::Upstream(format!("storage read failed: {:#}", e)))?;

        match found {
            Some(s) => Ok(SnippetView::from(&s)),
            None => {
                tracing::debug!(%name, %project, "snippet not found");
                Err(SnippetError::NotFound(format!("snippet '{}' in project '{}'", name, project)).into())
            }
        }
    }

    /// List snippet names in a project, newest first.
    pub async fn list(&self, project: Option<&str>) -> Result<Vec<String>> {
        let project = resolve_project(project);
        self.store
            .list_names(&project)
            .await
            .with_context(|| format!("listing snippets in '{}'", project))
    }

    /// Rank a project's snippets by cosine similarity to a free-text query.
    ///
    /// An empty project yields an empty list. `k` defaults to
    /// `retrieval.top_k` and is clamped to `retrieval.max_k`.
    pub async fn search(&self, req: SearchRequest) -> Result<Vec<SnippetMatch>> {
        require_text("query", &req.query)?;
        let project = resolve_project(req.project.as_deref());
        let k = req
            .k
            .unwrap_or(self.retrieval.top_k)
            .clamp(1, self.retrieval.max_k);

        let query_vec = embed_one(self.embedder.as_ref(), &req.query)
            .await
            .map_err(|e| SnippetError::Upstream(format!("embedding failed: {:#}", e)))?;

        let hits = self
            .store
            .vector_search(&project, &query_vec, k)
            .await
            .map_err(|e| SnippetError::Upstream(format!("storage query failed: {:#}", e)))?;

        tracing::debug!(%project, k, hits = hits.len(), "similarity search");
        Ok(hits
            .iter()
            .map(|h| SnippetMatch {
                snippet: SnippetView::from(&h.snippet),
                score: h.score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use snippy_core::error::classify;
    use snippy_core::store::memory::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and maps text length onto a 2-d vector.
    #[derive(Default)]
    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        fn model_name(&self) -> &str {
            "counting"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![1.0, t.len() as f32]).collect())
        }
    }

    fn service(embedder: Arc<CountingEmbedder>) -> SnippetService {
        SnippetService::new(
            Arc::new(InMemoryStore::new()),
            embedder,
            RetrievalConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_validation_never_calls_embedder() {
        let embedder = Arc::new(CountingEmbedder::default());
        let svc = service(embedder.clone());

        let err = svc
            .save(SaveRequest {
                name: "".into(),
                project: None,
                content: "fn main() {}".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(classify(&err), Some(SnippetError::Validation(_))));

        let err = svc
            .save(SaveRequest {
                name: "x".into(),
                project: None,
                content: "  ".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(classify(&err), Some(SnippetError::Validation(_))));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_project_defaults() {
        let svc = service(Arc::new(CountingEmbedder::default()));
        let saved = svc
            .save(SaveRequest {
                name: " hello ".into(),
                project: Some("".into()),
                content: "print('hi')".into(),
            })
            .await
            .unwrap();
        assert_eq!(saved.project, snippy_core::DEFAULT_PROJECT);
        assert_eq!(saved.name, "hello");
        assert_eq!(svc.get("hello", None).await.unwrap().content, "print('hi')");
    }

    #[tokio::test]
    async fn test_k_is_clamped() {
        let svc = service(Arc::new(CountingEmbedder::default()));
        for i in 0..3 {
            svc.save(SaveRequest {
                name: format!("s{}", i),
                project: None,
                content: "x".repeat(i + 1),
            })
            .await
            .unwrap();
        }
        let hits = svc
            .search(SearchRequest {
                query: "xx".into(),
                project: None,
                k: Some(0),
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }
}
