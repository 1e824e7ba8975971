//! Wiring: builds the snippet service, authoring service, and tool
//! registry from configuration.

use anyhow::Result;
use std::sync::Arc;

use snippy_core::embedding::EmbeddingProvider;
use snippy_core::store::SnippetStore;

use crate::agent_run::RunOptions;
use crate::agent_service::{AgentService, HttpAgentService};
use crate::authoring::Authoring;
use crate::config::Config;
use crate::embedding::create_provider;
use crate::snippets::SnippetService;
use crate::sqlite_store::SqliteStore;
use crate::traits::{ToolContext, ToolRegistry};
use crate::{db, migrate};

/// Shared application handles. Cheap to clone.
#[derive(Clone)]
pub struct App {
    pub config: Arc<Config>,
    pub snippets: Arc<SnippetService>,
    pub authoring: Option<Arc<Authoring>>,
    pub tools: Arc<ToolRegistry>,
}

impl App {
    /// Open the SQLite store (applying migrations), create the configured
    /// embedding provider, and connect the agent service if `[agent]` is
    /// present.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::migrate_pool(&pool).await?;
        let store: Arc<dyn SnippetStore> = Arc::new(SqliteStore::new(pool));
        let embedder = create_provider(&config.embedding)?;

        let agent: Option<Arc<dyn AgentService>> = match &config.agent {
            Some(agent_cfg) => Some(Arc::new(HttpAgentService::new(agent_cfg)?)),
            None => None,
        };

        Ok(Self::with_components(config.clone(), store, embedder, agent))
    }

    /// Assemble from explicit components. Used by tests and by binaries
    /// that bring their own store or providers.
    pub fn with_components(
        config: Config,
        store: Arc<dyn SnippetStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        agent: Option<Arc<dyn AgentService>>,
    ) -> Self {
        let snippets = Arc::new(SnippetService::new(
            store,
            embedder,
            config.retrieval.clone(),
        ));

        let authoring = match (agent, &config.agent) {
            (Some(service), Some(agent_cfg)) => Some(Arc::new(Authoring::new(
                service,
                snippets.clone(),
                RunOptions::from(agent_cfg),
            ))),
            (Some(_), None) => {
                tracing::warn!("agent service supplied without [agent] config; authoring disabled");
                None
            }
            (None, _) => None,
        };

        Self {
            config: Arc::new(config),
            snippets,
            authoring,
            tools: Arc::new(ToolRegistry::with_builtins()),
        }
    }

    pub fn tool_context(&self) -> ToolContext {
        ToolContext::new(self.snippets.clone(), self.authoring.clone())
    }
}
