//! Offline fixtures shared by the integration tests: a deterministic
//! embedder and a scripted agent service.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use snippy::agent_service::{
    AgentService, RunHandle, RunRequest, RunStatus, ToolCallRequest, ToolOutput,
};
use snippy::config::{AgentConfig, Config};
use snippy::models::DEFAULT_PROJECT;
use snippy::store::SnippetStore;
use snippy::App;
use snippy_core::embedding::EmbeddingProvider;

pub const BAG_DIMS: usize = 32;

/// Hashes lowercase words into a fixed number of buckets. Texts sharing
/// words score higher than texts that don't.
pub struct BagOfWordsEmbedder;

#[async_trait]
impl EmbeddingProvider for BagOfWordsEmbedder {
    fn model_name(&self) -> &str {
        "bag-of-words"
    }

    fn dims(&self) -> usize {
        BAG_DIMS
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| bag_of_words(t)).collect())
    }
}

pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; BAG_DIMS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let bucket = word
            .to_lowercase()
            .bytes()
            .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize))
            % BAG_DIMS;
        v[bucket] += 1.0;
    }
    v
}

/// Always fails, as an unreachable provider would.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }

    fn dims(&self) -> usize {
        BAG_DIMS
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        anyhow::bail!("connection refused")
    }
}

/// What the scripted service records about a run.
#[derive(Debug, Default)]
pub struct Recorded {
    pub started: Vec<RunRequest>,
    pub submitted: Vec<Vec<ToolOutput>>,
    pub polls: usize,
    pub cleanups: usize,
}

/// Returns a fixed sequence of statuses, then repeats the last one.
pub struct ScriptedAgentService {
    statuses: Mutex<VecDeque<RunStatus>>,
    last: Mutex<RunStatus>,
    final_text: String,
    pub recorded: Mutex<Recorded>,
}

impl ScriptedAgentService {
    pub fn new(statuses: Vec<RunStatus>, final_text: &str) -> Self {
        Self {
            statuses: Mutex::new(statuses.into()),
            last: Mutex::new(RunStatus::InProgress),
            final_text: final_text.to_string(),
            recorded: Mutex::new(Recorded::default()),
        }
    }

    /// One `requires_action` round with the given calls, then completion.
    pub fn with_tool_round(calls: Vec<ToolCallRequest>, final_text: &str) -> Self {
        Self::new(
            vec![
                RunStatus::Queued,
                RunStatus::RequiresAction(calls),
                RunStatus::InProgress,
                RunStatus::Completed,
            ],
            final_text,
        )
    }

    /// Never leaves `in_progress`.
    pub fn hanging() -> Self {
        Self::new(vec![RunStatus::InProgress], "")
    }
}

#[async_trait]
impl AgentService for ScriptedAgentService {
    async fn start_run(&self, req: &RunRequest) -> Result<RunHandle> {
        self.recorded.lock().unwrap().started.push(req.clone());
        Ok(RunHandle {
            agent_id: "asst_1".to_string(),
            thread_id: "thread_1".to_string(),
            run_id: "run_1".to_string(),
        })
    }

    async fn poll_run(&self, _run: &RunHandle) -> Result<RunStatus> {
        self.recorded.lock().unwrap().polls += 1;
        let next = self.statuses.lock().unwrap().pop_front();
        match next {
            Some(status) => {
                *self.last.lock().unwrap() = status.clone();
                Ok(status)
            }
            None => Ok(self.last.lock().unwrap().clone()),
        }
    }

    async fn submit_tool_outputs(&self, _run: &RunHandle, outputs: &[ToolOutput]) -> Result<()> {
        self.recorded
            .lock()
            .unwrap()
            .submitted
            .push(outputs.to_vec());
        Ok(())
    }

    async fn final_message(&self, _run: &RunHandle) -> Result<String> {
        Ok(self.final_text.clone())
    }

    async fn cleanup(&self, _run: &RunHandle) -> Result<()> {
        self.recorded.lock().unwrap().cleanups += 1;
        Ok(())
    }
}

pub fn call(id: &str, name: &str, arguments: &str) -> ToolCallRequest {
    ToolCallRequest {
        id: id.to_string(),
        name: name.to_string(),
        arguments: arguments.to_string(),
    }
}

pub fn agent_config(timeout_secs: u64) -> AgentConfig {
    AgentConfig {
        endpoint: "http://agents.invalid".to_string(),
        model: "gpt-4o".to_string(),
        api_version: "v1".to_string(),
        api_key_env: "SNIPPY_TEST_AGENT_KEY".to_string(),
        poll_interval_ms: 1,
        timeout_secs,
        request_timeout_secs: 5,
    }
}

/// An app over the given store with the bag-of-words embedder and,
/// optionally, a scripted agent service.
pub fn test_app(
    store: Arc<dyn SnippetStore>,
    agent: Option<Arc<ScriptedAgentService>>,
) -> App {
    let mut config = Config::minimal(":memory:");
    if agent.is_some() {
        config.agent = Some(agent_config(5));
    }
    let agent: Option<Arc<dyn AgentService>> = agent.map(|a| a as Arc<dyn AgentService>);
    App::with_components(config, store, Arc::new(BagOfWordsEmbedder), agent)
}

pub fn poll_fast() -> Duration {
    Duration::from_millis(1)
}

pub fn default_project() -> &'static str {
    DEFAULT_PROJECT
}
