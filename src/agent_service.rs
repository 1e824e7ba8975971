//! Client for the externally managed agent-execution service.
//!
//! The service owns the model-driven loop. Snippy only starts a run,
//! polls it, answers tool-call requests, and reads the final message; the
//! loop that does this lives in [`crate::agent_run`]. The [`AgentService`]
//! trait is the seam, so tests can script a run without a network.
//!
//! [`HttpAgentService`] speaks the Assistants-style REST dialect used by
//! Azure AI Foundry Agents:
//!
//! | Step | Request |
//! |------|---------|
//! | create agent | `POST /assistants` |
//! | create thread + run | `POST /threads/runs` |
//! | poll | `GET /threads/{thread}/runs/{run}` |
//! | answer tool calls | `POST /threads/{thread}/runs/{run}/submit_tool_outputs` |
//! | read result | `GET /threads/{thread}/messages?order=desc` |
//! | cleanup | `DELETE /assistants/{agent}` |

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::AgentConfig;
use crate::traits::ToolInfo;

/// Everything needed to start one agent run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Display name for the ephemeral agent.
    pub agent_name: String,
    /// System instructions.
    pub instructions: String,
    /// The single user message that opens the thread.
    pub message: String,
    /// Function tools the model may call back into.
    pub tools: Vec<ToolInfo>,
}

/// Identifies a started run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunHandle {
    pub agent_id: String,
    pub thread_id: String,
    pub run_id: String,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    /// JSON-encoded arguments, exactly as the service sent them.
    pub arguments: String,
}

/// The answer to one [`ToolCallRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

/// Run state as reported by the service.
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction(Vec<ToolCallRequest>),
    Completed,
    Failed(String),
    Cancelled,
    Expired,
}

/// Operations Snippy needs from an agent-execution service.
#[async_trait]
pub trait AgentService: Send + Sync {
    /// Create the agent and a thread holding the opening message, and
    /// start a run on it.
    async fn start_run(&self, req: &RunRequest) -> Result<RunHandle>;

    /// Fetch the current run state.
    async fn poll_run(&self, run: &RunHandle) -> Result<RunStatus>;

    /// Answer every pending tool call of a run in one submission.
    async fn submit_tool_outputs(&self, run: &RunHandle, outputs: &[ToolOutput]) -> Result<()>;

    /// Text of the latest assistant message in the run's thread.
    async fn final_message(&self, run: &RunHandle) -> Result<String>;

    /// Delete server-side resources created by [`start_run`](AgentService::start_run).
    async fn cleanup(&self, run: &RunHandle) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════
// HTTP implementation
// ═══════════════════════════════════════════════════════════════════════

/// REST client for an Assistants-compatible agent service.
pub struct HttpAgentService {
    client: reqwest::Client,
    endpoint: String,
    api_version: String,
    /// Variable holding the bearer token, read per request.
    api_key_env: String,
    model: String,
}

impl HttpAgentService {
    /// The token variable named by `agent.api_key_env` is not read here,
    /// so commands that never start a run work without it.
    pub fn new(config: &AgentConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            api_key_env: config.api_key_env.clone(),
            model: config.model.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}?api-version={}", self.endpoint, path, self.api_version)
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<Value> {
        let token = std::env::var(&self.api_key_env)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", self.api_key_env))?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("agent service request failed: {}", what))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("agent service error {} during {}: {}", status, what, body);
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl AgentService for HttpAgentService {
    async fn start_run(&self, req: &RunRequest) -> Result<RunHandle> {
        let agent = self
            .send(
                self.client
                    .post(self.url("/assistants"))
                    .json(&agent_body(&self.model, req)),
                "create agent",
            )
            .await?;
        let agent_id = required_str(&agent, "id")?.to_string();

        let body = json!({
            "assistant_id": agent_id,
            "thread": { "messages": [{ "role": "user", "content": req.message }] }
        });
        let run = match self
            .send(self.client.post(self.url("/threads/runs")).json(&body), "create run")
            .await
        {
            Ok(run) => run,
            Err(e) => {
                // The agent exists even though the run does not.
                if let Err(cleanup_err) = self
                    .send(
                        self.client.delete(self.url(&format!("/assistants/{}", agent_id))),
                        "delete agent",
                    )
                    .await
                {
                    tracing::warn!(agent = %agent_id, error = %cleanup_err, "agent cleanup failed");
                }
                return Err(e);
            }
        };

        Ok(RunHandle {
            agent_id,
            thread_id: required_str(&run, "thread_id")?.to_string(),
            run_id: required_str(&run, "id")?.to_string(),
        })
    }

    async fn poll_run(&self, run: &RunHandle) -> Result<RunStatus> {
        let path = format!("/threads/{}/runs/{}", run.thread_id, run.run_id);
        let json = self.send(self.client.get(self.url(&path)), "poll run").await?;
        parse_run_status(&json)
    }

    async fn submit_tool_outputs(&self, run: &RunHandle, outputs: &[ToolOutput]) -> Result<()> {
        let path = format!(
            "/threads/{}/runs/{}/submit_tool_outputs",
            run.thread_id, run.run_id
        );
        let body = json!({
            "tool_outputs": outputs
                .iter()
                .map(|o| json!({ "tool_call_id": o.tool_call_id, "output": o.output }))
                .collect::<Vec<_>>()
        });
        self.send(self.client.post(self.url(&path)).json(&body), "submit tool outputs")
            .await?;
        Ok(())
    }

    async fn final_message(&self, run: &RunHandle) -> Result<String> {
        let path = format!("/threads/{}/messages", run.thread_id);
        let json = self
            .send(
                self.client
                    .get(self.url(&path))
                    .query(&[("order", "desc"), ("limit", "20")]),
                "list messages",
            )
            .await?;
        parse_final_message(&json)
    }

    async fn cleanup(&self, run: &RunHandle) -> Result<()> {
        let path = format!("/assistants/{}", run.agent_id);
        self.send(self.client.delete(self.url(&path)), "delete agent")
            .await?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Wire format helpers
// ═══════════════════════════════════════════════════════════════════════

fn agent_body(model: &str, req: &RunRequest) -> Value {
    json!({
        "model": model,
        "name": req.agent_name,
        "instructions": req.instructions,
        "tools": req.tools.iter().map(|t| json!({
            "type": "function",
            "function": {
                "name": t.name,
                "description": t.description,
                "parameters": t.parameters,
            }
        })).collect::<Vec<_>>()
    })
}

fn required_str<'a>(json: &'a Value, key: &str) -> Result<&'a str> {
    json.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("agent service response missing '{}'", key))
}

/// Parse a run object into a [`RunStatus`].
pub fn parse_run_status(json: &Value) -> Result<RunStatus> {
    let status = required_str(json, "status")?;
    Ok(match status {
        "queued" => RunStatus::Queued,
        "in_progress" | "cancelling" => RunStatus::InProgress,
        "completed" => RunStatus::Completed,
        "cancelled" => RunStatus::Cancelled,
        "expired" => RunStatus::Expired,
        "failed" | "incomplete" => {
            let reason = json
                .pointer("/last_error/message")
                .and_then(Value::as_str)
                .unwrap_or(status)
                .to_string();
            RunStatus::Failed(reason)
        }
        "requires_action" => {
            let calls = json
                .pointer("/required_action/submit_tool_outputs/tool_calls")
                .and_then(Value::as_array)
                .ok_or_else(|| anyhow::anyhow!("requires_action run has no tool_calls"))?;
            let mut requests = Vec::with_capacity(calls.len());
            for call in calls {
                requests.push(ToolCallRequest {
                    id: required_str(call, "id")?.to_string(),
                    name: call
                        .pointer("/function/name")
                        .and_then(Value::as_str)
                        .ok_or_else(|| anyhow::anyhow!("tool call missing function name"))?
                        .to_string(),
                    arguments: call
                        .pointer("/function/arguments")
                        .and_then(Value::as_str)
                        .unwrap_or("{}")
                        .to_string(),
                });
            }
            RunStatus::RequiresAction(requests)
        }
        other => bail!("unknown run status: {}", other),
    })
}

/// Extract the newest assistant message text from a message list
/// ordered newest first.
pub fn parse_final_message(json: &Value) -> Result<String> {
    let messages = json
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow::anyhow!("message list missing data array"))?;

    let latest = messages
        .iter()
        .find(|m| m.get("role").and_then(Value::as_str) == Some("assistant"))
        .ok_or_else(|| anyhow::anyhow!("run completed without an assistant message"))?;

    let text: Vec<&str> = latest
        .get("content")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.pointer("/text/value").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    Ok(text.join("\n"))
}
