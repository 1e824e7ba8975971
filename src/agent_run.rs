//! Client-side driver for one agent run.
//!
//! Starts the run, polls until the service reports a terminal state, and
//! answers every `requires_action` pause by dispatching the requested
//! tool calls into a local [`ToolRegistry`]. A tool that fails does not
//! abort the run: the model receives `{"error": "..."}` as that call's
//! output and decides what to do next.
//!
//! The whole exchange is bounded by [`RunOptions::timeout`]. Server-side
//! cleanup is attempted on every exit path.

use anyhow::Result;
use serde_json::{json, Value};
use std::time::Duration;

use snippy_core::error::SnippetError;

use crate::agent_service::{AgentService, RunHandle, RunRequest, RunStatus, ToolCallRequest, ToolOutput};
use crate::config::AgentConfig;
use crate::traits::{ToolContext, ToolRegistry};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl From<&AgentConfig> for RunOptions {
    fn from(config: &AgentConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub text: String,
    /// Number of tool calls relayed during the run.
    pub tool_calls: usize,
}

/// Execute a run to completion.
///
/// # Errors
///
/// - [`SnippetError::Upstream`] if the service errors or the run ends
///   failed, cancelled, or expired.
/// - [`SnippetError::Timeout`] if the run outlives `opts.timeout`.
pub async fn run_agent(
    service: &dyn AgentService,
    tools: &ToolRegistry,
    ctx: &ToolContext,
    req: &RunRequest,
    opts: &RunOptions,
) -> Result<RunOutcome> {
    let run = service
        .start_run(req)
        .await
        .map_err(|e| SnippetError::Upstream(format!("starting agent run: {:#}", e)))?;
    tracing::info!(agent = %req.agent_name, run = %run.run_id, "agent run started");

    let driven = tokio::time::timeout(opts.timeout, drive(service, tools, ctx, &run, opts)).await;

    if let Err(e) = service.cleanup(&run).await {
        tracing::warn!(run = %run.run_id, error = %e, "agent cleanup failed");
    }

    match driven {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::warn!(run = %run.run_id, timeout_secs = opts.timeout.as_secs(), "agent run timed out");
            Err(SnippetError::Timeout(format!(
                "agent run {} exceeded {}s",
                run.run_id,
                opts.timeout.as_secs()
            ))
            .into())
        }
    }
}

async fn drive(
    service: &dyn AgentService,
    tools: &ToolRegistry,
    ctx: &ToolContext,
    run: &RunHandle,
    opts: &RunOptions,
) -> Result<RunOutcome> {
    let mut relayed = 0usize;

    loop {
        let status = service
            .poll_run(run)
            .await
            .map_err(|e| SnippetError::Upstream(format!("polling agent run: {:#}", e)))?;

        match status {
            RunStatus::Queued | RunStatus::InProgress => {
                tokio::time::sleep(opts.poll_interval).await;
            }
            RunStatus::RequiresAction(calls) => {
                tracing::debug!(run = %run.run_id, calls = calls.len(), "relaying tool calls");
                let outputs = relay_tool_calls(tools, ctx, &calls).await;
                relayed += outputs.len();
                service
                    .submit_tool_outputs(run, &outputs)
                    .await
                    .map_err(|e| SnippetError::Upstream(format!("submitting tool outputs: {:#}", e)))?;
            }
            RunStatus::Completed => {
                let text = service
                    .final_message(run)
                    .await
                    .map_err(|e| SnippetError::Upstream(format!("reading agent result: {:#}", e)))?;
                tracing::info!(run = %run.run_id, tool_calls = relayed, "agent run completed");
                return Ok(RunOutcome {
                    text,
                    tool_calls: relayed,
                });
            }
            RunStatus::Failed(reason) => {
                return Err(SnippetError::Upstream(format!("agent run failed: {}", reason)).into())
            }
            RunStatus::Cancelled => {
                return Err(SnippetError::Upstream("agent run was cancelled".to_string()).into())
            }
            RunStatus::Expired => {
                return Err(SnippetError::Upstream("agent run expired".to_string()).into())
            }
        }
    }
}

/// Dispatch each requested call to the registry and collect outputs in
/// request order.
pub async fn relay_tool_calls(
    tools: &ToolRegistry,
    ctx: &ToolContext,
    calls: &[ToolCallRequest],
) -> Vec<ToolOutput> {
    let mut outputs = Vec::with_capacity(calls.len());

    for call in calls {
        let result = match serde_json::from_str::<Value>(&call.arguments) {
            Ok(args) => tools.call(&call.name, args, ctx).await,
            Err(e) => Err(SnippetError::Validation(format!("invalid tool arguments: {}", e)).into()),
        };

        let output = match result {
            Ok(value) => value.to_string(),
            Err(e) => {
                tracing::debug!(tool = %call.name, error = %e, "tool call failed");
                json!({ "error": format!("{:#}", e) }).to_string()
            }
        };

        outputs.push(ToolOutput {
            tool_call_id: call.id.clone(),
            output,
        });
    }

    outputs
}
