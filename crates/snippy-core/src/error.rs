//! Domain error kinds.
//!
//! Operations return `anyhow::Result` and wrap one of these variants at the
//! point of failure. Surfaces (HTTP, MCP, CLI) recover the kind with
//! `err.downcast_ref::<SnippetError>()` to choose a status code.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnippetError {
    /// Missing or malformed input. Reported immediately, never retried.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The lookup key does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An embedding, storage, or agent-service call failed.
    #[error("upstream failure: {0}")]
    Upstream(String),

    /// An agent run did not finish within its time budget.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Authoring was requested but no agent service is configured.
    #[error("agent service is disabled; configure [agent] to enable authoring")]
    AgentDisabled,
}

impl SnippetError {
    /// Returns the machine-readable code used in error response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            SnippetError::Validation(_) => "bad_request",
            SnippetError::NotFound(_) => "not_found",
            SnippetError::Upstream(_) => "upstream_error",
            SnippetError::Timeout(_) => "timeout",
            SnippetError::AgentDisabled => "agent_disabled",
        }
    }
}

/// Finds the first [`SnippetError`] in an `anyhow` error chain.
pub fn classify(err: &anyhow::Error) -> Option<&SnippetError> {
    err.chain().find_map(|e| e.downcast_ref::<SnippetError>())
}
