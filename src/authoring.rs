//! Agent-authored project documents: a wiki and a code style guide.
//!
//! Both documents follow the same recipe. Pre-fetch the snippets most
//! relevant to a fixed seed query, render them into the opening message,
//! declare the read-only snippet tools, and hand the run to
//! [`run_agent`]. The agent may search for more snippets while writing.

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;

use snippy_core::models::{resolve_project, SnippetMatch};

use crate::agent_run::{run_agent, RunOptions};
use crate::agent_service::{AgentService, RunRequest};
use crate::snippets::{SearchRequest, SnippetService};
use crate::traits::{ToolContext, ToolRegistry};

const WIKI_INSTRUCTIONS: &str = "You write developer wikis for code repositories. \
Using the snippets provided and any more you find with the search_snippets tool, \
produce a Markdown wiki for the project with these sections: Overview, Key Components, \
Data Flow, Usage Examples, and Open Questions. Reference snippets by name. \
Do not invent APIs that no snippet shows. Reply with the Markdown document only.";

const STYLE_GUIDE_INSTRUCTIONS: &str = "You write code style guides. \
Infer the conventions the project's snippets actually follow: naming, formatting, \
error handling, comments, testing, and module layout. Use the search_snippets tool \
to check a convention against more snippets before stating it. For every rule give \
a short example taken from a snippet. Reply with a Markdown document only.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Wiki,
    StyleGuide,
}

impl DocumentKind {
    fn instructions(self) -> &'static str {
        match self {
            DocumentKind::Wiki => WIKI_INSTRUCTIONS,
            DocumentKind::StyleGuide => STYLE_GUIDE_INSTRUCTIONS,
        }
    }

    /// Query used to pick the snippets placed in the opening message.
    fn seed_query(self) -> &'static str {
        match self {
            DocumentKind::Wiki => "entry points, public interfaces, and core data structures",
            DocumentKind::StyleGuide => "naming conventions, error handling, formatting, and tests",
        }
    }

    fn agent_name(self) -> &'static str {
        match self {
            DocumentKind::Wiki => "snippy-wiki",
            DocumentKind::StyleGuide => "snippy-style-guide",
        }
    }
}

/// A generated document.
#[derive(Debug, Clone, Serialize)]
pub struct AuthoredDocument {
    pub kind: DocumentKind,
    pub project: String,
    pub content: String,
    /// Snippets pre-fetched into the opening message.
    pub context_snippets: usize,
    /// Tool calls the agent made while writing.
    pub tool_calls: usize,
}

pub struct Authoring {
    service: Arc<dyn AgentService>,
    snippets: Arc<SnippetService>,
    tools: ToolRegistry,
    options: RunOptions,
}

impl Authoring {
    pub fn new(
        service: Arc<dyn AgentService>,
        snippets: Arc<SnippetService>,
        options: RunOptions,
    ) -> Self {
        Self {
            service,
            snippets,
            tools: ToolRegistry::for_agents(),
            options,
        }
    }

    /// Generate a document of `kind` for `project`.
    ///
    /// `focus` narrows a style guide to one topic; the wiki ignores it.
    pub async fn generate(
        &self,
        kind: DocumentKind,
        project: Option<&str>,
        focus: Option<&str>,
    ) -> Result<AuthoredDocument> {
        let project = resolve_project(project);
        let context = self
            .snippets
            .search(SearchRequest {
                query: kind.seed_query().to_string(),
                project: Some(project.clone()),
                k: Some(self.snippets.retrieval().context_k),
            })
            .await?;

        let focus = match kind {
            DocumentKind::StyleGuide => focus.map(str::trim).filter(|f| !f.is_empty()),
            DocumentKind::Wiki => None,
        };

        let request = RunRequest {
            agent_name: kind.agent_name().to_string(),
            instructions: kind.instructions().to_string(),
            message: render_message(&project, focus, &context),
            tools: self.tools.infos(),
        };

        // Agent-side tools stay in this project and cannot reach back into authoring.
        let ctx = ToolContext::for_project(self.snippets.clone(), project.clone());
        let outcome = run_agent(
            self.service.as_ref(),
            &self.tools,
            &ctx,
            &request,
            &self.options,
        )
        .await?;

        tracing::info!(
            kind = ?kind,
            %project,
            context = context.len(),
            tool_calls = outcome.tool_calls,
            "authored document"
        );

        Ok(AuthoredDocument {
            kind,
            project,
            content: outcome.text,
            context_snippets: context.len(),
            tool_calls: outcome.tool_calls,
        })
    }
}

/// Render the opening user message.
fn render_message(project: &str, focus: Option<&str>, context: &[SnippetMatch]) -> String {
    let mut message = format!("Project: {}\n", project);
    if let Some(focus) = focus {
        message.push_str(&format!("Focus: {}\n", focus));
    }
    message.push('\n');

    if context.is_empty() {
        message.push_str(
            "No snippets were found for this project. Use search_snippets to look for more; \
             if none exist, say so briefly.\n",
        );
        return message;
    }

    message.push_str(&format!("{} relevant snippets:\n", context.len()));
    for hit in context {
        message.push_str(&format!(
            "\n### {} (similarity {:.3})\n```\n{}\n```\n",
            hit.snippet.name, hit.score, hit.snippet.content
        ));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use snippy_core::models::SnippetView;

    fn hit(name: &str, content: &str, score: f64) -> SnippetMatch {
        SnippetMatch {
            snippet: SnippetView {
                name: name.into(),
                project: "p".into(),
                content: content.into(),
                created_at: String::new(),
                updated_at: String::new(),
            },
            score,
        }
    }

    #[test]
    fn test_render_message_lists_snippets() {
        let msg = render_message("p", Some("errors"), &[hit("auth", "fn login() {}", 0.91234)]);
        assert!(msg.starts_with("Project: p\nFocus: errors\n"));
        assert!(msg.contains("### auth (similarity 0.912)"));
        assert!(msg.contains("fn login() {}"));
    }

    #[test]
    fn test_render_message_empty_project() {
        let msg = render_message("p", None, &[]);
        assert!(msg.contains("No snippets were found"));
    }

    #[test]
    fn test_kinds_differ() {
        assert_ne!(
            DocumentKind::Wiki.instructions(),
            DocumentKind::StyleGuide.instructions()
        );
        assert_eq!(
            serde_json::to_value(DocumentKind::StyleGuide).unwrap(),
            "style_guide"
        );
    }
}
