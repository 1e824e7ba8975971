//! CLI entry points. Each function builds an [`App`], runs one operation,
//! and prints the result to stdout.

use anyhow::{Context, Result};
use std::path::Path;

use snippy_core::models::resolve_project;

use crate::app::App;
use crate::authoring::DocumentKind;
use crate::config::Config;
use crate::snippets::{SaveRequest, SearchRequest};
use crate::traits::ToolRegistry;

pub async fn run_save(
    config: &Config,
    name: &str,
    project: Option<String>,
    content: Option<String>,
    file: Option<&Path>,
) -> Result<()> {
    let content = match (content, file) {
        (Some(c), _) => c,
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snippet file: {}", path.display()))?,
        (None, None) => anyhow::bail!("provide the snippet with --content or --file"),
    };

    let app = App::from_config(config).await?;
    let saved = app
        .snippets
        .save(SaveRequest {
            name: name.to_string(),
            project,
            content,
        })
        .await?;

    println!(
        "saved {} in {} ({} bytes)",
        saved.name,
        saved.project,
        saved.content.len()
    );
    Ok(())
}

pub async fn run_get(config: &Config, name: &str, project: Option<String>) -> Result<()> {
    let app = App::from_config(config).await?;
    let snippet = app.snippets.get(name, project.as_deref()).await?;

    println!("--- Snippet ---");
    println!("name:       {}", snippet.name);
    println!("project:    {}", snippet.project);
    println!("created_at: {}", snippet.created_at);
    println!("updated_at: {}", snippet.updated_at);
    println!();
    println!("{}", snippet.content);
    Ok(())
}

pub async fn run_list(config: &Config, project: Option<String>) -> Result<()> {
    let app = App::from_config(config).await?;
    let names = app.snippets.list(project.as_deref()).await?;

    if names.is_empty() {
        println!("No snippets in {}.", resolve_project(project.as_deref()));
        return Ok(());
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

pub async fn run_search(
    config: &Config,
    query: &str,
    project: Option<String>,
    k: Option<usize>,
) -> Result<()> {
    let app = App::from_config(config).await?;
    let results = app
        .snippets
        .search(SearchRequest {
            query: query.to_string(),
            project,
            k,
        })
        .await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in results.iter().enumerate() {
        println!("{}. [{:.3}] {}", i + 1, hit.score, hit.snippet.name);
        let preview: String = hit.snippet.content.lines().take(3).collect::<Vec<_>>().join("\n    ");
        println!("    {}", preview);
    }
    Ok(())
}

pub async fn run_author(
    config: &Config,
    kind: DocumentKind,
    project: Option<String>,
    focus: Option<String>,
) -> Result<()> {
    let app = App::from_config(config).await?;
    let authoring = app
        .authoring
        .as_ref()
        .ok_or(snippy_core::SnippetError::AgentDisabled)?;
    let doc = authoring
        .generate(kind, project.as_deref(), focus.as_deref())
        .await?;
    println!("{}", doc.content);
    Ok(())
}

/// Prints the declared tools and their argument schemas. Needs no config.
pub fn run_tools() -> Result<()> {
    let registry = ToolRegistry::with_builtins();
    for info in registry.infos() {
        println!("{} — {}", info.name, info.description);
        println!("{}", serde_json::to_string_pretty(&info.parameters)?);
        println!();
    }
    Ok(())
}
