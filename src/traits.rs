//! The tool surface: [`Tool`] trait, [`ToolContext`], and [`ToolRegistry`].
//!
//! Every operation an AI assistant can call is a [`Tool`] with a name, a
//! one-line description, and an OpenAI function-calling JSON Schema for
//! its arguments. The same registry backs `GET /tools/list`,
//! `POST /tools/{name}`, the MCP bridge, and the tool calls relayed from
//! agent runs.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    ToolRegistry                      │
//! │  save_snippet · get_snippet · search_snippets        │
//! │  generate_wiki · generate_style_guide                │
//! └──────────────┬───────────────────────┬───────────────┘
//!                ▼                       ▼
//!       HTTP /tools + MCP        agent run tool relay
//! ```
//!
//! Arguments are validated only against the declared schema (see
//! [`validate_params`]); the operations behind each tool apply their own
//! checks on top.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use snippy_core::error::SnippetError;

use crate::authoring::{Authoring, DocumentKind};
use crate::snippets::{SaveRequest, SearchRequest, SnippetService};

// ═══════════════════════════════════════════════════════════════════════
// Tool Trait
// ═══════════════════════════════════════════════════════════════════════

/// A callable operation exposed to AI assistants.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Lowercase identifier with underscores, used as the route path
    /// (`POST /tools/{name}`) and the MCP tool name.
    fn name(&self) -> &str;

    /// One-line description for agent discovery.
    fn description(&self) -> &str;

    /// JSON Schema (`type: "object"`) describing the arguments.
    fn parameters_schema(&self) -> Value;

    /// Whether the tool only reads state. Reported as an MCP annotation.
    fn read_only(&self) -> bool {
        true
    }

    /// Execute with schema-validated parameters.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Serializable tool info for the `/tools/list` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolInfo {
    pub fn of(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters_schema(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// ToolContext
// ═══════════════════════════════════════════════════════════════════════

/// Handles a tool needs while executing.
///
/// Cheap to clone; built once per server and shared by every call. A
/// context built with [`ToolContext::for_project`] resolves calls that
/// omit `project` to that project instead of the default one.
#[derive(Clone)]
pub struct ToolContext {
    snippets: Arc<SnippetService>,
    authoring: Option<Arc<Authoring>>,
    project: Option<String>,
}

impl ToolContext {
    pub fn new(snippets: Arc<SnippetService>, authoring: Option<Arc<Authoring>>) -> Self {
        Self {
            snippets,
            authoring,
            project: None,
        }
    }

    /// A context for agent runs: no authoring, and `project` pinned.
    pub fn for_project(snippets: Arc<SnippetService>, project: impl Into<String>) -> Self {
        Self {
            snippets,
            authoring: None,
            project: Some(project.into()),
        }
    }

    /// The project a call targets: its own `project` argument if given and
    /// non-blank, else the pinned project.
    pub fn project<'a>(&'a self, params: &'a Value) -> Option<&'a str> {
        str_param(params, "project")
            .filter(|p| !p.trim().is_empty())
            .or(self.project.as_deref())
    }

    pub fn snippets(&self) -> &SnippetService {
        &self.snippets
    }

    /// The authoring service, or [`SnippetError::AgentDisabled`].
    pub fn authoring(&self) -> Result<&Authoring> {
        self.authoring
            .as_deref()
            .ok_or_else(|| SnippetError::AgentDisabled.into())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Parameter validation
// ═══════════════════════════════════════════════════════════════════════

/// Validate tool parameters against a JSON Schema.
///
/// Checks that required fields are present and that each supplied
/// property has the declared primitive type; injects `default` values for
/// absent properties. Returns the validated (possibly augmented) object.
/// Failures are [`SnippetError::Validation`].
pub fn validate_params(schema: &Value, params: &Value) -> Result<Value> {
    let params_obj = match params {
        Value::Object(map) => map.clone(),
        Value::Null => serde_json::Map::new(),
        other => {
            return Err(SnippetError::Validation(format!(
                "parameters must be an object, got {}",
                json_type_name(other)
            ))
            .into())
        }
    };

    let properties = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .cloned()
        .unwrap_or_default();

    let required: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    for field in &required {
        if params_obj.get(*field).map_or(true, Value::is_null) {
            return Err(
                SnippetError::Validation(format!("missing required parameter: {}", field)).into(),
            );
        }
    }

    let mut result = params_obj.clone();

    for (prop_name, prop_schema) in &properties {
        match params_obj.get(prop_name) {
            Some(Value::Null) | None => {
                if let Some(default) = prop_schema.get("default") {
                    result.insert(prop_name.clone(), default.clone());
                }
            }
            Some(value) => {
                if let Some(expected) = prop_schema.get("type").and_then(|t| t.as_str()) {
                    let type_ok = match expected {
                        "string" => value.is_string(),
                        "integer" => value.is_i64() || value.is_u64(),
                        "number" => value.is_number(),
                        "boolean" => value.is_boolean(),
                        "array" => value.is_array(),
                        "object" => value.is_object(),
                        _ => true,
                    };
                    if !type_ok {
                        return Err(SnippetError::Validation(format!(
                            "parameter '{}' must be of type '{}', got {}",
                            prop_name,
                            expected,
                            json_type_name(value)
                        ))
                        .into());
                    }
                }
            }
        }
    }

    Ok(Value::Object(result))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn str_param<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in tools
// ═══════════════════════════════════════════════════════════════════════

/// Saves a snippet. Delegates to [`SnippetService::save`].
pub struct SaveSnippetTool;

#[async_trait]
impl Tool for SaveSnippetTool {
    fn name(&self) -> &str {
        "save_snippet"
    }

    fn description(&self) -> &str {
        "Save a named code snippet to a project, replacing any snippet with the same name"
    }

    fn read_only(&self) -> bool {
        false
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Unique snippet name within the project" },
                "project": { "type": "string", "description": "Project id; defaults to the current project, or 'default-project'" },
                "content": { "type": "string", "description": "The code text to store" }
            },
            "required": ["name", "content"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let mut req: SaveRequest = serde_json::from_value(params.clone())
            .map_err(|e| SnippetError::Validation(e.to_string()))?;
        req.project = ctx.project(&params).map(str::to_string);
        let saved = ctx.snippets().save(req).await?;
        Ok(serde_json::to_value(saved)?)
    }
}

/// Fetches a snippet by name. Delegates to [`SnippetService::get`].
pub struct GetSnippetTool;

#[async_trait]
impl Tool for GetSnippetTool {
    fn name(&self) -> &str {
        "get_snippet"
    }

    fn description(&self) -> &str {
        "Retrieve a saved code snippet by name"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Snippet name" },
                "project": { "type": "string", "description": "Project id; defaults to the current project, or 'default-project'" }
            },
            "required": ["name"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let name = str_param(&params, "name").unwrap_or("");
        let found = ctx
            .snippets()
            .get(name, ctx.project(&params))
            .await?;
        Ok(serde_json::to_value(found)?)
    }
}

/// Similarity search over a project. Delegates to [`SnippetService::search`].
///
/// This is also the tool declared to agent runs.
pub struct SearchSnippetsTool;

#[async_trait]
impl Tool for SearchSnippetsTool {
    fn name(&self) -> &str {
        "search_snippets"
    }

    fn description(&self) -> &str {
        "Find the snippets in a project most similar to a natural-language or code query"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Text to compare snippets against" },
                "project": { "type": "string", "description": "Project id; defaults to the current project, or 'default-project'" },
                "k": { "type": "integer", "description": "Maximum number of results" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let mut req: SearchRequest = serde_json::from_value(params.clone())
            .map_err(|e| SnippetError::Validation(e.to_string()))?;
        req.project = ctx.project(&params).map(str::to_string);
        let results = ctx.snippets().search(req).await?;
        Ok(json!({ "results": results }))
    }
}

/// Generates a project wiki through the agent service.
pub struct GenerateWikiTool;

#[async_trait]
impl Tool for GenerateWikiTool {
    fn name(&self) -> &str {
        "generate_wiki"
    }

    fn description(&self) -> &str {
        "Write a Markdown wiki describing a project's snippets"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "project": { "type": "string", "description": "Project id; defaults to the current project, or 'default-project'" }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let doc = ctx
            .authoring()?
            .generate(DocumentKind::Wiki, ctx.project(&params), None)
            .await?;
        Ok(serde_json::to_value(doc)?)
    }
}

/// Generates a code style guide through the agent service.
pub struct GenerateStyleGuideTool;

#[async_trait]
impl Tool for GenerateStyleGuideTool {
    fn name(&self) -> &str {
        "generate_style_guide"
    }

    fn description(&self) -> &str {
        "Write a code style guide inferred from a project's snippets"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "project": { "type": "string", "description": "Project id; defaults to the current project, or 'default-project'" },
                "focus": { "type": "string", "description": "Optional topic the guide should emphasise" }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let doc = ctx
            .authoring()?
            .generate(
                DocumentKind::StyleGuide,
                ctx.project(&params),
                str_param(&params, "focus"),
            )
            .await?;
        Ok(serde_json::to_value(doc)?)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Ordered collection of tools, looked up by name.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// All five built-in tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SaveSnippetTool));
        registry.register(Box::new(GetSnippetTool));
        registry.register(Box::new(SearchSnippetsTool));
        registry.register(Box::new(GenerateWikiTool));
        registry.register(Box::new(GenerateStyleGuideTool));
        registry
    }

    /// The tools an authoring agent may call back into.
    pub fn for_agents() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SearchSnippetsTool));
        registry.register(Box::new(GetSnippetTool));
        registry
    }

    /// Register a tool. A later registration with an existing name is
    /// rejected.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        if self.find(tool.name()).is_some() {
            tracing::warn!(tool = tool.name(), "duplicate tool name ignored");
            return;
        }
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn infos(&self) -> Vec<ToolInfo> {
        self.tools.iter().map(|t| ToolInfo::of(t.as_ref())).collect()
    }

    /// Validate `params` against the named tool's schema and execute it.
    pub async fn call(&self, name: &str, params: Value, ctx: &ToolContext) -> Result<Value> {
        let tool = match self.find(name) {
            Some(t) => t,
            None => bail!(SnippetError::NotFound(format!("no tool registered with name: {}", name))),
        };
        let validated = validate_params(&tool.parameters_schema(), &params)?;
        tracing::debug!(tool = name, "executing tool");
        tool.execute(validated, ctx).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snippy_core::error::classify;

    #[test]
    fn test_validate_missing_required() {
        let schema = SaveSnippetTool.parameters_schema();
        let err = validate_params(&schema, &json!({ "name": "x" })).unwrap_err();
        assert!(err.to_string().contains("missing required parameter: content"));
        assert!(matches!(classify(&err), Some(SnippetError::Validation(_))));
    }

    #[test]
    fn test_validate_type_mismatch() {
        let schema = SearchSnippetsTool.parameters_schema();
        let err = validate_params(&schema, &json!({ "query": "q", "k": "five" })).unwrap_err();
        assert!(err.to_string().contains("'k' must be of type 'integer'"));
    }

    #[test]
    fn test_validate_null_params_is_empty_object() {
        let schema = GenerateWikiTool.parameters_schema();
        assert_eq!(validate_params(&schema, &Value::Null).unwrap(), json!({}));
    }

    #[test]
    fn test_validate_injects_defaults() {
        let schema = json!({
            "type": "object",
            "properties": { "k": { "type": "integer", "default": 3 } }
        });
        assert_eq!(validate_params(&schema, &json!({})).unwrap(), json!({ "k": 3 }));
    }

    #[test]
    fn test_registry_names_unique_and_ordered() {
        let mut registry = ToolRegistry::with_builtins();
        registry.register(Box::new(SaveSnippetTool));
        let names: Vec<&str> = registry.tools().iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            vec![
                "save_snippet",
                "get_snippet",
                "search_snippets",
                "generate_wiki",
                "generate_style_guide"
            ]
        );
    }

    #[test]
    fn test_save_schema_matches_request() {
        let schema = SaveSnippetTool.parameters_schema();
        let mut props: Vec<&str> = schema["properties"]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        props.sort();
        assert_eq!(props, vec!["content", "name", "project"]);
        assert_eq!(schema["required"], json!(["name", "content"]));

        // The minimal valid arguments deserialize into the request type.
        let args = validate_params(&schema, &json!({ "name": "a", "content": "b" })).unwrap();
        let req: SaveRequest = serde_json::from_value(args).unwrap();
        assert!(req.project.is_none());
    }

    #[test]
    fn test_agent_tools_are_read_only() {
        let registry = ToolRegistry::for_agents();
        assert!(registry.tools().iter().all(|t| t.read_only()));
        assert!(registry.find("save_snippet").is_none());
    }
}
