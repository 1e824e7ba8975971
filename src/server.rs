//! HTTP server.
//!
//! Exposes snippet operations as a JSON REST API, the tool registry as
//! `/tools/*`, and an MCP Streamable HTTP endpoint at `/mcp`.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/snippets` | Save a snippet (`201`) |
//! | `GET`  | `/api/snippets` | List names in `?project=` |
//! | `GET`  | `/api/snippets/{name}` | Fetch a snippet (`?project=`) |
//! | `POST` | `/api/snippets/search` | Similarity search |
//! | `GET`  | `/api/snippets/search` | Fetch the snippet named `search` |
//! | `POST` | `/api/wiki` | Generate a project wiki |
//! | `POST` | `/api/style-guide` | Generate a code style guide |
//! | `GET`  | `/tools/list` | List tools with schemas |
//! | `POST` | `/tools/{name}` | Call a tool by name |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `*`    | `/mcp` | MCP JSON-RPC over Streamable HTTP |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "not found: snippet 'x' in project 'default-project'" } }
//! ```
//!
//! | Code | Status |
//! |------|--------|
//! | `bad_request` | 400 |
//! | `agent_disabled` | 400 |
//! | `not_found` | 404 |
//! | `upstream_error` | 502 |
//! | `timeout` | 504 |
//! | `internal` | 500 |

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use snippy_core::error::{classify, SnippetError};
use snippy_core::models::{resolve_project, SnippetView};

use crate::app::App;
use crate::authoring::{AuthoredDocument, DocumentKind};
use crate::config::Config;
use crate::mcp::McpBridge;
use crate::snippets::{SaveRequest, SearchRequest};
use crate::traits::ToolInfo;

/// Starts the server on `[server].bind` and runs until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let app = App::from_config(config).await?;
    let bind_addr = app.config.server.bind.clone();
    let router = build_router(app);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "snippy server listening");
    axum::serve(listener, router).await?;

    Ok(())
}

/// Builds the full router for an [`App`].
pub fn build_router(app: App) -> Router {
    let bridge = McpBridge::new(app.clone());
    let mcp_service = StreamableHttpService::new(
        move || Ok(bridge.clone()),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig::default(),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/snippets", post(handle_save).get(handle_list))
        .route(
            "/api/snippets/search",
            post(handle_search).get(handle_get_named_search),
        )
        .route("/api/snippets/{name}", get(handle_get))
        .route("/api/wiki", post(handle_wiki))
        .route("/api/style-guide", post(handle_style_guide))
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/health", get(handle_health))
        .nest_service("/mcp", mcp_service)
        .layer(cors)
        .with_state(app)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        let message = format!("{:#}", err);
        match classify(&err) {
            Some(kind) => {
                let status = match kind {
                    SnippetError::Validation(_) | SnippetError::AgentDisabled => {
                        StatusCode::BAD_REQUEST
                    }
                    SnippetError::NotFound(_) => StatusCode::NOT_FOUND,
                    SnippetError::Upstream(_) => StatusCode::BAD_GATEWAY,
                    SnippetError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                };
                if status.is_server_error() {
                    tracing::warn!(error = %message, "request failed");
                }
                AppError {
                    status,
                    code: kind.code().to_string(),
                    message,
                }
            }
            None => {
                tracing::error!(error = %message, "internal error");
                AppError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "internal".to_string(),
                    message,
                }
            }
        }
    }
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(v)| v)
        .map_err(|rejection| bad_request(rejection.body_text()))
}

// ============ Snippet routes ============

#[derive(Debug, Deserialize)]
struct ProjectQuery {
    project: Option<String>,
}

async fn handle_save(
    State(app): State<App>,
    body: Result<Json<SaveRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SnippetView>), AppError> {
    let req = json_body(body)?;
    let saved = app.snippets.save(req).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

async fn handle_get(
    State(app): State<App>,
    Path(name): Path<String>,
    Query(query): Query<ProjectQuery>,
) -> Result<Json<SnippetView>, AppError> {
    let found = app.snippets.get(&name, query.project.as_deref()).await?;
    Ok(Json(found))
}

/// `GET /api/snippets/search` fetches the snippet literally named `search`,
/// which the static search route would otherwise shadow.
async fn handle_get_named_search(
    state: State<App>,
    query: Query<ProjectQuery>,
) -> Result<Json<SnippetView>, AppError> {
    handle_get(state, Path("search".to_string()), query).await
}

#[derive(Serialize)]
struct ListResponse {
    project: String,
    names: Vec<String>,
}

async fn handle_list(
    State(app): State<App>,
    Query(query): Query<ProjectQuery>,
) -> Result<Json<ListResponse>, AppError> {
    let names = app.snippets.list(query.project.as_deref()).await?;
    Ok(Json(ListResponse {
        project: resolve_project(query.project.as_deref()),
        names,
    }))
}

async fn handle_search(
    State(app): State<App>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let req = json_body(body)?;
    let results = app.snippets.search(req).await?;
    Ok(Json(serde_json::json!({ "results": results })))
}

// ============ Authoring routes ============

#[derive(Debug, Default, Deserialize)]
struct AuthorBody {
    #[serde(default)]
    project: Option<String>,
    #[serde(default)]
    focus: Option<String>,
}

/// Parses an optional JSON body; an empty body means all defaults.
fn author_body(bytes: &Bytes) -> Result<AuthorBody, AppError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(AuthorBody::default());
    }
    serde_json::from_slice(bytes).map_err(|e| bad_request(format!("invalid JSON body: {}", e)))
}

async fn author(app: &App, kind: DocumentKind, bytes: Bytes) -> Result<Json<AuthoredDocument>, AppError> {
    let body = author_body(&bytes)?;
    let authoring = app
        .authoring
        .as_ref()
        .ok_or_else(|| AppError::from(anyhow::Error::from(SnippetError::AgentDisabled)))?;
    let doc = authoring
        .generate(kind, body.project.as_deref(), body.focus.as_deref())
        .await?;
    Ok(Json(doc))
}

async fn handle_wiki(
    State(app): State<App>,
    bytes: Bytes,
) -> Result<Json<AuthoredDocument>, AppError> {
    author(&app, DocumentKind::Wiki, bytes).await
}

async fn handle_style_guide(
    State(app): State<App>,
    bytes: Bytes,
) -> Result<Json<AuthoredDocument>, AppError> {
    author(&app, DocumentKind::StyleGuide, bytes).await
}

// ============ Tool routes ============

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(app): State<App>) -> Json<ToolListResponse> {
    Json(ToolListResponse {
        tools: app.tools.infos(),
    })
}

/// Unified tool dispatch: validates parameters against the tool's schema
/// and wraps the output as `{ "result": ... }`.
async fn handle_tool_call(
    State(app): State<App>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let params: Value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).map_err(|e| bad_request(format!("invalid JSON body: {}", e)))?
    };
    let ctx = app.tool_context();
    let result = app.tools.call(&name, params, &ctx).await?;
    Ok(Json(serde_json::json!({ "result": result })))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
