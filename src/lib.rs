//! # Snippy
//!
//! **A code-snippet manager for AI tools.**
//!
//! Snippy stores named code snippets per project, derives a vector
//! embedding from each snippet when it is saved, answers exact lookups and
//! cosine-similarity searches, and drives an external agent service to
//! write project wikis and code style guides.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  ┌──────────┐  ┌──────────┐
//! │   CLI    │  │   HTTP   │  │   MCP    │
//! │ (snippy) │  │  (axum)  │  │  (rmcp)  │
//! └────┬─────┘  └────┬─────┘  └────┬─────┘
//!      └─────────────┼─────────────┘
//!                    ▼
//!     ToolRegistry · SnippetService · Authoring
//!          │               │              │
//!          ▼               ▼              ▼
//!   SnippetStore   EmbeddingProvider  AgentService ──┐
//!   (SQLite)       (OpenAI / Azure)   (HTTP)         │
//!                                      ▲ tool calls ─┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | SQLite connection pool with WAL mode |
//! | [`migrate`] | Idempotent schema migrations |
//! | [`sqlite_store`] | SQLite [`store::SnippetStore`] |
//! | [`embedding`] | OpenAI and Azure OpenAI embedding providers |
//! | [`snippets`] | Save, get, list, and similarity search |
//! | [`traits`] | `Tool` trait, `ToolContext`, `ToolRegistry`, built-in tools |
//! | [`agent_service`] | Agent-execution service client |
//! | [`agent_run`] | Run loop: poll, relay tool calls, collect result |
//! | [`authoring`] | Wiki and style-guide generation |
//! | [`app`] | Component wiring |
//! | [`server`] | HTTP routes and MCP endpoint |
//! | [`mcp`] | MCP protocol bridge |
//! | [`cli`] | CLI command implementations |

pub mod agent_run;
pub mod agent_service;
pub mod app;
pub mod authoring;
pub mod cli;
pub mod config;
pub mod db;
pub mod embedding;
pub mod mcp;
pub mod migrate;
pub mod server;
pub mod snippets;
pub mod sqlite_store;
pub mod traits;

pub use app::App;
pub use snippy_core::{models, store, SnippetError};
pub use traits::{Tool, ToolContext, ToolRegistry};
