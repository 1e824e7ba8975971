//! # Snippy Core
//!
//! Runtime-free logic shared by the Snippy application: snippet models,
//! the domain error kinds, the embedding provider trait with vector
//! utilities, and the [`store::SnippetStore`] abstraction.
//!
//! This crate contains no tokio, sqlx, or HTTP dependencies.

pub mod embedding;
pub mod error;
pub mod models;
pub mod store;

pub use error::SnippetError;
pub use models::{Snippet, SnippetMatch, SnippetView, DEFAULT_PROJECT};
