//! Core data models for snippets.
//!
//! A [`Snippet`] is addressed by `(project, name)`. Its embedding is always
//! derived from `content` by the configured embedding provider when the
//! snippet is written and is never accepted from callers.

use serde::Serialize;

use crate::error::SnippetError;

/// Project id used when a caller omits one.
pub const DEFAULT_PROJECT: &str = "default-project";

/// A stored snippet, including its embedding vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Snippet {
    pub name: String,
    pub project: String,
    pub content: String,
    pub embedding: Vec<f32>,
    /// Unix seconds of the first save under this key.
    pub created_at: i64,
    /// Unix seconds of the latest save under this key.
    pub updated_at: i64,
}

/// Serializable view of a snippet, without its vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnippetView {
    pub name: String,
    pub project: String,
    pub content: String,
    pub created_at: String, // ISO8601
    pub updated_at: String, // ISO8601
}

/// A similarity search hit.
#[derive(Debug, Clone, Serialize)]
pub struct SnippetMatch {
    #[serde(flatten)]
    pub snippet: SnippetView,
    /// Cosine similarity between the query and the snippet embedding.
    pub score: f64,
}

impl From<&Snippet> for SnippetView {
    fn from(s: &Snippet) -> Self {
        Self {
            name: s.name.clone(),
            project: s.project.clone(),
            content: s.content.clone(),
            created_at: format_ts_iso(s.created_at),
            updated_at: format_ts_iso(s.updated_at),
        }
    }
}

/// Resolves an optional project id, falling back to [`DEFAULT_PROJECT`]
/// for `None` and for blank strings.
pub fn resolve_project(project: Option<&str>) -> String {
    match project.map(str::trim) {
        Some(p) if !p.is_empty() => p.to_string(),
        _ => DEFAULT_PROJECT.to_string(),
    }
}

/// Checks that a required text field is present and not blank.
pub fn require_text(field: &str, value: &str) -> Result<(), SnippetError> {
    if value.trim().is_empty() {
        return Err(SnippetError::Validation(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(())
}

pub fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_project_defaults() {
        assert_eq!(resolve_project(None), DEFAULT_PROJECT);
        assert_eq!(resolve_project(Some("   ")), DEFAULT_PROJECT);
        assert_eq!(resolve_project(Some(" api ")), "api");
    }

    #[test]
    fn test_require_text() {
        assert!(require_text("name", "x").is_ok());
        let err = require_text("content", " \n").unwrap_err();
        assert_eq!(err.to_string(), "invalid input: content must not be empty");
    }

    #[test]
    fn test_view_formats_timestamps() {
        let s = Snippet {
            name: "n".into(),
            project: "p".into(),
            content: "c".into(),
            embedding: vec![1.0],
            created_at: 0,
            updated_at: 86_400,
        };
        let v = SnippetView::from(&s);
        assert_eq!(v.created_at, "1970-01-01T00:00:00Z");
        assert_eq!(v.updated_at, "1970-01-02T00:00:00Z");
    }
}
