//! Snippet behaviour exercised against both store backends.

mod common;

use std::sync::Arc;
use tempfile::TempDir;

use snippy::config::{Config, RetrievalConfig};
use snippy::snippets::{SaveRequest, SearchRequest, SnippetService};
use snippy::sqlite_store::SqliteStore;
use snippy::store::memory::InMemoryStore;
use snippy::store::SnippetStore;
use snippy::{db, migrate};
use snippy_core::error::{classify, SnippetError};

use common::{BagOfWordsEmbedder, FailingEmbedder};

async fn sqlite_store() -> (TempDir, Arc<dyn SnippetStore>) {
    let tmp = TempDir::new().unwrap();
    let config = Config::minimal(tmp.path().join("data/snippy.sqlite"));
    let pool = db::connect(&config).await.unwrap();
    migrate::migrate_pool(&pool).await.unwrap();
    (tmp, Arc::new(SqliteStore::new(pool)))
}

fn service(store: Arc<dyn SnippetStore>) -> SnippetService {
    SnippetService::new(store, Arc::new(BagOfWordsEmbedder), RetrievalConfig::default())
}

fn save(name: &str, project: Option<&str>, content: &str) -> SaveRequest {
    SaveRequest {
        name: name.to_string(),
        project: project.map(str::to_string),
        content: content.to_string(),
    }
}

fn search(query: &str, project: Option<&str>, k: Option<usize>) -> SearchRequest {
    SearchRequest {
        query: query.to_string(),
        project: project.map(str::to_string),
        k,
    }
}

async fn check_save_then_get(svc: &SnippetService) {
    let saved = svc
        .save(save("parse_args", Some("cli"), "fn parse_args() {}"))
        .await
        .unwrap();
    assert_eq!(saved.project, "cli");

    let got = svc.get("parse_args", Some("cli")).await.unwrap();
    assert_eq!(got.content, "fn parse_args() {}");
    assert_eq!(got.name, "parse_args");
}

async fn check_resave_replaces(svc: &SnippetService) {
    svc.save(save("retry", None, "loop { try_once() }")).await.unwrap();
    let first = svc.get("retry", None).await.unwrap();
    svc.save(save("retry", None, "for _ in 0..3 { try_once() }"))
        .await
        .unwrap();

    let second = svc.get("retry", None).await.unwrap();
    assert_eq!(second.content, "for _ in 0..3 { try_once() }");
    assert_eq!(second.created_at, first.created_at);
    assert_eq!(svc.list(None).await.unwrap(), vec!["retry".to_string()]);
}

async fn check_projects_are_isolated(svc: &SnippetService) {
    svc.save(save("handler", Some("alpha"), "async fn handler() -> Json<Value>"))
        .await
        .unwrap();
    svc.save(save("handler", Some("beta"), "def handler(request): pass"))
        .await
        .unwrap();

    let alpha = svc.get("handler", Some("alpha")).await.unwrap();
    assert!(alpha.content.contains("async fn"));

    let hits = svc.search(search("handler", Some("beta"), None)).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].snippet.project, "beta");

    let err = svc.get("handler", Some("gamma")).await.unwrap_err();
    assert!(matches!(classify(&err), Some(SnippetError::NotFound(_))));
}

async fn check_search_ranks_by_similarity(svc: &SnippetService) {
    svc.save(save("open_db", Some("ranking"), "open sqlite database connection pool"))
        .await
        .unwrap();
    svc.save(save("render", Some("ranking"), "render html template page"))
        .await
        .unwrap();
    svc.save(save("close_db", Some("ranking"), "close database connection"))
        .await
        .unwrap();

    let hits = svc
        .search(search("database connection pool", Some("ranking"), Some(2)))
        .await
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].snippet.name, "open_db");
    assert!(hits[0].score >= hits[1].score);
    assert!(hits.iter().all(|h| h.snippet.name != "render"));
}

async fn check_empty_project_search(svc: &SnippetService) {
    let hits = svc
        .search(search("anything at all", Some("nobody-home"), None))
        .await
        .unwrap();
    assert!(hits.is_empty());
}

async fn run_all(svc: SnippetService) {
    check_save_then_get(&svc).await;
    check_resave_replaces(&svc).await;
    check_projects_are_isolated(&svc).await;
    check_search_ranks_by_similarity(&svc).await;
    check_empty_project_search(&svc).await;
}

#[tokio::test]
async fn test_snippets_in_memory() {
    run_all(service(Arc::new(InMemoryStore::new()))).await;
}

#[tokio::test]
async fn test_snippets_sqlite() {
    let (_tmp, store) = sqlite_store().await;
    run_all(service(store)).await;
}

#[tokio::test]
async fn test_sqlite_persists_across_pools() {
    let tmp = TempDir::new().unwrap();
    let config = Config::minimal(tmp.path().join("snippy.sqlite"));

    {
        let pool = db::connect(&config).await.unwrap();
        migrate::migrate_pool(&pool).await.unwrap();
        let svc = service(Arc::new(SqliteStore::new(pool.clone())));
        svc.save(save("kept", None, "struct Kept;")).await.unwrap();
        pool.close().await;
    }

    let pool = db::connect(&config).await.unwrap();
    migrate::migrate_pool(&pool).await.unwrap();
    let svc = service(Arc::new(SqliteStore::new(pool)));
    assert_eq!(svc.get("kept", None).await.unwrap().content, "struct Kept;");
}

#[tokio::test]
async fn test_failed_embedding_writes_nothing() {
    let store = Arc::new(InMemoryStore::new());
    let svc = SnippetService::new(
        store.clone(),
        Arc::new(FailingEmbedder),
        RetrievalConfig::default(),
    );

    let err = svc.save(save("x", None, "fn x() {}")).await.unwrap_err();
    assert!(matches!(classify(&err), Some(SnippetError::Upstream(_))));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_blank_fields_rejected() {
    let svc = service(Arc::new(InMemoryStore::new()));

    let err = svc.save(save("  ", None, "body")).await.unwrap_err();
    assert!(matches!(classify(&err), Some(SnippetError::Validation(_))));

    let err = svc.save(save("name", None, "")).await.unwrap_err();
    assert!(matches!(classify(&err), Some(SnippetError::Validation(_))));

    let err = svc.search(search("   ", None, None)).await.unwrap_err();
    assert!(matches!(classify(&err), Some(SnippetError::Validation(_))));
}
