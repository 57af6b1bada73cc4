//! Integration tests for the search proxy HTTP server.
//!
//! The proxy is served on a real local port over an in-memory index and
//! exercised with `reqwest`, including its CORS and error contract.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use hackathon_search::config::Config;
use hackathon_search::core::index::memory::InMemoryIndex;
use hackathon_search::core::index::{IndexSpec, SearchQuery, VectorIndex};
use hackathon_search::core::models::{build_records, CleanProject, IndexRecord, SearchHit};
use hackathon_search::server::{router, AppState};

/// An index whose every call fails, standing in for an unreachable provider.
struct DownIndex;

#[async_trait]
impl VectorIndex for DownIndex {
    async fn list_indexes(&self) -> Result<Vec<String>> {
        bail!("connection refused")
    }
    async fn create_index_for_model(&self, _spec: &IndexSpec) -> Result<()> {
        bail!("connection refused")
    }
    async fn upsert_records(&self, _namespace: &str, _records: &[IndexRecord]) -> Result<()> {
        bail!("connection refused")
    }
    async fn search_records(&self, _namespace: &str, _query: &SearchQuery) -> Result<Vec<SearchHit>> {
        bail!("connection refused")
    }
}

async fn seeded_index() -> InMemoryIndex {
    let index = InMemoryIndex::new();
    let projects = vec![
        CleanProject {
            title: "MedAI".into(),
            caption: "AI healthcare triage".into(),
            description: "Ranks incoming patients by urgency.".into(),
            url: "https://devpost.com/software/medai".into(),
            tech_used: vec!["python".into()],
            hackathon: "HackMIT".into(),
            ..Default::default()
        },
        CleanProject {
            title: "FarmBot".into(),
            caption: "Soil sensors".into(),
            description: "Irrigation scheduling.".into(),
            ..Default::default()
        },
        CleanProject {
            title: "CareLink".into(),
            caption: "Healthcare scheduling".into(),
            description: "Shift planning for nurses.".into(),
            ..Default::default()
        },
    ];
    index
        .upsert_records("projects", &build_records(&projects))
        .await
        .unwrap();
    index
}

async fn start_proxy(index: Arc<dyn VectorIndex>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let app = router(AppState::new(Arc::new(Config::default()), index));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    base
}

async fn post(base: &str, path: &str, body: &str) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{}{}", base, path))
        .header("Origin", "https://example.com")
        .header("Content-Type", "application/json")
        .body(body.to_string())
        .send()
        .await
        .unwrap()
}

fn allow_origin(resp: &reqwest::Response) -> Option<String> {
    resp.headers()
        .get("access-control-allow-origin")
        .map(|v| v.to_str().unwrap().to_string())
}

#[tokio::test]
async fn search_returns_flat_projects() {
    let base = start_proxy(Arc::new(seeded_index().await)).await;

    let resp = post(&base, "/search", r#"{"query": "AI healthcare"}"#).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(allow_origin(&resp).as_deref(), Some("*"));

    let body: Value = resp.json().await.unwrap();
    let projects = body["projects"].as_array().unwrap();
    assert_eq!(projects.len(), 2);
    assert_eq!(projects[0]["_id"], "project-0");
    assert_eq!(projects[0]["title"], "MedAI");
    assert_eq!(projects[0]["url"], "https://devpost.com/software/medai");
    assert_eq!(projects[0]["techUsed"], json!(["python"]));
    assert_eq!(projects[1]["_id"], "project-2");
    for p in projects {
        assert!(p.get("fields").is_none());
        assert!(p.get("_score").is_none());
    }
}

#[tokio::test]
async fn root_path_behaves_like_search() {
    let base = start_proxy(Arc::new(seeded_index().await)).await;

    let a: Value = post(&base, "/", r#"{"query": "soil"}"#)
        .await
        .json()
        .await
        .unwrap();
    let b: Value = post(&base, "/search", r#"{"query": "soil"}"#)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(a, b);
    assert_eq!(a["projects"][0]["title"], "FarmBot");
}

#[tokio::test]
async fn empty_query_is_rejected_with_cors() {
    let base = start_proxy(Arc::new(seeded_index().await)).await;

    for body in ["", "{}", r#"{"query": "   "}"#, r#"{"query": 7}"#] {
        let resp = post(&base, "/search", body).await;
        assert_eq!(resp.status(), 400, "body {:?}", body);
        assert_eq!(allow_origin(&resp).as_deref(), Some("*"));
        let err: Value = resp.json().await.unwrap();
        assert_eq!(err["error"]["code"], "bad_request");
        assert_eq!(err["error"]["message"], "query must not be empty");
    }
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let base = start_proxy(Arc::new(seeded_index().await)).await;
    let resp = post(&base, "/search", "{\"query\": ").await;
    assert_eq!(resp.status(), 400);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["error"]["code"], "bad_request");
}

#[tokio::test]
async fn upstream_failure_is_bad_gateway() {
    let base = start_proxy(Arc::new(DownIndex)).await;
    let resp = post(&base, "/search", r#"{"query": "anything"}"#).await;
    assert_eq!(resp.status(), 502);
    assert_eq!(allow_origin(&resp).as_deref(), Some("*"));
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["error"]["code"], "upstream_error");
    assert!(err["error"]["message"]
        .as_str()
        .unwrap()
        .contains("connection refused"));
}

#[tokio::test]
async fn preflight_and_health() {
    let base = start_proxy(Arc::new(InMemoryIndex::new())).await;
    let client = reqwest::Client::new();

    let preflight = client
        .request(reqwest::Method::OPTIONS, format!("{}/search", base))
        .header("Origin", "https://example.com")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .send()
        .await
        .unwrap();
    assert!(preflight.status().is_success());
    assert_eq!(allow_origin(&preflight).as_deref(), Some("*"));

    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
}

#[tokio::test]
async fn no_match_is_an_empty_list() {
    let base = start_proxy(Arc::new(seeded_index().await)).await;
    let body: Value = post(&base, "/search", r#"{"query": "blockchain"}"#)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({ "projects": [] }));
}
