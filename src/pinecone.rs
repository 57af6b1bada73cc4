//! Pinecone REST client.
//!
//! Implements [`VectorIndex`] against Pinecone's integrated-embedding
//! ("records") API. Embedding and reranking run on Pinecone's side; this
//! client only moves JSON.
//!
//! # Endpoints
//!
//! | Plane | Method | Path |
//! |-------|--------|------|
//! | control | `GET`  | `/indexes` |
//! | control | `GET`  | `/indexes/{name}` |
//! | control | `POST` | `/indexes/create-for-model` |
//! | data    | `POST` | `/records/namespaces/{ns}/upsert` (NDJSON body) |
//! | data    | `POST` | `/records/namespaces/{ns}/search` |
//!
//! The data-plane host is taken from `pinecone.index_host` when set, and
//! otherwise resolved from the control plane on first use, at most once.
//!
//! Failed calls are not retried: the ingestion driver treats any error as
//! fatal to the run.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::OnceCell;

use hackathon_search_core::index::{IndexSpec, SearchQuery, VectorIndex};
use hackathon_search_core::models::{IndexRecord, SearchHit};

use crate::config::PineconeConfig;
use crate::secrets::ApiKey;

/// Client bound to a single Pinecone index.
pub struct PineconeClient {
    http: reqwest::Client,
    control_plane: String,
    index_name: String,
    index_host: OnceCell<String>,
    ready_timeout: Duration,
    poll_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexDescription>,
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    name: String,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    status: Option<IndexStatus>,
}

#[derive(Debug, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: SearchResult,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

impl PineconeClient {
    /// Build a client for `config.index`, authenticating with `api_key`.
    pub fn new(api_key: &ApiKey, config: &PineconeConfig) -> Result<Self> {
        anyhow::ensure!(
            config.control_plane_url.starts_with("http://")
                || config.control_plane_url.starts_with("https://"),
            "pinecone.control_plane_url must be an http(s) URL"
        );

        let mut headers = HeaderMap::new();
        headers.insert(
            "Api-Key",
            HeaderValue::from_str(api_key.expose()).context("invalid Pinecone API key")?,
        );
        headers.insert(
            "X-Pinecone-API-Version",
            HeaderValue::from_str(&config.api_version).context("invalid Pinecone API version")?,
        );

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .context("failed to build Pinecone HTTP client")?;

        Ok(Self {
            http,
            control_plane: config.control_plane_url.trim_end_matches('/').to_string(),
            index_name: config.index.clone(),
            index_host: OnceCell::new_with(config.index_host.clone()),
            ready_timeout: Duration::from_secs(config.ready_timeout_secs),
            poll_interval: Duration::from_secs(2),
        })
    }

    /// Override the readiness poll interval (default 2s).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn describe_index(&self, name: &str) -> Result<IndexDescription> {
        let resp = self
            .http
            .get(format!("{}/indexes/{}", self.control_plane, name))
            .send()
            .await
            .with_context(|| format!("Failed to describe index '{}'", name))?;
        let resp = check_status(resp, "describe index").await?;
        Ok(resp.json().await?)
    }

    /// Data-plane host, resolved on first call.
    async fn host(&self) -> Result<&str> {
        let host = self
            .index_host
            .get_or_try_init(|| async {
                let desc = self.describe_index(&self.index_name).await?;
                desc.host.filter(|h| !h.is_empty()).ok_or_else(|| {
                    anyhow::anyhow!("index '{}' has no data-plane host yet", self.index_name)
                })
            })
            .await?;
        Ok(host.as_str())
    }

    async fn data_url(&self, path: &str) -> Result<String> {
        let host = self.host().await?;
        let base = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", host.trim_end_matches('/'))
        };
        Ok(format!("{}{}", base, path))
    }

    async fn wait_until_ready(&self, name: &str) -> Result<IndexDescription> {
        let deadline = tokio::time::Instant::now() + self.ready_timeout;
        loop {
            let desc = self.describe_index(name).await?;
            if desc.status.as_ref().is_some_and(|s| s.ready) {
                return Ok(desc);
            }
            if tokio::time::Instant::now() >= deadline {
                let state = desc
                    .status
                    .and_then(|s| s.state)
                    .unwrap_or_else(|| "unknown".to_string());
                bail!(
                    "index '{}' not ready after {}s (state: {})",
                    name,
                    self.ready_timeout.as_secs(),
                    state
                );
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Turn a non-success response into an error carrying status and body.
async fn check_status(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    bail!(
        "Pinecone {} failed (HTTP {}): {}",
        what,
        status,
        body.chars().take(500).collect::<String>()
    );
}

/// Records as newline-delimited JSON, one per line.
fn to_ndjson(records: &[IndexRecord]) -> Result<String> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}

fn search_body(query: &SearchQuery) -> serde_json::Value {
    let mut body = serde_json::json!({
        "query": {
            "inputs": { "text": query.text },
            "top_k": query.top_k,
        },
        "fields": query.fields,
    });
    if let Some(rerank) = &query.rerank {
        body["rerank"] = serde_json::json!({
            "model": rerank.model,
            "top_n": rerank.top_n,
            "rank_fields": rerank.rank_fields,
        });
    }
    body
}

#[async_trait]
impl VectorIndex for PineconeClient {
    async fn list_indexes(&self) -> Result<Vec<String>> {
        let resp = self
            .http
            .get(format!("{}/indexes", self.control_plane))
            .send()
            .await
            .context("Failed to list Pinecone indexes")?;
        let resp = check_status(resp, "list indexes").await?;
        let list: IndexList = resp.json().await?;
        Ok(list.indexes.into_iter().map(|i| i.name).collect())
    }

    async fn create_index_for_model(&self, spec: &IndexSpec) -> Result<()> {
        let body = serde_json::json!({
            "name": spec.name,
            "cloud": spec.cloud,
            "region": spec.region,
            "embed": {
                "model": spec.embed_model,
                "field_map": { "text": spec.text_field },
            },
        });
        let resp = self
            .http
            .post(format!("{}/indexes/create-for-model", self.control_plane))
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to create index '{}'", spec.name))?;
        check_status(resp, "create index").await?;

        let desc = self.wait_until_ready(&spec.name).await?;
        if spec.name == self.index_name {
            if let Some(host) = desc.host.filter(|h| !h.is_empty()) {
                let _ = self.index_host.set(host);
            }
        }
        Ok(())
    }

    async fn upsert_records(&self, namespace: &str, records: &[IndexRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let url = self
            .data_url(&format!("/records/namespaces/{}/upsert", namespace))
            .await?;
        let resp = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(to_ndjson(records)?)
            .send()
            .await
            .with_context(|| format!("Failed to upsert {} records", records.len()))?;
        check_status(resp, "upsert records").await?;
        Ok(())
    }

    async fn search_records(&self, namespace: &str, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        let url = self
            .data_url(&format!("/records/namespaces/{}/search", namespace))
            .await?;
        let resp = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .json(&search_body(query))
            .send()
            .await
            .context("Failed to search Pinecone records")?;
        let resp = check_status(resp, "search records").await?;
        let parsed: SearchResponse = resp.json().await?;
        Ok(parsed.result.hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hackathon_search_core::index::Rerank;
    use hackathon_search_core::models::{CleanProject, TEXT_FIELD};

    #[test]
    fn ndjson_is_one_record_per_line() {
        let records: Vec<_> = (0..3)
            .map(|i| IndexRecord::from_project(i, &CleanProject::default()))
            .collect();
        let body = to_ndjson(&records).unwrap();
        let lines: Vec<_> = body.lines().collect();
        assert_eq!(lines.len(), 3);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["_id"], "project-0");
        assert!(body.ends_with('\n'));
    }

    #[test]
    fn search_body_with_rerank() {
        let q = SearchQuery {
            text: "AI healthcare".into(),
            top_k: 9,
            fields: vec!["title".into()],
            rerank: Some(Rerank {
                model: "bge-reranker-v2-m3".into(),
                top_n: 9,
                rank_fields: vec![TEXT_FIELD.into()],
            }),
        };
        let body = search_body(&q);
        assert_eq!(body["query"]["inputs"]["text"], "AI healthcare");
        assert_eq!(body["query"]["top_k"], 9);
        assert_eq!(body["rerank"]["rank_fields"][0], "chunk_text");
    }

    #[test]
    fn search_body_without_rerank() {
        let q = SearchQuery {
            text: "x".into(),
            top_k: 3,
            fields: vec![],
            rerank: None,
        };
        assert!(search_body(&q).get("rerank").is_none());
    }

    #[test]
    fn rejects_non_http_control_plane() {
        let cfg = PineconeConfig {
            control_plane_url: "api.pinecone.io".into(),
            ..PineconeConfig::default()
        };
        assert!(PineconeClient::new(&ApiKey::new("k"), &cfg).is_err());
    }
}
