//! In-memory [`VectorIndex`] for tests and dry runs.
//!
//! Records live in a `BTreeMap` per namespace behind `std::sync::RwLock`,
//! keyed by `_id`, so upserts overwrite exactly like the hosted index.
//! Search is a plain term-overlap score over the text field; it stands in
//! for the provider's embedding search and makes no attempt to imitate it.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::models::{IndexRecord, SearchHit, TEXT_FIELD};

use super::{IndexSpec, SearchQuery, VectorIndex};

type Namespace = BTreeMap<String, Map<String, Value>>;

/// In-memory index holding one logical index's namespaces.
pub struct InMemoryIndex {
    indexes: RwLock<Vec<IndexSpec>>,
    namespaces: RwLock<HashMap<String, Namespace>>,
    upsert_calls: AtomicUsize,
    fail_after: Option<usize>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            indexes: RwLock::new(Vec::new()),
            namespaces: RwLock::new(HashMap::new()),
            upsert_calls: AtomicUsize::new(0),
            fail_after: None,
        }
    }

    /// An index whose upserts start failing after `ok_calls` successful calls.
    pub fn failing_after(ok_calls: usize) -> Self {
        Self {
            fail_after: Some(ok_calls),
            ..Self::new()
        }
    }

    /// Number of upsert calls received, including failed ones.
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    /// Specs of every index created so far.
    pub fn created(&self) -> Vec<IndexSpec> {
        self.indexes.read().unwrap().clone()
    }

    /// Number of records stored in `namespace`.
    pub fn len(&self, namespace: &str) -> usize {
        self.namespaces
            .read()
            .unwrap()
            .get(namespace)
            .map_or(0, |ns| ns.len())
    }

    pub fn is_empty(&self, namespace: &str) -> bool {
        self.len(namespace) == 0
    }

    /// Stored fields for a record, if present.
    pub fn get(&self, namespace: &str, id: &str) -> Option<Map<String, Value>> {
        self.namespaces
            .read()
            .unwrap()
            .get(namespace)
            .and_then(|ns| ns.get(id).cloned())
    }

    /// Sorted record ids in `namespace`.
    pub fn ids(&self, namespace: &str) -> Vec<String> {
        self.namespaces
            .read()
            .unwrap()
            .get(namespace)
            .map(|ns| ns.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn overlap_score(query_terms: &[String], text: &str) -> f64 {
    let text = text.to_lowercase();
    let hits = query_terms
        .iter()
        .filter(|t| text.contains(t.as_str()))
        .count();
    if query_terms.is_empty() {
        0.0
    } else {
        hits as f64 / query_terms.len() as f64
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn list_indexes(&self) -> Result<Vec<String>> {
        Ok(self
            .indexes
            .read()
            .unwrap()
            .iter()
            .map(|s| s.name.clone())
            .collect())
    }

    async fn create_index_for_model(&self, spec: &IndexSpec) -> Result<()> {
        let mut indexes = self.indexes.write().unwrap();
        if indexes.iter().any(|s| s.name == spec.name) {
            bail!("index '{}' already exists", spec.name);
        }
        indexes.push(spec.clone());
        Ok(())
    }

    async fn upsert_records(&self, namespace: &str, records: &[IndexRecord]) -> Result<()> {
        let call = self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.fail_after {
            if call >= limit {
                bail!("upsert rejected: simulated quota exceeded");
            }
        }
        let mut namespaces = self.namespaces.write().unwrap();
        let ns = namespaces.entry(namespace.to_string()).or_default();
        for record in records {
            let mut fields = record.to_fields();
            fields.remove("_id");
            ns.insert(record.id.clone(), fields);
        }
        Ok(())
    }

    async fn search_records(&self, namespace: &str, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        let terms: Vec<String> = query
            .text
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();

        let namespaces = self.namespaces.read().unwrap();
        let Some(ns) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<SearchHit> = ns
            .iter()
            .filter_map(|(id, fields)| {
                let text = fields.get(TEXT_FIELD).and_then(|v| v.as_str()).unwrap_or("");
                let score = overlap_score(&terms, text);
                (score > 0.0).then(|| SearchHit {
                    id: id.clone(),
                    score,
                    fields: fields
                        .iter()
                        .filter(|(k, _)| query.fields.iter().any(|f| f == *k))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(query.top_k);
        if let Some(rerank) = &query.rerank {
            hits.truncate(rerank.top_n);
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CleanProject;

    fn rec(i: usize, caption: &str) -> IndexRecord {
        IndexRecord::from_project(
            i,
            &CleanProject {
                title: format!("p{}", i),
                caption: caption.to_string(),
                ..Default::default()
            },
        )
    }

    fn query(text: &str, top_k: usize) -> SearchQuery {
        SearchQuery {
            text: text.to_string(),
            top_k,
            fields: vec!["title".to_string(), TEXT_FIELD.to_string()],
            rerank: None,
        }
    }

    #[tokio::test]
    async fn upsert_overwrites_by_id() {
        let index = InMemoryIndex::new();
        index.upsert_records("ns", &[rec(0, "old")]).await.unwrap();
        index.upsert_records("ns", &[rec(0, "new"), rec(1, "x")]).await.unwrap();
        assert_eq!(index.len("ns"), 2);
        assert_eq!(index.get("ns", "project-0").unwrap()["caption"], "new");
        assert!(index.get("ns", "project-0").unwrap().get("_id").is_none());
    }

    #[tokio::test]
    async fn create_then_list() {
        let index = InMemoryIndex::new();
        let spec = IndexSpec {
            name: "projects".into(),
            cloud: "aws".into(),
            region: "us-east-1".into(),
            embed_model: "llama-text-embed-v2".into(),
            text_field: TEXT_FIELD.into(),
        };
        index.create_index_for_model(&spec).await.unwrap();
        assert_eq!(index.list_indexes().await.unwrap(), vec!["projects"]);
        assert!(index.create_index_for_model(&spec).await.is_err());
    }

    #[tokio::test]
    async fn search_ranks_and_projects_fields() {
        let index = InMemoryIndex::new();
        index
            .upsert_records(
                "ns",
                &[rec(0, "AI for healthcare"), rec(1, "healthcare billing"), rec(2, "games")],
            )
            .await
            .unwrap();

        let hits = index.search_records("ns", &query("AI healthcare", 9)).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["project-0", "project-1"]);
        assert!(hits[0].fields.contains_key("title"));
        assert!(!hits[0].fields.contains_key("caption"));
    }

    #[tokio::test]
    async fn fails_after_configured_calls() {
        let index = InMemoryIndex::failing_after(1);
        assert!(index.upsert_records("ns", &[rec(0, "a")]).await.is_ok());
        assert!(index.upsert_records("ns", &[rec(1, "b")]).await.is_err());
        assert_eq!(index.upsert_calls(), 2);
        assert_eq!(index.ids("ns"), vec!["project-0"]);
    }
}
