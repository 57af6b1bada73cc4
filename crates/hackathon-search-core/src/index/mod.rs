//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait describes everything the ingestion driver and
//! the search proxy need from the managed index: listing and creating
//! indexes, upserting records, and searching with optional reranking.
//! Embedding, ANN search and reranking all happen on the provider side.
//!
//! Implementations must be `Send + Sync`; the search proxy shares one
//! instance across concurrent requests.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{IndexRecord, SearchHit};

/// Settings for creating an index bound to a hosted embedding model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexSpec {
    pub name: String,
    pub cloud: String,
    pub region: String,
    /// Hosted embedding model identifier (e.g. `llama-text-embed-v2`).
    pub embed_model: String,
    /// Record field whose text is embedded.
    pub text_field: String,
}

/// A similarity query against one namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    pub top_k: usize,
    /// Fields to return for each hit.
    pub fields: Vec<String>,
    pub rerank: Option<Rerank>,
}

/// Second-stage rerank request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rerank {
    pub model: String,
    pub top_n: usize,
    pub rank_fields: Vec<String>,
}

/// Abstract managed vector index.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`list_indexes`](VectorIndex::list_indexes) | Names of existing indexes |
/// | [`create_index_for_model`](VectorIndex::create_index_for_model) | Create an index and wait until ready |
/// | [`upsert_records`](VectorIndex::upsert_records) | Insert or overwrite records by `_id` |
/// | [`search_records`](VectorIndex::search_records) | Text query with optional rerank |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn list_indexes(&self) -> Result<Vec<String>>;

    /// Create an index with integrated embedding, returning once it is ready.
    async fn create_index_for_model(&self, spec: &IndexSpec) -> Result<()>;

    /// Upsert records into `namespace`. Records with an existing `_id` are
    /// overwritten, never duplicated.
    async fn upsert_records(&self, namespace: &str, records: &[IndexRecord]) -> Result<()>;

    async fn search_records(&self, namespace: &str, query: &SearchQuery) -> Result<Vec<SearchHit>>;
}
