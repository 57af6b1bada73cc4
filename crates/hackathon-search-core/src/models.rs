//! Core data models shared by the ingestion pipeline and the search proxy.
//!
//! Raw project records are untyped [`serde_json::Value`]s; they become
//! [`CleanProject`]s after normalization, and [`IndexRecord`]s on the way
//! to the external index. Search results come back as [`SearchHit`]s.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the derived text field used for embedding and reranking.
pub const TEXT_FIELD: &str = "chunk_text";

/// Record fields requested back from the index on search.
pub const RECORD_FIELDS: &[&str] = &[
    TEXT_FIELD,
    "title",
    "caption",
    "url",
    "videoLink",
    "techUsed",
    "externalLinks",
    "hackathon",
];

/// A hackathon project after normalization.
///
/// Every field is always present: scalars default to `""`, lists to `[]`.
/// Serialized with the camelCase keys of the source dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanProject {
    pub title: String,
    pub caption: String,
    pub url: String,
    pub video_link: String,
    pub description: String,
    pub tech_used: Vec<String>,
    pub external_links: Vec<String>,
    pub hackathon: String,
}

impl CleanProject {
    /// Text embedded and reranked by the index: caption, newline, description.
    pub fn derived_text(&self) -> String {
        format!("{}\n{}", self.caption, self.description)
    }
}

/// A single record submitted to the external index.
///
/// Serializes to the flat shape the index expects: `_id`, the derived
/// text field, and the project metadata side by side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub chunk_text: String,
    #[serde(flatten)]
    pub metadata: ProjectMetadata,
}

/// Project fields stored alongside each record.
///
/// The description is not repeated here; it travels inside `chunk_text`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetadata {
    pub title: String,
    pub caption: String,
    pub url: String,
    pub video_link: String,
    pub tech_used: Vec<String>,
    pub external_links: Vec<String>,
    pub hackathon: String,
}

impl IndexRecord {
    /// Build the record for the project at `ordinal` in the cleaned snapshot.
    pub fn from_project(ordinal: usize, project: &CleanProject) -> Self {
        Self {
            id: record_id(ordinal),
            chunk_text: project.derived_text(),
            metadata: ProjectMetadata {
                title: project.title.clone(),
                caption: project.caption.clone(),
                url: project.url.clone(),
                video_link: project.video_link.clone(),
                tech_used: project.tech_used.clone(),
                external_links: project.external_links.clone(),
                hackathon: project.hackathon.clone(),
            },
        }
    }

    /// The record as a flat JSON object, exactly as sent on the wire.
    pub fn to_fields(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Build index records for a cleaned snapshot, numbered by position.
pub fn build_records(projects: &[CleanProject]) -> Vec<IndexRecord> {
    projects
        .iter()
        .enumerate()
        .map(|(i, p)| IndexRecord::from_project(i, p))
        .collect()
}

/// Identifier for the record at `ordinal`.
pub fn record_id(ordinal: usize) -> String {
    format!("project-{}", ordinal)
}

/// A single hit returned by the external search API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_score", default)]
    pub score: f64,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl SearchHit {
    /// Flatten the hit into `{ "_id": ..., ...fields }`.
    ///
    /// A stray `_id` inside `fields` never overrides the hit's identifier.
    pub fn into_project(self) -> Value {
        let mut out = Map::with_capacity(self.fields.len() + 1);
        out.insert("_id".to_string(), Value::String(self.id));
        for (k, v) in self.fields {
            if k != "_id" {
                out.insert(k, v);
            }
        }
        Value::Object(out)
    }
}
