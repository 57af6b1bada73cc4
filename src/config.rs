//! Configuration loading.
//!
//! Settings come from a TOML file (default `./config/hsearch.toml`) and are
//! then overridden by environment variables. A missing file is not an
//! error: every knob has a default, so a bare environment is enough to
//! run against the reference dataset.
//!
//! ```toml
//! [data]
//! raw_path = "./data/winning_projects.json"
//! clean_path = "./data/cleaned_projects.json"
//!
//! [pinecone]
//! index = "hackathon-projects"
//! namespace = "projects"
//! embed_model = "llama-text-embed-v2"
//!
//! [ingest]
//! batch_size = 25
//! tokens_per_minute = 250000
//!
//! [search]
//! top_k = 9
//! rerank_model = "bge-reranker-v2-m3"
//!
//! [server]
//! bind = "127.0.0.1:3000"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hackathon_search_core::filter::{DEFAULT_METADATA_LIMIT, DEFAULT_PREVIEW_LEN};
use hackathon_search_core::index::IndexSpec;
use hackathon_search_core::models::TEXT_FIELD;
use hackathon_search_core::pacing::{PacingPolicy, DEFAULT_BATCH_SIZE, DEFAULT_TOKENS_PER_MINUTE};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub pinecone: PineconeConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub secrets: Option<SecretsConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    #[serde(default = "default_raw_path")]
    pub raw_path: PathBuf,
    #[serde(default = "default_clean_path")]
    pub clean_path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            raw_path: default_raw_path(),
            clean_path: default_clean_path(),
        }
    }
}

fn default_raw_path() -> PathBuf {
    PathBuf::from("./data/winning_projects.json")
}
fn default_clean_path() -> PathBuf {
    PathBuf::from("./data/cleaned_projects.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct PineconeConfig {
    #[serde(default = "default_index")]
    pub index: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_embed_model")]
    pub embed_model: String,
    #[serde(default = "default_cloud")]
    pub cloud: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_control_plane_url")]
    pub control_plane_url: String,
    /// Data-plane host; resolved from the control plane when unset.
    #[serde(default)]
    pub index_host: Option<String>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            index: default_index(),
            namespace: default_namespace(),
            embed_model: default_embed_model(),
            cloud: default_cloud(),
            region: default_region(),
            api_key_env: default_api_key_env(),
            control_plane_url: default_control_plane_url(),
            index_host: None,
            api_version: default_api_version(),
            timeout_secs: default_timeout_secs(),
            ready_timeout_secs: default_ready_timeout_secs(),
        }
    }
}

fn default_index() -> String {
    "hackathon-projects".to_string()
}
fn default_namespace() -> String {
    "projects".to_string()
}
fn default_embed_model() -> String {
    "llama-text-embed-v2".to_string()
}
fn default_cloud() -> String {
    "aws".to_string()
}
fn default_region() -> String {
    "us-east-1".to_string()
}
fn default_api_key_env() -> String {
    "PINECONE_API_KEY".to_string()
}
fn default_control_plane_url() -> String {
    "https://api.pinecone.io".to_string()
}
fn default_api_version() -> String {
    "2025-01".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_ready_timeout_secs() -> u64 {
    300
}

impl PineconeConfig {
    /// Spec for creating the index with integrated embedding.
    pub fn index_spec(&self) -> IndexSpec {
        IndexSpec {
            name: self.index.clone(),
            cloud: self.cloud.clone(),
            region: self.region.clone(),
            embed_model: self.embed_model.clone(),
            text_field: TEXT_FIELD.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_tokens_per_minute")]
    pub tokens_per_minute: u64,
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "default_metadata_limit")]
    pub metadata_limit_bytes: usize,
    /// How many skipped ids to show in the summary.
    #[serde(default = "default_skipped_preview")]
    pub skipped_preview: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            tokens_per_minute: default_tokens_per_minute(),
            min_delay_ms: default_min_delay_ms(),
            metadata_limit_bytes: default_metadata_limit(),
            skipped_preview: default_skipped_preview(),
        }
    }
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_tokens_per_minute() -> u64 {
    DEFAULT_TOKENS_PER_MINUTE
}
fn default_min_delay_ms() -> u64 {
    2_000
}
fn default_metadata_limit() -> usize {
    DEFAULT_METADATA_LIMIT
}
fn default_skipped_preview() -> usize {
    DEFAULT_PREVIEW_LEN
}

impl IngestConfig {
    pub fn pacing(&self) -> PacingPolicy {
        PacingPolicy::new(
            self.batch_size,
            self.tokens_per_minute,
            Duration::from_millis(self.min_delay_ms),
        )
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Rerank model; reranking is skipped when unset or empty.
    #[serde(default = "default_rerank_model")]
    pub rerank_model: Option<String>,
    /// Results kept after reranking; defaults to `top_k`.
    #[serde(default)]
    pub rerank_top_n: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            rerank_model: default_rerank_model(),
            rerank_top_n: None,
        }
    }
}

fn default_top_k() -> usize {
    9
}
fn default_rerank_model() -> Option<String> {
    Some("bge-reranker-v2-m3".to_string())
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

/// AWS Secrets Manager lookup for the API key.
#[derive(Debug, Deserialize, Clone)]
pub struct SecretsConfig {
    pub secret_id: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Key to read when the secret string is a JSON object.
    #[serde(default)]
    pub json_key: Option<String>,
    /// Custom endpoint (LocalStack, tests).
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

/// Load configuration from `path` (if it exists), then apply environment
/// overrides and validate.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    config.apply_env(|name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Apply `HSEARCH_*` overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("HSEARCH_INDEX") {
            self.pinecone.index = v;
        }
        if let Some(v) = lookup("HSEARCH_NAMESPACE") {
            self.pinecone.namespace = v;
        }
        if let Some(v) = lookup("HSEARCH_EMBED_MODEL") {
            self.pinecone.embed_model = v;
        }
        if let Some(v) = lookup("HSEARCH_INDEX_HOST") {
            self.pinecone.index_host = Some(v);
        }
        if let Some(v) = lookup("HSEARCH_METADATA_LIMIT") {
            self.ingest.metadata_limit_bytes = parse_env("HSEARCH_METADATA_LIMIT", &v)?;
        }
        if let Some(v) = lookup("HSEARCH_BATCH_SIZE") {
            self.ingest.batch_size = parse_env("HSEARCH_BATCH_SIZE", &v)?;
        }
        if let Some(v) = lookup("HSEARCH_TOKENS_PER_MINUTE") {
            self.ingest.tokens_per_minute = parse_env("HSEARCH_TOKENS_PER_MINUTE", &v)?;
        }
        if let Some(v) = lookup("HSEARCH_BIND") {
            self.server.bind = v;
        }
        if let Some(v) = lookup("HSEARCH_SECRET_ID") {
            match self.secrets.as_mut() {
                Some(s) => s.secret_id = v,
                None => {
                    self.secrets = Some(SecretsConfig {
                        secret_id: v,
                        region: default_region(),
                        json_key: None,
                        endpoint_url: None,
                    })
                }
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.ingest.batch_size == 0 {
            bail!("ingest.batch_size must be > 0");
        }
        if self.ingest.tokens_per_minute == 0 {
            bail!("ingest.tokens_per_minute must be > 0");
        }
        if self.ingest.metadata_limit_bytes == 0 {
            bail!("ingest.metadata_limit_bytes must be > 0");
        }
        if self.search.top_k == 0 {
            bail!("search.top_k must be >= 1");
        }
        if self.search.rerank_top_n == Some(0) {
            bail!("search.rerank_top_n must be >= 1");
        }
        if self.pinecone.index.trim().is_empty() {
            bail!("pinecone.index must not be empty");
        }
        if self.pinecone.namespace.trim().is_empty() {
            bail!("pinecone.namespace must not be empty");
        }
        if self.pinecone.embed_model.trim().is_empty() {
            bail!("pinecone.embed_model must not be empty");
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{} must be a non-negative integer, got '{}'", name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_match_reference_setup() {
        let cfg = Config::default();
        assert_eq!(cfg.pinecone.index, "hackathon-projects");
        assert_eq!(cfg.pinecone.namespace, "projects");
        assert_eq!(cfg.pinecone.embed_model, "llama-text-embed-v2");
        assert_eq!(cfg.ingest.batch_size, 25);
        assert_eq!(cfg.ingest.tokens_per_minute, 250_000);
        assert_eq!(cfg.ingest.metadata_limit_bytes, 40_960);
        assert_eq!(cfg.ingest.pacing().min_delay, Duration::from_secs(2));
        assert_eq!(cfg.search.top_k, 9);
        assert!(cfg.secrets.is_none());
        cfg.validate().unwrap();
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: Config = toml::from_str(
            r#"
[ingest]
batch_size = 10

[search]
rerank_top_n = 5
"#,
        )
        .unwrap();
        assert_eq!(cfg.ingest.batch_size, 10);
        assert_eq!(cfg.ingest.tokens_per_minute, 250_000);
        assert_eq!(cfg.search.rerank_top_n, Some(5));
        assert_eq!(cfg.pinecone.index, "hackathon-projects");
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = Config::default();
        cfg.apply_env(env(&[
            ("HSEARCH_INDEX", "other"),
            ("HSEARCH_BATCH_SIZE", "50"),
            ("HSEARCH_TOKENS_PER_MINUTE", "1000"),
            ("HSEARCH_SECRET_ID", "prod/pinecone"),
        ]))
        .unwrap();
        assert_eq!(cfg.pinecone.index, "other");
        assert_eq!(cfg.ingest.batch_size, 50);
        assert_eq!(cfg.ingest.tokens_per_minute, 1000);
        assert_eq!(cfg.secrets.unwrap().secret_id, "prod/pinecone");
    }

    #[test]
    fn bad_env_number_is_rejected() {
        let mut cfg = Config::default();
        let err = cfg
            .apply_env(env(&[("HSEARCH_BATCH_SIZE", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("HSEARCH_BATCH_SIZE"));
    }

    #[test]
    fn zero_batch_size_is_invalid() {
        let mut cfg = Config::default();
        cfg.ingest.batch_size = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cfg = load_config(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.ingest.batch_size, 25);
    }
}
