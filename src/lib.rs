//! # Hackathon Search
//!
//! Semantic search over past hackathon projects.
//!
//! Hackathon Search normalizes a scraped snapshot of winning projects,
//! uploads them to a Pinecone index with integrated embedding, and serves
//! a small HTTP proxy that turns a free-text query into reranked project
//! matches.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌───────────┐   ┌──────────────┐   ┌──────────┐
//! │ raw JSON   │──▶│  clean    │──▶│ size filter  │──▶│ Pinecone │
//! │ snapshot   │   │ snapshot  │   │ + paced batch│   │  index   │
//! └────────────┘   └───────────┘   └──────────────┘   └────┬─────┘
//!                                                          │
//!                                      ┌───────────────────┤
//!                                      ▼                   ▼
//!                                 ┌──────────┐       ┌──────────┐
//!                                 │   CLI    │       │  search  │
//!                                 │(hsearch) │       │  proxy   │
//!                                 └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! hsearch clean                    # raw → cleaned snapshot
//! hsearch upsert --dry-run         # show the batch plan
//! hsearch upsert                   # create index if needed, upload
//! hsearch search "AI healthcare"
//! hsearch serve                    # start the search proxy
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`snapshot`] | Reading and writing JSON snapshots |
//! | [`clean_cmd`] | The `clean` run |
//! | [`ingest`] | The paced `upsert` run |
//! | [`pinecone`] | Pinecone REST client |
//! | [`secrets`] | API key resolution (env, AWS Secrets Manager) |
//! | [`server`] | Search proxy HTTP server |
//! | [`progress`] | Operator progress reporting |
//! | [`error`] | Driver error type |
//!
//! Pure logic (normalization, size filtering, batch pacing, the index
//! trait and an in-memory index) lives in the `hackathon-search-core`
//! crate, re-exported here as [`core`].

pub use hackathon_search_core as core;

pub mod clean_cmd;
pub mod config;
pub mod error;
pub mod ingest;
pub mod pinecone;
pub mod progress;
pub mod secrets;
pub mod server;
pub mod snapshot;
