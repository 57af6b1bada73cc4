//! # Hackathon Search Core
//!
//! Shared logic for Hackathon Search: project models, record cleaning,
//! the metadata size filter, upsert pacing, and the vector index trait.
//!
//! This crate contains no tokio, reqwest, filesystem I/O, or other
//! runtime-specific dependencies. Everything that talks to the outside
//! world lives in the `hackathon-search` crate.

pub mod clean;
pub mod filter;
pub mod index;
pub mod models;
pub mod pacing;
