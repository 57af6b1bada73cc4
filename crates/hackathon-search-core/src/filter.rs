//! Metadata size filter.
//!
//! The external index caps per-record metadata in bytes. Records over the
//! cap are dropped whole; nothing is ever truncated. Sizes are measured on
//! the UTF-8 JSON serialization of the record as it is sent on the wire,
//! which includes every stored field plus `_id`.

use crate::models::IndexRecord;

/// Default per-record metadata ceiling, in bytes.
pub const DEFAULT_METADATA_LIMIT: usize = 40_960;

/// Default number of skipped identifiers kept for display.
pub const DEFAULT_PREVIEW_LEN: usize = 5;

/// Result of partitioning records by serialized size.
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    /// Records within the limit, in input order.
    pub valid: Vec<IndexRecord>,
    /// Identifiers of records over the limit, in input order.
    pub skipped: Vec<String>,
}

impl FilterOutcome {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// The first `n` skipped identifiers.
    pub fn skipped_preview(&self, n: usize) -> &[String] {
        &self.skipped[..self.skipped.len().min(n)]
    }
}

/// Byte length of the record's JSON serialization.
pub fn metadata_size(record: &IndexRecord) -> usize {
    // Serializing plain strings and string lists cannot fail.
    serde_json::to_vec(record).map(|v| v.len()).unwrap_or(usize::MAX)
}

/// Split `records` into those that fit within `limit` bytes and the ids of
/// those that don't.
pub fn filter_by_size(records: Vec<IndexRecord>, limit: usize) -> FilterOutcome {
    let mut outcome = FilterOutcome::default();
    for record in records {
        if metadata_size(&record) <= limit {
            outcome.valid.push(record);
        } else {
            outcome.skipped.push(record.id);
        }
    }
    outcome
}
