//! Batch scheduling and upsert pacing.
//!
//! The external index charges embedding work against a tokens-per-minute
//! budget. Rather than react to throttling, the upsert loop paces itself
//! up front: after each batch it waits long enough for that batch's
//! estimated token cost to fit inside the budget, and never less than a
//! fixed floor.
//!
//! # Algorithm
//!
//! 1. Estimate tokens per record as `ceil(0.75 × words)` over the derived
//!    text field (whitespace-delimited words; a rough heuristic, not a
//!    tokenizer).
//! 2. Split records into consecutive batches of `batch_size` (the last
//!    may be shorter).
//! 3. After a batch costing `C` tokens, wait
//!    `max(ceil(C / T × 60 000) ms, min_delay)`.
//!
//! Since batches go out one at a time and each is followed by its own
//! delay, any window of wall-clock time carries at most `T` tokens per
//! minute of estimated load.
//!
//! # Example
//!
//! ```rust
//! use hackathon_search_core::pacing::PacingPolicy;
//! use std::time::Duration;
//!
//! let policy = PacingPolicy::new(25, 250_000, Duration::from_millis(2_000));
//! assert_eq!(policy.delay_for(10_000), Duration::from_millis(2_400));
//! assert_eq!(policy.delay_for(10), Duration::from_millis(2_000));
//! ```

use std::ops::Range;
use std::time::Duration;

use crate::models::IndexRecord;

pub const DEFAULT_BATCH_SIZE: usize = 25;
pub const DEFAULT_TOKENS_PER_MINUTE: u64 = 250_000;
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(2_000);

/// Estimated tokens for a piece of text: `ceil(words × 0.75)`.
pub fn estimate_tokens(text: &str) -> u64 {
    let words = text.split_whitespace().count() as u64;
    (words * 3).div_ceil(4)
}

/// Batch size, token budget, and minimum delay between batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    pub batch_size: usize,
    pub tokens_per_minute: u64,
    pub min_delay: Duration,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            tokens_per_minute: DEFAULT_TOKENS_PER_MINUTE,
            min_delay: DEFAULT_MIN_DELAY,
        }
    }
}

/// One scheduled batch: a window into the record list plus its cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<'a> {
    /// 1-based batch number.
    pub ordinal: usize,
    /// Position of the batch within the scheduled records.
    pub range: Range<usize>,
    pub records: &'a [IndexRecord],
    pub estimated_tokens: u64,
    /// How long to wait after submitting this batch.
    pub delay: Duration,
}

impl PacingPolicy {
    /// Both `batch_size` and `tokens_per_minute` must be non-zero; zero
    /// values are clamped to 1 so scheduling never divides by zero.
    pub fn new(batch_size: usize, tokens_per_minute: u64, min_delay: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            tokens_per_minute: tokens_per_minute.max(1),
            min_delay,
        }
    }

    /// Delay owed after submitting `tokens` estimated tokens.
    pub fn delay_for(&self, tokens: u64) -> Duration {
        let tpm = self.tokens_per_minute.max(1) as u128;
        let ms = (tokens as u128 * 60_000).div_ceil(tpm);
        let budget = Duration::from_millis(ms.min(u64::MAX as u128) as u64);
        budget.max(self.min_delay)
    }

    /// Split `records` into paced batches, in order.
    pub fn plan<'a>(&self, records: &'a [IndexRecord]) -> Vec<Batch<'a>> {
        let size = self.batch_size.max(1);
        records
            .chunks(size)
            .enumerate()
            .map(|(i, chunk)| {
                let start = i * size;
                let estimated_tokens = chunk
                    .iter()
                    .map(|r| estimate_tokens(&r.chunk_text))
                    .sum();
                Batch {
                    ordinal: i + 1,
                    range: start..start + chunk.len(),
                    records: chunk,
                    estimated_tokens,
                    delay: self.delay_for(estimated_tokens),
                }
            })
            .collect()
    }
}
