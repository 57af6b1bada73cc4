//! Upsert pipeline orchestration.
//!
//! Coordinates the full upsert run: cleaned snapshot → index records →
//! size filter → paced batches → external upsert. Batches go out strictly
//! one at a time, each followed by its pacing delay, which keeps the
//! estimated token load under the configured per-minute budget.
//!
//! Any failure aborts the run. Batches already upserted stay in the index;
//! re-running overwrites them by `_id`.

use std::time::Duration;
use tokio::time::Instant;

use hackathon_search_core::filter::{filter_by_size, FilterOutcome};
use hackathon_search_core::index::VectorIndex;
use hackathon_search_core::models::build_records;
use hackathon_search_core::pacing::{Batch, PacingPolicy};

use crate::config::{Config, IngestConfig};
use crate::error::{IngestError, Result};
use crate::progress::{format_elapsed, ProgressEvent, ProgressReporter};
use crate::snapshot;

/// Per-run overrides from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpsertOptions {
    pub dry_run: bool,
    pub batch_size: Option<usize>,
    pub tokens_per_minute: Option<u64>,
}

/// A loaded, filtered, and scheduled run that has not touched the index yet.
#[derive(Debug)]
pub struct UpsertPlan {
    pub loaded: usize,
    pub outcome: FilterOutcome,
    pub policy: PacingPolicy,
    pub preview_len: usize,
    started: Instant,
}

impl UpsertPlan {
    pub fn batches(&self) -> Vec<Batch<'_>> {
        self.policy.plan(&self.outcome.valid)
    }
}

/// What happened to one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub ordinal: usize,
    /// 1-based position of the first and last record in the batch.
    pub first: usize,
    pub last: usize,
    pub records: usize,
    pub estimated_tokens: u64,
    pub delay: Duration,
}

impl From<&Batch<'_>> for BatchReport {
    fn from(b: &Batch<'_>) -> Self {
        Self {
            ordinal: b.ordinal,
            first: b.range.start + 1,
            last: b.range.end,
            records: b.records.len(),
            estimated_tokens: b.estimated_tokens,
            delay: b.delay,
        }
    }
}

/// Final outcome of an upsert run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertReport {
    pub dry_run: bool,
    pub loaded: usize,
    /// Records sent to the index (planned, for a dry run).
    pub submitted: usize,
    pub skipped: usize,
    pub skipped_preview: Vec<String>,
    pub index_created: bool,
    pub batches: Vec<BatchReport>,
    pub elapsed: Duration,
}

/// Load the cleaned snapshot, build records, filter, and schedule.
pub fn prepare_upsert(
    config: &Config,
    options: &UpsertOptions,
    progress: &dyn ProgressReporter,
) -> Result<UpsertPlan> {
    let started = Instant::now();

    let batch_size = options.batch_size.unwrap_or(config.ingest.batch_size);
    let tokens_per_minute = options
        .tokens_per_minute
        .unwrap_or(config.ingest.tokens_per_minute);
    if batch_size == 0 {
        return Err(IngestError::Config("batch size must be > 0".into()));
    }
    if tokens_per_minute == 0 {
        return Err(IngestError::Config("tokens per minute must be > 0".into()));
    }
    let policy = IngestConfig {
        batch_size,
        tokens_per_minute,
        ..config.ingest.clone()
    }
    .pacing();

    let path = &config.data.clean_path;
    let projects = snapshot::read_clean(path)?;
    progress.report(ProgressEvent::Loaded {
        path: path.display().to_string(),
        count: projects.len(),
    });

    let outcome = filter_by_size(build_records(&projects), config.ingest.metadata_limit_bytes);
    let preview_len = config.ingest.skipped_preview;
    if outcome.skipped_count() > 0 {
        tracing::warn!(
            skipped = outcome.skipped_count(),
            limit = config.ingest.metadata_limit_bytes,
            preview = ?outcome.skipped_preview(preview_len),
            "skipping oversized records"
        );
    }
    progress.report(ProgressEvent::Filtered {
        valid: outcome.valid.len(),
        skipped: outcome.skipped_count(),
        preview: outcome.skipped_preview(preview_len).to_vec(),
    });

    Ok(UpsertPlan {
        loaded: projects.len(),
        outcome,
        policy,
        preview_len,
        started,
    })
}

/// Report a plan without contacting the index.
pub fn dry_run_report(plan: &UpsertPlan) -> UpsertReport {
    UpsertReport {
        dry_run: true,
        loaded: plan.loaded,
        submitted: plan.outcome.valid.len(),
        skipped: plan.outcome.skipped_count(),
        skipped_preview: plan.outcome.skipped_preview(plan.preview_len).to_vec(),
        index_created: false,
        batches: plan.batches().iter().map(BatchReport::from).collect(),
        elapsed: plan.started.elapsed(),
    }
}

/// Create the target index if it does not exist yet.
///
/// Check-then-create is not atomic: two first runs racing each other may
/// both try to create. Single-writer use is assumed.
pub async fn ensure_index(
    config: &Config,
    index: &dyn VectorIndex,
    progress: &dyn ProgressReporter,
) -> Result<bool> {
    let name = &config.pinecone.index;
    let existing = index
        .list_indexes()
        .await
        .map_err(|e| IngestError::external("list indexes", e))?;
    if existing.iter().any(|n| n == name) {
        return Ok(false);
    }

    tracing::info!(index = %name, model = %config.pinecone.embed_model, "creating index");
    index
        .create_index_for_model(&config.pinecone.index_spec())
        .await
        .map_err(|e| IngestError::external("create index", e))?;
    progress.report(ProgressEvent::IndexCreated { name: name.clone() });
    Ok(true)
}

/// Ensure the index, then upsert every planned batch with pacing.
pub async fn execute_upsert(
    config: &Config,
    plan: &UpsertPlan,
    index: &dyn VectorIndex,
    progress: &dyn ProgressReporter,
) -> Result<UpsertReport> {
    let index_created = ensure_index(config, index, progress).await?;

    let namespace = &config.pinecone.namespace;
    let batches = plan.batches();
    let total = batches.len();
    let mut reports = Vec::with_capacity(total);
    let mut submitted = 0usize;

    for batch in &batches {
        index
            .upsert_records(namespace, batch.records)
            .await
            .map_err(|e| IngestError::external("upsert batch", e))?;
        submitted += batch.records.len();

        let report = BatchReport::from(batch);
        progress.report(ProgressEvent::BatchUpserted {
            ordinal: report.ordinal,
            total,
            first: report.first,
            last: report.last,
            tokens: report.estimated_tokens,
        });
        reports.push(report);

        // Also after the last batch, so a follow-up run starts inside budget.
        progress.report(ProgressEvent::Sleeping { delay: batch.delay });
        tokio::time::sleep(batch.delay).await;
    }

    let elapsed = plan.started.elapsed();
    progress.report(ProgressEvent::Finished { submitted, elapsed });

    Ok(UpsertReport {
        dry_run: false,
        loaded: plan.loaded,
        submitted,
        skipped: plan.outcome.skipped_count(),
        skipped_preview: plan.outcome.skipped_preview(plan.preview_len).to_vec(),
        index_created,
        batches: reports,
        elapsed,
    })
}

/// Run the whole upsert: prepare, then (unless dry-running) execute.
pub async fn run_upsert(
    config: &Config,
    index: &dyn VectorIndex,
    options: &UpsertOptions,
    progress: &dyn ProgressReporter,
) -> Result<UpsertReport> {
    let plan = prepare_upsert(config, options, progress)?;
    if options.dry_run {
        return Ok(dry_run_report(&plan));
    }
    execute_upsert(config, &plan, index, progress).await
}

pub fn print_report(config: &Config, report: &UpsertReport) {
    if report.dry_run {
        println!(
            "upsert {}/{} (dry-run)",
            config.pinecone.index, config.pinecone.namespace
        );
    } else {
        println!("upsert {}/{}", config.pinecone.index, config.pinecone.namespace);
    }
    println!("  loaded: {}", report.loaded);
    println!("  submitted: {}", report.submitted);
    if report.skipped_preview.is_empty() {
        println!("  skipped: {}", report.skipped);
    } else {
        let more = if report.skipped > report.skipped_preview.len() {
            ", ..."
        } else {
            ""
        };
        println!(
            "  skipped: {} ({}{})",
            report.skipped,
            report.skipped_preview.join(", "),
            more
        );
    }
    println!("  batches: {}", report.batches.len());
    if report.dry_run {
        let tokens: u64 = report.batches.iter().map(|b| b.estimated_tokens).sum();
        let wait: Duration = report.batches.iter().map(|b| b.delay).sum();
        println!("  estimated tokens: {}", tokens);
        println!("  estimated duration: {}", format_elapsed(wait));
    } else {
        if report.index_created {
            println!("  index created: {}", config.pinecone.index);
        }
        println!("  elapsed: {}", format_elapsed(report.elapsed));
    }
    println!("ok");
}
