//! The `clean` run: raw snapshot → cleaned snapshot.

use std::path::PathBuf;

use hackathon_search_core::clean::clean_projects;

use crate::config::Config;
use crate::error::Result;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::snapshot;

/// Outcome of a clean run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanReport {
    pub cleaned: usize,
    pub output: PathBuf,
}

/// Read `data.raw_path`, normalize every project, and write the result to
/// `data.clean_path`.
pub fn run_clean(config: &Config, progress: &dyn ProgressReporter) -> Result<CleanReport> {
    let input = &config.data.raw_path;
    let raw = snapshot::read_array(input)?;
    progress.report(ProgressEvent::Loaded {
        path: input.display().to_string(),
        count: raw.len(),
    });

    let cleaned = clean_projects(&raw);
    snapshot::write_clean(&config.data.clean_path, &cleaned)?;
    tracing::debug!(count = cleaned.len(), output = %config.data.clean_path.display(), "wrote cleaned snapshot");

    Ok(CleanReport {
        cleaned: cleaned.len(),
        output: config.data.clean_path.clone(),
    })
}

pub fn print_report(report: &CleanReport) {
    println!("clean");
    println!("  projects: {}", report.cleaned);
    println!("  written: {}", report.output.display());
    println!("ok");
}
