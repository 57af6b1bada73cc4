//! Ingestion progress reporting.
//!
//! Reports what the clean and upsert runs are doing so operators can follow
//! a long, paced upload. Progress is emitted on **stderr** so stdout stays
//! parseable for scripts; final summaries go to stdout.

use std::io::Write;
use std::time::Duration;

/// A single progress event.
#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    /// Snapshot read from disk.
    Loaded { path: String, count: usize },
    /// Size filter finished.
    Filtered {
        valid: usize,
        skipped: usize,
        preview: Vec<String>,
    },
    /// The target index was missing and has been created.
    IndexCreated { name: String },
    /// A batch went out.
    BatchUpserted {
        ordinal: usize,
        total: usize,
        first: usize,
        last: usize,
        tokens: u64,
    },
    /// Pacing wait before the next batch.
    Sleeping { delay: Duration },
    /// Run complete.
    Finished { submitted: usize, elapsed: Duration },
}

/// Receives progress events from the drivers.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr.
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Loaded { path, count } => {
                format!("loaded {} projects from {}\n", format_number(*count as u64), path)
            }
            ProgressEvent::Filtered {
                valid,
                skipped,
                preview,
            } => {
                let mut line = format!("filtered  valid: {}  skipped: {}", valid, skipped);
                if !preview.is_empty() {
                    line.push_str(&format!("  [{}", preview.join(", ")));
                    if *skipped > preview.len() {
                        line.push_str(", ...");
                    }
                    line.push(']');
                }
                line.push('\n');
                line
            }
            ProgressEvent::IndexCreated { name } => format!("created index {}\n", name),
            ProgressEvent::BatchUpserted {
                ordinal,
                total,
                first,
                last,
                tokens,
            } => format!(
                "upserted batch {} / {} ({}-{})  ~{} tokens\n",
                ordinal,
                total,
                first,
                last,
                format_number(*tokens)
            ),
            ProgressEvent::Sleeping { delay } => {
                format!("sleeping {}ms\n", delay.as_millis())
            }
            ProgressEvent::Finished { submitted, elapsed } => format!(
                "finished {} records in {}\n",
                format_number(*submitted as u64),
                format_elapsed(*elapsed)
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Loaded { path, count } => serde_json::json!({
                "event": "loaded", "path": path, "count": count
            }),
            ProgressEvent::Filtered {
                valid,
                skipped,
                preview,
            } => serde_json::json!({
                "event": "filtered", "valid": valid, "skipped": skipped, "preview": preview
            }),
            ProgressEvent::IndexCreated { name } => serde_json::json!({
                "event": "index_created", "name": name
            }),
            ProgressEvent::BatchUpserted {
                ordinal,
                total,
                first,
                last,
                tokens,
            } => serde_json::json!({
                "event": "batch", "n": ordinal, "total": total,
                "first": first, "last": last, "tokens": tokens
            }),
            ProgressEvent::Sleeping { delay } => serde_json::json!({
                "event": "sleeping", "ms": delay.as_millis() as u64
            }),
            ProgressEvent::Finished { submitted, elapsed } => serde_json::json!({
                "event": "finished", "submitted": submitted, "elapsed_ms": elapsed.as_millis() as u64
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// `"{m}m {s}s"`, seconds rounded to nearest.
pub fn format_elapsed(elapsed: Duration) -> String {
    let ms = elapsed.as_millis();
    let mins = ms / 60_000;
    let secs = ((ms % 60_000) + 500) / 1_000;
    format!("{}m {}s", mins, secs)
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Parse `auto`, `human`, `json`, or `off`.
    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "auto" => Ok(Self::default_for_tty()),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            "off" => Ok(ProgressMode::Off),
            other => Err(format!(
                "unknown progress mode '{}': expected auto, human, json, or off",
                other
            )),
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
