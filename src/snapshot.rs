//! On-disk JSON snapshots.
//!
//! The raw dataset and the cleaned intermediate are both JSON arrays of
//! project objects. Anything else (unreadable file, invalid JSON, a
//! top-level value that is not an array) is fatal before any external
//! call is made.

use serde_json::Value;
use std::path::Path;

use hackathon_search_core::clean::clean_projects;
use hackathon_search_core::models::CleanProject;

use crate::error::{IngestError, Result};

/// Read a JSON array from `path`.
pub fn read_array(path: &Path) -> Result<Vec<Value>> {
    let raw = std::fs::read_to_string(path).map_err(|e| IngestError::io(path, e))?;
    let value: Value = serde_json::from_str(&raw).map_err(|e| IngestError::InputShape {
        path: path.to_path_buf(),
        message: format!("not valid JSON: {}", e),
    })?;
    match value {
        Value::Array(items) => Ok(items),
        other => Err(IngestError::InputShape {
            path: path.to_path_buf(),
            message: format!("expected a JSON array of projects, found {}", kind(&other)),
        }),
    }
}

/// Read the cleaned snapshot.
///
/// Entries are passed through the normalizer again, which leaves clean
/// records unchanged and repairs any hand edits to the file.
pub fn read_clean(path: &Path) -> Result<Vec<CleanProject>> {
    Ok(clean_projects(&read_array(path)?))
}

/// Write the cleaned snapshot as pretty-printed JSON, creating parent
/// directories as needed.
pub fn write_clean(path: &Path, projects: &[CleanProject]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| IngestError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(projects)?;
    std::fs::write(path, json).map_err(|e| IngestError::io(path, e))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
