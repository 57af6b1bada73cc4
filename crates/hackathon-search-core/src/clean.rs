//! Record normalizer.
//!
//! Turns raw, loosely-typed project records into [`CleanProject`]s. Cleaning
//! never fails: a malformed field silently degrades to its empty default.
//!
//! # Rules
//!
//! - Scalar fields are kept (trimmed) only if they are JSON strings;
//!   anything else becomes `""`.
//! - List fields are kept only if they are JSON arrays; each element is
//!   scalar-coerced and empty results are dropped, preserving order.
//!
//! # Example
//!
//! ```rust
//! use hackathon_search_core::clean::clean_project;
//! use serde_json::json;
//!
//! let p = clean_project(&json!({"title": "  X ", "techUsed": ["a", "", 1, "b"]}));
//! assert_eq!(p.title, "X");
//! assert_eq!(p.tech_used, vec!["a", "b"]);
//! assert_eq!(p.caption, "");
//! ```

use serde_json::Value;

use crate::models::CleanProject;

/// Normalize a single raw record.
///
/// Non-object input yields a fully-defaulted project.
pub fn clean_project(raw: &Value) -> CleanProject {
    CleanProject {
        title: scalar(raw.get("title")),
        caption: scalar(raw.get("caption")),
        url: scalar(raw.get("url")),
        video_link: scalar(raw.get("videoLink")),
        description: scalar(raw.get("description")),
        tech_used: string_list(raw.get("techUsed")),
        external_links: string_list(raw.get("externalLinks")),
        hackathon: scalar(raw.get("hackathon")),
    }
}

/// Normalize a sequence of raw records, one-to-one and in order.
pub fn clean_projects(raw: &[Value]) -> Vec<CleanProject> {
    raw.iter().map(clean_project).collect()
}

fn scalar(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        _ => String::new(),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| scalar(Some(v)))
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_and_trims_strings() {
        let p = clean_project(&json!({
            "title": "  Echo  ",
            "caption": "\tcap\n",
            "url": "https://example.com",
            "videoLink": " https://youtu.be/x ",
            "description": "desc",
            "hackathon": "hackmit"
        }));
        assert_eq!(p.title, "Echo");
        assert_eq!(p.caption, "cap");
        assert_eq!(p.video_link, "https://youtu.be/x");
        assert_eq!(p.hackathon, "hackmit");
    }

    #[test]
    fn non_string_scalars_become_empty() {
        let p = clean_project(&json!({
            "title": 42,
            "caption": null,
            "url": {"href": "x"},
            "videoLink": ["x"],
            "description": true
        }));
        assert_eq!(p.title, "");
        assert_eq!(p.caption, "");
        assert_eq!(p.url, "");
        assert_eq!(p.video_link, "");
        assert_eq!(p.description, "");
        assert_eq!(p.hackathon, "");
    }

    #[test]
    fn non_list_fields_become_empty_lists() {
        let p = clean_project(&json!({
            "techUsed": "rust, go",
            "externalLinks": {"0": "x"}
        }));
        assert!(p.tech_used.is_empty());
        assert!(p.external_links.is_empty());
    }

    #[test]
    fn blank_and_malformed_entries_dropped_in_order() {
        let p = clean_project(&json!({
            "techUsed": ["  z ", "", "   ", null, 3, {"a": 1}, "a", "m"],
            "externalLinks": [" https://a ", "\n", "https://b"]
        }));
        assert_eq!(p.tech_used, vec!["z", "a", "m"]);
        assert_eq!(p.external_links, vec!["https://a", "https://b"]);
    }

    #[test]
    fn non_object_record_is_fully_defaulted() {
        assert_eq!(clean_project(&json!("oops")), CleanProject::default());
        assert_eq!(clean_project(&Value::Null), CleanProject::default());
    }

    #[test]
    fn scenario_mixed_tech_list() {
        let p = clean_project(&json!({
            "title": "X",
            "caption": "Y",
            "description": "Z",
            "techUsed": ["a", "", 1, "b"]
        }));
        assert_eq!(p.title, "X");
        assert_eq!(p.tech_used, vec!["a", "b"]);
        assert_eq!(p.derived_text(), "Y\nZ");
    }

    #[test]
    fn one_to_one_and_order_preserving() {
        let raw = vec![json!({"title": "a"}), json!(7), json!({"title": "c"})];
        let cleaned = clean_projects(&raw);
        assert_eq!(cleaned.len(), 3);
        assert_eq!(cleaned[0].title, "a");
        assert_eq!(cleaned[1].title, "");
        assert_eq!(cleaned[2].title, "c");
    }
}
