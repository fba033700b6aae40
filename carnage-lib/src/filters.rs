//! Which files in the watched folder are match reports.

use std::path::Path;

/// Name fragments of report files the game client writes.
const REPORT_MARKERS: &[&str] = &["mpcarnagereport", "asq_"];

/// Files the operator drops in to poke the watcher.
const EXCLUDED_MARKERS: &[&str] = &["test_trigger"];

/// True when `path` looks like a carnage report with the given extension.
pub fn is_report_candidate(path: &Path, extension: &str) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let has_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension));
    if !has_extension {
        return false;
    }
    let lower = name.to_lowercase();
    if EXCLUDED_MARKERS.iter().any(|m| lower.contains(m)) {
        return false;
    }
    REPORT_MARKERS.iter().any(|m| lower.contains(m))
}
