//! Path Expander / File Discoverer: turns a service's path template and a
//! time window into a concrete, deduplicated list of log file paths.

use crate::types::{ServiceDescriptor, TimeWindow};
use chrono::{Duration as ChronoDuration, Timelike};
use std::collections::BTreeSet;

/// Substitute `{YYYY}{MM}{DD}{HH}` with the UTC components of `hour` and
/// `{guid}` with the glob wildcard `*`. `hour` should already be truncated
/// to the top of the hour.
pub fn expand_pattern(template: &str, hour: chrono::DateTime<chrono::Utc>) -> String {
    template
        .replace("{YYYY}", &hour.format("%Y").to_string())
        .replace("{MM}", &hour.format("%m").to_string())
        .replace("{DD}", &hour.format("%d").to_string())
        .replace("{HH}", &hour.format("%H").to_string())
        .replace("{guid}", "*")
}

fn has_date_placeholders(template: &str) -> bool {
    template.contains("{YYYY}") || template.contains("{MM}") || template.contains("{DD}") || template.contains("{HH}")
}

/// Discover files for a single service over a time window.
///
/// Iterates hour-by-hour from the window's start, floored to the top of
/// the hour, through the window's end inclusive of the last partial hour.
/// Read-only, order is unspecified (callers must not rely on it), and
/// duplicates are avoided across hour globs via a set. A template with no
/// date placeholders is globbed once, directly. Missing hours (no files
/// match that hour's glob) simply contribute nothing — not an error.
pub fn discover(descriptor: &ServiceDescriptor, window: TimeWindow) -> Result<Vec<String>, String> {
    if !has_date_placeholders(&descriptor.path_template) {
        return glob_pattern(&descriptor.path_template);
    }

    let mut seen = BTreeSet::new();
    let mut files = BTreeSet::new();

    let mut hour = window
        .start
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(window.start);

    while hour <= window.end {
        let pattern = expand_pattern(&descriptor.path_template, hour);
        if seen.insert(pattern.clone()) {
            for path in glob_pattern(&pattern)? {
                files.insert(path);
            }
        }
        hour += ChronoDuration::hours(1);
    }

    Ok(files.into_iter().collect())
}

fn glob_pattern(pattern: &str) -> Result<Vec<String>, String> {
    let paths = glob::glob(pattern).map_err(|e| format!("bad glob pattern '{pattern}': {e}"))?;
    let mut out = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => out.push(path.to_string_lossy().to_string()),
            // A single unreadable directory entry shouldn't fail the whole
            // discovery pass — skip it, matching the "missing hours ->
            // empty, not error" stance for discovery as a whole.
            Err(_) => continue,
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;

    fn descriptor(template: String) -> ServiceDescriptor {
        ServiceDescriptor { name: "svc".into(), alternate_names: vec![], path_template: template }
    }

    #[test]
    fn no_placeholders_globs_once() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.log"), "x").unwrap();
        let pattern = dir.path().join("*.log").to_string_lossy().to_string();
        let window = TimeWindow::new(
            chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            chrono::Utc.with_ymd_and_hms(2026, 1, 1, 1, 0, 0).unwrap(),
        )
        .unwrap();
        let files = discover(&descriptor(pattern), window).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn hour_by_hour_iteration_covers_day_boundary() {
        let dir = tempfile::tempdir().unwrap();
        // Create hour dirs spanning 2026-01-01T23 through 2026-01-02T01
        for (y, m, d, h) in [(2026, 1, 1, 23), (2026, 1, 2, 0), (2026, 1, 2, 1)] {
            let p = dir.path().join(format!("{y:04}/{m:02}/{d:02}/{h:02}"));
            fs::create_dir_all(&p).unwrap();
            fs::write(p.join("x.log"), "line").unwrap();
        }
        let template = dir.path().join("{YYYY}/{MM}/{DD}/{HH}/*.log").to_string_lossy().to_string();
        let window = TimeWindow::new(
            chrono::Utc.with_ymd_and_hms(2026, 1, 1, 23, 30, 0).unwrap(),
            chrono::Utc.with_ymd_and_hms(2026, 1, 2, 1, 15, 0).unwrap(),
        )
        .unwrap();
        let files = discover(&descriptor(template), window).unwrap();
        assert_eq!(files.len(), 3, "expected one file per hour across the day boundary: {files:?}");
    }

    #[test]
    fn missing_hour_contributes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("{YYYY}/{MM}/{DD}/{HH}/*.log").to_string_lossy().to_string();
        let window = TimeWindow::new(
            chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 30, 0).unwrap(),
        )
        .unwrap();
        let files = discover(&descriptor(template), window).unwrap();
        assert!(files.is_empty());
    }
}
