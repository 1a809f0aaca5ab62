//! Result Presenter & Spill Layer: persists the full match list to disk
//! and reads it back, enforcing the path and size rules from `spec.md` §6.

use crate::error::SpillReadError;
use crate::types::{Match, ResultSet, SearchMetadata};
use chrono::Utc;
use std::path::{Path, PathBuf};

const FULL_PREFIX: &str = "logai-search-";
const PARTIAL_PREFIX: &str = "logai-partial-";

/// Truncate a service label for embedding in a spill filename: lowercase,
/// non-alphanumeric runs collapsed to `-`, capped at 24 characters.
fn truncate_label(services: &[String]) -> String {
    let joined = if services.len() == 1 {
        services[0].clone()
    } else {
        format!("{}-and-{}-more", services[0], services.len() - 1)
    };
    let mut label = String::new();
    let mut last_was_dash = false;
    for c in joined.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            label.push(c);
            last_was_dash = false;
        } else if !last_was_dash {
            label.push('-');
            last_was_dash = true;
        }
    }
    label.truncate(24);
    label.trim_matches('-').to_string()
}

fn random_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Build a spill filename following the grammar
/// `logai-(search|partial)-<yyyymmdd-hhmmss>-<service-label>-<rand8>.json`.
pub fn spill_filename(services: &[String], partial: bool) -> String {
    let prefix = if partial { PARTIAL_PREFIX } else { FULL_PREFIX };
    let timestamp = Utc::now().format("%Y%m%d-%H%M%S");
    let label = truncate_label(services);
    format!("{prefix}{timestamp}-{label}-{}.json", random_suffix())
}

/// Write the full match list to a new file under `spill_root`. Returns
/// the path, which the caller records in `SearchMetadata::saved_to`.
pub async fn write_spill(
    spill_root: &Path,
    services: &[String],
    partial: bool,
    matches: &[Match],
) -> Result<PathBuf, String> {
    tokio::fs::create_dir_all(spill_root)
        .await
        .map_err(|e| format!("failed to create spill directory {}: {e}", spill_root.display()))?;
    let path = spill_root.join(spill_filename(services, partial));
    let json = serde_json::to_vec_pretty(matches).map_err(|e| format!("failed to encode matches: {e}"))?;
    tokio::fs::write(&path, json).await.map_err(|e| format!("failed to write spill file {}: {e}", path.display()))?;
    Ok(path)
}

/// Read back a previously-spilled match list, format-agnostic (text vs.
/// structured is a presentation choice made by the caller; the on-disk
/// format is always the same JSON array).
///
/// `path` must: resolve to inside `spill_root`'s canonical tree, carry one
/// of the documented prefixes, exist, and be no larger than `size_cap`.
pub async fn read_spill(
    spill_root: &Path,
    path: &Path,
    size_cap: u64,
) -> Result<ResultSet, SpillReadError> {
    let root_canonical = spill_root
        .canonicalize()
        .map_err(|_| SpillReadError::InvalidPath(spill_root.display().to_string()))?;

    if !path.is_absolute() {
        return Err(SpillReadError::InvalidPath(path.display().to_string()));
    }

    // Containment is checked ahead of the prefix check: a path outside the
    // output root is rejected as `InvalidPath` even if it happens to carry
    // a recognized spill filename, matching the validation order `spec.md`
    // §4.F documents (inside the root tree, then the filename prefix).
    let canonical = match path.canonicalize() {
        Ok(c) => c,
        Err(_) => return Err(SpillReadError::NotFound(path.display().to_string())),
    };
    if !canonical.starts_with(&root_canonical) {
        return Err(SpillReadError::InvalidPath(path.display().to_string()));
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| SpillReadError::InvalidPath(path.display().to_string()))?;
    if !(file_name.starts_with(FULL_PREFIX) || file_name.starts_with(PARTIAL_PREFIX)) {
        return Err(SpillReadError::PrefixMismatch(path.display().to_string()));
    }

    let metadata = tokio::fs::metadata(&canonical)
        .await
        .map_err(|_| SpillReadError::NotFound(path.display().to_string()))?;
    let size = metadata.len();
    if size > size_cap {
        return Err(SpillReadError::FileTooLarge { path: path.display().to_string(), size, cap: size_cap });
    }

    let bytes = tokio::fs::read(&canonical)
        .await
        .map_err(|e| SpillReadError::DecodeError { path: path.display().to_string(), reason: e.to_string() })?;
    let matches: Vec<Match> = serde_json::from_slice(&bytes)
        .map_err(|e| SpillReadError::DecodeError { path: path.display().to_string(), reason: e.to_string() })?;

    let metadata = SearchMetadata {
        total_matches: matches.len(),
        saved_to: Some(path.display().to_string()),
        ..Default::default()
    };
    Ok(ResultSet { matches, metadata })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MatchContent;

    fn sample_matches(n: usize) -> Vec<Match> {
        (0..n)
            .map(|i| Match {
                service: "hub-ca-auth".into(),
                file_path: "/logs/app.log".to_string(),
                line_number: i as u64 + 1,
                content: MatchContent::Raw(format!("line {i}")),
            })
            .collect()
    }

    #[tokio::test]
    async fn round_trips_full_match_list() {
        let dir = tempfile::tempdir().unwrap();
        let services = vec!["hub-ca-auth".to_string()];
        let matches = sample_matches(5);
        let path = write_spill(dir.path(), &services, false, &matches).await.unwrap();
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with(FULL_PREFIX));

        let result = read_spill(dir.path(), &path, 10_000_000).await.unwrap();
        assert_eq!(result.matches.len(), 5);
    }

    #[tokio::test]
    async fn partial_filename_uses_partial_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_spill(dir.path(), &["svc".to_string()], true, &sample_matches(1)).await.unwrap();
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with(PARTIAL_PREFIX));
    }

    #[tokio::test]
    async fn rejects_path_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let evil = outside.path().join("logai-search-20260101-000000-svc-aaaaaaaa.json");
        tokio::fs::write(&evil, b"[]").await.unwrap();
        let err = read_spill(dir.path(), &evil, 10_000_000).await.unwrap_err();
        assert!(matches!(err, SpillReadError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn rejects_missing_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("not-a-spill-file.json");
        tokio::fs::write(&bad, b"[]").await.unwrap();
        let err = read_spill(dir.path(), &bad, 10_000_000).await.unwrap_err();
        assert!(matches!(err, SpillReadError::PrefixMismatch(_)));
    }

    #[tokio::test]
    async fn rejects_oversized_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_spill(dir.path(), &["svc".to_string()], false, &sample_matches(100)).await.unwrap();
        let err = read_spill(dir.path(), &path, 4).await.unwrap_err();
        assert!(matches!(err, SpillReadError::FileTooLarge { .. }));
    }
}
