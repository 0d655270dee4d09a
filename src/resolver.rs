//! Filename resolution across Unicode normalization forms.
//!
//! Data directories assembled from several machines mix NFC and NFD
//! encodings of the same hangul filenames (macOS decomposes on write,
//! most other systems do not). Raw byte comparison therefore misses
//! files that are visually identical to the expected name. Matching is
//! done on a canonical equivalence key instead: the trimmed NFC form of
//! the name. Keying both sides with NFC covers the full union of
//! composed/decomposed spellings, since canonically equivalent strings
//! share one NFC form.

use crate::error::PipelineError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;

/// Canonical equivalence key for a name: trimmed, NFC-normalized.
pub fn canonical_key(name: &str) -> String {
    name.trim().nfc().collect()
}

/// A resolved source file together with the directory name it was
/// found under (useful for reporting which spelling matched).
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFile {
    pub path: PathBuf,
    pub file_name: String,
    /// Names of further entries that matched the same logical name.
    /// Non-fatal; the caller should surface them as warnings.
    pub duplicates: Vec<String>,
}

/// Locate the file whose name is canonically equal to `logical_name`.
///
/// Returns `Ok(None)` when nothing matches; the caller decides whether
/// that is recoverable. When several directory entries match (the same
/// text in different encodings can coexist on some filesystems), the
/// first one in directory order wins and the duplicate is logged.
pub fn resolve(dir: &Path, logical_name: &str) -> Result<Option<ResolvedFile>, PipelineError> {
    resolve_with(dir, |candidate| {
        canonical_key(candidate) == canonical_key(logical_name)
    })
}

/// Locate the first file whose canonical name ends with the canonical
/// form of `suffix`. Used for sources with a variable prefix, such as
/// the combined growth workbook (`<N>개교_...`).
pub fn resolve_by_suffix(dir: &Path, suffix: &str) -> Result<Option<ResolvedFile>, PipelineError> {
    let key = canonical_key(suffix);
    resolve_with(dir, |candidate| canonical_key(candidate).ends_with(&key))
}

fn resolve_with<F>(dir: &Path, matches: F) -> Result<Option<ResolvedFile>, PipelineError>
where
    F: Fn(&str) -> bool,
{
    let entries = fs::read_dir(dir)
        .map_err(|e| PipelineError::Io(dir.display().to_string(), e))?;

    let mut found: Option<ResolvedFile> = None;

    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::Io(dir.display().to_string(), e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().to_string();
        if !matches(&file_name) {
            continue;
        }

        match &mut found {
            None => {
                debug!("resolved '{}' in {}", file_name, dir.display());
                found = Some(ResolvedFile {
                    path,
                    file_name,
                    duplicates: Vec::new(),
                });
            }
            Some(first) => {
                warn!(
                    "multiple candidates for the same logical name in {}: keeping '{}', ignoring '{}'",
                    dir.display(),
                    first.file_name,
                    file_name
                );
                first.duplicates.push(file_name);
            }
        }
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn nfd(s: &str) -> String {
        s.nfd().collect()
    }

    #[test]
    fn test_canonical_key_trims_and_composes() {
        assert_eq!(canonical_key("  송도고 "), "송도고");
        assert_eq!(canonical_key(&nfd("송도고")), "송도고");
    }

    #[test]
    fn test_resolve_exact_name() {
        let dir = TempDir::new().unwrap();
        File::create(dir.path().join("송도고_환경데이터.csv")).unwrap();

        let resolved = resolve(dir.path(), "송도고_환경데이터.csv").unwrap();
        assert!(resolved.is_some());
    }

    #[test]
    fn test_resolve_is_normalization_invariant() {
        let dir = TempDir::new().unwrap();
        // File on disk in decomposed form, query in composed form.
        File::create(dir.path().join(nfd("하늘고_환경데이터.csv"))).unwrap();

        let composed = resolve(dir.path(), "하늘고_환경데이터.csv").unwrap();
        let decomposed = resolve(dir.path(), &nfd("하늘고_환경데이터.csv")).unwrap();

        assert!(composed.is_some());
        assert_eq!(
            composed.unwrap().path,
            decomposed.expect("decomposed query must match too").path
        );
    }

    #[test]
    fn test_resolve_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        File::create(dir.path().join("other.csv")).unwrap();

        let resolved = resolve(dir.path(), "송도고_환경데이터.csv").unwrap();
        assert!(resolved.is_none());
    }

    #[test]
    fn test_resolve_ignores_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("송도고_환경데이터.csv")).unwrap();

        let resolved = resolve(dir.path(), "송도고_환경데이터.csv").unwrap();
        assert!(resolved.is_none());
    }

    #[test]
    fn test_resolve_by_suffix() {
        let dir = TempDir::new().unwrap();
        File::create(dir.path().join("4개교_생육결과데이터.xlsx")).unwrap();
        File::create(dir.path().join("notes.txt")).unwrap();

        let resolved = resolve_by_suffix(dir.path(), "개교_생육결과데이터.xlsx").unwrap();
        assert_eq!(resolved.unwrap().file_name, "4개교_생육결과데이터.xlsx");
    }

    #[test]
    fn test_resolve_by_suffix_matches_decomposed_file() {
        let dir = TempDir::new().unwrap();
        File::create(dir.path().join(nfd("4개교_생육결과데이터.xlsx"))).unwrap();

        let resolved = resolve_by_suffix(dir.path(), "개교_생육결과데이터.xlsx").unwrap();
        assert!(resolved.is_some());
    }
}
