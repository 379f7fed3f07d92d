//! Heuristic fallback: recover a Swiss IBAN from text artifacts when no QR
//! code could be decoded.
//!
//! Text artifacts are files produced next to the scan output by other tools
//! (typically Markdown exports). They are read in lexicographic path order and
//! the first accepted token wins.

pub mod iban;
pub mod patterns;

pub use iban::{extract_swiss_iban, format_iban, validate_iban};

use std::path::Path;
use tracing::{debug, trace, warn};

/// Read every file in `dir` matching one of `patterns`, sorted by path.
///
/// Unreadable files are skipped. Non-UTF-8 content is decoded lossily.
pub fn list_text_artifacts(dir: &Path, patterns: &[String]) -> Vec<String> {
    let base = glob::Pattern::escape(&dir.to_string_lossy());

    let mut paths = Vec::new();
    for pattern in patterns {
        let full = format!("{}/{}", base, pattern);
        match glob::glob(&full) {
            Ok(entries) => paths.extend(entries.filter_map(|e| e.ok())),
            Err(e) => warn!("Invalid artifact pattern {:?}: {}", pattern, e),
        }
    }
    paths.sort();
    paths.dedup();

    paths
        .into_iter()
        .filter(|p| p.is_file())
        .filter_map(|p| match std::fs::read(&p) {
            Ok(bytes) => {
                trace!("Read text artifact {}", p.display());
                Some(String::from_utf8_lossy(&bytes).into_owned())
            }
            Err(e) => {
                debug!("Skipping unreadable artifact {}: {}", p.display(), e);
                None
            }
        })
        .collect()
}

/// First Swiss IBAN-like token across `texts`, in order.
pub fn find_iban<S: AsRef<str>>(texts: &[S]) -> Option<String> {
    texts.iter().find_map(|t| extract_swiss_iban(t.as_ref()))
}

/// Scan the text artifacts in `dir` for a Swiss IBAN.
pub fn find_iban_in_dir(dir: &Path, patterns: &[String]) -> Option<String> {
    let texts = list_text_artifacts(dir, patterns);
    debug!("Heuristic scan over {} text artifacts in {}", texts.len(), dir.display());

    let found = find_iban(&texts)?;
    if !validate_iban(&found) {
        warn!("Heuristic IBAN {} fails checksum validation", format_iban(&found));
    }
    Some(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn md() -> Vec<String> {
        vec!["*.md".to_string()]
    }

    #[test]
    fn test_lists_artifacts_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.md"), "second").unwrap();
        fs::write(dir.path().join("a.md"), "first").unwrap();
        fs::write(dir.path().join("c.txt"), "ignored").unwrap();

        let texts = list_text_artifacts(dir.path(), &md());
        assert_eq!(texts, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn test_lossy_decoding() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), b"IBAN \xff CH93 0076 2011 6238 5295 7\n").unwrap();

        assert_eq!(
            find_iban_in_dir(dir.path(), &md()).as_deref(),
            Some("CH9300762011623852957")
        );
    }

    #[test]
    fn test_first_artifact_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "Konto: CH44 3199 9123 0008 8901 2").unwrap();
        fs::write(dir.path().join("b.md"), "Konto: CH93 0076 2011 6238 5295 7").unwrap();

        assert_eq!(
            find_iban_in_dir(dir.path(), &md()).as_deref(),
            Some("CH4431999123000889012")
        );
    }

    #[test]
    fn test_no_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(find_iban_in_dir(dir.path(), &md()), None);
        assert!(list_text_artifacts(&dir.path().join("missing"), &md()).is_empty());
    }

    #[test]
    fn test_find_iban_skips_texts_without_match() {
        let texts = ["nothing here", "Ref CH93 0076 2011 6238 5295 7 | end"];
        assert_eq!(find_iban(&texts).as_deref(), Some("CH9300762011623852957"));
    }
}
