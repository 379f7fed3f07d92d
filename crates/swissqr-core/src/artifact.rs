//! Scan result artifacts written next to the scanned document's other outputs.
//!
//! All artifacts are pretty-printed UTF-8 JSON written atomically: the
//! content goes to a temporary file in the target directory which is then
//! renamed over the destination.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::Result;
use crate::models::invoice::{Invoice, InvoiceStub};

/// Message stored in the error artifact.
pub const NO_CODE_FOUND: &str = "No QR code found";

/// The three artifact files a scan can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// `{stem}_qr.json`
    Qr,
    /// `{stem}_qr_error.json`
    Error,
    /// `{stem}_qr_fallback.json`
    Fallback,
}

impl ArtifactKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Qr => "_qr.json",
            Self::Error => "_qr_error.json",
            Self::Fallback => "_qr_fallback.json",
        }
    }

    /// Artifact path for a document stem inside `dir`.
    pub fn path(&self, dir: &Path, stem: &str) -> PathBuf {
        dir.join(format!("{}{}", stem, self.suffix()))
    }
}

/// `{stem}_qr.json`: decoded text and the parsed invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrArtifact {
    pub raw_qr_text: String,
    pub parsed_invoice: Invoice,
}

/// `{stem}_qr_error.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorArtifact {
    pub error: String,
}

impl ErrorArtifact {
    pub fn no_code_found() -> Self {
        Self {
            error: NO_CODE_FOUND.to_string(),
        }
    }
}

/// `{stem}_qr_fallback.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackArtifact {
    /// Always null: no QR symbol was decoded.
    pub raw_qr_text: Option<String>,
    pub heuristic_iban: String,
    pub parsed_invoice: InvoiceStub,
}

impl FallbackArtifact {
    pub fn from_iban(iban: &str) -> Self {
        Self {
            raw_qr_text: None,
            heuristic_iban: iban.to_string(),
            parsed_invoice: InvoiceStub::from_iban(iban),
        }
    }
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.write_all(b"\n")?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;

    debug!("Wrote {}", path.display());
    Ok(())
}

/// Read an artifact back.
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::parse_swiss_qr;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_artifact_paths() {
        let dir = Path::new("/out");
        assert_eq!(ArtifactKind::Qr.path(dir, "inv"), PathBuf::from("/out/inv_qr.json"));
        assert_eq!(
            ArtifactKind::Error.path(dir, "inv"),
            PathBuf::from("/out/inv_qr_error.json")
        );
        assert_eq!(
            ArtifactKind::Fallback.path(dir, "inv"),
            PathBuf::from("/out/inv_qr_fallback.json")
        );
    }

    #[test]
    fn test_error_artifact_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a_qr_error.json");
        write_json(&path, &ErrorArtifact::no_code_found()).unwrap();

        let value: serde_json::Value = read_json(&path).unwrap();
        assert_eq!(value, json!({"error": "No QR code found"}));
    }

    #[test]
    fn test_fallback_artifact_format() {
        let artifact = FallbackArtifact::from_iban("CH9300762011623852957");
        assert_eq!(
            serde_json::to_value(&artifact).unwrap(),
            json!({
                "raw_qr_text": null,
                "heuristic_iban": "CH9300762011623852957",
                "parsed_invoice": {
                    "qr_type": null,
                    "version": null,
                    "coding_type": null,
                    "iban": "CH9300762011623852957",
                    "creditor": null,
                    "amount": null,
                    "currency": null
                }
            })
        );
    }

    #[test]
    fn test_qr_artifact_keeps_non_ascii_and_amount_text() {
        let text = "SPC\n0200\n1\nCH4431999123000889012\nS\nZürcher Bäckerei\n\n\n8000\nZürich\nCH\n\n\n\n\n\n\n\n1200.00\nCHF";
        let artifact = QrArtifact {
            raw_qr_text: text.to_string(),
            parsed_invoice: parse_swiss_qr(text).unwrap(),
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a_qr.json");
        write_json(&path, &artifact).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("Zürcher Bäckerei"));
        assert!(raw.contains("\"amount\": \"1200.00\""));

        let back: QrArtifact = read_json(&path).unwrap();
        assert_eq!(back, artifact);
    }

    #[test]
    fn test_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a_qr_error.json");
        std::fs::write(&path, "stale").unwrap();
        write_json(&path, &ErrorArtifact::no_code_found()).unwrap();

        let back: ErrorArtifact = read_json(&path).unwrap();
        assert_eq!(back, ErrorArtifact::no_code_found());
        // Only the target remains; the temporary file was renamed.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
