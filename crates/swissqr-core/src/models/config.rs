//! Configuration structures for the scan pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the swissqr pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Candidate search configuration.
    pub scan: SearchConfig,

    /// Decoder chain configuration.
    pub decoders: DecoderConfig,

    /// PDF rendering configuration.
    pub pdf: PdfConfig,

    /// Heuristic fallback configuration.
    pub heuristic: HeuristicConfig,
}

/// Candidate search and preprocessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Zoom levels tried per page, in order.
    pub zoom_levels: Vec<f32>,

    /// Contrast enhancement factor applied to every candidate.
    pub contrast_factor: f32,

    /// Integer upscale factor applied after contrast enhancement.
    pub upscale_factor: u32,

    /// Upper bound on candidates examined per scan (None = unlimited).
    pub max_candidates: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            zoom_levels: vec![4.0, 6.0, 8.0],
            contrast_factor: 2.0,
            upscale_factor: 2,
            max_candidates: None,
        }
    }
}

/// Decoder availability and model files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Try the detector + super-resolution model pair first.
    pub enable_model: bool,

    /// Fall back to the general-purpose reader.
    pub enable_general: bool,

    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// QR detector model file name.
    pub detector_model: String,

    /// Super-resolution model file name.
    pub sr_model: String,

    /// Minimum detector score for a region to be decoded.
    pub detection_threshold: f32,

    /// Crops with a shorter side below this are super-resolved.
    pub sr_max_size: u32,

    /// Number of CPU threads for model inference.
    pub num_threads: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            enable_model: true,
            enable_general: true,
            model_dir: PathBuf::from("models"),
            detector_model: "detect.onnx".to_string(),
            sr_model: "sr.onnx".to_string(),
            detection_threshold: 0.3,
            sr_max_size: 160,
            num_threads: 4,
        }
    }
}

impl DecoderConfig {
    pub fn detector_path(&self) -> PathBuf {
        self.model_dir.join(&self.detector_model)
    }

    pub fn sr_path(&self) -> PathBuf {
        self.model_dir.join(&self.sr_model)
    }
}

/// PDF page rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Poppler `pdftoppm` executable used to rasterize pages.
    pub renderer: PathBuf,

    /// DPI corresponding to zoom 1.0 (PDF user space is 72 units per inch).
    pub base_dpi: f32,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            renderer: PathBuf::from("pdftoppm"),
            base_dpi: 72.0,
        }
    }
}

/// Heuristic IBAN fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    /// Default for callers that do not choose explicitly.
    pub enabled: bool,

    /// Glob patterns, relative to the output directory, of text artifacts to scan.
    pub artifact_patterns: Vec<String>,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            artifact_patterns: vec!["*.md".to_string()],
        }
    }
}

impl ScanConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ScanConfig =
            serde_json::from_str(r#"{"decoders": {"enable_model": false}}"#).unwrap();

        assert!(!config.decoders.enable_model);
        assert!(config.decoders.enable_general);
        assert_eq!(config.scan.zoom_levels, vec![4.0, 6.0, 8.0]);
        assert_eq!(config.heuristic.artifact_patterns, vec!["*.md".to_string()]);
    }

    #[test]
    fn test_model_paths() {
        let config = DecoderConfig {
            model_dir: PathBuf::from("/opt/qr"),
            ..DecoderConfig::default()
        };
        assert_eq!(config.detector_path(), PathBuf::from("/opt/qr/detect.onnx"));
        assert_eq!(config.sr_path(), PathBuf::from("/opt/qr/sr.onnx"));
    }
}
