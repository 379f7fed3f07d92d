//! Ordered QR decoder chain.
//!
//! Decoders are tried in priority order on each preprocessed tile; the first
//! decoded text that carries the SPC marker wins. Decoder errors never leave
//! the chain: they mean "no result" for that decoder on that tile.

pub mod backend;
pub mod general;
pub mod model;

pub use backend::ModelBackend;
#[cfg(feature = "native")]
pub use backend::OrtModel;
pub use general::GeneralDecoder;
pub use model::{Detection, ModelDecoder};

use image::GrayImage;
use tracing::{debug, trace, warn};

use crate::error::DecodeError;
use crate::models::config::DecoderConfig;
use crate::models::scan::ScanMethod;
use crate::payload::is_spc_payload;

/// Decoder capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderKind {
    /// Detector + super-resolution model pair.
    SpecializedModel,
    /// Whole-image grid reader.
    GeneralPurpose,
}

impl From<DecoderKind> for ScanMethod {
    fn from(kind: DecoderKind) -> Self {
        match kind {
            DecoderKind::SpecializedModel => ScanMethod::WeChat,
            DecoderKind::GeneralPurpose => ScanMethod::OpenCv,
        }
    }
}

/// A QR decoder.
pub trait QrDecoder: Send + Sync {
    fn kind(&self) -> DecoderKind;

    /// All texts decoded from the image; empty when no code is found.
    fn decode(&self, image: &GrayImage) -> Result<Vec<String>, DecodeError>;
}

/// Text accepted by the chain and the decoder that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    pub kind: DecoderKind,
}

/// Decoders in priority order, built once and shared read-only.
pub struct DecoderChain {
    decoders: Vec<Box<dyn QrDecoder>>,
}

impl DecoderChain {
    /// Chain over explicit decoders, tried in the given order.
    pub fn new(decoders: Vec<Box<dyn QrDecoder>>) -> Self {
        Self { decoders }
    }

    /// Chain with only the general-purpose reader.
    pub fn general_only() -> Self {
        Self::new(vec![Box::new(GeneralDecoder::new())])
    }

    /// Build the chain from configuration.
    ///
    /// The model decoder is included only when enabled and both model files
    /// load; otherwise the chain degrades to the general-purpose reader.
    pub fn from_config(config: &DecoderConfig) -> Self {
        let mut decoders: Vec<Box<dyn QrDecoder>> = Vec::new();

        if config.enable_model {
            match load_model_decoder(config) {
                Ok(decoder) => decoders.push(decoder),
                Err(e) => warn!("QR model decoder unavailable, using general decoder only: {}", e),
            }
        }

        if config.enable_general {
            decoders.push(Box::new(GeneralDecoder::new()));
        }

        if decoders.is_empty() {
            warn!("No QR decoders enabled; every scan will come up empty");
        }

        let chain = Self::new(decoders);
        debug!("Decoder chain: {:?}", chain.kinds());
        chain
    }

    /// Kinds of the configured decoders, in priority order.
    pub fn kinds(&self) -> Vec<DecoderKind> {
        self.decoders.iter().map(|d| d.kind()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// First SPC text any decoder finds in the image.
    pub fn decode(&self, image: &GrayImage) -> Option<Decoded> {
        for decoder in &self.decoders {
            let kind = decoder.kind();
            match decoder.decode(image) {
                Ok(texts) => {
                    let count = texts.len();
                    if let Some(text) = texts.into_iter().find(|t| is_spc_payload(t)) {
                        return Some(Decoded { text, kind });
                    }
                    if count > 0 {
                        trace!("{:?} decoded {} non-SPC codes", kind, count);
                    }
                }
                Err(e) => trace!("{:?} decoder failed: {}", kind, e),
            }
        }
        None
    }
}

#[cfg(feature = "native")]
fn load_model_decoder(config: &DecoderConfig) -> Result<Box<dyn QrDecoder>, DecodeError> {
    let detector = OrtModel::from_file(config.detector_path(), config.num_threads)?;
    let super_resolution = OrtModel::from_file(config.sr_path(), config.num_threads)?;
    Ok(Box::new(
        ModelDecoder::new(detector, super_resolution)
            .with_threshold(config.detection_threshold)
            .with_sr_max_size(config.sr_max_size),
    ))
}

#[cfg(not(feature = "native"))]
fn load_model_decoder(_config: &DecoderConfig) -> Result<Box<dyn QrDecoder>, DecodeError> {
    Err(DecodeError::ModelLoad(
        "built without the `native` feature".to_string(),
    ))
}


#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        kind: DecoderKind,
        result: Result<Vec<String>, String>,
        calls: Arc<AtomicUsize>,
    }

    impl Fixed {
        fn boxed(kind: DecoderKind, result: Result<Vec<&str>, &str>) -> (Box<dyn QrDecoder>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let decoder = Self {
                kind,
                result: result
                    .map(|v| v.into_iter().map(String::from).collect())
                    .map_err(String::from),
                calls: calls.clone(),
            };
            (Box::new(decoder) as Box<dyn QrDecoder>, calls)
        }
    }

    impl QrDecoder for Fixed {
        fn kind(&self) -> DecoderKind {
            self.kind
        }

        fn decode(&self, _image: &GrayImage) -> Result<Vec<String>, DecodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone().map_err(DecodeError::Inference)
        }
    }

    fn tile() -> GrayImage {
        GrayImage::new(8, 8)
    }

    #[test]
    fn test_first_decoder_wins() {
        let (model, _) = Fixed::boxed(DecoderKind::SpecializedModel, Ok(vec!["SPC\nA"]));
        let (general, general_calls) = Fixed::boxed(DecoderKind::GeneralPurpose, Ok(vec!["SPC\nB"]));
        let chain = DecoderChain::new(vec![model, general]);

        assert_eq!(
            chain.decode(&tile()),
            Some(Decoded {
                text: "SPC\nA".to_string(),
                kind: DecoderKind::SpecializedModel
            })
        );
        assert_eq!(general_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_errors_and_non_spc_fall_through() {
        let (model, _) = Fixed::boxed(DecoderKind::SpecializedModel, Err("broken"));
        let (general, _) = Fixed::boxed(
            DecoderKind::GeneralPurpose,
            Ok(vec!["https://example.com", "SPC\n0200"]),
        );
        let chain = DecoderChain::new(vec![model, general]);

        let decoded = chain.decode(&tile()).unwrap();
        assert_eq!(decoded.text, "SPC\n0200");
        assert_eq!(ScanMethod::from(decoded.kind), ScanMethod::OpenCv);
    }

    #[test]
    fn test_non_spc_only_is_no_result() {
        let (general, _) = Fixed::boxed(DecoderKind::GeneralPurpose, Ok(vec!["hello"]));
        assert_eq!(DecoderChain::new(vec![general]).decode(&tile()), None);
        assert_eq!(DecoderChain::new(Vec::new()).decode(&tile()), None);
    }

    #[test]
    fn test_missing_models_degrade_to_general() {
        let dir = tempfile::tempdir().unwrap();
        let config = DecoderConfig {
            model_dir: dir.path().to_path_buf(),
            ..DecoderConfig::default()
        };
        let chain = DecoderChain::from_config(&config);
        assert_eq!(chain.kinds(), vec![DecoderKind::GeneralPurpose]);

        let none = DecoderChain::from_config(&DecoderConfig {
            enable_model: false,
            enable_general: false,
            ..DecoderConfig::default()
        });
        assert!(none.is_empty());
    }

    #[test]
    fn test_general_chain_reads_synthetic_code() {
        let img = test_support::qr_image("SPC\n0200\n1", 4);
        let decoded = DecoderChain::general_only().decode(&img).unwrap();
        assert_eq!(decoded.kind, DecoderKind::GeneralPurpose);
        assert_eq!(decoded.text, "SPC\n0200\n1");
    }
}
