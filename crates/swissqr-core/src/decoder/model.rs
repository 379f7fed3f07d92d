//! Detector + super-resolution QR decoder.
//!
//! The detector (SSD-style, output `[1, 1, N, 7]`) localizes QR symbols on a
//! downscaled copy of the tile. Each box above the score threshold is padded,
//! cropped from the full-resolution tile, super-resolved when small, and read
//! with the grid decoder. Boxes are tried in descending score order.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use ndarray::{Array4, ArrayD};
use tracing::{debug, trace};

use super::backend::ModelBackend;
use super::general::decode_grids;
use super::{DecoderKind, QrDecoder};
use crate::error::DecodeError;

/// Detector input area in pixels (400x400 for a square tile).
const DETECTOR_TARGET_AREA: f32 = 400.0 * 400.0;

/// Fields per detection row: image id, label, score, x0, y0, x1, y1.
const DETECTION_FIELDS: usize = 7;

/// A detected QR region in tile pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub score: f32,
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

/// Model-based QR decoder.
pub struct ModelDecoder<B: ModelBackend> {
    detector: B,
    super_resolution: B,
    threshold: f32,
    sr_max_size: u32,
    padding: f32,
}

impl<B: ModelBackend> ModelDecoder<B> {
    /// Create a decoder from a detector and a super-resolution model.
    pub fn new(detector: B, super_resolution: B) -> Self {
        Self {
            detector,
            super_resolution,
            threshold: 0.3,
            sr_max_size: 160,
            padding: 0.1,
        }
    }

    /// Set detection score threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Crops with a shorter side below this are super-resolved.
    pub fn with_sr_max_size(mut self, size: u32) -> Self {
        self.sr_max_size = size;
        self
    }

    /// Detect QR regions, sorted by descending score.
    pub fn detect(&self, image: &GrayImage) -> Result<Vec<Detection>, DecodeError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(DecodeError::InvalidImage("empty image".to_string()));
        }

        let scale = (DETECTOR_TARGET_AREA / (width as f32 * height as f32)).sqrt();
        let det_w = ((width as f32 * scale).round() as u32).max(1);
        let det_h = ((height as f32 * scale).round() as u32).max(1);
        let resized = imageops::resize(image, det_w, det_h, FilterType::CatmullRom);
        trace!("Detector input {}x{} (from {}x{})", det_w, det_h, width, height);

        let output = self.detector.run(to_tensor(&resized))?;
        let rows = detection_rows(&output)?;

        let mut detections: Vec<Detection> = rows
            .chunks_exact(DETECTION_FIELDS)
            .filter(|row| row[2] > self.threshold)
            .map(|row| Detection {
                score: row[2],
                x0: (row[3] * width as f32).clamp(0.0, width as f32),
                y0: (row[4] * height as f32).clamp(0.0, height as f32),
                x1: (row[5] * width as f32).clamp(0.0, width as f32),
                y1: (row[6] * height as f32).clamp(0.0, height as f32),
            })
            .filter(|d| d.x1 > d.x0 && d.y1 > d.y0)
            .collect();

        detections.sort_by(|a, b| b.score.total_cmp(&a.score));
        debug!("Detector found {} QR regions above {}", detections.len(), self.threshold);
        Ok(detections)
    }

    /// Padded crop of a detection from the tile.
    fn crop(&self, image: &GrayImage, det: &Detection) -> Option<GrayImage> {
        let pad_x = (det.x1 - det.x0) * self.padding;
        let pad_y = (det.y1 - det.y0) * self.padding;
        let x0 = (det.x0 - pad_x).max(0.0) as u32;
        let y0 = (det.y0 - pad_y).max(0.0) as u32;
        let x1 = ((det.x1 + pad_x).ceil() as u32).min(image.width());
        let y1 = ((det.y1 + pad_y).ceil() as u32).min(image.height());

        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(imageops::crop_imm(image, x0, y0, x1 - x0, y1 - y0).to_image())
    }

    /// Run the super-resolution model on a crop.
    fn super_resolve(&self, crop: &GrayImage) -> Result<GrayImage, DecodeError> {
        let output = self.super_resolution.run(to_tensor(crop))?;
        from_tensor(&output)
    }
}

impl<B: ModelBackend> QrDecoder for ModelDecoder<B> {
    fn kind(&self) -> DecoderKind {
        DecoderKind::SpecializedModel
    }

    fn decode(&self, image: &GrayImage) -> Result<Vec<String>, DecodeError> {
        let mut texts = Vec::new();

        for det in self.detect(image)? {
            let Some(crop) = self.crop(image, &det) else {
                continue;
            };

            let crop = if crop.width().min(crop.height()) < self.sr_max_size {
                match self.super_resolve(&crop) {
                    Ok(upscaled) => upscaled,
                    Err(e) => {
                        trace!("Super-resolution failed, using raw crop: {}", e);
                        crop
                    }
                }
            } else {
                crop
            };

            let found = decode_grids(&crop);
            trace!("Region with score {:.3} decoded {} codes", det.score, found.len());
            texts.extend(found);
        }

        Ok(texts)
    }
}

/// NCHW tensor `[1, 1, H, W]` normalized to `[0, 1]`.
fn to_tensor(image: &GrayImage) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 1, height as usize, width as usize));
    for (x, y, Luma([value])) in image.enumerate_pixels() {
        tensor[[0, 0, y as usize, x as usize]] = *value as f32 / 255.0;
    }
    tensor
}

/// Greyscale image from a `[.., H, W]` tensor in `[0, 1]`.
fn from_tensor(output: &ArrayD<f32>) -> Result<GrayImage, DecodeError> {
    let shape = output.shape();
    if shape.len() < 2 || shape[..shape.len() - 2].iter().any(|&d| d != 1) {
        return Err(DecodeError::Inference(format!(
            "unexpected super-resolution output shape {:?}",
            shape
        )));
    }
    let (height, width) = (shape[shape.len() - 2], shape[shape.len() - 1]);

    let pixels: Vec<u8> = output
        .iter()
        .map(|&v| (v * 255.0).round().clamp(0.0, 255.0) as u8)
        .collect();
    GrayImage::from_raw(width as u32, height as u32, pixels)
        .ok_or_else(|| DecodeError::Inference("super-resolution output size mismatch".to_string()))
}

/// Flattened detection rows from an `[.., N, 7]` output.
fn detection_rows(output: &ArrayD<f32>) -> Result<Vec<f32>, DecodeError> {
    match output.shape().last() {
        Some(&DETECTION_FIELDS) => Ok(output.iter().cloned().collect()),
        _ => Err(DecodeError::Inference(format!(
            "unexpected detector output shape {:?}",
            output.shape()
        ))),
    }
}
