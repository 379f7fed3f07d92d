//! Candidate image preprocessing: greyscale, contrast boost, upscale.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma};
use tracing::trace;

use crate::models::config::SearchConfig;

/// Preprocessor applied identically to every candidate before decoding.
#[derive(Debug, Clone)]
pub struct CandidatePreprocessor {
    /// Contrast factor around the mean grey level.
    contrast_factor: f32,
    /// Integer upscale factor.
    upscale_factor: u32,
}

impl CandidatePreprocessor {
    /// Create a preprocessor with default settings (contrast 2.0, upscale 2x).
    pub fn new() -> Self {
        Self {
            contrast_factor: 2.0,
            upscale_factor: 2,
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new()
            .with_contrast_factor(config.contrast_factor)
            .with_upscale_factor(config.upscale_factor)
    }

    /// Set contrast factor.
    pub fn with_contrast_factor(mut self, factor: f32) -> Self {
        self.contrast_factor = factor;
        self
    }

    /// Set upscale factor (values below 1 are treated as 1).
    pub fn with_upscale_factor(mut self, factor: u32) -> Self {
        self.upscale_factor = factor.max(1);
        self
    }

    /// Greyscale, contrast boost and upscale.
    pub fn prepare(&self, image: &DynamicImage) -> GrayImage {
        let gray = image.to_luma8();
        let boosted = enhance_contrast(&gray, self.contrast_factor);
        let prepared = upscale(&boosted, self.upscale_factor);
        trace!(
            "Prepared candidate {}x{} -> {}x{}",
            gray.width(),
            gray.height(),
            prepared.width(),
            prepared.height()
        );
        prepared
    }
}

impl Default for CandidatePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Rounded mean grey level; 0 for an empty image.
pub fn mean_level(image: &GrayImage) -> u8 {
    let count = image.as_raw().len() as u64;
    if count == 0 {
        return 0;
    }
    let sum: u64 = image.as_raw().iter().map(|&v| v as u64).sum();
    ((sum as f64 / count as f64).round()).clamp(0.0, 255.0) as u8
}

/// Each pixel becomes `mean + factor * (pixel - mean)`, clamped to 0..=255.
pub fn enhance_contrast(image: &GrayImage, factor: f32) -> GrayImage {
    let mean = mean_level(image) as f32;
    let mut result = image.clone();
    for Luma([value]) in result.pixels_mut() {
        let boosted = mean + factor * (*value as f32 - mean);
        *value = boosted.round().clamp(0.0, 255.0) as u8;
    }
    result
}

/// Lanczos3 upscale by an integer factor.
pub fn upscale(image: &GrayImage, factor: u32) -> GrayImage {
    if factor <= 1 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    imageops::resize(
        image,
        image.width() * factor,
        image.height() * factor,
        FilterType::Lanczos3,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mean_is_rounded() {
        let img = GrayImage::from_raw(2, 1, vec![100, 101]).unwrap();
        assert_eq!(mean_level(&img), 101);
        assert_eq!(mean_level(&GrayImage::new(0, 0)), 0);
    }

    #[test]
    fn test_contrast_stretches_around_mean() {
        let img = GrayImage::from_raw(4, 1, vec![100, 120, 140, 160]).unwrap();
        // mean 130
        let out = enhance_contrast(&img, 2.0);
        assert_eq!(out.as_raw(), &vec![70, 110, 150, 190]);
    }

    #[test]
    fn test_contrast_clamps() {
        let img = GrayImage::from_raw(2, 1, vec![0, 255]).unwrap();
        let out = enhance_contrast(&img, 2.0);
        assert_eq!(out.as_raw(), &vec![0, 255]);
    }

    #[test]
    fn test_prepare_doubles_dimensions() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(30, 20, Luma([200])));
        let out = CandidatePreprocessor::new().prepare(&img);
        assert_eq!(out.dimensions(), (60, 40));
        // Uniform input stays uniform
        assert!(out.pixels().all(|p| p[0] == 200));
    }

    #[test]
    fn test_from_config() {
        let config = SearchConfig {
            upscale_factor: 3,
            ..SearchConfig::default()
        };
        let img = DynamicImage::ImageLuma8(GrayImage::new(10, 10));
        assert_eq!(
            CandidatePreprocessor::from_config(&config).prepare(&img).dimensions(),
            (30, 30)
        );
    }
}
