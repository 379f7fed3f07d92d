//! Error types for the swissqr-core library.

use thiserror::Error;

/// Main error type for the swissqr library.
#[derive(Error, Debug)]
pub enum SwissQrError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Artifact serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors related to PDF access and rendering.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to open PDF: {0}")]
    Open(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page index requested (0-based).
    #[error("invalid page index: {0}")]
    InvalidPage(usize),

    /// Rendering a page to a raster image failed.
    #[error("failed to render page {page} at zoom {zoom}: {reason}")]
    Render { page: usize, zoom: f32, reason: String },

    /// Failed to extract embedded images from a page.
    #[error("failed to extract images: {0}")]
    ImageExtraction(String),
}

/// Errors raised inside a single decoder.
///
/// The decoder chain treats every variant as "no result" for the image at hand.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Failed to load a decoder model.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Model inference failed or produced an unexpected tensor.
    #[error("inference failed: {0}")]
    Inference(String),

    /// The image cannot be handed to the decoder.
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

/// Errors related to SPC payload parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// The text is not a well-formed Swiss Payments Code payload.
    #[error("invalid Swiss QR payload format: {0}")]
    InvalidPayloadFormat(String),
}

/// Result type for the swissqr library.
pub type Result<T> = std::result::Result<T, SwissQrError>;
