//! PDF page access: page count, rendering and embedded raster images.

mod document;

pub use document::PdfDocument;

use crate::error::PdfError;
use image::DynamicImage;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Page-level access to a document, as consumed by the candidate generator.
///
/// Page indices are 0-based.
pub trait PageSource {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Rasterize a page at a zoom factor (1.0 = 72 DPI).
    fn render(&self, page: usize, zoom: f32) -> Result<DynamicImage>;

    /// Raster images embedded on a page, in document enumeration order.
    fn embedded_images(&self, page: usize) -> Result<Vec<DynamicImage>>;
}

impl<T: PageSource + ?Sized> PageSource for &T {
    fn page_count(&self) -> usize {
        (**self).page_count()
    }

    fn render(&self, page: usize, zoom: f32) -> Result<DynamicImage> {
        (**self).render(page, zoom)
    }

    fn embedded_images(&self, page: usize) -> Result<Vec<DynamicImage>> {
        (**self).embedded_images(page)
    }
}
