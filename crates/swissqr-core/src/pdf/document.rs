//! PDF document handle backed by lopdf, rendered through Poppler's `pdftoppm`.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use tracing::{debug, trace};

use super::{PageSource, Result};
use crate::error::PdfError;
use crate::models::config::PdfConfig;

/// An open PDF document.
///
/// Owns the parsed document and a temporary directory for rendered pages;
/// both are released when the handle is dropped.
pub struct PdfDocument {
    path: PathBuf,
    document: Document,
    pages: Vec<ObjectId>,
    render_dir: TempDir,
    renderer: PathBuf,
    base_dpi: f32,
}

impl PdfDocument {
    /// Open and parse a PDF file.
    pub fn open(path: &Path, config: &PdfConfig) -> Result<Self> {
        let data = std::fs::read(path)
            .map_err(|e| PdfError::Open(format!("{}: {}", path.display(), e)))?;
        let mut document = Document::load_mem(&data).map_err(|e| PdfError::Open(e.to_string()))?;

        // Handle PDFs with empty password encryption
        if document.is_encrypted() {
            if document.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");
        }

        let pages: Vec<ObjectId> = document.get_pages().into_values().collect();
        if pages.is_empty() {
            return Err(PdfError::NoPages);
        }

        let render_dir = TempDir::new()
            .map_err(|e| PdfError::Open(format!("failed to create render directory: {}", e)))?;

        debug!("Opened {} with {} pages", path.display(), pages.len());
        Ok(Self {
            path: path.to_path_buf(),
            document,
            pages,
            render_dir,
            renderer: config.renderer.clone(),
            base_dpi: config.base_dpi,
        })
    }

    /// Path the document was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn page_id(&self, page: usize) -> Result<ObjectId> {
        self.pages.get(page).copied().ok_or(PdfError::InvalidPage(page))
    }

    fn try_extract_image_from_object(&self, obj: &Object) -> Option<DynamicImage> {
        let Object::Stream(stream) = obj else {
            return None;
        };
        let dict = &stream.dict;

        // Check if it's an image XObject
        if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
            return None;
        }

        let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
        let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;
        trace!("Found image object: {}x{}", width, height);

        let filters = dict.get(b"Filter").map(filter_chain).unwrap_or_default();
        if let Some(&codec) = filters.last().filter(|f| is_image_codec(f)) {
            if filters.len() > 1 {
                trace!(
                    "Skipping image with chained filters {:?}",
                    filters.iter().map(|f| String::from_utf8_lossy(f)).collect::<Vec<_>>()
                );
                return None;
            }
            if codec != b"DCTDecode" {
                trace!("Unsupported image filter {}", String::from_utf8_lossy(codec));
                return None;
            }
            trace!("Decoding JPEG image");
            return image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg)
                .ok();
        }

        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());

        let color_space = dict
            .get(b"ColorSpace")
            .ok()
            .and_then(|o| match o {
                Object::Name(name) => Some(name.as_slice()),
                Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
                Object::Reference(r) => self.document.get_object(*r).ok().and_then(|o| o.as_name().ok()),
                _ => None,
            })
            .unwrap_or(b"DeviceRGB");

        let bits = dict
            .get(b"BitsPerComponent")
            .ok()
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(8) as u8;

        image_from_raw(&data, width, height, color_space, bits)
    }

    /// Resources dictionary for a page, following `/Parent` inheritance.
    fn page_resources(&self, node_id: ObjectId) -> Option<Dictionary> {
        let Ok(Object::Dictionary(dict)) = self.document.get_object(node_id) else {
            return None;
        };

        if let Ok(resources) = dict.get(b"Resources") {
            if let Ok((_, Object::Dictionary(res_dict))) = self.document.dereference(resources) {
                return Some(res_dict.clone());
            }
        }

        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => self.page_resources(*parent_id),
            _ => None,
        }
    }
}

impl PageSource for PdfDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn render(&self, page: usize, zoom: f32) -> Result<DynamicImage> {
        self.page_id(page)?;

        let dpi = (zoom * self.base_dpi).round().max(1.0) as u32;
        let prefix = self.render_dir.path().join(format!("page-{}-{}", page, dpi));
        let page_number = (page + 1).to_string();
        let render_error = |reason: String| PdfError::Render { page, zoom, reason };

        trace!("Rendering page {} at {} DPI", page, dpi);
        let output = Command::new(&self.renderer)
            .args(["-png", "-singlefile", "-r"])
            .arg(dpi.to_string())
            .args(["-f", page_number.as_str(), "-l", page_number.as_str()])
            .arg(&self.path)
            .arg(&prefix)
            .output()
            .map_err(|e| render_error(format!("failed to run {}: {}", self.renderer.display(), e)))?;

        if !output.status.success() {
            return Err(render_error(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let png = prefix.with_extension("png");
        let image = image::open(&png).map_err(|e| render_error(e.to_string()))?;
        if let Err(e) = std::fs::remove_file(&png) {
            trace!("Could not remove {}: {}", png.display(), e);
        }
        Ok(image)
    }

    fn embedded_images(&self, page: usize) -> Result<Vec<DynamicImage>> {
        let page_id = self.page_id(page)?;
        let mut images = Vec::new();

        let Some(resources) = self.page_resources(page_id) else {
            return Ok(images);
        };
        let Ok(xobjects) = resources.get(b"XObject") else {
            return Ok(images);
        };
        let xobj_dict = match self.document.dereference(xobjects) {
            Ok((_, Object::Dictionary(dict))) => dict,
            Ok(_) => {
                return Err(PdfError::ImageExtraction(format!(
                    "page {}: /XObject is not a dictionary",
                    page
                )));
            }
            Err(e) => return Err(PdfError::ImageExtraction(e.to_string())),
        };

        for (name, obj_ref) in xobj_dict.iter() {
            if let Ok((_, obj)) = self.document.dereference(obj_ref) {
                match self.try_extract_image_from_object(obj) {
                    Some(img) => images.push(img),
                    None => trace!("Skipping XObject {}", String::from_utf8_lossy(name)),
                }
            }
        }

        debug!("Extracted {} images from page {}", images.len(), page);
        Ok(images)
    }
}

/// Filter names of a stream, in application order.
fn filter_chain(filter: &Object) -> Vec<&[u8]> {
    match filter {
        Object::Name(name) => vec![name.as_slice()],
        Object::Array(arr) => arr.iter().filter_map(|o| o.as_name().ok()).collect(),
        _ => Vec::new(),
    }
}

/// Filters whose output is an encoded image rather than raw samples.
fn is_image_codec(filter: &[u8]) -> bool {
    matches!(
        filter,
        b"DCTDecode" | b"JPXDecode" | b"CCITTFaxDecode" | b"JBIG2Decode"
    )
}

/// Build an image from raw (already decompressed) sample data.
fn image_from_raw(
    data: &[u8],
    width: u32,
    height: u32,
    color_space: &[u8],
    bits_per_component: u8,
) -> Option<DynamicImage> {
    let pixels = (width as usize).checked_mul(height as usize)?;
    if pixels == 0 {
        return None;
    }

    if bits_per_component == 1 {
        return bilevel_image(data, width, height).map(DynamicImage::ImageLuma8);
    }
    if bits_per_component != 8 {
        trace!("Unsupported bits per component: {}", bits_per_component);
        return None;
    }

    let components = match color_space {
        b"DeviceGray" | b"G" | b"CalGray" => 1,
        b"DeviceRGB" | b"RGB" | b"CalRGB" => 3,
        b"DeviceCMYK" | b"CMYK" => 4,
        // ICC-based and other spaces: infer from the sample count
        _ => data.len() / pixels,
    };

    let samples = &data[..data.len().min(pixels * components)];
    if samples.len() < pixels * components {
        trace!(
            "Could not decode image: data_len={}, expected={}",
            data.len(),
            pixels * components
        );
        return None;
    }

    match components {
        1 => GrayImage::from_raw(width, height, samples.to_vec()).map(DynamicImage::ImageLuma8),
        3 => RgbImage::from_raw(width, height, samples.to_vec()).map(DynamicImage::ImageRgb8),
        4 => {
            let rgb: Vec<u8> = samples.chunks_exact(4).flat_map(cmyk_to_rgb).collect();
            ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, rgb).map(DynamicImage::ImageRgb8)
        }
        _ => None,
    }
}

/// Unpack 1-bit samples (rows padded to whole bytes, 0 = black).
fn bilevel_image(data: &[u8], width: u32, height: u32) -> Option<GrayImage> {
    let row_bytes = (width as usize).div_ceil(8);
    if data.len() < row_bytes * height as usize {
        return None;
    }

    let mut img = GrayImage::new(width, height);
    for (y, row) in data.chunks(row_bytes).take(height as usize).enumerate() {
        for x in 0..width as usize {
            let bit = (row[x / 8] >> (7 - (x % 8))) & 1;
            img.put_pixel(x as u32, y as u32, Luma([if bit == 1 { 255 } else { 0 }]));
        }
    }
    Some(img)
}

fn cmyk_to_rgb(px: &[u8]) -> [u8; 3] {
    let k = 255 - px[3] as u16;
    let channel = |c: u8| ((255 - c as u16) * k / 255) as u8;
    [channel(px[0]), channel(px[1]), channel(px[2])]
}
