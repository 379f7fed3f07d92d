//! General-purpose QR reader over the whole tile.

use image::GrayImage;
use rqrr::PreparedImage;
use tracing::trace;

use super::{DecoderKind, QrDecoder};
use crate::error::DecodeError;

/// Grid detection and decoding with `rqrr`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeneralDecoder;

impl GeneralDecoder {
    pub fn new() -> Self {
        Self
    }
}

/// Decode every QR grid found in a greyscale image.
///
/// Grids that are detected but fail to decode are skipped.
pub fn decode_grids(image: &GrayImage) -> Vec<String> {
    let (w, h) = (image.width() as usize, image.height() as usize);
    if w == 0 || h == 0 {
        return Vec::new();
    }

    let raw = image.as_raw();
    let mut prepared = PreparedImage::prepare_from_greyscale(w, h, |x, y| raw[y * w + x]);
    let grids = prepared.detect_grids();
    trace!("rqrr found {} grids in {}x{} image", grids.len(), w, h);

    grids
        .iter()
        .filter_map(|grid| match grid.decode() {
            Ok((_meta, content)) => Some(content),
            Err(e) => {
                trace!("Grid failed to decode: {:?}", e);
                None
            }
        })
        .collect()
}

impl QrDecoder for GeneralDecoder {
    fn kind(&self) -> DecoderKind {
        DecoderKind::GeneralPurpose
    }

    fn decode(&self, image: &GrayImage) -> Result<Vec<String>, DecodeError> {
        Ok(decode_grids(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::test_support::qr_image;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decodes_synthetic_code() {
        let img = qr_image("SPC\n0200\n1\nCH4431999123000889012", 4);
        assert_eq!(
            GeneralDecoder::new().decode(&img).unwrap(),
            vec!["SPC\n0200\n1\nCH4431999123000889012".to_string()]
        );
    }

    #[test]
    fn test_blank_image_yields_nothing() {
        let img = GrayImage::from_pixel(120, 120, image::Luma([255]));
        assert!(GeneralDecoder::new().decode(&img).unwrap().is_empty());
        assert!(decode_grids(&GrayImage::new(0, 0)).is_empty());
    }
}
