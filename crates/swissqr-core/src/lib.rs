//! Core library for Swiss QR-bill extraction.
//!
//! This crate provides:
//! - PDF page access (rendering via Poppler, embedded images via lopdf)
//! - Ordered candidate search over page regions and zoom levels
//! - QR decoder chain (detector/super-resolution models, general grid reader)
//! - Swiss Payments Code (SPC) payload parsing
//! - Heuristic IBAN fallback over text artifacts

pub mod artifact;
pub mod decoder;
pub mod error;
pub mod heuristic;
pub mod models;
pub mod payload;
pub mod pdf;
pub mod scan;

pub use error::{DecodeError, PayloadError, PdfError, Result, SwissQrError};
pub use models::config::{DecoderConfig, HeuristicConfig, PdfConfig, ScanConfig, SearchConfig};
pub use models::invoice::{Address, AddressType, Invoice, InvoiceStub, ReferenceType};
pub use models::scan::{ScanMethod, ScanResult, ScannedInvoice};
pub use decoder::{Decoded, DecoderChain, DecoderKind, ModelBackend, ModelDecoder, QrDecoder};
pub use payload::parse_swiss_qr;
pub use pdf::{PageSource, PdfDocument};
pub use scan::{Scanner, document_stem};

#[cfg(feature = "native")]
pub use decoder::OrtModel;
