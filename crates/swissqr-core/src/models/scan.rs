//! Outcome of one document scan.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::invoice::{Invoice, InvoiceStub};

/// How the payment data was obtained.
///
/// The serialized names are part of the result format consumed downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanMethod {
    /// Specialized detector + super-resolution model pair.
    #[serde(rename = "WeChat")]
    WeChat,
    /// General-purpose QR reader.
    #[serde(rename = "OpenCV")]
    OpenCv,
    /// IBAN found in text artifacts, no QR symbol decoded.
    #[serde(rename = "heuristic")]
    Heuristic,
    /// Nothing found.
    #[serde(rename = "none")]
    None,
}

impl ScanMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WeChat => "WeChat",
            Self::OpenCv => "OpenCV",
            Self::Heuristic => "heuristic",
            Self::None => "none",
        }
    }
}

impl fmt::Display for ScanMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invoice data attached to a scan result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScannedInvoice {
    /// Fully parsed SPC payload.
    Parsed(Invoice),
    /// IBAN-only stub from the heuristic fallback.
    Heuristic(InvoiceStub),
}

impl ScannedInvoice {
    pub fn iban(&self) -> &str {
        match self {
            Self::Parsed(invoice) => &invoice.iban,
            Self::Heuristic(stub) => &stub.iban,
        }
    }

    pub fn amount(&self) -> Option<String> {
        match self {
            Self::Parsed(invoice) => invoice.amount_text().map(str::to_string),
            Self::Heuristic(stub) => stub.amount.clone(),
        }
    }

    pub fn currency(&self) -> Option<&str> {
        match self {
            Self::Parsed(invoice) => Some(&invoice.currency),
            Self::Heuristic(stub) => stub.currency.as_deref(),
        }
    }
}

/// The single result produced by one scan. Written once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Raw decoded QR text, if a symbol was decoded.
    pub qr_text: Option<String>,

    /// Method that produced the result.
    pub method: ScanMethod,

    /// Parsed invoice or heuristic stub.
    pub invoice: Option<ScannedInvoice>,

    /// Artifact written for this scan.
    pub output_file: PathBuf,
}

impl ScanResult {
    /// Whether any payment data was recovered.
    pub fn is_found(&self) -> bool {
        self.method != ScanMethod::None
    }
}
