//! Swiss QR-bill invoice data models.
//!
//! Field names follow the result artifact format, so a parsed [`Invoice`]
//! serializes straight into the `parsed_invoice` mapping.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default currency when the payload leaves field 19 empty.
pub const DEFAULT_CURRENCY: &str = "CHF";

/// Default trailer when the payload leaves field 30 empty.
pub const DEFAULT_TRAILER: &str = "EPD";

/// Encoding of an address block inside the SPC payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressType {
    /// Discrete street, building number, postal code and city (tag `S`).
    #[serde(rename = "S")]
    Structured,
    /// Two free-text lines, no postal code or city (tag `K`).
    #[serde(rename = "K")]
    Combined,
}

impl AddressType {
    /// Map a payload tag to an address type. Empty or unknown tags have none.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "S" => Some(Self::Structured),
            "K" => Some(Self::Combined),
            _ => None,
        }
    }

    /// Payload tag for this address type.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Structured => "S",
            Self::Combined => "K",
        }
    }
}

/// A creditor or debtor address from one 7-field payload window.
///
/// An absent address (empty type tag) is represented by `Option<Address>::None`
/// on the invoice, so every `Address` value carries a real type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Structured (`S`) or combined (`K`).
    pub address_type: AddressType,

    /// Name or company.
    pub name: String,

    /// Street (structured) or first address line (combined).
    #[serde(rename = "address_line_1")]
    pub line1: String,

    /// Building number (structured) or postal code and town (combined).
    #[serde(rename = "address_line_2")]
    pub line2: String,

    /// Postal code. Always empty for combined addresses.
    pub postal_code: String,

    /// Town. Always empty for combined addresses.
    pub city: String,

    /// Two-letter ISO country code.
    pub country: String,
}

impl Address {
    /// Format address as a single line for display.
    pub fn format(&self) -> String {
        let mut parts = vec![self.name.clone()];
        match self.address_type {
            AddressType::Structured => {
                let street = format!("{} {}", self.line1, self.line2);
                if !street.trim().is_empty() {
                    parts.push(street.trim().to_string());
                }
                let town = format!("{} {}", self.postal_code, self.city);
                if !town.trim().is_empty() {
                    parts.push(town.trim().to_string());
                }
            }
            AddressType::Combined => {
                parts.extend(
                    [&self.line1, &self.line2]
                        .into_iter()
                        .filter(|l| !l.is_empty())
                        .cloned(),
                );
            }
        }
        if !self.country.is_empty() {
            parts.push(self.country.clone());
        }
        parts.retain(|p| !p.is_empty());
        parts.join(", ")
    }
}

/// Payment reference type (field 27).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReferenceType {
    /// QR reference (27 digits, used with QR-IBANs).
    Qrr,
    /// ISO 11649 creditor reference.
    Scor,
    /// No reference.
    Non,
    /// Field left empty by the producer.
    #[default]
    Empty,
    /// Tag outside the grammar, kept verbatim.
    Other(String),
}

impl ReferenceType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Qrr => "QRR",
            Self::Scor => "SCOR",
            Self::Non => "NON",
            Self::Empty => "",
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for ReferenceType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "QRR" => Self::Qrr,
            "SCOR" => Self::Scor,
            "NON" => Self::Non,
            "" => Self::Empty,
            _ => Self::Other(tag),
        }
    }
}

impl From<ReferenceType> for String {
    fn from(reference_type: ReferenceType) -> Self {
        reference_type.as_str().to_string()
    }
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded Swiss QR-bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Payload marker, always `SPC`.
    pub qr_type: String,

    /// Grammar version, e.g. `0200`.
    pub version: String,

    /// Character set, `1` for UTF-8.
    pub coding_type: String,

    /// Creditor account. Not checksum-validated.
    pub iban: String,

    /// Creditor. Absent only when the payload leaves the block empty.
    pub creditor: Option<Address>,

    /// Ultimate creditor (reserved for future use by the grammar).
    pub ultimate_creditor: Option<Address>,

    /// Amount exactly as written in the payload.
    pub amount: Option<String>,

    /// Currency code.
    pub currency: String,

    /// Ultimate debtor.
    pub ultimate_debtor: Option<Address>,

    /// Reference type.
    pub reference_type: ReferenceType,

    /// Reference number.
    pub reference: String,

    /// Unstructured message.
    pub unstructured_message: String,

    /// End-of-payment-data trailer.
    pub trailer: String,

    /// First alternative scheme parameter.
    pub alternative_scheme_1: String,

    /// Second alternative scheme parameter.
    pub alternative_scheme_2: String,
}

impl Invoice {
    /// Amount exactly as it appears in the payload, e.g. `1200.00`.
    pub fn amount_text(&self) -> Option<&str> {
        self.amount.as_deref()
    }

    /// Numeric amount, if the payload text is a plain decimal number.
    pub fn amount_decimal(&self) -> Option<Decimal> {
        let text = self.amount.as_deref()?;
        match Decimal::from_str(text) {
            Ok(amount) => Some(amount),
            Err(e) => {
                warn!("Amount {:?} is not a decimal number: {}", text, e);
                None
            }
        }
    }
}

/// Minimal invoice produced by the heuristic fallback: only the IBAN is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceStub {
    pub qr_type: Option<String>,
    pub version: Option<String>,
    pub coding_type: Option<String>,
    pub iban: String,
    pub creditor: Option<Address>,
    pub amount: Option<String>,
    pub currency: Option<String>,
}

impl InvoiceStub {
    /// Create a stub carrying only the given account identifier.
    pub fn from_iban(iban: impl Into<String>) -> Self {
        Self {
            qr_type: None,
            version: None,
            coding_type: None,
            iban: iban.into(),
            creditor: None,
            amount: None,
            currency: None,
        }
    }
}
