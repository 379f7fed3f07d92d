//! Regex patterns for account identifiers in free text.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // "CH" followed by 10-30 letters, digits or whitespace
    pub static ref IBAN_CANDIDATE: Regex = Regex::new(
        r"(?i)\bCH[\s\dA-Za-z]{10,30}\b"
    ).unwrap();
}
