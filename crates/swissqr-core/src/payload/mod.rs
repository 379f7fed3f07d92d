//! Swiss Payments Code (SPC) payload grammar.
//!
//! The payload is a positional, newline-separated field list. Offsets below
//! are the grammar's field indices; the parser reads them in order through a
//! [`FieldReader`] and checks the cursor against each named offset.

mod reader;

pub use reader::{ADDRESS_BLOCK_LEN, FieldReader, MIN_FIELDS};

use tracing::debug;

use crate::error::PayloadError;
use crate::models::invoice::{DEFAULT_CURRENCY, DEFAULT_TRAILER, Invoice, ReferenceType};

/// Literal marker every Swiss QR-bill payload starts with.
pub const PAYLOAD_MARKER: &str = "SPC";

pub const QR_TYPE_OFFSET: usize = 0;
pub const VERSION_OFFSET: usize = 1;
pub const CODING_TYPE_OFFSET: usize = 2;
pub const IBAN_OFFSET: usize = 3;
pub const CREDITOR_OFFSET: usize = 4;
pub const ULTIMATE_CREDITOR_OFFSET: usize = 11;
pub const AMOUNT_OFFSET: usize = 18;
pub const CURRENCY_OFFSET: usize = 19;
pub const ULTIMATE_DEBTOR_OFFSET: usize = 20;
pub const REFERENCE_TYPE_OFFSET: usize = 27;
pub const REFERENCE_OFFSET: usize = 28;
pub const MESSAGE_OFFSET: usize = 29;
pub const TRAILER_OFFSET: usize = 30;
pub const ALTERNATIVE_SCHEME_1_OFFSET: usize = 31;
pub const ALTERNATIVE_SCHEME_2_OFFSET: usize = 32;

/// Whether decoded QR text carries the SPC marker.
pub fn is_spc_payload(text: &str) -> bool {
    text.starts_with(PAYLOAD_MARKER)
}

/// Parse raw QR text into an [`Invoice`].
pub fn parse_swiss_qr(text: &str) -> Result<Invoice, PayloadError> {
    if text.is_empty() || !is_spc_payload(text) {
        return Err(PayloadError::InvalidPayloadFormat(
            "payload does not start with SPC".to_string(),
        ));
    }

    let mut reader = FieldReader::new(text);
    debug!("Parsing SPC payload with {} fields", reader.len());

    reader.expect_offset("qr_type", QR_TYPE_OFFSET)?;
    let qr_type = reader.read_scalar("qr_type")?;
    reader.expect_offset("version", VERSION_OFFSET)?;
    let version = reader.read_scalar("version")?;
    reader.expect_offset("coding_type", CODING_TYPE_OFFSET)?;
    let coding_type = reader.read_scalar("coding_type")?;

    reader.expect_offset("iban", IBAN_OFFSET)?;
    let iban = reader.read_scalar("iban")?;

    reader.expect_offset("creditor", CREDITOR_OFFSET)?;
    let creditor = reader.read_address_block("creditor")?;
    reader.expect_offset("ultimate_creditor", ULTIMATE_CREDITOR_OFFSET)?;
    let ultimate_creditor = reader.read_address_block("ultimate_creditor")?;

    reader.expect_offset("amount", AMOUNT_OFFSET)?;
    let amount = reader.read_optional("amount")?;
    reader.expect_offset("currency", CURRENCY_OFFSET)?;
    let currency = reader.read_optional("currency")?.unwrap_or(DEFAULT_CURRENCY);

    reader.expect_offset("ultimate_debtor", ULTIMATE_DEBTOR_OFFSET)?;
    let ultimate_debtor = reader.read_address_block("ultimate_debtor")?;

    reader.expect_offset("reference_type", REFERENCE_TYPE_OFFSET)?;
    let reference_type = ReferenceType::from(reader.read_scalar("reference_type")?.to_string());
    reader.expect_offset("reference", REFERENCE_OFFSET)?;
    let reference = reader.read_scalar("reference")?;
    reader.expect_offset("unstructured_message", MESSAGE_OFFSET)?;
    let unstructured_message = reader.read_scalar("unstructured_message")?;
    reader.expect_offset("trailer", TRAILER_OFFSET)?;
    let trailer = reader.read_optional("trailer")?.unwrap_or(DEFAULT_TRAILER);
    reader.expect_offset("alternative_scheme_1", ALTERNATIVE_SCHEME_1_OFFSET)?;
    let alternative_scheme_1 = reader.read_scalar("alternative_scheme_1")?;
    reader.expect_offset("alternative_scheme_2", ALTERNATIVE_SCHEME_2_OFFSET)?;
    let alternative_scheme_2 = reader.read_scalar("alternative_scheme_2")?;

    Ok(Invoice {
        qr_type: qr_type.to_string(),
        version: version.to_string(),
        coding_type: coding_type.to_string(),
        iban: iban.to_string(),
        creditor,
        ultimate_creditor,
        amount: amount.map(str::to_string),
        currency: currency.to_string(),
        ultimate_debtor,
        reference_type,
        reference: reference.to_string(),
        unstructured_message: unstructured_message.to_string(),
        trailer: trailer.to_string(),
        alternative_scheme_1: alternative_scheme_1.to_string(),
        alternative_scheme_2: alternative_scheme_2.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::invoice::AddressType;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "SPC\n0200\n1\nCH4431999123000889012\n\
        S\nRobert Schneider AG\nRue du Lac\n1268\n2501\nBiel\nCH\n\
        \n\n\n\n\n\n\n\
        1949.75\nCHF\n\
        S\nPia-Maria Rutschmann-Schnyder\nGrosse Marktgasse\n28\n9400\nRorschach\nCH\n\
        QRR\n210000000003139471430009017\nOrder from 15.10.2020\nEPD\n\
        //S1/10/1234/11/201021/30/102673386/32/7.7/40/0:30\n\
        eBill/B/simon.muster@example.com";

    #[test]
    fn test_parse_full_payload() {
        let invoice = parse_swiss_qr(SAMPLE).unwrap();

        assert_eq!(invoice.qr_type, "SPC");
        assert_eq!(invoice.version, "0200");
        assert_eq!(invoice.coding_type, "1");
        assert_eq!(invoice.iban, "CH4431999123000889012");

        let creditor = invoice.creditor.as_ref().unwrap();
        assert_eq!(creditor.address_type, AddressType::Structured);
        assert_eq!(creditor.name, "Robert Schneider AG");
        assert_eq!(creditor.line1, "Rue du Lac");
        assert_eq!(creditor.line2, "1268");
        assert_eq!(creditor.postal_code, "2501");
        assert_eq!(creditor.city, "Biel");
        assert_eq!(creditor.country, "CH");

        assert_eq!(invoice.ultimate_creditor, None);
        assert_eq!(invoice.amount_text(), Some("1949.75"));
        assert_eq!(invoice.currency, "CHF");
        assert_eq!(invoice.ultimate_debtor.as_ref().unwrap().city, "Rorschach");
        assert_eq!(invoice.reference_type, ReferenceType::Qrr);
        assert_eq!(invoice.reference, "210000000003139471430009017");
        assert_eq!(invoice.unstructured_message, "Order from 15.10.2020");
        assert_eq!(invoice.trailer, "EPD");
        assert_eq!(
            invoice.alternative_scheme_1,
            "//S1/10/1234/11/201021/30/102673386/32/7.7/40/0:30"
        );
        assert_eq!(invoice.alternative_scheme_2, "eBill/B/simon.muster@example.com");
    }

    #[test]
    fn test_rejects_missing_marker() {
        assert!(matches!(
            parse_swiss_qr(""),
            Err(PayloadError::InvalidPayloadFormat(_))
        ));
        assert!(parse_swiss_qr("https://example.com").is_err());
        assert!(parse_swiss_qr(" SPC\n0200").is_err());
    }

    #[test]
    fn test_truncated_payloads_never_fail_on_index() {
        let fields: Vec<&str> = SAMPLE.split('\n').collect();
        for n in 1..fields.len() {
            let truncated = fields[..n].join("\n");
            let result = parse_swiss_qr(&truncated);
            assert!(result.is_ok(), "{} fields: {:?}", n, result.err());
        }
    }

    #[test]
    fn test_defaults_for_empty_fields() {
        let invoice = parse_swiss_qr("SPC\n0200\n1\nCH4431999123000889012").unwrap();

        assert_eq!(invoice.creditor, None);
        assert_eq!(invoice.amount, None);
        assert_eq!(invoice.currency, "CHF");
        assert_eq!(invoice.reference_type, ReferenceType::Empty);
        assert_eq!(invoice.trailer, "EPD");
        assert_eq!(invoice.alternative_scheme_1, "");
    }

    #[test]
    fn test_combined_creditor_drops_postal_fields() {
        let payload = "SPC\n0200\n1\nCH4431999123000889012\n\
            K\nMueller AG\nBahnhofstrasse 1\n8001 Zuerich\n9999\nNowhere\nCH";
        let creditor = parse_swiss_qr(payload).unwrap().creditor.unwrap();

        assert_eq!(creditor.address_type, AddressType::Combined);
        assert_eq!(creditor.line1, "Bahnhofstrasse 1");
        assert_eq!(creditor.line2, "8001 Zuerich");
        assert_eq!(creditor.postal_code, "");
        assert_eq!(creditor.city, "");
        assert_eq!(creditor.country, "CH");
    }

    #[test]
    fn test_empty_address_blocks_keep_amount_aligned() {
        let mut fields = vec!["SPC", "0200", "1", "CH4431999123000889012"];
        fields.extend([""; 14]);
        fields.extend(["1200.00", "EUR"]);
        let invoice = parse_swiss_qr(&fields.join("\n")).unwrap();

        assert_eq!(invoice.creditor, None);
        assert_eq!(invoice.ultimate_creditor, None);
        assert_eq!(invoice.amount_text(), Some("1200.00"));
        assert_eq!(invoice.currency, "EUR");
    }

    #[test]
    fn test_amount_keeps_trailing_zeros_through_json() {
        let mut fields = vec!["SPC", "0200", "1", "CH4431999123000889012"];
        fields.extend([""; 14]);
        fields.push("1200.00");
        let invoice = parse_swiss_qr(&fields.join("\n")).unwrap();

        let json = serde_json::to_value(&invoice).unwrap();
        assert_eq!(json["amount"], serde_json::json!("1200.00"));
        let back: Invoice = serde_json::from_value(json).unwrap();
        assert_eq!(back.amount_text(), Some("1200.00"));
    }

    #[test]
    fn test_amount_text_is_kept_verbatim() {
        for raw in ["0100.50", "1'200.00", "1200.", "12,00 CHF"] {
            let mut fields = vec!["SPC", "0200", "1", "CH4431999123000889012"];
            fields.extend([""; 14]);
            fields.extend([raw, "CHF", "S"]);
            let invoice = parse_swiss_qr(&fields.join("\n")).unwrap();

            assert_eq!(invoice.amount_text(), Some(raw));
            assert_eq!(invoice.iban, "CH4431999123000889012");
            assert_eq!(serde_json::to_value(&invoice).unwrap()["amount"], serde_json::json!(raw));
        }
    }
}
