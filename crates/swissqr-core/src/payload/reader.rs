//! Cursor over the newline-separated fields of an SPC payload.

use crate::error::PayloadError;
use crate::models::invoice::{Address, AddressType};

/// Number of fields the grammar addresses; shorter payloads are padded.
pub const MIN_FIELDS: usize = 35;

/// Fields per address window, whatever its type tag.
pub const ADDRESS_BLOCK_LEN: usize = 7;

/// Sequential reader over payload fields.
///
/// Every read advances a single cursor. Callers pin the cursor to the
/// grammar's named offsets with [`FieldReader::expect_offset`], so a change in
/// the field layout surfaces as an error instead of a silent shift.
#[derive(Debug)]
pub struct FieldReader<'a> {
    fields: Vec<&'a str>,
    cursor: usize,
}

impl<'a> FieldReader<'a> {
    /// Split a payload into trimmed fields, right-padded to [`MIN_FIELDS`].
    pub fn new(text: &'a str) -> Self {
        let mut fields: Vec<&'a str> = text.trim().split('\n').map(str::trim).collect();
        if fields.len() < MIN_FIELDS {
            fields.resize(MIN_FIELDS, "");
        }
        Self { fields, cursor: 0 }
    }

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Number of fields after padding.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fail unless the cursor sits at the offset the grammar assigns to `name`.
    pub fn expect_offset(&self, name: &str, offset: usize) -> Result<(), PayloadError> {
        if self.cursor == offset {
            Ok(())
        } else {
            Err(PayloadError::InvalidPayloadFormat(format!(
                "{} expected at field {}, cursor is at {}",
                name, offset, self.cursor
            )))
        }
    }

    /// Read one scalar field and advance.
    pub fn read_scalar(&mut self, name: &str) -> Result<&'a str, PayloadError> {
        let value = self.fields.get(self.cursor).copied().ok_or_else(|| {
            PayloadError::InvalidPayloadFormat(format!(
                "{} missing: field {} out of range ({} fields)",
                name,
                self.cursor,
                self.fields.len()
            ))
        })?;
        self.cursor += 1;
        Ok(value)
    }

    /// Read one scalar field, mapping an empty value to `None`.
    pub fn read_optional(&mut self, name: &str) -> Result<Option<&'a str>, PayloadError> {
        let value = self.read_scalar(name)?;
        Ok((!value.is_empty()).then_some(value))
    }

    /// Read a 7-field address window and advance past it.
    ///
    /// Window layout: type tag, name, line 1, line 2, postal code, city, country.
    /// An empty or unknown tag yields `None`. Combined (`K`) addresses never take
    /// postal code or city from the window.
    pub fn read_address_block(&mut self, name: &str) -> Result<Option<Address>, PayloadError> {
        let start = self.cursor;
        let end = start + ADDRESS_BLOCK_LEN;
        let window = self.fields.get(start..end).ok_or_else(|| {
            PayloadError::InvalidPayloadFormat(format!(
                "{} address window {}..{} out of range ({} fields)",
                name,
                start,
                end,
                self.fields.len()
            ))
        })?;
        self.cursor = end;

        let Some(address_type) = AddressType::from_tag(window[0]) else {
            return Ok(None);
        };

        let (postal_code, city) = match address_type {
            AddressType::Structured => (window[4].to_string(), window[5].to_string()),
            AddressType::Combined => (String::new(), String::new()),
        };

        Ok(Some(Address {
            address_type,
            name: window[1].to_string(),
            line1: window[2].to_string(),
            line2: window[3].to_string(),
            postal_code,
            city,
            country: window[6].to_string(),
        }))
    }
}
