//! ISO 2709 encoding
//!
//! Records are encoded whole into a byte buffer so that an oversized record is
//! rejected before anything reaches the output file.

use crate::domain::errors::MarcError;
use crate::marc::record::{validate_tag, MarcRecord};

pub const FIELD_TERMINATOR: u8 = 0x1E;
pub const SUBFIELD_DELIMITER: u8 = 0x1F;
pub const RECORD_TERMINATOR: u8 = 0x1D;

/// Largest record expressible in the five-digit leader length
pub const MAX_RECORD_LENGTH: usize = 99_999;

/// Largest field expressible in the four-digit directory length
pub const MAX_FIELD_LENGTH: usize = 9_999;

const LEADER_LENGTH: usize = 24;

/// Encode a record to ISO 2709 bytes
///
/// # Errors
///
/// Returns [`MarcError::RecordTooLong`] if the encoded record would exceed
/// 99,999 bytes, [`MarcError::FieldTooLong`] for a field over 9,999 bytes and
/// [`MarcError::InvalidTag`] for malformed tags.
pub fn encode(record: &MarcRecord) -> Result<Vec<u8>, MarcError> {
    let mut data_area = Vec::new();
    let mut directory = Vec::new();

    let mut push_field = |tag: &str, field_data: Vec<u8>| -> Result<(), MarcError> {
        validate_tag(tag)?;
        let field_length = field_data.len();
        if field_length > MAX_FIELD_LENGTH {
            return Err(MarcError::FieldTooLong {
                tag: tag.to_string(),
                length: field_length,
            });
        }
        let offset = data_area.len();
        directory.extend_from_slice(tag.as_bytes());
        directory.extend_from_slice(format!("{field_length:04}").as_bytes());
        directory.extend_from_slice(format!("{offset:05}").as_bytes());
        data_area.extend_from_slice(&field_data);
        Ok(())
    };

    for field in &record.control_fields {
        let mut field_data = field.value.as_bytes().to_vec();
        field_data.push(FIELD_TERMINATOR);
        push_field(&field.tag, field_data)?;
    }

    for field in &record.data_fields {
        let mut field_data = Vec::new();
        field_data.push(indicator_byte(field.ind1));
        field_data.push(indicator_byte(field.ind2));
        for subfield in &field.subfields {
            field_data.push(SUBFIELD_DELIMITER);
            let mut code = [0u8; 4];
            field_data.extend_from_slice(subfield.code.encode_utf8(&mut code).as_bytes());
            field_data.extend_from_slice(subfield.value.as_bytes());
        }
        field_data.push(FIELD_TERMINATOR);
        push_field(&field.tag, field_data)?;
    }

    directory.push(FIELD_TERMINATOR);

    let base_address = LEADER_LENGTH + directory.len();
    let record_length = base_address + data_area.len() + 1;
    if record_length > MAX_RECORD_LENGTH {
        return Err(MarcError::RecordTooLong(record_length));
    }

    let mut bytes = Vec::with_capacity(record_length);
    bytes.extend_from_slice(&record.leader.to_bytes(record_length, base_address));
    bytes.extend_from_slice(&directory);
    bytes.extend_from_slice(&data_area);
    bytes.push(RECORD_TERMINATOR);
    Ok(bytes)
}

fn indicator_byte(c: char) -> u8 {
    if c.is_ascii() && !c.is_ascii_control() {
        c as u8
    } else {
        b' '
    }
}
