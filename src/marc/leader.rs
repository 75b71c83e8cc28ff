//! MARC leader
//!
//! The 24-byte leader carries the record length and base address of data,
//! both of which are only known once the record is encoded. [`Leader`] keeps
//! the descriptive positions; the two numeric ones are filled in by the encoder.

use crate::domain::errors::MarcError;
use serde::{Deserialize, Serialize};

/// Leader positions that do not depend on the encoded layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leader {
    /// Position 5
    pub record_status: char,
    /// Position 6
    pub record_type: char,
    /// Position 7
    pub bibliographic_level: char,
    /// Position 8
    pub control_record_type: char,
    /// Position 9, `a` for UCS/Unicode
    pub character_coding: char,
    /// Position 17
    pub encoding_level: char,
    /// Position 18
    pub cataloging_form: char,
    /// Position 19
    pub multipart_level: char,
}

impl Default for Leader {
    fn default() -> Self {
        Self::bibliographic()
    }
}

impl Leader {
    /// Leader for a generated bibliographic record
    pub fn bibliographic() -> Self {
        Self {
            record_status: 'n',
            record_type: 'a',
            bibliographic_level: 'm',
            control_record_type: ' ',
            character_coding: 'a',
            encoding_level: ' ',
            cataloging_form: 'a',
            multipart_level: ' ',
        }
    }

    /// Leader for a generated holdings record
    pub fn holdings() -> Self {
        Self {
            record_type: 'x',
            bibliographic_level: ' ',
            encoding_level: '1',
            cataloging_form: 'n',
            ..Self::bibliographic()
        }
    }

    /// Leader for a generated authority record
    pub fn authority() -> Self {
        Self {
            record_type: 'z',
            bibliographic_level: ' ',
            encoding_level: 'n',
            cataloging_form: ' ',
            ..Self::bibliographic()
        }
    }

    /// Parse a leader, ignoring its length and base address positions
    ///
    /// # Errors
    ///
    /// Returns an error if the leader is not exactly 24 ASCII characters.
    pub fn parse(value: &str) -> Result<Self, MarcError> {
        let bytes = value.as_bytes();
        if bytes.len() != 24 || !value.is_ascii() {
            return Err(MarcError::InvalidLeader(format!(
                "Leader must be 24 ASCII characters, got '{value}'"
            )));
        }
        let at = |i: usize| bytes[i] as char;
        Ok(Self {
            record_status: at(5),
            record_type: at(6),
            bibliographic_level: at(7),
            control_record_type: at(8),
            character_coding: at(9),
            encoding_level: at(17),
            cataloging_form: at(18),
            multipart_level: at(19),
        })
    }

    /// Serialize with the computed record length and base address
    pub fn to_bytes(&self, record_length: usize, base_address: usize) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(24);
        bytes.extend_from_slice(format!("{record_length:05}").as_bytes());
        for c in [
            self.record_status,
            self.record_type,
            self.bibliographic_level,
            self.control_record_type,
            self.character_coding,
        ] {
            bytes.push(ascii_or_blank(c));
        }
        // Indicator count and subfield code count
        bytes.extend_from_slice(b"22");
        bytes.extend_from_slice(format!("{base_address:05}").as_bytes());
        for c in [self.encoding_level, self.cataloging_form, self.multipart_level] {
            bytes.push(ascii_or_blank(c));
        }
        // Entry map
        bytes.extend_from_slice(b"4500");
        bytes
    }
}

fn ascii_or_blank(c: char) -> u8 {
    if c.is_ascii() {
        c as u8
    } else {
        b' '
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_serialize() {
        let leader = Leader::parse("01234cam a2200289 i 4500").unwrap();
        assert_eq!(leader.record_status, 'c');
        assert_eq!(leader.cataloging_form, 'i');
        let bytes = leader.to_bytes(100, 49);
        assert_eq!(bytes, b"00100cam a2200049 i 4500".to_vec());
    }

    #[test]
    fn test_parse_rejects_short_leader() {
        assert!(matches!(
            Leader::parse("00000nam"),
            Err(MarcError::InvalidLeader(_))
        ));
    }

    #[test]
    fn test_record_type_per_kind() {
        assert_eq!(Leader::holdings().record_type, 'x');
        assert_eq!(Leader::authority().record_type, 'z');
        assert_eq!(Leader::default(), Leader::bibliographic());
    }
}
