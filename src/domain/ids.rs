//! Domain identifier types with validation
//!
//! Newtype wrappers keep job, file and record identifiers from being mixed up.
//! All of them are UUIDs; record identifiers are additionally ordered so that
//! identifier ranges can be expressed over them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_newtype {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| format!("Invalid {} format: {}", $label, s))
            }
        }
    };
}

uuid_newtype!(
    /// Identifier of one export job
    JobId,
    "job id"
);

uuid_newtype!(
    /// Identifier of one export partition file
    FileId,
    "file id"
);

uuid_newtype!(
    /// Identifier of a catalog record (instance, holdings, item or authority)
    ///
    /// # Examples
    ///
    /// ```
    /// use marcport::domain::ids::RecordId;
    /// use std::str::FromStr;
    ///
    /// let id = RecordId::from_str("7d44b88c-4199-4bad-97dc-d78268e01398").unwrap();
    /// assert_eq!(id.to_string(), "7d44b88c-4199-4bad-97dc-d78268e01398");
    /// assert!(RecordId::from_str("not-a-uuid").is_err());
    /// ```
    RecordId,
    "record id"
);

impl RecordId {
    /// Numeric position of this identifier in the UUID space
    pub fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }

    /// Identifier at a numeric position of the UUID space
    pub fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}
