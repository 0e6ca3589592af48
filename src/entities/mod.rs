// Entity Models
//
// Each entity maps one table. Struct fields serialize under their
// column names so CSV files and JSON payloads share one vocabulary.
//
// Category columns (provider type, food type, status, ...) are closed enums
// stored as their display label.

pub mod provider;
pub mod receiver;
pub mod food_listing;
pub mod claim;

pub use provider::{Provider, ProviderDraft, ProviderType};
pub use receiver::{Receiver, ReceiverDraft, ReceiverType};
pub use food_listing::{FoodListing, FoodListingDraft, FoodType, MealType};
pub use claim::{Claim, ClaimDraft, ClaimStatus};

use crate::error::ValidationError;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::Row;

/// Closed enum persisted as its label
///
/// Generates `as_str`, `ALL`, `Display`, `FromStr` (case-insensitive, errors
/// name `$field`), rusqlite `ToSql`/`FromSql` and serde impls.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident ($field:literal) {
            $( $(#[$vmeta:meta])* $variant:ident => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[ $( $name::$variant ),+ ];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $label ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::ValidationError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                let wanted = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| {
                        let allowed: Vec<&str> = $name::ALL.iter().map(|v| v.as_str()).collect();
                        $crate::error::ValidationError::new(
                            $field,
                            format!("'{}' is not one of: {}", wanted, allowed.join(", ")),
                        )
                    })
            }
        }

        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| rusqlite::types::FromSqlError::Other(Box::new(e)))
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(
                deserializer: D,
            ) -> std::result::Result<Self, D::Error> {
                let raw = <String as serde::Deserialize>::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

pub(crate) use text_enum;

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Push a "required" error when `value` is blank
pub(crate) fn require_text(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(ValidationError::required(field));
    }
}

/// Read a `YYYY-MM-DD` column
pub(crate) fn date_column(row: &Row<'_>, column: &str) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(column)?;
    NaiveDate::parse_from_str(raw.trim(), crate::db::DATE_FORMAT).map_err(|e| {
        let idx = row.as_ref().column_index(column).unwrap_or(0);
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
    })
}

/// Read a `YYYY-MM-DD HH:MM:SS` column
pub(crate) fn timestamp_column(row: &Row<'_>, column: &str) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(column)?;
    NaiveDateTime::parse_from_str(raw.trim(), crate::db::TIMESTAMP_FORMAT).map_err(|e| {
        let idx = row.as_ref().column_index(column).unwrap_or(0);
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
    })
}

/// Serde adapters for the storage date formats
pub(crate) mod serde_format {
    pub mod date {
        use crate::db::DATE_FORMAT;
        use chrono::NaiveDate;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str(&date.format(DATE_FORMAT).to_string())
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
            let raw = String::deserialize(d)?;
            NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(serde::de::Error::custom)
        }
    }

    pub mod timestamp {
        use crate::db::TIMESTAMP_FORMAT;
        use chrono::NaiveDateTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str(&ts.format(TIMESTAMP_FORMAT).to_string())
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
            let raw = String::deserialize(d)?;
            NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
                .map_err(serde::de::Error::custom)
        }
    }
}
