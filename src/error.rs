// Error taxonomy for the donation core
//
// Validation  -> caller sent something we refuse to store (nothing written)
// NotFound    -> update/delete addressed a key that does not exist
// Storage     -> SQLite rejected a statement (transaction rolled back)

use crate::db::Table;
use thiserror::Error;

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Required field left empty
    pub fn required(field: &str) -> Self {
        Self::new(field, "Required field is empty")
    }
}

#[derive(Debug, Error)]
pub enum DonationError {
    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("{table} {id} does not exist")]
    NotFound { table: Table, id: i64 },

    /// The SQLite message is reachable through `source()`
    #[error("database error")]
    Storage(#[from] rusqlite::Error),
}

impl DonationError {
    pub fn is_validation(&self) -> bool {
        matches!(self, DonationError::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DonationError::NotFound { .. })
    }

    /// Field-level errors, empty for non-validation failures
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            DonationError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

impl From<ValidationError> for DonationError {
    fn from(err: ValidationError) -> Self {
        DonationError::Validation(vec![err])
    }
}

impl From<Vec<ValidationError>> for DonationError {
    fn from(errors: Vec<ValidationError>) -> Self {
        DonationError::Validation(errors)
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, DonationError>;
