// ⚠️ Domain errors for money box operations
//
// Every operation returns one of these kinds unmodified; the HTTP layer and the
// CLI decide how to present them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MoneyBoxError {
    /// Referenced box id does not exist
    #[error("Money box {0} not found")]
    NotFound(i64),

    /// Deposit or shake attempted on a broken box
    #[error("This money box is broken you cannot use it anymore.")]
    BoxBroken(i64),

    /// Break attempted on a box that is already broken
    #[error("This money box is broken you cannot use it anymore.")]
    AlreadyBroken(i64),

    /// (type, value) pair absent from the catalog. `value` is already
    /// formatted with two fractional digits.
    #[error("The {cash_type} with the value {value} does not exist.")]
    InvalidDenomination { cash_type: String, value: String },

    /// Field-level validation failure
    #[error("{field}: {message}")]
    InvalidInput { field: String, message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Stored data that cannot be mapped back to the domain
    #[error("Corrupt stored data: {0}")]
    Corrupt(String),
}

impl MoneyBoxError {
    pub fn invalid_input(field: &str, message: impl Into<String>) -> Self {
        MoneyBoxError::InvalidInput {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn required(field: &str) -> Self {
        Self::invalid_input(field, "This field is required.")
    }
}

pub type Result<T> = std::result::Result<T, MoneyBoxError>;
