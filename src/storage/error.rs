//! Storage errors.

use thiserror::Error;

/// Address components that cannot be turned into integer ids.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} id is not an integer: {value:?}")]
    NotAnInteger { field: &'static str, value: String },

    #[error("chat or user id is required, none was provided")]
    MissingAddress,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid address: {0}")]
    Validation(#[from] ValidationError),

    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("failed to encode document: {0}")]
    Encode(#[from] mongodb::bson::ser::Error),

    #[error("failed to decode field `{field}`: {source}")]
    Decode {
        field: &'static str,
        #[source]
        source: mongodb::bson::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, StorageError>;
