use coverquote_core::ports::RepositoryError;

pub mod agency_location;
pub mod application;
pub mod insurer;
pub mod memory;
pub mod quote;
pub mod zip_code;

pub use agency_location::SqlAgencyLocationStore;
pub use application::SqlApplicationStore;
pub use insurer::SqlInsurerStore;
pub use memory::{InMemoryApplicationStore, InMemoryQuoteStore, InMemoryZipCodes};
pub use quote::SqlQuoteStore;
pub use zip_code::SqlZipCodeLookup;

pub(crate) fn db_error(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Database(error.to_string())
}

pub(crate) fn decode_error(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

/// SQLite has no unsigned integers; ids are stored as i64.
pub(crate) fn to_u64(value: i64, column: &str) -> Result<u64, RepositoryError> {
    u64::try_from(value).map_err(|_| RepositoryError::Decode(format!("{column} is negative: {value}")))
}

pub(crate) fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
