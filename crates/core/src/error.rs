use commute_transit::TransitError;

use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Transit(#[from] TransitError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;
