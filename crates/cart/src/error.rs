use storefront_storage::StorageError;
use thiserror::Error;

/// The persisted cart document could not be understood.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("malformed cart document: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("cart document has version {found}; this build supports up to {supported}")]
    UnsupportedVersion { found: u64, supported: u32 },
}

#[derive(Debug, Error)]
pub enum CartError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}
