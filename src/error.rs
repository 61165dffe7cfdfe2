use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("No billing session initialized")]
    NotInitialized,
    #[error("{message}")]
    ProviderRejected {
        code: crate::domain::billing::ResponseCode,
        message: String,
    },
    #[error("unknown-product: {0}")]
    UnknownProduct(String),
    #[error("Failed to create record for product {product_id}: {reason}")]
    Serialization { product_id: String, reason: String },
    #[error("purchase already finalized: {0}")]
    AlreadyFinalized(String),
    #[error("finalization already in progress: {0}")]
    FinalizeInFlight(String),
    #[error("no product identifiers to query")]
    EmptyQuery,
    #[error("Purchase JSON deserialization fail")]
    Receipt(#[source] serde_json::Error),
    #[error("invalid catalog entry: {0}")]
    Catalog(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("no tokio runtime available to run billing operations")]
    NoRuntime,
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDbError(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
