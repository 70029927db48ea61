use thiserror::Error;

/// Errors that stop the reconciler service itself. Per-batch problems are
/// reported through `ReconcileOutcome` and `PayloadError` instead.
#[derive(Error, Debug)]
pub enum ReconcilerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(#[from] crate::config::ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Failed to read request body: {0}")]
    RequestBody(#[from] hyper::Error),

    #[error("Response serialization error: {0}")]
    ResponseSerialization(#[from] serde_json::Error),
}
