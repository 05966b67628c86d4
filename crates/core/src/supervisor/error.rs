use thiserror::Error;

/// Why a supervised download attempt did not complete.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Metadata resolution timed out after {0}s")]
    MetadataTimeout(u64),

    #[error("Metadata resolution failed: {0}")]
    MetadataFailure(#[from] crate::resolver::ResolverError),

    #[error("Failed to spawn download tool: {0}")]
    ProcessSpawnFailure(std::io::Error),

    #[error("Download tool exited with code {0}")]
    ProcessExitFailure(i32),

    #[error("Cancelled by request")]
    Cancelled,

    #[error("I/O error supervising download tool: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),
}
