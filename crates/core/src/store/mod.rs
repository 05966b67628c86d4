//! Persistence collaborator seams.
//!
//! The core consults and updates job, history and subscription records but
//! does not own a storage backend; embedders supply implementations of these
//! traits. [`MemoryStore`] is the in-crate implementation used by tests and
//! small deployments.

mod memory;
mod traits;
mod types;

use thiserror::Error;

pub use memory::MemoryStore;
pub use traits::{HistoryStore, JobStore, SubscriptionStore};
pub use types::SubscriptionRecord;

/// Errors surfaced by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}
