//! Job model and the active-job registry.

mod registry;
mod types;

pub use registry::{JobRegistry, RegistrySnapshot};
pub use types::{JobId, JobOptions, JobRecord, JobState};
