//! Subprocess supervision for download jobs.
//!
//! Each job gets one supervision task that drives the external tool through
//! `Queued → FetchingMetadata → Running → terminal`, feeding the tool's
//! output through the progress parser and honoring cancellation from the
//! registry.

mod command;
mod error;
mod runner;
mod throttle;

pub use command::build_command;
pub use error::FetchError;
pub use runner::JobSupervisor;
pub use throttle::ProgressThrottle;
