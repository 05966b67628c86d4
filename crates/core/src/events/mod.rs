//! Structured job events and their fan-out to observers.

mod broadcaster;
mod types;

pub use broadcaster::EventBroadcaster;
pub use types::{JobEvent, ProgressEvent};
