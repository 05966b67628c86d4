//! Line-oriented progress parsing.
//!
//! The external tool reports progress as free text. Parsing it is inherently
//! fragile, so every rule lives here in a pure state machine that is unit
//! tested against captured transcripts; unrecognized lines are ignored, never
//! fatal.

mod parser;

pub use parser::ProgressParser;
