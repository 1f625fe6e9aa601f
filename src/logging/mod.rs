//! Structured logging setup for the embedded agent.

mod format;

pub use format::StructuredLogger;
