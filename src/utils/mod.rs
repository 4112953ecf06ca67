//! Shared utilities
//!
//! Error types and filesystem helpers.

pub mod error;
pub mod fs;

pub use error::{FrameDrop, RecorderError, RecorderResult, WriterError};
