//! Media encoding
//!
//! Concrete `MediaWriter` implementations.

pub mod frame_stream;

pub use frame_stream::{read_stream, FrameCodec, FrameStreamWriter, StoredFrame, StreamHeader};
