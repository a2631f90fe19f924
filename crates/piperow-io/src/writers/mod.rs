//! Streaming writers for a script pipeline's output side.

pub mod jsonl;

pub use jsonl::JsonlWriter;
