#![forbid(unsafe_code)]
//! piperow-core: records, schemas, and IO format configuration.
//!
//! Everything here is pure data. Codecs live in `piperow-io`; process
//! orchestration lives in `piperow-exec`.

pub mod config;
pub mod error;
pub mod prelude;
pub mod schema;
pub mod types;

pub use error::{Error, Result};
