#![forbid(unsafe_code)]
//! piperow-io: the byte-level side of a script pipeline.
//!
//! - `codec`: turns rows into bytes for the script's stdin and bytes from its
//!   stdout back into rows (delimited text or a registered binary serde).
//! - `errlog`: bounded tail of the script's stderr.
//! - `buf`: bounded buffered reader used on the script's stdout.
//! - `readers`/`writers`: CSV input and JSONL output for the CLI.

pub mod buf;
pub mod codec;
pub mod error;
pub mod errlog;
pub mod readers;
pub mod writers;

pub use codec::{register_serde, DecodeError, RawRecord, RecordCodec, RecordSerde, SerdeRegistry};
pub use errlog::CircularErrorLog;
pub use error::{Error, Result};
