use std::io;

use piperow_io::DecodeError;
use thiserror::Error;

/// Error raised by a lazily-produced input sequence.
pub type InputError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] piperow_core::Error),

    #[error("codec: {0}")]
    Codec(#[from] piperow_io::Error),

    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("child {0} was not piped")]
    PipeUnavailable(&'static str),

    #[error("input source failed: {0}")]
    Input(#[source] InputError),

    #[error("failed to encode input record {index}: {source}")]
    Encode {
        index: u64,
        #[source]
        source: piperow_io::Error,
    },

    #[error("failed to write to script stdin: {0}")]
    Write(#[source] io::Error),

    #[error("failed to wait for script exit: {0}")]
    Wait(#[source] io::Error),

    #[error("failed to decode script output: {0}")]
    Decode(#[source] DecodeError),

    #[error("failed to start {name} thread: {source}")]
    Thread {
        name: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("{0} thread panicked")]
    Panicked(&'static str),
}
