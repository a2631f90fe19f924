//! piperow: stream records through an external script.
//!
//! Re-exports the workspace crates under one name.

pub use {piperow_core, piperow_exec, piperow_io};

pub use piperow_exec::{PipelineError, ResultIterator, ScriptTransform};
