#![forbid(unsafe_code)]
//! piperow-exec: stream rows through an external script.
//!
//! One pipeline run owns a child process and two helper threads:
//! - the feeder encodes input rows onto the child's stdin, then reaps the child;
//! - the stderr drain keeps the tail of the child's stderr.
//!
//! The caller pulls decoded rows from the child's stdout through a
//! [`ResultIterator`]. A failure on the feeder side is handed over exactly once,
//! after the output is exhausted.

pub mod drain;
pub mod error;
pub mod failure;
pub mod feeder;
pub mod iter;
pub mod process;
pub mod transform;

pub use error::{InputError, PipelineError};
pub use failure::PipelineFailure;
pub use feeder::FeederReport;
pub use iter::ResultIterator;
pub use process::{exit_code, LaunchedProcess, ProcessControl, ProcessLauncher, ProcessOrchestrator};
pub use transform::ScriptTransform;
