//! Launching the script and controlling its lifetime.

use std::io;
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::debug;
use wait_timeout::ChildExt;

use crate::error::PipelineError;

/// How long `wait` holds the child lock per poll, so `kill` is never starved.
const WAIT_SLICE: Duration = Duration::from_millis(50);

/// Starts the external command for a pipeline run.
pub trait ProcessLauncher: Send + Sync {
    /// Start `argv[0]` with the remaining arguments, all three streams piped.
    fn launch(&self, argv: &[String]) -> Result<LaunchedProcess, PipelineError>;
}

/// A started child with its pipes split out.
pub struct LaunchedProcess {
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
    pub control: ProcessControl,
}

/// Default launcher: spawns the command directly with `std::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessOrchestrator;

impl ProcessLauncher for ProcessOrchestrator {
    fn launch(&self, argv: &[String]) -> Result<LaunchedProcess, PipelineError> {
        let (program, args) = argv.split_first().ok_or_else(|| {
            PipelineError::Core(piperow_core::Error::Config("empty command line".into()))
        })?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| PipelineError::Spawn {
                program: program.clone(),
                source,
            })?;
        debug!(program = %program, pid = child.id(), "spawned script");

        let pipes = (child.stdin.take(), child.stdout.take(), child.stderr.take());
        let control = ProcessControl::new(child);
        match pipes {
            (Some(stdin), Some(stdout), Some(stderr)) => Ok(LaunchedProcess {
                stdin,
                stdout,
                stderr,
                control,
            }),
            (stdin, stdout, _) => {
                control.kill();
                let missing = if stdin.is_none() {
                    "stdin"
                } else if stdout.is_none() {
                    "stdout"
                } else {
                    "stderr"
                };
                Err(PipelineError::PipeUnavailable(missing))
            }
        }
    }
}

/// Shared handle to a running child. Clones refer to the same process.
#[derive(Clone)]
pub struct ProcessControl {
    child: Arc<Mutex<Child>>,
    pid: u32,
}

impl ProcessControl {
    pub fn new(child: Child) -> Self {
        let pid = child.id();
        Self {
            child: Arc::new(Mutex::new(child)),
            pid,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Forcibly terminate the child. Errors (already exited, already reaped) are ignored.
    pub fn kill(&self) {
        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = child.kill() {
            debug!(pid = self.pid, error = %e, "kill failed; child likely already exited");
        }
    }

    /// Exit code if the child has already exited.
    pub fn try_exit_code(&self) -> io::Result<Option<i32>> {
        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(child.try_wait()?.map(exit_code))
    }

    /// Block until the child exits and return its exit code.
    pub fn wait(&self) -> io::Result<i32> {
        loop {
            let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(status) = child.wait_timeout(WAIT_SLICE)? {
                return Ok(exit_code(status));
            }
        }
    }
}

/// Numeric exit code. A child killed by signal `n` reports `128 + n`, like a shell.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}
