//! Background copy of the script's stderr into a bounded tail.

use std::io::{ErrorKind, Read};
use std::process::ChildStderr;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use piperow_io::CircularErrorLog;
use tracing::debug;

use crate::error::PipelineError;

/// How long `finish` waits for stderr EOF after the child has exited.
pub const DRAIN_GRACE: Duration = Duration::from_millis(250);

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Reads stderr until EOF so the child never blocks on a full stderr pipe.
///
/// The log is shared with the thread, so a snapshot can be taken while a
/// background job of the script still holds stderr open.
pub struct StderrDrainTask {
    log: Arc<Mutex<CircularErrorLog>>,
    handle: JoinHandle<()>,
}

impl StderrDrainTask {
    pub fn spawn(stderr: ChildStderr, capacity: usize) -> Result<Self, PipelineError> {
        let log = Arc::new(Mutex::new(CircularErrorLog::with_capacity(capacity)));
        let shared = Arc::clone(&log);
        let handle = thread::Builder::new()
            .name("piperow-stderr".into())
            .spawn(move || drain(stderr, &shared))
            .map_err(|source| PipelineError::Thread {
                name: "stderr drain",
                source,
            })?;
        Ok(Self { log, handle })
    }

    /// Render the tail once stderr reaches EOF or `grace` runs out.
    ///
    /// A drain still running past `grace` is left detached; it ends when the
    /// last holder of the pipe closes it.
    pub fn finish(self, grace: Duration) -> String {
        let deadline = Instant::now() + grace;
        while !self.handle.is_finished() && Instant::now() < deadline {
            thread::sleep(POLL_INTERVAL);
        }
        if self.handle.is_finished() {
            if self.handle.join().is_err() {
                debug!("stderr drain thread panicked");
            }
        } else {
            debug!("stderr still open after script exit; taking partial tail");
        }
        snapshot(&self.log)
    }
}

fn snapshot(log: &Mutex<CircularErrorLog>) -> String {
    log.lock().unwrap_or_else(PoisonError::into_inner).render()
}

fn drain<R: Read>(mut stderr: R, log: &Mutex<CircularErrorLog>) {
    let mut buf = [0u8; 4096];
    loop {
        match stderr.read(&mut buf) {
            Ok(0) => return,
            Ok(n) => {
                let mut log = log.lock().unwrap_or_else(PoisonError::into_inner);
                for &byte in &buf[..n] {
                    log.push(byte);
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(error = %e, "stderr drain stopped on read error");
                return;
            }
        }
    }
}
