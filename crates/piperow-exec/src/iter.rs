//! Pull-based iterator over the script's decoded output.

use std::process::ChildStdout;
use std::sync::Arc;
use std::thread::JoinHandle;

use piperow_core::prelude::Row;
use piperow_io::buf::BoundedBufReader;
use piperow_io::{DecodeError, RecordCodec};
use tracing::{debug, error};

use crate::error::PipelineError;
use crate::failure::PipelineFailure;
use crate::feeder::FeederReport;
use crate::process::ProcessControl;

enum State {
    /// Nothing buffered; the next call reads from stdout.
    Idle,
    /// One decoded row waiting to be handed out.
    HasItem(Row),
    /// Stdout hit EOF (or bad data); the pending failure has not been checked.
    Exhausted,
    /// Failure check done. Only `None` from here on.
    Done,
}

/// Everything tied to a running child.
struct Live {
    stdout: BoundedBufReader<ChildStdout>,
    codec: RecordCodec,
    feeder: JoinHandle<FeederReport>,
    control: ProcessControl,
}

/// Rows decoded from the script's stdout, followed by at most one error.
///
/// Reading happens on the caller's thread, one record per step. When stdout is
/// exhausted the iterator joins the feeder; if feeding failed, that failure is
/// yielded once as the last item. Dropping the iterator early kills the child
/// (unless the run was configured with `kill_on_drop = false`).
pub struct ResultIterator {
    state: State,
    live: Option<Live>,
    failure: Arc<PipelineFailure>,
    report: Option<FeederReport>,
    kill_on_drop: bool,
    rows_read: u64,
}

impl ResultIterator {
    /// An iterator that yields nothing; used when no child was launched.
    pub(crate) fn empty() -> Self {
        Self {
            state: State::Done,
            live: None,
            failure: Arc::new(PipelineFailure::new()),
            report: None,
            kill_on_drop: false,
            rows_read: 0,
        }
    }

    pub(crate) fn new(
        stdout: ChildStdout,
        read_buffer_bytes: usize,
        codec: RecordCodec,
        feeder: JoinHandle<FeederReport>,
        control: ProcessControl,
        failure: Arc<PipelineFailure>,
        kill_on_drop: bool,
    ) -> Self {
        Self {
            state: State::Idle,
            live: Some(Live {
                stdout: BoundedBufReader::with_capacity(read_buffer_bytes, stdout),
                codec,
                feeder,
                control,
            }),
            failure,
            report: None,
            kill_on_drop,
            rows_read: 0,
        }
    }

    /// Whether [`next_row`](Self::next_row) will return a row.
    ///
    /// Reads ahead at most one record. Returns the pending failure (once) when
    /// the output is exhausted and feeding failed.
    pub fn has_next(&mut self) -> Result<bool, PipelineError> {
        loop {
            match self.state {
                State::HasItem(_) => return Ok(true),
                State::Done => return Ok(false),
                State::Exhausted => {
                    self.state = State::Done;
                    return match self.finish() {
                        Some(err) => Err(err),
                        None => Ok(false),
                    };
                }
                State::Idle => self.state = self.read_one(),
            }
        }
    }

    /// Next decoded row, `Ok(None)` at the end, or the pipeline failure.
    pub fn next_row(&mut self) -> Result<Option<Row>, PipelineError> {
        if !self.has_next()? {
            return Ok(None);
        }
        match std::mem::replace(&mut self.state, State::Idle) {
            State::HasItem(row) => {
                self.rows_read += 1;
                Ok(Some(row))
            }
            other => {
                self.state = other;
                Ok(None)
            }
        }
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// True once the end of output (and any failure) has been reported.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Done)
    }

    /// Exit code of the child, known once the iterator is finished.
    pub fn exit_code(&self) -> Option<i32> {
        self.report.as_ref().and_then(|r| r.exit_code)
    }

    /// Last bytes the child wrote to stderr, known once the iterator is finished.
    pub fn stderr_tail(&self) -> Option<&str> {
        self.report.as_ref().map(|r| r.stderr_tail.as_str())
    }

    /// Number of input rows the feeder wrote, known once the iterator is finished.
    pub fn records_fed(&self) -> Option<u64> {
        self.report.as_ref().map(|r| r.records_fed)
    }

    fn read_one(&mut self) -> State {
        let Some(live) = self.live.as_mut() else {
            return State::Exhausted;
        };
        match live.codec.decode(&mut live.stdout) {
            Ok(row) => State::HasItem(row),
            Err(DecodeError::EndOfStream) => State::Exhausted,
            Err(err) => {
                error!(
                    error = %err,
                    codec = live.codec.describe(),
                    offset = live.stdout.consumed(),
                    "failed to decode script output; killing it"
                );
                // recorded before the kill so the feeder's broken pipe cannot mask it
                if let Err(earlier) = self.failure.record(PipelineError::Decode(err)) {
                    debug!(error = %earlier, "decode failure after an earlier failure");
                }
                live.control.kill();
                State::Exhausted
            }
        }
    }

    /// Join the feeder and hand out the recorded failure, if any.
    fn finish(&mut self) -> Option<PipelineError> {
        if let Some(Live { stdout, feeder, .. }) = self.live.take() {
            drop(stdout);
            match feeder.join() {
                Ok(report) => {
                    debug!(
                        rows_read = self.rows_read,
                        records_fed = report.records_fed,
                        exit_code = ?report.exit_code,
                        "script output exhausted"
                    );
                    self.report = Some(report);
                }
                Err(_) => {
                    if let Err(err) = self.failure.record(PipelineError::Panicked("feeder")) {
                        error!(error = %err, "feeder panicked after an earlier failure");
                    }
                }
            }
        }
        self.failure.take()
    }
}

impl Iterator for ResultIterator {
    type Item = Result<Row, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}

impl Drop for ResultIterator {
    fn drop(&mut self) {
        if let Some(live) = self.live.take() {
            if self.kill_on_drop {
                debug!(pid = live.control.pid(), "result iterator dropped early; killing script");
                live.control.kill();
            }
            // the detached feeder still reaps the child
        }
    }
}
