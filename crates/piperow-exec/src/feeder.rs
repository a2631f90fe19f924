//! Background task that writes input rows to the script's stdin.
//!
//! After the input is exhausted (or feeding fails) the feeder closes stdin,
//! reaps the child and collects the stderr tail, so every run leaves no zombie
//! behind even when the consumer stops reading early.

use std::io::{self, BufWriter, Write};
use std::process::ChildStdin;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use piperow_core::prelude::Row;
use piperow_io::RecordCodec;
use tracing::{debug, error, warn};

use crate::drain::{StderrDrainTask, DRAIN_GRACE};
use crate::error::{InputError, PipelineError};
use crate::failure::PipelineFailure;
use crate::process::ProcessControl;

const WRITE_BUFFER_BYTES: usize = 64 * 1024;

/// What the feeder saw by the time the child exited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeederReport {
    pub records_fed: u64,
    /// `None` when waiting for the child failed.
    pub exit_code: Option<i32>,
    /// Rendered stderr tail as of shortly after the child exited.
    pub stderr_tail: String,
}

pub struct FeederTask<I> {
    input: I,
    codec: RecordCodec,
    stdin: ChildStdin,
    control: ProcessControl,
    drain: StderrDrainTask,
    failure: Arc<PipelineFailure>,
}

impl<I> FeederTask<I>
where
    I: Iterator<Item = Result<Row, InputError>> + Send + 'static,
{
    pub fn new(
        input: I,
        codec: RecordCodec,
        stdin: ChildStdin,
        control: ProcessControl,
        drain: StderrDrainTask,
        failure: Arc<PipelineFailure>,
    ) -> Self {
        Self {
            input,
            codec,
            stdin,
            control,
            drain,
            failure,
        }
    }

    pub fn spawn(self) -> Result<JoinHandle<FeederReport>, PipelineError> {
        thread::Builder::new()
            .name("piperow-feeder".into())
            .spawn(move || self.run())
            .map_err(|source| PipelineError::Thread {
                name: "feeder",
                source,
            })
    }

    fn run(self) -> FeederReport {
        let FeederTask {
            input,
            mut codec,
            stdin,
            control,
            drain,
            failure,
        } = self;
        let mut report = FeederReport::default();

        let mut writer = BufWriter::with_capacity(WRITE_BUFFER_BYTES, stdin);
        match feed(input, &mut codec, &mut writer, &mut report.records_fed) {
            Ok(()) => {
                drop(writer);
                debug!(records = report.records_fed, "script input complete");
            }
            Err(err) => {
                error!(
                    error = %err,
                    records = report.records_fed,
                    pid = control.pid(),
                    "feeding script failed; killing it"
                );
                if let Err(late) = failure.record(err) {
                    debug!(error = %late, "feeder failure after an earlier failure");
                }
                control.kill();
                // whatever is still buffered is discarded with the pipe
                let (stdin, _unflushed) = writer.into_parts();
                drop(stdin);
            }
        }

        report.exit_code = settle_wait(&failure, control.wait());

        report.stderr_tail = drain.finish(DRAIN_GRACE);
        if let Some(code) = report.exit_code.filter(|code| *code != 0) {
            warn!(
                exit_code = code,
                stderr = %report.stderr_tail,
                "script exited with non-zero status"
            );
        }
        report
    }
}

/// Turn the outcome of waiting for the child into its exit code.
///
/// A wait error becomes the pipeline failure only when nothing failed before;
/// otherwise it is logged and the earlier cause stands.
fn settle_wait(failure: &PipelineFailure, waited: io::Result<i32>) -> Option<i32> {
    match waited {
        Ok(code) => Some(code),
        Err(e) => {
            let err = PipelineError::Wait(e);
            if failure.is_set() {
                error!(error = %err, "wait for script failed after an earlier failure");
            } else if let Err(err) = failure.record(err) {
                error!(error = %err, "wait for script failed");
            }
            None
        }
    }
}

/// Encode every input row into `writer`, counting rows as they are written.
fn feed<I, W>(input: I, codec: &mut RecordCodec, writer: &mut W, fed: &mut u64) -> Result<(), PipelineError>
where
    I: Iterator<Item = Result<Row, InputError>>,
    W: Write,
{
    let mut buf = Vec::new();
    for item in input {
        let row = item.map_err(PipelineError::Input)?;
        buf.clear();
        codec
            .encode(&row, &mut buf)
            .map_err(|source| PipelineError::Encode { index: *fed, source })?;
        writer.write_all(&buf).map_err(PipelineError::Write)?;
        *fed += 1;
    }
    writer.flush().map_err(PipelineError::Write)
}

#[cfg(test)]
mod tests {
    use super::*;

    use piperow_core::prelude::{IoFormat, Scalar, Schema};

    fn ok_rows(rows: &[&[&str]]) -> impl Iterator<Item = Result<Row, InputError>> {
        rows.iter()
            .map(|r| Ok(Row::from_strs(*r)))
            .collect::<Vec<_>>()
            .into_iter()
    }

    fn text_codec() -> RecordCodec {
        RecordCodec::for_format(&IoFormat::delimited(), &Schema::utf8(&["a", "b"])).unwrap()
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "reader went away"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writes_each_record_in_order() {
        let mut out = Vec::new();
        let mut fed = 0;
        feed(
            ok_rows(&[&["k1", "v1"], &["k2", "v2"]]),
            &mut text_codec(),
            &mut out,
            &mut fed,
        )
        .unwrap();
        assert_eq!(fed, 2);
        assert_eq!(out, b"k1\tv1\nk2\tv2\n");
    }

    #[test]
    fn input_errors_stop_feeding() {
        let input = vec![
            Ok(Row::from_strs(&["a", "b"])),
            Err(InputError::from("source went away")),
            Ok(Row::from_strs(&["never", "sent"])),
        ];
        let mut out = Vec::new();
        let mut fed = 0;
        let err = feed(input.into_iter(), &mut text_codec(), &mut out, &mut fed).unwrap_err();
        assert!(matches!(err, PipelineError::Input(_)));
        assert_eq!(fed, 1);
        assert_eq!(out, b"a\tb\n");
    }

    #[test]
    fn write_errors_are_reported() {
        let mut fed = 0;
        let err = feed(ok_rows(&[&["x", "y"]]), &mut text_codec(), &mut ClosedPipe, &mut fed)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Write(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
        assert_eq!(fed, 0);
    }

    #[test]
    fn encode_errors_carry_the_record_index() {
        let schema = Schema::utf8(&["a"]);
        let mut codec = RecordCodec::for_format(
            &IoFormat::with_serde("framed").prop("framed.max_frame_bytes", "16"),
            &schema,
        )
        .unwrap();
        let input = vec![
            Ok(Row::from_strs(&["ok"])),
            Ok(Row::new(vec![Scalar::from("far too long for a sixteen byte frame")])),
        ];
        let mut out = Vec::new();
        let mut fed = 0;
        let err = feed(input.into_iter(), &mut codec, &mut out, &mut fed).unwrap_err();
        assert!(matches!(err, PipelineError::Encode { index: 1, .. }));
    }

    #[test]
    fn wait_error_does_not_mask_an_earlier_failure() {
        let failure = PipelineFailure::new();
        failure
            .record(PipelineError::Write(io::Error::new(io::ErrorKind::BrokenPipe, "closed")))
            .unwrap();

        let code = settle_wait(&failure, Err(io::Error::new(io::ErrorKind::Other, "wait lost")));
        assert_eq!(code, None);
        assert!(matches!(failure.take(), Some(PipelineError::Write(_))));
    }

    #[test]
    fn wait_error_alone_becomes_the_failure() {
        let failure = PipelineFailure::new();
        let code = settle_wait(&failure, Err(io::Error::new(io::ErrorKind::Other, "wait lost")));
        assert_eq!(code, None);
        assert!(matches!(failure.take(), Some(PipelineError::Wait(ref e)) if e.to_string() == "wait lost"));
    }

    #[test]
    fn successful_wait_records_nothing() {
        let failure = PipelineFailure::new();
        assert_eq!(settle_wait(&failure, Ok(3)), Some(3));
        assert!(!failure.is_set());
    }
}
