//! Entry point: run rows through a configured script.

use std::sync::Arc;

use piperow_core::prelude::{Row, RowBatch, Schema, TransformConfig};
use piperow_io::RecordCodec;
use tracing::debug;

use crate::drain::StderrDrainTask;
use crate::error::{InputError, PipelineError};
use crate::failure::PipelineFailure;
use crate::feeder::FeederTask;
use crate::iter::ResultIterator;
use crate::process::{LaunchedProcess, ProcessLauncher, ProcessOrchestrator};

/// A script plus the wire formats and schemas on either side of it.
///
/// Construction validates the configuration and resolves both codecs, so an
/// unknown serde name fails here instead of after the child is running. Each
/// call to [`execute`](Self::execute) starts a fresh child.
pub struct ScriptTransform {
    config: TransformConfig,
    input_schema: Schema,
    output_schema: Schema,
    launcher: Arc<dyn ProcessLauncher>,
}

impl ScriptTransform {
    pub fn new(
        config: TransformConfig,
        input_schema: Schema,
        output_schema: Schema,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        RecordCodec::for_format(&config.input, &input_schema)?;
        RecordCodec::for_format(&config.output, &output_schema)?;
        Ok(Self {
            config,
            input_schema,
            output_schema,
            launcher: Arc::new(ProcessOrchestrator),
        })
    }

    /// Replace the process launcher (the default spawns via `std::process`).
    pub fn with_launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    pub fn input_schema(&self) -> &Schema {
        &self.input_schema
    }

    pub fn output_schema(&self) -> &Schema {
        &self.output_schema
    }

    /// Stream `input` through the script and return its output lazily.
    ///
    /// An empty input returns an empty iterator without starting the script.
    pub fn execute<I>(&self, input: I) -> Result<ResultIterator, PipelineError>
    where
        I: IntoIterator<Item = Row>,
        I::IntoIter: Send + 'static,
    {
        self.execute_fallible(input.into_iter().map(Ok::<Row, std::convert::Infallible>))
    }

    /// Like [`execute`](Self::execute), for inputs that can fail mid-stream.
    ///
    /// An input error stops feeding, kills the script, and is reported by the
    /// returned iterator after the rows already produced.
    pub fn execute_fallible<I, E>(&self, input: I) -> Result<ResultIterator, PipelineError>
    where
        I: IntoIterator<Item = Result<Row, E>>,
        I::IntoIter: Send + 'static,
        E: Into<InputError> + 'static,
    {
        let mut input = input.into_iter().map(box_input_error::<E>).peekable();
        if input.peek().is_none() {
            debug!(script = %self.config.script, "empty input; script not started");
            return Ok(ResultIterator::empty());
        }

        let input_codec = RecordCodec::for_format(&self.config.input, &self.input_schema)?;
        let output_codec = RecordCodec::for_format(&self.config.output, &self.output_schema)?;

        let argv = self.config.command();
        let LaunchedProcess {
            stdin,
            stdout,
            stderr,
            control,
        } = self.launcher.launch(&argv)?;
        debug!(
            pid = control.pid(),
            input_codec = input_codec.describe(),
            output_codec = output_codec.describe(),
            "pipeline started"
        );

        let failure = Arc::new(PipelineFailure::new());
        let drain = match StderrDrainTask::spawn(stderr, self.config.stderr_tail_bytes) {
            Ok(drain) => drain,
            Err(err) => {
                control.kill();
                return Err(err);
            }
        };
        let feeder = FeederTask::new(
            input,
            input_codec,
            stdin,
            control.clone(),
            drain,
            Arc::clone(&failure),
        );
        let feeder = match feeder.spawn() {
            Ok(handle) => handle,
            Err(err) => {
                control.kill();
                return Err(err);
            }
        };

        Ok(ResultIterator::new(
            stdout,
            self.config.read_buffer_bytes,
            output_codec,
            feeder,
            control,
            failure,
            self.config.kill_on_drop,
        ))
    }

    /// Run one batch through a fresh child and collect the output as a batch.
    pub fn eval_batch(&self, batch: &RowBatch) -> Result<RowBatch, PipelineError> {
        let rows = self
            .execute(batch.rows())?
            .collect::<Result<Vec<Row>, PipelineError>>()?;
        Ok(RowBatch::from_rows(&self.output_schema, &rows)?)
    }
}

fn box_input_error<E: Into<InputError>>(item: Result<Row, E>) -> Result<Row, InputError> {
    item.map_err(Into::into)
}
