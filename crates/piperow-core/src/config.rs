//! Script transform configuration that callers can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Wire format for one direction of the pipe (script input or script output).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoFormat {
    /// Separator between fields of a delimited record.
    pub field_delimiter: String,

    /// Terminator of a delimited record. Must be a single byte.
    pub record_delimiter: String,

    /// Text written for null values by the delimited encoder.
    pub null_token: String,

    /// Split each output line into at most two fields (key, rest).
    pub schema_less: bool,

    /// Binary serde identifier. `None` or empty selects delimited text.
    pub serde: Option<String>,

    /// Free-form properties handed to the serde on initialization.
    pub serde_props: Vec<(String, String)>,
}

impl Default for IoFormat {
    fn default() -> Self {
        Self {
            field_delimiter: "\t".to_string(),
            record_delimiter: "\n".to_string(),
            null_token: "\\N".to_string(),
            schema_less: false,
            serde: None,
            serde_props: Vec::new(),
        }
    }
}

impl IoFormat {
    /// Delimited text with default delimiters.
    pub fn delimited() -> Self {
        Self::default()
    }

    /// Binary serde with the given identifier.
    pub fn with_serde(name: impl Into<String>) -> Self {
        Self {
            serde: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn prop(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.serde_props.push((key.into(), value.into()));
        self
    }

    /// The configured serde identifier, if this direction is binary.
    pub fn serde_name(&self) -> Option<&str> {
        self.serde
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn record_delimiter_byte(&self) -> Result<u8> {
        match self.record_delimiter.as_bytes() {
            [b] => Ok(*b),
            _ => Err(Error::Config(format!(
                "record delimiter must be exactly one byte, got {:?}",
                self.record_delimiter
            ))),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.serde_name().is_some() {
            return Ok(());
        }
        if self.field_delimiter.is_empty() {
            return Err(Error::Config("field delimiter must not be empty".into()));
        }
        self.record_delimiter_byte()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Script text interpreted by `shell`.
    pub script: String,

    /// Interpreter argv prefix; the script is appended as the last argument.
    pub shell: Vec<String>,

    /// Format of records written to the script's stdin.
    pub input: IoFormat,

    /// Format of records read from the script's stdout.
    pub output: IoFormat,

    /// How many trailing stderr bytes to keep for diagnostics.
    pub stderr_tail_bytes: usize,

    /// Read buffer size for the script's stdout.
    pub read_buffer_bytes: usize,

    /// Kill the child when the result iterator is dropped before exhaustion.
    pub kill_on_drop: bool,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            script: String::new(),
            shell: vec!["/bin/bash".to_string(), "-c".to_string()],
            input: IoFormat::default(),
            output: IoFormat::default(),
            stderr_tail_bytes: 2048,
            read_buffer_bytes: 64 * 1024,
            kill_on_drop: true,
        }
    }
}

impl TransformConfig {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            ..Self::default()
        }
    }

    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `PIPEROW_SHELL`: whitespace-separated interpreter prefix (e.g. `/bin/sh -c`)
    /// - `PIPEROW_STDERR_TAIL_BYTES`: stderr tail capacity
    /// - `PIPEROW_READ_BUFFER_BYTES`: stdout read buffer size
    /// - `PIPEROW_KILL_ON_DROP`: `true`/`false`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env(|key| std::env::var(key).ok());
        cfg
    }

    /// Overlay values from `lookup` (an env-like source). Unparsable values
    /// are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(s) = lookup("PIPEROW_SHELL") {
            let argv: Vec<String> = s.split_whitespace().map(str::to_string).collect();
            if !argv.is_empty() {
                self.shell = argv;
            }
        }

        if let Some(s) = lookup("PIPEROW_STDERR_TAIL_BYTES") {
            if let Ok(v) = s.parse::<usize>() {
                self.stderr_tail_bytes = v;
            }
        }

        if let Some(s) = lookup("PIPEROW_READ_BUFFER_BYTES") {
            if let Ok(v) = s.parse::<usize>() {
                self.read_buffer_bytes = v;
            }
        }

        if let Some(s) = lookup("PIPEROW_KILL_ON_DROP") {
            if let Ok(v) = s.parse::<bool>() {
                self.kill_on_drop = v;
            }
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Full argv for the child: shell prefix followed by the script.
    pub fn command(&self) -> Vec<String> {
        let mut argv = self.shell.clone();
        argv.push(self.script.clone());
        argv
    }

    pub fn validate(&self) -> Result<()> {
        if self.shell.is_empty() {
            return Err(Error::Config("shell must name an interpreter".into()));
        }
        if self.stderr_tail_bytes == 0 {
            return Err(Error::Config("stderr_tail_bytes must be positive".into()));
        }
        if self.read_buffer_bytes == 0 {
            return Err(Error::Config("read_buffer_bytes must be positive".into()));
        }
        self.input
            .validate()
            .map_err(|e| Error::Config(format!("input format: {e}")))?;
        self.output
            .validate()
            .map_err(|e| Error::Config(format!("output format: {e}")))?;
        Ok(())
    }
}
