//! Streaming NDJSON writer for output rows.

use std::fs::File;
use std::io::{BufWriter, Write};

use serde_json::{Map, Value};

use crate::codec::scalar_to_json;
use crate::error::Result;
use piperow_core::prelude::{Row, Schema};

pub struct JsonlWriter<W: Write> {
    writer: BufWriter<W>,
    // column names by position
    columns: Vec<String>,
    rows_written: u64,
}

impl JsonlWriter<File> {
    pub fn to_path(path: &str, schema: &Schema) -> Result<Self> {
        let f = File::create(path)?;
        Ok(Self::to_writer(f, schema))
    }
}

impl<W: Write> JsonlWriter<W> {
    pub fn to_writer(writer: W, schema: &Schema) -> Self {
        Self {
            writer: BufWriter::new(writer),
            columns: schema.column_names(),
            rows_written: 0,
        }
    }

    /// Write one row as a JSON object. Fields past the schema are keyed `_cN`.
    pub fn write_row(&mut self, row: &Row) -> Result<()> {
        let mut obj = Map::new();
        for (ci, val) in row.values().iter().enumerate() {
            let key = self
                .columns
                .get(ci)
                .cloned()
                .unwrap_or_else(|| format!("_c{ci}"));
            obj.insert(key, scalar_to_json(val));
        }
        serde_json::to_writer(&mut self.writer, &Value::Object(obj))?;
        self.writer.write_all(b"\n")?;
        self.rows_written += 1;
        Ok(())
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        self.writer
            .into_inner()
            .map_err(|e| e.into_error().into())
    }
}
