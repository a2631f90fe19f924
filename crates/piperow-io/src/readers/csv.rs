//! CSV reader yielding text rows one at a time.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use piperow_core::prelude::{Row, Schema, Scalar};

use crate::error::Result;

pub struct CsvReader<R: Read> {
    inner: ::csv::Reader<R>,
    schema: Schema,
}

impl CsvReader<File> {
    pub fn from_path<P: AsRef<Path>>(path: P, has_headers: bool) -> Result<Self> {
        let f = File::open(path)?;
        Self::from_reader(f, has_headers)
    }
}

impl<R: Read> CsvReader<R> {
    /// Build a reader. With headers, column names come from the first record;
    /// without, columns are named `c0..cN` after the first record's width.
    pub fn from_reader(reader: R, has_headers: bool) -> Result<Self> {
        let mut inner = ::csv::ReaderBuilder::new()
            .has_headers(has_headers)
            .flexible(true)
            .from_reader(reader);

        let names: Vec<String> = if has_headers {
            inner.headers()?.iter().map(str::to_string).collect()
        } else {
            let width = inner.headers()?.len();
            (0..width).map(|i| format!("c{i}")).collect()
        };

        Ok(Self {
            inner,
            schema: Schema::utf8(&names),
        })
    }

    /// All-text schema derived from the header (or first record).
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Lazily yield rows; each field is a string scalar.
    pub fn rows(self) -> CsvRows<R> {
        CsvRows {
            records: self.inner.into_records(),
        }
    }
}

pub struct CsvRows<R: Read> {
    records: ::csv::StringRecordsIntoIter<R>,
}

impl<R: Read> Iterator for CsvRows<R> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(
            record
                .map(|rec| Row::new(rec.iter().map(Scalar::from).collect()))
                .map_err(Into::into),
        )
    }
}
