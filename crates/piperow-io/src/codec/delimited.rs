//! Delimited text: one record per line, fields joined by a delimiter.

use std::io::BufRead;

use piperow_core::prelude::{IoFormat, Row, Scalar};

use super::DecodeError;
use crate::error::Result;

pub struct DelimitedText {
    field_delimiter: String,
    record_delimiter: u8,
    null_token: String,
    schema_less: bool,
    // scratch buffers reused across records
    text: String,
    line: Vec<u8>,
}

impl DelimitedText {
    pub fn new(format: &IoFormat) -> Result<Self> {
        Ok(Self {
            field_delimiter: format.field_delimiter.clone(),
            record_delimiter: format.record_delimiter_byte()?,
            null_token: format.null_token.clone(),
            schema_less: format.schema_less,
            text: String::new(),
            line: Vec::new(),
        })
    }

    /// Stringify each field, join with the field delimiter, terminate the record.
    pub fn encode(&mut self, row: &Row, out: &mut Vec<u8>) {
        self.text.clear();
        for (i, value) in row.values().iter().enumerate() {
            if i > 0 {
                self.text.push_str(&self.field_delimiter);
            }
            value.render_into(&mut self.text, &self.null_token);
        }
        out.extend_from_slice(self.text.as_bytes());
        out.push(self.record_delimiter);
    }

    /// Split one line (without its terminator) into text fields.
    ///
    /// Schema-less mode caps the split at two parts; extra delimiters stay in
    /// the second field.
    pub fn split_line(&self, line: &str) -> Row {
        let parts: Vec<Scalar> = if self.schema_less {
            line.splitn(2, self.field_delimiter.as_str())
                .map(Scalar::from)
                .collect()
        } else {
            line.split(self.field_delimiter.as_str())
                .map(Scalar::from)
                .collect()
        };
        Row::new(parts)
    }

    /// Read the next record. A final line without a terminator still counts.
    pub fn decode<R: BufRead>(&mut self, input: &mut R) -> std::result::Result<Row, DecodeError> {
        self.line.clear();
        let n = input.read_until(self.record_delimiter, &mut self.line)?;
        if n == 0 {
            return Err(DecodeError::EndOfStream);
        }
        if self.line.last() == Some(&self.record_delimiter) {
            self.line.pop();
            if self.record_delimiter == b'\n' && self.line.last() == Some(&b'\r') {
                self.line.pop();
            }
        }
        let text = String::from_utf8_lossy(&self.line);
        Ok(self.split_line(&text))
    }
}
