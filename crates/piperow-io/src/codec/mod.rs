//! Record codecs for the two directions of a script pipe.
//!
//! A direction is either delimited text or a binary serde looked up by name in
//! the [`SerdeRegistry`]. The choice is made once, when the codec is built from
//! an [`IoFormat`]; unknown serde names fail there rather than mid-stream.

mod delimited;
mod framed;
mod json;
mod plugin;

use std::io::BufRead;

use piperow_core::prelude::{IoFormat, Row, Schema};
use thiserror::Error;

use crate::error::Result;

pub use delimited::DelimitedText;
pub use framed::FramedSerde;
pub use json::JsonSerde;
pub(crate) use json::scalar_to_json;
pub use plugin::{make_serde, register_serde, RawRecord, RecordSerde, SerdeCtor, SerdeRegistry};

/// Why a decode call produced no row.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Input ended cleanly on a record boundary.
    #[error("end of stream")]
    EndOfStream,

    /// Input ended mid-record or held bytes the codec could not parse.
    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, DecodeError::EndOfStream)
    }
}

/// A binary serde bound to a schema.
pub struct BinaryCodec {
    name: String,
    serde: Box<dyn RecordSerde>,
    num_fields: usize,
}

impl BinaryCodec {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Encode/decode capability for one pipe direction.
pub enum RecordCodec {
    Delimited(DelimitedText),
    Binary(BinaryCodec),
}

impl RecordCodec {
    /// Build the codec for `format`, resolving serde names in the global registry.
    pub fn for_format(format: &IoFormat, schema: &Schema) -> Result<Self> {
        match format.serde_name() {
            None => Self::delimited(format),
            Some(name) => {
                let serde = make_serde(name)?;
                Self::binary(name, serde, format, schema)
            }
        }
    }

    /// Like [`RecordCodec::for_format`] but against an explicit registry.
    pub fn with_registry(format: &IoFormat, schema: &Schema, registry: &SerdeRegistry) -> Result<Self> {
        match format.serde_name() {
            None => Self::delimited(format),
            Some(name) => {
                let serde = registry.make(name)?;
                Self::binary(name, serde, format, schema)
            }
        }
    }

    fn delimited(format: &IoFormat) -> Result<Self> {
        format.validate()?;
        Ok(RecordCodec::Delimited(DelimitedText::new(format)?))
    }

    fn binary(
        name: &str,
        mut serde: Box<dyn RecordSerde>,
        format: &IoFormat,
        schema: &Schema,
    ) -> Result<Self> {
        serde.initialize(
            &schema.column_names(),
            &schema.column_type_names(),
            &format.serde_props,
        )?;
        Ok(RecordCodec::Binary(BinaryCodec {
            name: name.to_string(),
            serde,
            num_fields: schema.len(),
        }))
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, RecordCodec::Binary(_))
    }

    /// Human-readable codec name for logs.
    pub fn describe(&self) -> &str {
        match self {
            RecordCodec::Delimited(_) => "delimited",
            RecordCodec::Binary(b) => b.name(),
        }
    }

    /// Append the encoding of `row` to `out`.
    pub fn encode(&mut self, row: &Row, out: &mut Vec<u8>) -> Result<()> {
        match self {
            RecordCodec::Delimited(text) => {
                text.encode(row, out);
                Ok(())
            }
            RecordCodec::Binary(bin) => bin.serde.serialize(row.values(), out),
        }
    }

    /// Read exactly one record from `input`.
    pub fn decode<R: BufRead>(&mut self, input: &mut R) -> std::result::Result<Row, DecodeError> {
        match self {
            RecordCodec::Delimited(text) => text.decode(input),
            RecordCodec::Binary(bin) => {
                let raw = bin.serde.deserialize(input)?;
                let fields = (0..bin.num_fields)
                    .map(|idx| bin.serde.get_field(&raw, idx))
                    .collect();
                Ok(Row::new(fields))
            }
        }
    }
}
