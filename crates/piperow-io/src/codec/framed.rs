//! `framed` serde: length-prefixed binary records.
//!
//! Layout of one unit:
//! [ len: u32 LE ][ field_count: u16 LE ][ field … ]
//!
//! Each field is a tag byte followed by its little-endian value:
//! 0 null | 1 bool (1) | 2 i32 (4) | 3 i64 (8) | 4 f32 (4) | 5 f64 (8)
//! | 6 utf8 (u32 len + bytes) | 7 binary (u32 len + bytes)

use std::io::{BufRead, ErrorKind};

use piperow_core::prelude::Scalar;

use super::{DecodeError, RawRecord, RecordSerde};
use crate::error::{Error, Result};

pub const FRAME_HEADER_LEN: usize = 4;
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_I32: u8 = 2;
const TAG_I64: u8 = 3;
const TAG_F32: u8 = 4;
const TAG_F64: u8 = 5;
const TAG_STR: u8 = 6;
const TAG_BIN: u8 = 7;

pub struct FramedSerde {
    max_frame_bytes: usize,
    frame: Vec<u8>,
}

impl Default for FramedSerde {
    fn default() -> Self {
        Self {
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            frame: Vec::new(),
        }
    }
}

impl FramedSerde {
    pub const NAME: &'static str = "framed";

    pub fn boxed() -> Box<dyn RecordSerde> {
        Box::new(Self::default())
    }

    /// Fill the 4-byte length prefix. `Ok(false)` means clean EOF before any byte.
    fn read_header(input: &mut dyn BufRead, header: &mut [u8; FRAME_HEADER_LEN]) -> std::result::Result<bool, DecodeError> {
        let mut filled = 0;
        while filled < FRAME_HEADER_LEN {
            match input.read(&mut header[filled..]) {
                Ok(0) if filled == 0 => return Ok(false),
                Ok(0) => {
                    return Err(DecodeError::Malformed(format!(
                        "truncated frame header: {filled} of {FRAME_HEADER_LEN} bytes"
                    )))
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(DecodeError::Io(e)),
            }
        }
        Ok(true)
    }
}

impl RecordSerde for FramedSerde {
    fn initialize(
        &mut self,
        _columns: &[String],
        _column_types: &[String],
        props: &[(String, String)],
    ) -> Result<()> {
        for (key, value) in props {
            if key == "framed.max_frame_bytes" {
                self.max_frame_bytes = value
                    .parse::<usize>()
                    .ok()
                    .filter(|v| *v > 0)
                    .ok_or_else(|| Error::SerdeInit {
                        name: Self::NAME.to_string(),
                        reason: format!("invalid framed.max_frame_bytes '{value}'"),
                    })?;
            }
        }
        Ok(())
    }

    fn serialize(&mut self, fields: &[Scalar], out: &mut Vec<u8>) -> Result<()> {
        let count = u16::try_from(fields.len())
            .map_err(|_| Error::Encode(format!("{} fields exceed frame limit", fields.len())))?;

        let start = out.len();
        out.extend_from_slice(&[0u8; FRAME_HEADER_LEN]);
        out.extend_from_slice(&count.to_le_bytes());
        for field in fields {
            if let Err(e) = encode_scalar(field, out) {
                out.truncate(start);
                return Err(e);
            }
        }

        let payload_len = out.len() - start - FRAME_HEADER_LEN;
        if payload_len > self.max_frame_bytes {
            out.truncate(start);
            return Err(Error::Encode(format!(
                "frame of {payload_len} bytes exceeds max {}",
                self.max_frame_bytes
            )));
        }
        // max_frame_bytes may exceed u32 on 64-bit hosts
        let len = u32::try_from(payload_len).map_err(|_| {
            out.truncate(start);
            Error::Encode(format!("frame of {payload_len} bytes exceeds u32"))
        })?;
        out[start..start + FRAME_HEADER_LEN].copy_from_slice(&len.to_le_bytes());
        Ok(())
    }

    fn deserialize(&mut self, input: &mut dyn BufRead) -> std::result::Result<RawRecord, DecodeError> {
        let mut header = [0u8; FRAME_HEADER_LEN];
        if !Self::read_header(input, &mut header)? {
            return Err(DecodeError::EndOfStream);
        }
        let len = u32::from_le_bytes(header) as usize;
        if len > self.max_frame_bytes {
            return Err(DecodeError::Malformed(format!(
                "frame length {len} exceeds max {}",
                self.max_frame_bytes
            )));
        }

        self.frame.clear();
        self.frame.resize(len, 0);
        input.read_exact(&mut self.frame).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => {
                DecodeError::Malformed(format!("truncated frame: expected {len} bytes"))
            }
            _ => DecodeError::Io(e),
        })?;

        let fields = decode_payload(&self.frame)?;
        Ok(RawRecord::new(fields))
    }

    fn get_field(&self, raw: &RawRecord, idx: usize) -> Scalar {
        raw.downcast_ref::<Vec<Scalar>>()
            .and_then(|fields| fields.get(idx))
            .cloned()
            .unwrap_or(Scalar::Null)
    }
}

fn encode_bytes(tag: u8, bytes: &[u8], out: &mut Vec<u8>) -> Result<()> {
    let len = u32::try_from(bytes.len())
        .map_err(|_| Error::Encode(format!("value of {} bytes too large", bytes.len())))?;
    out.push(tag);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

fn encode_scalar(v: &Scalar, out: &mut Vec<u8>) -> Result<()> {
    use Scalar::*;
    match v {
        Null => out.push(TAG_NULL),
        Bool(b) => {
            out.push(TAG_BOOL);
            out.push(*b as u8);
        }
        I32(i) => {
            out.push(TAG_I32);
            out.extend_from_slice(&i.to_le_bytes());
        }
        I64(i) => {
            out.push(TAG_I64);
            out.extend_from_slice(&i.to_le_bytes());
        }
        F32(f) => {
            out.push(TAG_F32);
            out.extend_from_slice(&f.to_bits().to_le_bytes());
        }
        F64(f) => {
            out.push(TAG_F64);
            out.extend_from_slice(&f.to_bits().to_le_bytes());
        }
        Str(s) => encode_bytes(TAG_STR, s.as_bytes(), out)?,
        Bin(b) => encode_bytes(TAG_BIN, b, out)?,
    }
    Ok(())
}

/// Cursor over one frame's payload.
struct Payload<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Payload<'a> {
    fn take(&mut self, n: usize) -> std::result::Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.bytes.len());
        match end {
            Some(end) => {
                let bytes = self.bytes;
                let slice = &bytes[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(DecodeError::Malformed(format!(
                "field overruns frame at offset {}",
                self.pos
            ))),
        }
    }

    fn take_array<const N: usize>(&mut self) -> std::result::Result<[u8; N], DecodeError> {
        let mut arr = [0u8; N];
        arr.copy_from_slice(self.take(N)?);
        Ok(arr)
    }
}

fn decode_payload(bytes: &[u8]) -> std::result::Result<Vec<Scalar>, DecodeError> {
    let mut p = Payload { bytes, pos: 0 };
    let count = u16::from_le_bytes(p.take_array()?) as usize;
    let mut fields = Vec::with_capacity(count);
    for _ in 0..count {
        let tag = p.take_array::<1>()?[0];
        let value = match tag {
            TAG_NULL => Scalar::Null,
            TAG_BOOL => Scalar::Bool(p.take_array::<1>()?[0] != 0),
            TAG_I32 => Scalar::I32(i32::from_le_bytes(p.take_array()?)),
            TAG_I64 => Scalar::I64(i64::from_le_bytes(p.take_array()?)),
            TAG_F32 => Scalar::F32(f32::from_bits(u32::from_le_bytes(p.take_array()?))),
            TAG_F64 => Scalar::F64(f64::from_bits(u64::from_le_bytes(p.take_array()?))),
            TAG_STR | TAG_BIN => {
                let len = u32::from_le_bytes(p.take_array()?) as usize;
                let raw = p.take(len)?;
                if tag == TAG_BIN {
                    Scalar::Bin(raw.to_vec())
                } else {
                    let s = std::str::from_utf8(raw)
                        .map_err(|e| DecodeError::Malformed(format!("utf8 field: {e}")))?;
                    Scalar::Str(s.to_string())
                }
            }
            other => return Err(DecodeError::Malformed(format!("unknown field tag {other}"))),
        };
        fields.push(value);
    }
    if p.pos != bytes.len() {
        return Err(DecodeError::Malformed(format!(
            "{} trailing bytes in frame",
            bytes.len() - p.pos
        )));
    }
    Ok(fields)
}
