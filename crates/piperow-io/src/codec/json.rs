//! `json` serde: one JSON value per line.
//!
//! Records are written as arrays by default, or as objects keyed by column
//! name when `json.format = object`. Either shape is accepted on read.

use std::io::BufRead;

use piperow_core::prelude::{DataType, Scalar};
use serde_json::{Map, Value};

use super::{DecodeError, RawRecord, RecordSerde};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Shape {
    #[default]
    Array,
    Object,
}

#[derive(Default)]
pub struct JsonSerde {
    columns: Vec<String>,
    types: Vec<DataType>,
    shape: Shape,
    line: Vec<u8>,
}

impl JsonSerde {
    pub const NAME: &'static str = "json";

    pub fn boxed() -> Box<dyn RecordSerde> {
        Box::new(Self::default())
    }

    fn init_error(reason: String) -> Error {
        Error::SerdeInit {
            name: Self::NAME.to_string(),
            reason,
        }
    }
}

impl RecordSerde for JsonSerde {
    fn initialize(
        &mut self,
        columns: &[String],
        column_types: &[String],
        props: &[(String, String)],
    ) -> Result<()> {
        self.columns = columns.to_vec();
        self.types = column_types
            .iter()
            .map(|t| DataType::from_type_name(t).map_err(|e| Self::init_error(e.to_string())))
            .collect::<Result<Vec<_>>>()?;

        for (key, value) in props {
            if key == "json.format" {
                self.shape = match value.as_str() {
                    "array" => Shape::Array,
                    "object" => Shape::Object,
                    other => return Err(Self::init_error(format!("unknown json.format '{other}'"))),
                };
            }
        }
        Ok(())
    }

    fn serialize(&mut self, fields: &[Scalar], out: &mut Vec<u8>) -> Result<()> {
        let value = match self.shape {
            Shape::Array => Value::Array(fields.iter().map(scalar_to_json).collect()),
            Shape::Object => {
                let mut obj = Map::new();
                for (idx, field) in fields.iter().enumerate() {
                    let key = self
                        .columns
                        .get(idx)
                        .cloned()
                        .unwrap_or_else(|| format!("_c{idx}"));
                    obj.insert(key, scalar_to_json(field));
                }
                Value::Object(obj)
            }
        };
        serde_json::to_writer(&mut *out, &value)?;
        out.push(b'\n');
        Ok(())
    }

    fn deserialize(&mut self, input: &mut dyn BufRead) -> std::result::Result<RawRecord, DecodeError> {
        loop {
            self.line.clear();
            if input.read_until(b'\n', &mut self.line)? == 0 {
                return Err(DecodeError::EndOfStream);
            }
            if self.line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let value: Value = serde_json::from_slice(&self.line)
                .map_err(|e| DecodeError::Malformed(format!("json: {e}")))?;
            let values = match value {
                Value::Array(values) => values,
                Value::Object(mut obj) => self
                    .columns
                    .iter()
                    .map(|c| obj.remove(c).unwrap_or(Value::Null))
                    .collect(),
                other => {
                    return Err(DecodeError::Malformed(format!(
                        "json: expected array or object, got {other}"
                    )))
                }
            };
            return Ok(RawRecord::new(values));
        }
    }

    fn get_field(&self, raw: &RawRecord, idx: usize) -> Scalar {
        raw.downcast_ref::<Vec<Value>>()
            .and_then(|values| values.get(idx))
            .map(|v| json_to_scalar(v, self.types.get(idx).copied()))
            .unwrap_or(Scalar::Null)
    }
}

pub(crate) fn scalar_to_json(v: &Scalar) -> Value {
    use Scalar::*;
    match v {
        Null => Value::Null,
        Bool(b) => Value::Bool(*b),
        I32(i) => Value::from(*i),
        I64(i) => Value::from(*i),
        F32(f) => Value::from(*f as f64),
        F64(f) => Value::from(*f),
        Str(s) => Value::String(s.clone()),
        Bin(b) => Value::String(hex::encode(b)),
    }
}

/// Convert a JSON value, guided by the declared column type when known.
/// Values that do not fit the declared type become `Null`.
fn json_to_scalar(v: &Value, ty: Option<DataType>) -> Scalar {
    match (v, ty) {
        (Value::Null, _) => Scalar::Null,
        (Value::Bool(b), _) => Scalar::Bool(*b),
        (Value::Number(n), Some(DataType::Int32)) => n
            .as_i64()
            .and_then(|i| i32::try_from(i).ok())
            .map(Scalar::I32)
            .unwrap_or(Scalar::Null),
        (Value::Number(n), Some(DataType::Int64 | DataType::Date64)) => {
            n.as_i64().map(Scalar::I64).unwrap_or(Scalar::Null)
        }
        (Value::Number(n), Some(DataType::Float32)) => n
            .as_f64()
            .map(|f| Scalar::F32(f as f32))
            .unwrap_or(Scalar::Null),
        (Value::Number(n), Some(DataType::Float64 | DataType::Decimal128)) => {
            n.as_f64().map(Scalar::F64).unwrap_or(Scalar::Null)
        }
        (Value::Number(n), Some(DataType::Utf8)) => Scalar::Str(n.to_string()),
        (Value::Number(n), _) => match n.as_i64() {
            Some(i) => Scalar::I64(i),
            None => n.as_f64().map(Scalar::F64).unwrap_or(Scalar::Null),
        },
        (Value::String(s), Some(DataType::Binary)) => {
            hex::decode(s).map(Scalar::Bin).unwrap_or(Scalar::Null)
        }
        (Value::String(s), _) => Scalar::Str(s.clone()),
        (other, _) => Scalar::Str(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serde(types: &[&str], props: &[(&str, &str)]) -> JsonSerde {
        let columns: Vec<String> = (0..types.len()).map(|i| format!("c{i}")).collect();
        let types: Vec<String> = types.iter().map(|t| t.to_string()).collect();
        let props: Vec<(String, String)> = props
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut s = JsonSerde::default();
        s.initialize(&columns, &types, &props).unwrap();
        s
    }

    fn decode_all(s: &mut JsonSerde, mut input: &[u8]) -> Vec<Vec<Scalar>> {
        let mut out = Vec::new();
        loop {
            match s.deserialize(&mut input) {
                Ok(raw) => out.push((0..s.types.len()).map(|i| s.get_field(&raw, i)).collect()),
                Err(DecodeError::EndOfStream) => return out,
                Err(e) => panic!("unexpected decode error: {e}"),
            }
        }
    }

    #[test]
    fn typed_fields_survive_a_pass() {
        let mut s = serde(&["int", "double", "string", "binary", "boolean"], &[]);
        let fields = vec![
            Scalar::I32(5),
            Scalar::F64(2.5),
            Scalar::from("hi"),
            Scalar::Bin(vec![0xde, 0xad]),
            Scalar::Null,
        ];
        let mut buf = Vec::new();
        s.serialize(&fields, &mut buf).unwrap();
        assert_eq!(buf, b"[5,2.5,\"hi\",\"dead\",null]\n");
        assert_eq!(decode_all(&mut s, &buf), vec![fields]);
    }

    #[test]
    fn object_shape_keys_by_column() {
        let mut s = serde(&["bigint", "string"], &[("json.format", "object")]);
        let mut buf = Vec::new();
        s.serialize(&[Scalar::I64(1), Scalar::from("a")], &mut buf).unwrap();
        assert_eq!(buf, b"{\"c0\":1,\"c1\":\"a\"}\n");

        let rows = decode_all(&mut s, b"{\"c1\":\"z\"}\n\n[2,\"y\"]\n");
        assert_eq!(
            rows,
            vec![
                vec![Scalar::Null, Scalar::from("z")],
                vec![Scalar::I64(2), Scalar::from("y")],
            ]
        );
    }

    #[test]
    fn garbage_is_malformed_not_eof() {
        let mut s = serde(&["string"], &[]);
        let mut input: &[u8] = b"[\"ok\"]\n{not json\n";
        assert!(s.deserialize(&mut input).is_ok());
        assert!(matches!(s.deserialize(&mut input), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn rejects_unknown_options() {
        let mut s = JsonSerde::default();
        let props = vec![("json.format".to_string(), "xml".to_string())];
        assert!(s.initialize(&[], &[], &props).is_err());
        assert!(s
            .initialize(&["a".into()], &["map<string,int>".into()], &[])
            .is_err());
    }
}
