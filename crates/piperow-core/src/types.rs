//! Record values flowing through a script pipeline.
//!
//! A `Row` is the unit handed to (and read back from) the external process.
//! `RowBatch` is the columnar form batch-oriented callers hold; it converts to
//! and from rows so either side can drive the pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::{DataType, Schema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Bin(Vec<u8>),
}

impl Scalar {
    pub fn data_type(&self) -> DataType {
        match self {
            Scalar::Null => DataType::Utf8,
            Scalar::Bool(_) => DataType::Boolean,
            Scalar::I32(_) => DataType::Int32,
            Scalar::I64(_) => DataType::Int64,
            Scalar::F32(_) => DataType::Float32,
            Scalar::F64(_) => DataType::Float64,
            Scalar::Str(_) => DataType::Utf8,
            Scalar::Bin(_) => DataType::Binary,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Append the text form of this value to `out`.
    ///
    /// Nulls become `null_token`; binary values become lowercase hex.
    pub fn render_into(&self, out: &mut String, null_token: &str) {
        use Scalar::*;
        match self {
            Null => out.push_str(null_token),
            Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            I32(i) => out.push_str(&i.to_string()),
            I64(i) => out.push_str(&i.to_string()),
            F32(f) => out.push_str(&f.to_string()),
            F64(f) => out.push_str(&f.to_string()),
            Str(s) => out.push_str(s),
            Bin(b) => out.push_str(&hex::encode(b)),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Str(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Str(s)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::I64(v)
    }
}

/// One record: an ordered sequence of field values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(pub Vec<Scalar>);

impl Row {
    pub fn new(values: Vec<Scalar>) -> Self {
        Row(values)
    }

    /// Row of text fields.
    pub fn from_strs<S: AsRef<str>>(fields: &[S]) -> Self {
        Row(fields
            .iter()
            .map(|s| Scalar::Str(s.as_ref().to_string()))
            .collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Scalar> {
        self.0.get(idx)
    }

    pub fn values(&self) -> &[Scalar] {
        &self.0
    }

    pub fn into_values(self) -> Vec<Scalar> {
        self.0
    }
}

impl From<Vec<Scalar>> for Row {
    fn from(values: Vec<Scalar>) -> Self {
        Row(values)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Scalar>,
}

impl Column {
    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Columnar batch of rows sharing one schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowBatch {
    pub columns: Vec<Column>,
}

impl RowBatch {
    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Transpose the batch into rows, in row order.
    pub fn rows(&self) -> Vec<Row> {
        (0..self.num_rows())
            .map(|r| {
                Row(self
                    .columns
                    .iter()
                    .map(|c| c.values.get(r).cloned().unwrap_or(Scalar::Null))
                    .collect())
            })
            .collect()
    }

    /// Build a batch from rows. Short rows are padded with nulls; a row wider
    /// than the schema is an error.
    pub fn from_rows(schema: &Schema, rows: &[Row]) -> Result<RowBatch> {
        let mut columns: Vec<Column> = schema
            .fields
            .iter()
            .map(|f| Column {
                name: f.name.clone(),
                values: Vec::with_capacity(rows.len()),
            })
            .collect();

        for (idx, row) in rows.iter().enumerate() {
            if row.len() > columns.len() {
                return Err(Error::Schema(format!(
                    "row {} has {} fields but schema has {}",
                    idx,
                    row.len(),
                    columns.len()
                )));
            }
            for (ci, col) in columns.iter_mut().enumerate() {
                col.values
                    .push(row.get(ci).cloned().unwrap_or(Scalar::Null));
            }
        }

        Ok(RowBatch { columns })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Field;

    fn render(s: &Scalar) -> String {
        let mut out = String::new();
        s.render_into(&mut out, "\\N");
        out
    }

    #[test]
    fn scalar_text_forms() {
        assert_eq!(render(&Scalar::Null), "\\N");
        assert_eq!(render(&Scalar::Bool(true)), "true");
        assert_eq!(render(&Scalar::I64(-42)), "-42");
        assert_eq!(render(&Scalar::F64(1.5)), "1.5");
        assert_eq!(render(&Scalar::Bin(vec![0x0a, 0xff])), "0aff");
        assert_eq!(render(&Scalar::from("abc")), "abc");
    }

    #[test]
    fn render_appends_without_clearing() {
        let mut out = String::from("k=");
        Scalar::Bin(vec![0xde, 0xad, 0x01]).render_into(&mut out, "");
        out.push('|');
        Scalar::F32(0.25).render_into(&mut out, "");
        out.push('|');
        Scalar::I32(-7).render_into(&mut out, "");
        out.push('|');
        Scalar::Null.render_into(&mut out, "NULL");
        assert_eq!(out, "k=dead01|0.25|-7|NULL");
    }

    #[test]
    fn batch_transposes_to_rows_and_back() {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::utf8("name"),
        ]);
        let rows = vec![
            Row::new(vec![Scalar::I64(1), Scalar::from("a")]),
            Row::new(vec![Scalar::I64(2)]),
        ];
        let batch = RowBatch::from_rows(&schema, &rows).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.columns[1].values[1], Scalar::Null);

        let back = batch.rows();
        assert_eq!(back[0], rows[0]);
        assert_eq!(back[1], Row::new(vec![Scalar::I64(2), Scalar::Null]));
    }

    #[test]
    fn from_rows_rejects_wide_rows() {
        let schema = Schema::utf8(&["only"]);
        let rows = vec![Row::from_strs(&["a", "b"])];
        assert!(RowBatch::from_rows(&schema, &rows).is_err());
    }
}
