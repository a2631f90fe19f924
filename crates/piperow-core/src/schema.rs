//! Logical schema types. Pure data; no codec knowledge here.
//!
//! Binary serdes receive a schema as two parallel lists: column names and
//! column type names (see [`DataType::type_name`]).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    Utf8,
    Binary,
    Date64,
    Decimal128,
}

impl DataType {
    /// Stable lowercase name handed to serde plug-ins.
    pub fn type_name(&self) -> &'static str {
        match self {
            DataType::Boolean => "boolean",
            DataType::Int32 => "int",
            DataType::Int64 => "bigint",
            DataType::Float32 => "float",
            DataType::Float64 => "double",
            DataType::Utf8 => "string",
            DataType::Binary => "binary",
            DataType::Date64 => "date",
            DataType::Decimal128 => "decimal",
        }
    }

    pub fn from_type_name(name: &str) -> Result<Self> {
        let ty = match name.trim().to_ascii_lowercase().as_str() {
            "boolean" | "bool" => DataType::Boolean,
            "int" | "int32" => DataType::Int32,
            "bigint" | "int64" | "long" => DataType::Int64,
            "float" | "float32" => DataType::Float32,
            "double" | "float64" => DataType::Float64,
            "string" | "utf8" => DataType::Utf8,
            "binary" => DataType::Binary,
            "date" | "date64" => DataType::Date64,
            "decimal" | "decimal128" => DataType::Decimal128,
            other => return Err(Error::Schema(format!("unknown type name '{other}'"))),
        };
        Ok(ty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }

    /// Nullable text column; what the delimited codec produces.
    pub fn utf8(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Utf8, true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// All-text schema from column names.
    pub fn utf8<S: AsRef<str>>(names: &[S]) -> Self {
        Self::new(names.iter().map(|n| Field::utf8(n.as_ref())).collect())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, idx: usize) -> Option<&Field> {
        self.fields.get(idx)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn column_type_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|f| f.data_type.type_name().to_string())
            .collect()
    }
}
