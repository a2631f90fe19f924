//! Binary serde plug-in contract and the name → constructor registry.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::io::BufRead;
use std::sync::{PoisonError, RwLock};

use once_cell::sync::Lazy;
use piperow_core::prelude::Scalar;

use super::{DecodeError, FramedSerde, JsonSerde};
use crate::error::{Error, Result};

/// Opaque decoded unit. Only the serde that produced it knows its shape.
pub struct RawRecord(Box<dyn Any + Send>);

impl RawRecord {
    pub fn new<T: Any + Send>(value: T) -> Self {
        RawRecord(Box::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for RawRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RawRecord(..)")
    }
}

/// A binary record serde.
///
/// Implementations are created empty by their registered constructor and then
/// initialized once with the schema of the direction they serve.
pub trait RecordSerde: Send {
    fn initialize(
        &mut self,
        columns: &[String],
        column_types: &[String],
        props: &[(String, String)],
    ) -> Result<()>;

    /// Append one self-delimited unit for `fields` to `out`.
    fn serialize(&mut self, fields: &[Scalar], out: &mut Vec<u8>) -> Result<()>;

    /// Read one unit. Clean end of input must be reported as
    /// [`DecodeError::EndOfStream`].
    fn deserialize(&mut self, input: &mut dyn BufRead) -> std::result::Result<RawRecord, DecodeError>;

    /// Field `idx` of a unit produced by `deserialize`; `Null` when absent.
    fn get_field(&self, raw: &RawRecord, idx: usize) -> Scalar;
}

pub type SerdeCtor = fn() -> Box<dyn RecordSerde>;

/// Maps serde identifiers to constructors.
#[derive(Clone)]
pub struct SerdeRegistry {
    ctors: HashMap<String, SerdeCtor>,
}

impl Default for SerdeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SerdeRegistry {
    /// Registry with the built-in serdes (`json`, `framed`).
    pub fn new() -> Self {
        let mut reg = Self::empty();
        reg.register(JsonSerde::NAME, JsonSerde::boxed);
        reg.register(FramedSerde::NAME, FramedSerde::boxed);
        reg
    }

    pub fn empty() -> Self {
        Self {
            ctors: HashMap::new(),
        }
    }

    /// Add or replace a constructor.
    pub fn register(&mut self, name: impl Into<String>, ctor: SerdeCtor) {
        self.ctors.insert(name.into(), ctor);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ctors.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.ctors.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn make(&self, name: &str) -> Result<Box<dyn RecordSerde>> {
        self.ctors
            .get(name)
            .map(|ctor| ctor())
            .ok_or_else(|| Error::UnknownSerde(name.to_string()))
    }
}

static GLOBAL: Lazy<RwLock<SerdeRegistry>> = Lazy::new(|| RwLock::new(SerdeRegistry::new()));

/// Register a serde in the process-wide registry.
pub fn register_serde(name: impl Into<String>, ctor: SerdeCtor) {
    GLOBAL
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register(name, ctor);
}

/// Instantiate a serde from the process-wide registry.
pub fn make_serde(name: &str) -> Result<Box<dyn RecordSerde>> {
    GLOBAL
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .make(name)
}
