//! Column types, schemas and row values.

use std::fmt;
use std::sync::Arc;

use bstr::BStr;

use crate::error::{Result, StoreError};

/// Physical type of one column
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Int64,
    Float64,
    Bytes,
}

impl ColumnType {
    /// Parse a type name such as "i64", "float" or "bytes"
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "i64" | "int" | "int64" | "bigint" => Ok(ColumnType::Int64),
            "f64" | "float" | "float64" | "double" => Ok(ColumnType::Float64),
            "bytes" | "str" | "string" | "text" => Ok(ColumnType::Bytes),
            _ => Err(StoreError::InvalidColumnType(s.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Int64 => "i64",
            ColumnType::Float64 => "f64",
            ColumnType::Bytes => "bytes",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered column types shared by a store and all of its chunks
#[derive(Clone, Debug)]
pub struct Schema {
    columns: Arc<[ColumnType]>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnType>) -> Self {
        Self {
            columns: columns.into(),
        }
    }

    /// Parse a comma separated list of type names, e.g. "i64,f64,bytes"
    pub fn parse(s: &str) -> Result<Self> {
        let columns: Result<Vec<ColumnType>> = s.split(',').map(ColumnType::parse).collect();
        Ok(Schema::new(columns?))
    }

    pub fn columns(&self) -> &[ColumnType] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Check that owned values fit this schema, column by column
    pub fn check_values(&self, values: &[Datum]) -> Result<()> {
        if values.len() != self.len() {
            return Err(StoreError::SchemaMismatch(format!(
                "expected {} values, got {}",
                self.len(),
                values.len()
            )));
        }
        for (i, (value, &ty)) in values.iter().zip(self.columns.iter()).enumerate() {
            if !value.as_ref().fits(ty) {
                return Err(StoreError::SchemaMismatch(format!(
                    "column {} expects {}, got {:?}",
                    i, ty, value
                )));
            }
        }
        Ok(())
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.columns, &other.columns) || self.columns == other.columns
    }
}

impl Eq for Schema {}

/// Owned cell value
#[derive(Clone, Debug, PartialEq)]
pub enum Datum {
    Null,
    Int64(i64),
    Float64(f64),
    Bytes(Vec<u8>),
}

impl Datum {
    pub fn as_ref(&self) -> DatumRef<'_> {
        match self {
            Datum::Null => DatumRef::Null,
            Datum::Int64(v) => DatumRef::Int64(*v),
            Datum::Float64(v) => DatumRef::Float64(*v),
            Datum::Bytes(v) => DatumRef::Bytes(v),
        }
    }
}

impl From<i64> for Datum {
    fn from(v: i64) -> Self {
        Datum::Int64(v)
    }
}

impl From<f64> for Datum {
    fn from(v: f64) -> Self {
        Datum::Float64(v)
    }
}

impl From<&[u8]> for Datum {
    fn from(v: &[u8]) -> Self {
        Datum::Bytes(v.to_vec())
    }
}

impl From<&str> for Datum {
    fn from(v: &str) -> Self {
        Datum::Bytes(v.as_bytes().to_vec())
    }
}

/// Cell value borrowed from a chunk
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DatumRef<'a> {
    Null,
    Int64(i64),
    Float64(f64),
    Bytes(&'a [u8]),
}

impl<'a> DatumRef<'a> {
    pub fn is_null(&self) -> bool {
        matches!(self, DatumRef::Null)
    }

    /// Whether this value can be stored in a column of type `ty`
    pub fn fits(&self, ty: ColumnType) -> bool {
        matches!(
            (self, ty),
            (DatumRef::Null, _)
                | (DatumRef::Int64(_), ColumnType::Int64)
                | (DatumRef::Float64(_), ColumnType::Float64)
                | (DatumRef::Bytes(_), ColumnType::Bytes)
        )
    }

    pub fn to_datum(&self) -> Datum {
        match *self {
            DatumRef::Null => Datum::Null,
            DatumRef::Int64(v) => Datum::Int64(v),
            DatumRef::Float64(v) => Datum::Float64(v),
            DatumRef::Bytes(v) => Datum::Bytes(v.to_vec()),
        }
    }
}

impl fmt::Display for DatumRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatumRef::Null => f.write_str("\\N"),
            DatumRef::Int64(v) => write!(f, "{}", v),
            DatumRef::Float64(v) => write!(f, "{}", v),
            DatumRef::Bytes(v) => write!(f, "{}", BStr::new(v)),
        }
    }
}
