//! Logical schema types. Pure data; no row access here.
//!
//! Column names are not unique. Name lookup resolves to the most recently
//! declared column, while index lookup always addresses the exact column.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hash::{hash_serde, Hash256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    Utf8,
    Binary,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Boolean => "boolean",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::Utf8 => "utf8",
            DataType::Binary => "binary",
        };
        f.write_str(name)
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
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
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

    /// Index of the column named `name`. When several columns share the name,
    /// the last one wins.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().rposition(|f| f.name == name)
    }

    /// True when column `idx` is hidden from name lookup by a later column.
    pub fn is_shadowed(&self, idx: usize) -> bool {
        match self.fields.get(idx) {
            Some(f) => self.index_of(&f.name) != Some(idx),
            None => false,
        }
    }

    /// A new schema with `extra` appended after the existing columns.
    pub fn concat(&self, extra: &[Field]) -> Schema {
        let mut fields = Vec::with_capacity(self.fields.len() + extra.len());
        fields.extend_from_slice(&self.fields);
        fields.extend_from_slice(extra);
        Schema { fields }
    }

    /// Stable digest of names, types and nullability, in column order.
    pub fn fingerprint(&self) -> Result<Hash256> {
        hash_serde(&self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Schema {
        Schema::new(vec![
            Field::new("a", DataType::Int32, false),
            Field::new("b", DataType::Utf8, true),
            Field::new("a", DataType::Float64, false),
        ])
    }

    #[test]
    fn later_column_shadows_by_name() {
        let schema = sample();
        assert_eq!(schema.index_of("a"), Some(2));
        assert_eq!(schema.index_of("b"), Some(1));
        assert_eq!(schema.index_of("missing"), None);
        assert_eq!(schema.field(0).unwrap().data_type, DataType::Int32);
        assert!(schema.is_shadowed(0));
        assert!(!schema.is_shadowed(2));
    }

    #[test]
    fn fingerprint_tracks_column_order() {
        let schema = sample();
        let mut reordered = schema.clone();
        reordered.fields.swap(0, 1);
        assert_eq!(schema.fingerprint().unwrap(), sample().fingerprint().unwrap());
        assert_ne!(schema.fingerprint().unwrap(), reordered.fingerprint().unwrap());
    }
}
