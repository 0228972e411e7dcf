//! Column-major in-memory table.

use rowmap_core::error::{Error, Result};
use rowmap_core::schema::Schema;
use rowmap_core::types::Scalar;

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryTable {
    schema: Schema,
    columns: Vec<Vec<Scalar>>,
    rows: usize,
}

impl MemoryTable {
    /// Validates column count, equal lengths, value types and nullability.
    pub fn new(schema: Schema, columns: Vec<Vec<Scalar>>) -> Result<Self> {
        if columns.len() != schema.len() {
            return Err(Error::Schema(format!(
                "table has {} columns, schema declares {}",
                columns.len(),
                schema.len()
            )));
        }
        let rows = columns.first().map(Vec::len).unwrap_or(0);
        for (idx, (values, field)) in columns.iter().zip(&schema.fields).enumerate() {
            if values.len() != rows {
                return Err(Error::Schema(format!(
                    "column '{}' has {} rows, expected {rows}",
                    field.name,
                    values.len()
                )));
            }
            for value in values {
                if let Some(actual) = value.data_type() {
                    if actual != field.data_type {
                        return Err(Error::TypeMismatch {
                            column: idx,
                            expected: field.data_type,
                            actual,
                        });
                    }
                } else if !field.nullable {
                    return Err(Error::Schema(format!(
                        "null in non-nullable column '{}'",
                        field.name
                    )));
                }
            }
        }
        Ok(Self {
            schema,
            columns,
            rows,
        })
    }

    pub fn from_rows(schema: Schema, rows: Vec<Vec<Scalar>>) -> Result<Self> {
        let mut columns: Vec<Vec<Scalar>> = (0..schema.len())
            .map(|_| Vec::with_capacity(rows.len()))
            .collect();
        for (idx, row) in rows.into_iter().enumerate() {
            if row.len() != schema.len() {
                return Err(Error::Schema(format!(
                    "row {idx} has {} values, schema declares {}",
                    row.len(),
                    schema.len()
                )));
            }
            for (col, value) in columns.iter_mut().zip(row) {
                col.push(value);
            }
        }
        Self::new(schema, columns)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn value(&self, row: usize, col: usize) -> Option<&Scalar> {
        self.columns.get(col).and_then(|values| values.get(row))
    }
}
