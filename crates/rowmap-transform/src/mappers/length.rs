//! Character length of string columns.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use rowmap_core::column_set::ColumnSet;
use rowmap_core::cursor::{RowCursor, ValueGetter};
use rowmap_core::error::{Error, Result};
use rowmap_core::metadata::MetadataItem;
use rowmap_core::schema::{DataType, Field, Schema};
use rowmap_core::types::Scalar;

use crate::mapper::{check_output_name, noop_disposer, resolve_input, ColumnPair, MapperGetters, OutputColumn, RowMapper};

pub const SIGNATURE: &str = "LENGTH_MAPPER";

/// Metadata kind naming the input column an output was derived from.
pub const SOURCE_COLUMN_KIND: &str = "source_column";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LengthState {
    columns: Vec<ColumnPair>,
}

/// Adds one `Int32` column per pair: the character count of the `Utf8`
/// source column. Nulls stay null.
pub struct LengthMapper {
    columns: Vec<ColumnPair>,
    sources: Vec<usize>,
    input_width: usize,
    outputs: Vec<OutputColumn>,
}

impl LengthMapper {
    pub fn new(input: &Schema, columns: Vec<ColumnPair>) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::Schema("length mapper needs at least one column".into()));
        }
        let mut sources = Vec::with_capacity(columns.len());
        let mut outputs = Vec::with_capacity(columns.len());
        for pair in &columns {
            check_output_name(&pair.output)?;
            let idx = resolve_input(input, &pair.source, &[DataType::Utf8])?;
            let nullable = input.fields[idx].nullable;
            sources.push(idx);
            outputs.push(
                OutputColumn::new(Field::new(pair.output.clone(), DataType::Int32, nullable))
                    .with_metadata(MetadataItem::constant(
                        SOURCE_COLUMN_KIND,
                        Scalar::Str(pair.source.clone()),
                    )?),
            );
        }
        Ok(Self {
            columns,
            sources,
            input_width: input.len(),
            outputs,
        })
    }

    pub fn load(input: &Schema, state: &[u8]) -> Result<Arc<dyn RowMapper>> {
        let state: LengthState = serde_json::from_slice(state)?;
        Ok(Arc::new(Self::new(input, state.columns)?))
    }
}

fn char_length(column: usize, value: Scalar) -> Result<Scalar> {
    match value {
        Scalar::Str(s) => i32::try_from(s.chars().count())
            .map(Scalar::I32)
            .map_err(|_| Error::Invariant(format!("string length overflows int32 on column {column}"))),
        Scalar::Null => Ok(Scalar::Null),
        other => Err(Error::TypeMismatch {
            column,
            expected: DataType::Utf8,
            actual: other.data_type().unwrap_or(DataType::Utf8),
        }),
    }
}

impl RowMapper for LengthMapper {
    fn signature(&self) -> &'static str {
        SIGNATURE
    }

    fn output_columns(&self) -> &[OutputColumn] {
        &self.outputs
    }

    fn dependencies(&self, active_outputs: &ColumnSet) -> ColumnSet {
        ColumnSet::from_fn(self.input_width, |k| {
            active_outputs.iter().any(|j| self.sources.get(j) == Some(&k))
        })
    }

    fn create_getters(&self, input: &dyn RowCursor, active_outputs: &ColumnSet) -> Result<MapperGetters> {
        let mut getters: Vec<Option<ValueGetter>> = Vec::with_capacity(self.sources.len());
        for (j, &src) in self.sources.iter().enumerate() {
            if !active_outputs.contains(j) {
                getters.push(None);
                continue;
            }
            let value = input.getter(src)?;
            let getter: ValueGetter = Arc::new(move || char_length(src, value()?));
            getters.push(Some(getter));
        }
        Ok((getters, noop_disposer()))
    }

    fn save_state(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&LengthState {
            columns: self.columns.clone(),
        })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> Schema {
        Schema::new(vec![
            Field::new("a", DataType::Int32, false),
            Field::new("b", DataType::Utf8, true),
        ])
    }

    #[test]
    fn declares_int32_outputs() {
        let m = LengthMapper::new(&input(), vec![ColumnPair::new("b", "c")]).unwrap();
        let out = &m.output_columns()[0];
        assert_eq!(out.field, Field::new("c", DataType::Int32, true));
        assert_eq!(out.metadata[0].value(), Scalar::Str("b".into()));
    }

    #[test]
    fn dependencies_follow_active_outputs() {
        let m = LengthMapper::new(&input(), vec![ColumnPair::new("b", "c")]).unwrap();
        assert_eq!(
            m.dependencies(&ColumnSet::all(1)),
            ColumnSet::from_indices(2, [1]).unwrap()
        );
        assert!(m.dependencies(&ColumnSet::empty(1)).is_empty());
    }

    #[test]
    fn rejects_non_string_source() {
        assert!(matches!(
            LengthMapper::new(&input(), vec![ColumnPair::new("a", "c")]),
            Err(Error::Schema(_))
        ));
        assert!(LengthMapper::new(&input(), vec![]).is_err());
    }

    #[test]
    fn counts_characters_not_bytes() {
        assert_eq!(char_length(0, Scalar::Str("héé".into())).unwrap(), Scalar::I32(3));
        assert_eq!(char_length(0, Scalar::Null).unwrap(), Scalar::Null);
    }
}
