//! Row mapper trait + helpers shared by mapper implementations.
//!
//! The transform asks a mapper three things: which columns it adds, which
//! input columns a set of its outputs needs, and getters for those outputs on a
//! given input cursor. Everything else (schemas, active sets, cursors) is the
//! transform's job.

use serde::{Deserialize, Serialize};

use rowmap_core::column_set::ColumnSet;
use rowmap_core::cursor::{RowCursor, ValueGetter};
use rowmap_core::error::{Error, Result};
use rowmap_core::metadata::MetadataItem;
use rowmap_core::schema::{DataType, Field, Schema};

/// Releases per-cursor resources a mapper allocated in `create_getters`.
/// Called exactly once, when the owning cursor is disposed.
pub type Disposer = Box<dyn FnOnce() + Send>;

/// Output getters, one slot per declared output column, plus their disposer.
pub type MapperGetters = (Vec<Option<ValueGetter>>, Disposer);

pub fn noop_disposer() -> Disposer {
    Box::new(|| {})
}

/// A column a mapper adds, with the metadata it carries.
#[derive(Debug, Clone)]
pub struct OutputColumn {
    pub field: Field,
    pub metadata: Vec<MetadataItem>,
}

impl OutputColumn {
    pub fn new(field: Field) -> Self {
        Self {
            field,
            metadata: Vec::new(),
        }
    }

    pub fn with_metadata(mut self, item: MetadataItem) -> Self {
        self.metadata.push(item);
        self
    }
}

/// Trait that all row mappers must implement.
///
/// Invariants:
/// - `output_columns` is fixed at construction and derived from the input
///   schema alone.
/// - `dependencies` is a pure function of its argument and must cover every
///   input column any getter for those outputs will read.
/// - `create_getters` returns exactly one slot per output column, `Some` iff
///   the column is in `active_outputs`, and shares no mutable state between
///   calls, so cursors built from separate calls may run on separate threads.
pub trait RowMapper: Send + Sync + 'static {
    /// Registry key used to rebuild this mapper from saved state (stable).
    fn signature(&self) -> &'static str;

    fn output_columns(&self) -> &[OutputColumn];

    /// Input columns (width = input schema length) needed to compute the
    /// outputs in `active_outputs` (width = output column count).
    fn dependencies(&self, active_outputs: &ColumnSet) -> ColumnSet;

    /// Getters over `input`'s current row for every active output.
    fn create_getters(&self, input: &dyn RowCursor, active_outputs: &ColumnSet)
        -> Result<MapperGetters>;

    /// Opaque state; `signature()` identifies the decoder.
    fn save_state(&self) -> Result<Vec<u8>>;
}

/// Source column -> derived column naming used by one-to-one mappers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnPair {
    pub source: String,
    pub output: String,
}

impl ColumnPair {
    pub fn new(source: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
        }
    }
}

/// Resolve `name` in `schema` (last match wins) and check its type is one of
/// `allowed`. An empty `allowed` accepts any type.
pub fn resolve_input(schema: &Schema, name: &str, allowed: &[DataType]) -> Result<usize> {
    let idx = schema
        .index_of(name)
        .ok_or_else(|| Error::Schema(format!("input column '{name}' not found")))?;
    let field = &schema.fields[idx];
    if !allowed.is_empty() && !allowed.contains(&field.data_type) {
        return Err(Error::Schema(format!(
            "input column '{name}' has type {}, expected one of {allowed:?}",
            field.data_type
        )));
    }
    Ok(idx)
}

pub(crate) fn check_output_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Schema("output column name is empty".into()));
    }
    Ok(())
}
