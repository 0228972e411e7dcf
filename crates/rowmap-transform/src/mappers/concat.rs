//! Joins several string columns into one, with a separator.
//!
//! Each cursor gets its own scratch buffer, allocated in `create_getters` and
//! released by the disposer. Null parts contribute an empty string, so the
//! output is never null.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use rowmap_core::column_set::ColumnSet;
use rowmap_core::cursor::{RowCursor, ValueGetter};
use rowmap_core::error::{Error, Result};
use rowmap_core::metadata::MetadataItem;
use rowmap_core::schema::{DataType, Field, Schema};
use rowmap_core::types::Scalar;

use crate::mapper::{check_output_name, noop_disposer, resolve_input, Disposer, MapperGetters, OutputColumn, RowMapper};

pub const SIGNATURE: &str = "CONCAT_MAPPER";

/// Metadata kind carrying the separator on the output column.
pub const SEPARATOR_KIND: &str = "concat.separator";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcatState {
    pub sources: Vec<String>,
    pub output: String,
    #[serde(default)]
    pub separator: String,
}

pub struct ConcatMapper {
    state: ConcatState,
    sources: Vec<usize>,
    input_width: usize,
    outputs: Vec<OutputColumn>,
    live_buffers: Arc<AtomicUsize>,
}

impl ConcatMapper {
    pub fn new(input: &Schema, state: ConcatState) -> Result<Self> {
        if state.sources.is_empty() {
            return Err(Error::Schema("concat mapper needs at least one source".into()));
        }
        check_output_name(&state.output)?;
        let sources = state
            .sources
            .iter()
            .map(|name| resolve_input(input, name, &[DataType::Utf8]))
            .collect::<Result<Vec<_>>>()?;
        let outputs = vec![
            OutputColumn::new(Field::new(state.output.clone(), DataType::Utf8, false)).with_metadata(
                MetadataItem::constant(SEPARATOR_KIND, Scalar::Str(state.separator.clone()))?,
            ),
        ];
        Ok(Self {
            state,
            sources,
            input_width: input.len(),
            outputs,
            live_buffers: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn load(input: &Schema, state: &[u8]) -> Result<Arc<dyn RowMapper>> {
        let state: ConcatState = serde_json::from_slice(state)?;
        Ok(Arc::new(Self::new(input, state)?))
    }

    /// Scratch buffers handed out to cursors and not yet disposed.
    pub fn live_buffers(&self) -> usize {
        self.live_buffers.load(Ordering::Acquire)
    }
}

impl RowMapper for ConcatMapper {
    fn signature(&self) -> &'static str {
        SIGNATURE
    }

    fn output_columns(&self) -> &[OutputColumn] {
        &self.outputs
    }

    fn dependencies(&self, active_outputs: &ColumnSet) -> ColumnSet {
        if active_outputs.is_empty() {
            return ColumnSet::empty(self.input_width);
        }
        ColumnSet::from_fn(self.input_width, |k| self.sources.contains(&k))
    }

    fn create_getters(&self, input: &dyn RowCursor, active_outputs: &ColumnSet) -> Result<MapperGetters> {
        if !active_outputs.contains(0) {
            return Ok((vec![None], noop_disposer()));
        }

        let parts = self
            .sources
            .iter()
            .map(|src| input.getter(*src))
            .collect::<Result<Vec<_>>>()?;
        let separator = self.state.separator.clone();
        let buffer = Arc::new(Mutex::new(String::new()));

        let scratch = Arc::clone(&buffer);
        let getter: ValueGetter = Arc::new(move || {
            let mut buf = scratch
                .lock()
                .map_err(|_| Error::Invariant("concat buffer mutex poisoned".into()))?;
            buf.clear();
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    buf.push_str(&separator);
                }
                match part()? {
                    Scalar::Str(s) => buf.push_str(&s),
                    Scalar::Null => {}
                    other => {
                        return Err(Error::Invariant(format!(
                            "concat part {i} produced {other:?}"
                        )))
                    }
                }
            }
            Ok(Scalar::Str(buf.clone()))
        });

        self.live_buffers.fetch_add(1, Ordering::AcqRel);
        let live = Arc::clone(&self.live_buffers);
        let disposer: Disposer = Box::new(move || {
            if let Ok(mut buf) = buffer.lock() {
                buf.clear();
                buf.shrink_to_fit();
            }
            live.fetch_sub(1, Ordering::AcqRel);
        });

        Ok((vec![Some(getter)], disposer))
    }

    fn save_state(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.state)?)
    }
}
