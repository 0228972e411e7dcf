//! Bindings: the combined column space of an input schema plus mapper outputs.
//!
//! Layout: input columns keep indices `0..N`, output column `j` lives at
//! `N + j`. An output that reuses an input name hides that input from name
//! lookup only; index addressing of the input column is unaffected.

use rowmap_core::column_set::ColumnSet;
use rowmap_core::error::{Error, Result};
use rowmap_core::schema::{Field, Schema};

use crate::mapper::{check_output_name, RowMapper};

/// Where a combined-schema column gets its values from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnBinding {
    /// Forwarded unchanged from input column `k`.
    Input(usize),
    /// Computed as mapper output `j`.
    Output(usize),
}

/// Result of resolving a request against the bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveColumns {
    /// Combined-schema columns that must produce values (width N + M).
    pub active: ColumnSet,
    /// Input columns to fetch upstream (width N): direct passthrough requests
    /// plus whatever the mapper needs for the active outputs.
    pub inputs: ColumnSet,
}

#[derive(Debug, Clone)]
pub struct Bindings {
    input: Schema,
    schema: Schema,
}

impl Bindings {
    pub fn compose(input: &Schema, added: &[Field]) -> Result<Self> {
        for field in added {
            check_output_name(&field.name)?;
        }
        Ok(Self {
            input: input.clone(),
            schema: input.concat(added),
        })
    }

    /// The combined schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn input_schema(&self) -> &Schema {
        &self.input
    }

    pub fn input_count(&self) -> usize {
        self.input.len()
    }

    pub fn output_count(&self) -> usize {
        self.schema.len() - self.input.len()
    }

    pub fn column_count(&self) -> usize {
        self.schema.len()
    }

    /// Combined index of mapper output `j`.
    pub fn map_output_index(&self, j: usize) -> usize {
        debug_assert!(j < self.output_count());
        self.input.len() + j
    }

    pub fn resolve(&self, col: usize) -> Option<ColumnBinding> {
        let n = self.input.len();
        if col < n {
            Some(ColumnBinding::Input(col))
        } else if col < self.schema.len() {
            Some(ColumnBinding::Output(col - n))
        } else {
            None
        }
    }

    /// Mapper outputs that are active in `active` (width M).
    pub fn active_outputs(&self, active: &ColumnSet) -> ColumnSet {
        ColumnSet::from_fn(self.output_count(), |j| {
            active.contains(self.map_output_index(j))
        })
    }

    /// Input columns requested directly as passthrough (width N).
    pub fn active_passthrough(&self, active: &ColumnSet) -> ColumnSet {
        ColumnSet::from_fn(self.input_count(), |k| active.contains(k))
    }

    pub fn any_output_active(&self, active: &ColumnSet) -> bool {
        (self.input_count()..self.column_count()).any(|col| active.contains(col))
    }

    /// Resolve `request` (width N + M) into the active set and the input
    /// columns to fetch. Never under-fetches: every column the mapper reports
    /// for the active outputs is included.
    pub fn get_active(&self, request: &ColumnSet, mapper: &dyn RowMapper) -> Result<ActiveColumns> {
        request.ensure_width(self.column_count(), "request column set")?;
        let active = request.clone();

        let passthrough = self.active_passthrough(&active);
        let outputs = self.active_outputs(&active);
        let inputs = if outputs.is_empty() {
            passthrough
        } else {
            let needed = mapper.dependencies(&outputs);
            if needed.width() != self.input_count() {
                return Err(Error::Invariant(format!(
                    "mapper '{}' reported dependencies of width {}, input has {} columns",
                    mapper.signature(),
                    needed.width(),
                    self.input_count()
                )));
            }
            passthrough.union(&needed)?
        };

        Ok(ActiveColumns { active, inputs })
    }
}
