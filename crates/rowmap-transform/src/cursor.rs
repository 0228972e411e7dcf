//! `MapCursor`: combined-schema cursor over exactly one input cursor.
//!
//! Passthrough columns hand out the input cursor's own getters. Output columns
//! hand out the getters the mapper created for this cursor; values are only
//! computed when a getter is invoked.
//!
//! Disposal runs the mapper's disposer, then disposes the input cursor. It
//! happens at most once, either explicitly or on drop.
//!
//! An input failure during `move_next` is terminal: every later `move_next`
//! and `getter` call fails until the cursor is disposed.

use std::sync::Arc;

use rowmap_core::column_set::ColumnSet;
use rowmap_core::cursor::{typed_getter, CursorState, RowCursor, TypedGetter, ValueGetter};
use rowmap_core::error::{Error, Result};
use rowmap_core::schema::Schema;
use rowmap_core::types::ColumnType;

use crate::bindings::{Bindings, ColumnBinding};
use crate::mapper::{Disposer, RowMapper};

pub struct MapCursor {
    input: Box<dyn RowCursor>,
    bindings: Arc<Bindings>,
    active: ColumnSet,
    getters: Vec<Option<ValueGetter>>,
    disposer: Option<Disposer>,
    state: CursorState,
    failed: Option<String>,
}

impl MapCursor {
    pub(crate) fn new(
        mut input: Box<dyn RowCursor>,
        bindings: Arc<Bindings>,
        active: ColumnSet,
        mapper: &dyn RowMapper,
    ) -> Result<Self> {
        let outputs = bindings.active_outputs(&active);
        let (getters, disposer) = match mapper.create_getters(input.as_ref(), &outputs) {
            Ok(created) => created,
            Err(e) => {
                input.dispose();
                return Err(e);
            }
        };

        let malformed = getters.len() != outputs.width()
            || getters
                .iter()
                .enumerate()
                .any(|(j, g)| g.is_some() != outputs.contains(j));
        if malformed {
            drop(getters);
            disposer();
            input.dispose();
            return Err(Error::Invariant(format!(
                "mapper '{}' returned getters that do not match its active outputs",
                mapper.signature()
            )));
        }

        Ok(Self {
            input,
            bindings,
            active,
            getters,
            disposer: Some(disposer),
            state: CursorState::Created,
            failed: None,
        })
    }

    /// The combined-schema active set this cursor was built for.
    pub fn active(&self) -> &ColumnSet {
        &self.active
    }

    pub fn typed_getter<T: ColumnType>(&self, col: usize) -> Result<TypedGetter<T>> {
        typed_getter(self, col)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.state == CursorState::Disposed {
            return Err(Error::Usage("cursor has been disposed".into()));
        }
        if let Some(reason) = &self.failed {
            return Err(Error::Source(format!("input cursor failed earlier: {reason}")));
        }
        Ok(())
    }
}

impl RowCursor for MapCursor {
    fn schema(&self) -> &Schema {
        self.bindings.schema()
    }

    fn state(&self) -> CursorState {
        self.state
    }

    fn position(&self) -> i64 {
        if self.state == CursorState::Disposed {
            return -1;
        }
        self.input.position()
    }

    fn move_next(&mut self) -> Result<bool> {
        self.ensure_live()?;
        if self.state == CursorState::Done {
            return Ok(false);
        }
        let more = match self.input.move_next() {
            Ok(more) => more,
            Err(e) => {
                self.failed = Some(e.to_string());
                return Err(e);
            }
        };
        self.state = if more {
            CursorState::Active
        } else {
            CursorState::Done
        };
        Ok(more)
    }

    fn is_column_active(&self, col: usize) -> bool {
        self.active.contains(col)
    }

    fn getter(&self, col: usize) -> Result<ValueGetter> {
        self.ensure_live()?;
        if !self.active.contains(col) {
            return Err(Error::Usage(format!(
                "column {col} is not active on this cursor"
            )));
        }
        match self.bindings.resolve(col) {
            Some(ColumnBinding::Input(k)) => self.input.getter(k),
            Some(ColumnBinding::Output(j)) => self.getters[j]
                .clone()
                .ok_or_else(|| Error::Invariant(format!("no getter for active output {j}"))),
            None => Err(Error::Usage(format!("column {col} out of range"))),
        }
    }

    fn dispose(&mut self) {
        if self.state == CursorState::Disposed {
            return;
        }
        self.getters.clear();
        if let Some(disposer) = self.disposer.take() {
            disposer();
        }
        self.input.dispose();
        // NOTE: no logging here; this runs on the drop path.
        self.state = CursorState::Disposed;
    }
}

impl Drop for MapCursor {
    fn drop(&mut self) {
        self.dispose();
    }
}
