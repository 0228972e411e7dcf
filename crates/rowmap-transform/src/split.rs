//! Fan one or more input cursors out to `n` partition cursors.
//!
//! Partitions pull rows on demand from a shared, mutex-guarded feed: whichever
//! partition advances next takes the next input row and copies the active
//! column values into its own row buffer. Every input row goes to exactly one
//! partition, and each partition sees its rows in input order, so merging the
//! partitions by `position` reproduces the single-cursor traversal.
//!
//! Input cursors are drained front to back and disposed as they run dry; any
//! left over are disposed when the last partition goes away.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use rowmap_core::column_set::ColumnSet;
use rowmap_core::cursor::{CursorState, RowCursor, ValueGetter};
use rowmap_core::error::{Error, Result};
use rowmap_core::schema::Schema;
use rowmap_core::types::Scalar;

struct Feed {
    inputs: VecDeque<Box<dyn RowCursor>>,
    /// Getters for the active columns of `inputs.front()`.
    getters: Option<Vec<(usize, ValueGetter)>>,
    failed: Option<String>,
}

impl Feed {
    /// Next input row as `(position, values)`, or `None` when all inputs are
    /// exhausted.
    fn next_row(&mut self, active: &ColumnSet, width: usize) -> Result<Option<(i64, Vec<Option<Scalar>>)>> {
        if let Some(reason) = &self.failed {
            return Err(Error::Source(format!("split input failed earlier: {reason}")));
        }
        loop {
            let Some(cursor) = self.inputs.front_mut() else {
                return Ok(None);
            };
            if self.getters.is_none() {
                let getters = active
                    .iter()
                    .map(|col| cursor.getter(col).map(|g| (col, g)))
                    .collect::<Result<Vec<_>>>()?;
                self.getters = Some(getters);
            }
            if cursor.move_next()? {
                let mut values = vec![None; width];
                for (col, getter) in self.getters.iter().flatten() {
                    values[*col] = Some(getter()?);
                }
                return Ok(Some((cursor.position(), values)));
            }
            if let Some(mut done) = self.inputs.pop_front() {
                done.dispose();
            }
            self.getters = None;
        }
    }
}

impl Drop for Feed {
    fn drop(&mut self) {
        for cursor in &mut self.inputs {
            cursor.dispose();
        }
    }
}

struct Shared {
    active: ColumnSet,
    width: usize,
    feed: Mutex<Feed>,
}

impl Shared {
    fn lock(&self) -> Result<MutexGuard<'_, Feed>> {
        self.feed
            .lock()
            .map_err(|_| Error::Invariant("split feed mutex poisoned".into()))
    }
}

struct SplitRow {
    position: i64,
    values: Vec<Option<Scalar>>,
}

/// One partition of a split.
pub struct SplitCursor {
    schema: Schema,
    shared: Option<Arc<Shared>>,
    row: Arc<Mutex<SplitRow>>,
    state: CursorState,
}

impl SplitCursor {
    fn shared(&self) -> Result<&Arc<Shared>> {
        self.shared
            .as_ref()
            .ok_or_else(|| Error::Usage("cursor has been disposed".into()))
    }
}

/// Split `inputs` (all with the same schema and active set) into `n`
/// partition cursors.
pub fn split_cursors(inputs: Vec<Box<dyn RowCursor>>, active: &ColumnSet, n: usize) -> Result<Vec<Box<dyn RowCursor>>> {
    let schema = inputs
        .first()
        .map(|c| c.schema().clone())
        .ok_or_else(|| Error::Source("no input cursors to split".into()))?;
    active.ensure_width(schema.len(), "split active set")?;
    if let Some(col) = active.iter().find(|col| inputs.iter().any(|c| !c.is_column_active(*col))) {
        return Err(Error::Usage(format!(
            "column {col} is not active on every split input"
        )));
    }

    let shared = Arc::new(Shared {
        active: active.clone(),
        width: schema.len(),
        feed: Mutex::new(Feed {
            inputs: inputs.into(),
            getters: None,
            failed: None,
        }),
    });

    #[cfg(feature = "tracing")]
    tracing::debug!(partitions = n, active = active.count(), "splitting input cursor");

    Ok((0..n.max(1))
        .map(|_| {
            Box::new(SplitCursor {
                schema: schema.clone(),
                shared: Some(Arc::clone(&shared)),
                row: Arc::new(Mutex::new(SplitRow {
                    position: -1,
                    values: Vec::new(),
                })),
                state: CursorState::Created,
            }) as Box<dyn RowCursor>
        })
        .collect())
}

impl RowCursor for SplitCursor {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn state(&self) -> CursorState {
        self.state
    }

    fn position(&self) -> i64 {
        self.row.lock().map(|r| r.position).unwrap_or(-1)
    }

    fn move_next(&mut self) -> Result<bool> {
        let shared = Arc::clone(self.shared()?);
        if self.state == CursorState::Done {
            return Ok(false);
        }
        let next = {
            let mut feed = shared.lock()?;
            match feed.next_row(&shared.active, shared.width) {
                Ok(next) => next,
                Err(e) => {
                    feed.failed = Some(e.to_string());
                    return Err(e);
                }
            }
        };
        let mut row = self
            .row
            .lock()
            .map_err(|_| Error::Invariant("split row mutex poisoned".into()))?;
        match next {
            Some((position, values)) => {
                row.position = position;
                row.values = values;
                self.state = CursorState::Active;
                Ok(true)
            }
            None => {
                row.position = -1;
                row.values.clear();
                self.state = CursorState::Done;
                Ok(false)
            }
        }
    }

    fn is_column_active(&self, col: usize) -> bool {
        self.shared
            .as_ref()
            .is_some_and(|shared| shared.active.contains(col))
    }

    fn getter(&self, col: usize) -> Result<ValueGetter> {
        let shared = self.shared()?;
        if !shared.active.contains(col) {
            return Err(Error::Usage(format!(
                "column {col} is not active on this cursor"
            )));
        }
        let row = Arc::clone(&self.row);
        Ok(Arc::new(move || {
            let row = row
                .lock()
                .map_err(|_| Error::Invariant("split row mutex poisoned".into()))?;
            if row.position < 0 {
                return Err(Error::Usage("cursor is not positioned on a row".into()));
            }
            row.values
                .get(col)
                .cloned()
                .flatten()
                .ok_or_else(|| Error::Invariant(format!("split row is missing column {col}")))
        }))
    }

    fn dispose(&mut self) {
        if let Ok(mut row) = self.row.lock() {
            row.position = -1;
            row.values.clear();
        }
        // Dropping the last partition drops the feed, which disposes inputs.
        self.shared = None;
        self.state = CursorState::Disposed;
    }
}
