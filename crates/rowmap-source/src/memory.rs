//! In-memory `RowSource` backed by a shared `MemoryTable`.
//!
//! Cursors honor the active-column restriction strictly: asking for a getter
//! on a column that was not requested fails. Every value read through a getter
//! is counted per column, which lets callers check exactly which inputs a
//! consumer touched.

use std::ops::Range;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use rowmap_core::column_set::ColumnSet;
use rowmap_core::cursor::{CursorState, RowCursor, RowSource, ValueGetter};
use rowmap_core::error::{Error, Result};
use rowmap_core::metadata::MetadataDispatcher;
use rowmap_core::schema::Schema;

use crate::table::MemoryTable;

/// Per-column value read counters shared by a source and its cursors.
struct ReadCounters {
    columns: Vec<AtomicU64>,
}

impl ReadCounters {
    fn new(width: usize) -> Self {
        Self {
            columns: (0..width).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    fn record(&self, col: usize) {
        if let Some(c) = self.columns.get(col) {
            c.fetch_add(1, Ordering::Relaxed);
        }
    }
}

pub struct MemorySource {
    table: Arc<MemoryTable>,
    metadata: Option<MetadataDispatcher>,
    native_split: bool,
    parallel_preference: Option<bool>,
    reads: Arc<ReadCounters>,
}

impl MemorySource {
    pub fn new(table: MemoryTable) -> Self {
        let width = table.schema().len();
        Self {
            table: Arc::new(table),
            metadata: None,
            native_split: false,
            parallel_preference: None,
            reads: Arc::new(ReadCounters::new(width)),
        }
    }

    /// Attach column metadata. The dispatcher must be sealed and cover every
    /// column of the table.
    pub fn with_metadata(mut self, metadata: MetadataDispatcher) -> Result<Self> {
        if !metadata.is_sealed() {
            return Err(Error::Usage("source metadata must be sealed".into()));
        }
        if metadata.column_count() != self.table.schema().len() {
            return Err(Error::Schema(format!(
                "metadata covers {} columns, table has {}",
                metadata.column_count(),
                self.table.schema().len()
            )));
        }
        self.metadata = Some(metadata);
        Ok(self)
    }

    /// When enabled, `row_cursor_set` block-partitions rows itself instead of
    /// returning a single cursor.
    pub fn with_native_split(mut self, enabled: bool) -> Self {
        self.native_split = enabled;
        self
    }

    pub fn with_parallel_preference(mut self, preference: Option<bool>) -> Self {
        self.parallel_preference = preference;
        self
    }

    pub fn table(&self) -> &MemoryTable {
        &self.table
    }

    /// Values read so far, per column, across every cursor.
    pub fn reads(&self) -> Vec<u64> {
        self.reads
            .columns
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect()
    }

    pub fn reset_reads(&self) {
        for c in &self.reads.columns {
            c.store(0, Ordering::Relaxed);
        }
    }

    fn cursor_over(&self, active: &ColumnSet, rows: Range<usize>) -> Result<MemoryCursor> {
        active.ensure_width(self.table.schema().len(), "active column set")?;
        Ok(MemoryCursor {
            table: Arc::clone(&self.table),
            active: active.clone(),
            next: rows.start,
            end: rows.end,
            current: Arc::new(AtomicI64::new(-1)),
            state: CursorState::Created,
            reads: Arc::clone(&self.reads),
        })
    }
}

impl RowSource for MemorySource {
    fn schema(&self) -> &Schema {
        self.table.schema()
    }

    fn metadata(&self) -> Option<&MetadataDispatcher> {
        self.metadata.as_ref()
    }

    fn row_count(&self) -> Option<u64> {
        Some(self.table.num_rows() as u64)
    }

    fn prefers_parallel(&self, _active: &ColumnSet) -> Option<bool> {
        self.parallel_preference
    }

    fn row_cursor(&self, active: &ColumnSet) -> Result<Box<dyn RowCursor>> {
        Ok(Box::new(self.cursor_over(active, 0..self.table.num_rows())?))
    }

    fn row_cursor_set(&self, active: &ColumnSet, n: usize) -> Result<Vec<Box<dyn RowCursor>>> {
        let rows = self.table.num_rows();
        if !self.native_split || n <= 1 || rows == 0 {
            return Ok(vec![self.row_cursor(active)?]);
        }
        let chunk = rows.div_ceil(n);
        let mut cursors: Vec<Box<dyn RowCursor>> = Vec::with_capacity(n);
        let mut start = 0;
        while start < rows {
            let end = (start + chunk).min(rows);
            cursors.push(Box::new(self.cursor_over(active, start..end)?));
            start = end;
        }
        #[cfg(feature = "tracing")]
        tracing::trace!(requested = n, produced = cursors.len(), rows, "memory cursor set");
        Ok(cursors)
    }
}

/// Cursor over a contiguous row range of a `MemoryTable`.
pub struct MemoryCursor {
    table: Arc<MemoryTable>,
    active: ColumnSet,
    next: usize,
    end: usize,
    /// Row the getters observe; -1 when not on a row.
    current: Arc<AtomicI64>,
    state: CursorState,
    reads: Arc<ReadCounters>,
}

impl RowCursor for MemoryCursor {
    fn schema(&self) -> &Schema {
        self.table.schema()
    }

    fn state(&self) -> CursorState {
        self.state
    }

    fn position(&self) -> i64 {
        self.current.load(Ordering::Acquire)
    }

    fn move_next(&mut self) -> Result<bool> {
        match self.state {
            CursorState::Disposed => {
                return Err(Error::Usage("move_next on a disposed cursor".into()))
            }
            CursorState::Done => return Ok(false),
            CursorState::Created | CursorState::Active => {}
        }
        if self.next < self.end {
            let row = i64::try_from(self.next)
                .map_err(|_| Error::Source(format!("row index {} overflows", self.next)))?;
            self.current.store(row, Ordering::Release);
            self.next += 1;
            self.state = CursorState::Active;
            Ok(true)
        } else {
            self.current.store(-1, Ordering::Release);
            self.state = CursorState::Done;
            Ok(false)
        }
    }

    fn is_column_active(&self, col: usize) -> bool {
        self.active.contains(col)
    }

    fn getter(&self, col: usize) -> Result<ValueGetter> {
        if self.state == CursorState::Disposed {
            return Err(Error::Usage("getter requested on a disposed cursor".into()));
        }
        if !self.active.contains(col) {
            return Err(Error::Usage(format!(
                "column {col} is not active on this cursor"
            )));
        }
        let table = Arc::clone(&self.table);
        let current = Arc::clone(&self.current);
        let reads = Arc::clone(&self.reads);
        Ok(Arc::new(move || {
            let row = current.load(Ordering::Acquire);
            let row = usize::try_from(row)
                .map_err(|_| Error::Usage("cursor is not positioned on a row".into()))?;
            reads.record(col);
            table
                .value(row, col)
                .cloned()
                .ok_or_else(|| Error::Invariant(format!("row {row} column {col} missing")))
        }))
    }

    fn dispose(&mut self) {
        self.current.store(-1, Ordering::Release);
        self.state = CursorState::Disposed;
    }
}
