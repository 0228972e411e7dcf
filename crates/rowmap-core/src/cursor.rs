//! The narrow pull interface between row producers and consumers.
//!
//! A `RowSource` hands out `RowCursor`s restricted to a set of active columns.
//! A cursor walks rows strictly forward; values are read through getters that
//! observe whatever row the cursor is currently on.
//!
//! Invariants:
//! - Getters may only be requested for active columns.
//! - A getter invoked before the first `move_next`, after exhaustion, or after
//!   disposal fails with a usage error rather than returning stale data.
//! - `dispose` is idempotent; `Disposed` is terminal.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::column_set::ColumnSet;
use crate::error::{Error, Result};
use crate::metadata::MetadataDispatcher;
use crate::schema::Schema;
use crate::types::ColumnType;

/// Yields the current row's value for one column.
pub type ValueGetter = Arc<dyn Fn() -> Result<crate::types::Scalar> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Not yet advanced.
    Created,
    /// Positioned on a row.
    Active,
    /// Advanced past the last row.
    Done,
    /// Resources released.
    Disposed,
}

pub trait RowCursor: Send {
    fn schema(&self) -> &Schema;

    fn state(&self) -> CursorState;

    /// Index of the current row in the source's own order; -1 when the
    /// cursor is not on a row.
    fn position(&self) -> i64;

    /// Advance to the next row. Returns false once the rows are exhausted.
    fn move_next(&mut self) -> Result<bool>;

    fn is_column_active(&self, col: usize) -> bool;

    /// Getter for column `col`, which must be active.
    fn getter(&self, col: usize) -> Result<ValueGetter>;

    /// Release resources. Safe to call more than once.
    fn dispose(&mut self);
}

pub trait RowSource: Send + Sync {
    fn schema(&self) -> &Schema;

    /// Per-column metadata, when the source carries any.
    fn metadata(&self) -> Option<&MetadataDispatcher> {
        None
    }

    fn row_count(&self) -> Option<u64> {
        None
    }

    /// Advisory: whether consumers reading `active` benefit from several
    /// cursors. `None` means no preference.
    fn prefers_parallel(&self, _active: &ColumnSet) -> Option<bool> {
        None
    }

    /// Cursor producing values only for the columns in `active`.
    fn row_cursor(&self, active: &ColumnSet) -> Result<Box<dyn RowCursor>>;

    /// Up to `n` cursors over disjoint row partitions. Sources without native
    /// partitioning return a single cursor.
    fn row_cursor_set(&self, active: &ColumnSet, _n: usize) -> Result<Vec<Box<dyn RowCursor>>> {
        Ok(vec![self.row_cursor(active)?])
    }
}

/// A getter whose column type was checked once, at creation.
pub struct TypedGetter<T> {
    column: usize,
    inner: ValueGetter,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ColumnType> TypedGetter<T> {
    pub fn get(&self) -> Result<T> {
        let value = (self.inner)()?;
        let actual = value.data_type();
        T::from_scalar(value).ok_or_else(|| match actual {
            None => Error::UnexpectedNull {
                column: self.column,
            },
            Some(actual) => Error::TypeMismatch {
                column: self.column,
                expected: T::DATA_TYPE,
                actual,
            },
        })
    }

    pub fn column(&self) -> usize {
        self.column
    }
}

/// Typed getter for `col`, failing with `TypeMismatch` before any row is read
/// if the declared column type differs from `T`.
pub fn typed_getter<T, C>(cursor: &C, col: usize) -> Result<TypedGetter<T>>
where
    T: ColumnType,
    C: RowCursor + ?Sized,
{
    let field = cursor
        .schema()
        .field(col)
        .ok_or_else(|| Error::Usage(format!("column {col} out of range")))?;
    if field.data_type != T::DATA_TYPE {
        return Err(Error::TypeMismatch {
            column: col,
            expected: T::DATA_TYPE,
            actual: field.data_type,
        });
    }
    Ok(TypedGetter {
        column: col,
        inner: cursor.getter(col)?,
        _marker: PhantomData,
    })
}

/// Drain `cursor`, reading the columns in `cols` for every row.
pub fn collect_rows<C>(cursor: &mut C, cols: &[usize]) -> Result<Vec<Vec<crate::types::Scalar>>>
where
    C: RowCursor + ?Sized,
{
    let getters = cols
        .iter()
        .map(|col| cursor.getter(*col))
        .collect::<Result<Vec<_>>>()?;
    let mut rows = Vec::new();
    while cursor.move_next()? {
        rows.push(getters.iter().map(|g| g()).collect::<Result<Vec<_>>>()?);
    }
    Ok(rows)
}
