//! Convenient re-exports for downstream crates.

pub use crate::column_set::ColumnSet;
pub use crate::config::TransformConfig;
pub use crate::cursor::{typed_getter, CursorState, RowCursor, RowSource, TypedGetter, ValueGetter};
pub use crate::error::{Error, Result};
pub use crate::hash::Hash256;
pub use crate::metadata::{MetadataDispatcher, MetadataItem};
pub use crate::schema::{DataType, Field, Schema};
pub use crate::types::{ColumnType, Scalar};
