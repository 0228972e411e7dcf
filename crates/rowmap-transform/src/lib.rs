#![forbid(unsafe_code)]
//! rowmap-transform: lazy row mapping over a `RowSource`.
//!
//! A `MapTransform` appends the columns declared by a `RowMapper` to its
//! input's schema. Cursors only fetch the input columns a request actually
//! needs, and mapper outputs are computed when their getters are invoked.
//!
//! Design intent:
//! - Everything derived from the schemas is computed once, at construction.
//! - Mappers are plain synchronous code; per-cursor resources are released by
//!   the disposer the mapper hands back with its getters.
//! - Saved transforms carry a versioned header; the mapper owns its state bytes.

pub mod bindings;
pub mod cursor;
pub mod mapper;
pub mod mappers;
pub mod persist;
pub mod registry;
pub mod split;
pub mod transform;

pub use bindings::{ActiveColumns, Bindings, ColumnBinding};
pub use cursor::MapCursor;
pub use mapper::{noop_disposer, ColumnPair, Disposer, MapperGetters, OutputColumn, RowMapper};
pub use mappers::{ConcatMapper, HashMapper, LengthMapper};
pub use registry::{MapperFactory, MapperRegistry};
pub use split::split_cursors;
pub use transform::MapTransform;
