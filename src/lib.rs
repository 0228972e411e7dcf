#![forbid(unsafe_code)]
//! rowmap: lazy, schema-driven row projection.
//!
//! Facade over the workspace crates:
//! - `rowmap_core`: schemas, values, column sets, metadata, cursor contract.
//! - `rowmap_source`: in-memory row sources.
//! - `rowmap_transform`: `MapTransform`, mappers, splitting, persistence.

pub use rowmap_core;
pub use rowmap_source;
pub use rowmap_transform;

pub use rowmap_core::prelude::*;
pub use rowmap_source::{MemorySource, MemoryTable};
pub use rowmap_transform::{MapCursor, MapTransform, MapperRegistry, RowMapper};
