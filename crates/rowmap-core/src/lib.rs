#![forbid(unsafe_code)]
//! rowmap-core: shared vocabulary for the rowmap projection operator.
//!
//! - `schema`: column descriptors and name lookup with shadowing.
//! - `types`: the closed set of scalar values and typed conversions.
//! - `column_set`: fixed-width bit sets used for active/needed columns.
//! - `metadata`: per-column metadata, built once and then sealed.
//! - `cursor`: the narrow pull interface every row source implements.
//!
//! No threads or IO live here.

pub mod column_set;
pub mod config;
pub mod cursor;
pub mod error;
pub mod hash;
pub mod metadata;
pub mod prelude;
pub mod schema;
pub mod types;
