#![forbid(unsafe_code)]
//! rowmap-source: row sources that feed transforms.
//!
//! Only an in-memory table lives here. It implements the full `RowSource`
//! contract (active-column restriction, block-partitioned cursor sets, read
//! accounting) and is what tests and benches drive transforms with.

pub mod memory;
pub mod table;

pub use memory::{MemoryCursor, MemorySource};
pub use table::MemoryTable;
