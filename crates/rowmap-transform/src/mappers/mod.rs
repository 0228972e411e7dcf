//! Built-in mappers.
//!
//! - `length`: character length of string columns.
//! - `concat`: joins string columns with a separator.
//! - `hash`: blake3 bucket of any column.

pub mod concat;
pub mod hash;
pub mod length;

pub use concat::ConcatMapper;
pub use hash::HashMapper;
pub use length::LengthMapper;
