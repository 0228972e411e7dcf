//! Mapper registry: signature string -> factory.
//!
//! Saved transforms name their mapper by signature; loading looks the
//! signature up here and hands the factory the input schema plus the mapper's
//! own state bytes. There is no runtime discovery: every factory is
//! registered explicitly, and `MapperRegistry::builtin()` is the process-wide
//! table of the mappers shipped with this crate.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;

use rowmap_core::error::{Error, Result};
use rowmap_core::schema::Schema;

use crate::mapper::RowMapper;
use crate::mappers::{concat, hash, length};

/// Rebuilds a mapper from its saved state against an input schema.
pub type MapperFactory = fn(&Schema, &[u8]) -> Result<Arc<dyn RowMapper>>;

#[derive(Default)]
pub struct MapperRegistry {
    factories: HashMap<&'static str, MapperFactory>,
}

static BUILTIN: Lazy<MapperRegistry> = Lazy::new(|| {
    let mut registry = MapperRegistry::new();
    registry.insert(length::SIGNATURE, length::LengthMapper::load);
    registry.insert(concat::SIGNATURE, concat::ConcatMapper::load);
    registry.insert(hash::SIGNATURE, hash::HashMapper::load);
    registry
});

impl MapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in mappers.
    pub fn builtin() -> &'static MapperRegistry {
        &BUILTIN
    }

    /// A mutable copy of the built-ins, for adding custom mappers.
    pub fn with_builtins() -> Self {
        Self {
            factories: BUILTIN.factories.clone(),
        }
    }

    /// Fails if `signature` is already registered.
    pub fn register(&mut self, signature: &'static str, factory: MapperFactory) -> Result<()> {
        if self.factories.contains_key(signature) {
            return Err(Error::Registry(format!(
                "signature '{signature}' is already registered"
            )));
        }
        self.insert(signature, factory);
        Ok(())
    }

    fn insert(&mut self, signature: &'static str, factory: MapperFactory) {
        self.factories.insert(signature, factory);
    }

    pub fn contains(&self, signature: &str) -> bool {
        self.factories.contains_key(signature)
    }

    /// Registered signatures, sorted.
    pub fn signatures(&self) -> Vec<&'static str> {
        let mut out: Vec<_> = self.factories.keys().copied().collect();
        out.sort_unstable();
        out
    }

    pub fn create(&self, signature: &str, input: &Schema, state: &[u8]) -> Result<Arc<dyn RowMapper>> {
        let factory = self
            .factories
            .get(signature)
            .ok_or_else(|| Error::Registry(format!("no mapper registered for '{signature}'")))?;
        factory(input, state)
    }
}
