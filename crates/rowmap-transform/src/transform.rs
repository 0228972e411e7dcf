//! `MapTransform`: a row source that appends a mapper's columns to another
//! row source.
//!
//! All derived state (bindings, metadata) is computed once at construction;
//! the transform holds nothing per row. Cursors resolve the request against
//! the bindings, fetch only the needed input columns upstream, and compute
//! output values lazily.

use std::sync::Arc;

use rowmap_core::column_set::ColumnSet;
use rowmap_core::config::TransformConfig;
use rowmap_core::cursor::{RowCursor, RowSource};
use rowmap_core::error::{Error, Result};
use rowmap_core::metadata::MetadataDispatcher;
use rowmap_core::schema::{Field, Schema};

use crate::bindings::{ActiveColumns, Bindings};
use crate::cursor::MapCursor;
use crate::mapper::RowMapper;
use crate::persist::{self, TransformHeader};
use crate::registry::MapperRegistry;
use crate::split::split_cursors;

pub struct MapTransform {
    source: Arc<dyn RowSource>,
    mapper: Arc<dyn RowMapper>,
    bindings: Arc<Bindings>,
    metadata: MetadataDispatcher,
    config: TransformConfig,
}

impl MapTransform {
    pub fn new(source: Arc<dyn RowSource>, mapper: Arc<dyn RowMapper>) -> Result<Self> {
        Self::with_config(source, mapper, TransformConfig::default())
    }

    pub fn with_config(
        source: Arc<dyn RowSource>,
        mapper: Arc<dyn RowMapper>,
        config: TransformConfig,
    ) -> Result<Self> {
        config.validate()?;
        let outputs = mapper.output_columns();
        if outputs.is_empty() {
            return Err(Error::Schema(format!(
                "mapper '{}' declares no output columns",
                mapper.signature()
            )));
        }
        let added: Vec<Field> = outputs.iter().map(|c| c.field.clone()).collect();
        let bindings = Bindings::compose(source.schema(), &added)?;
        let metadata = build_metadata(source.as_ref(), &bindings, mapper.as_ref())?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            mapper = mapper.signature(),
            inputs = bindings.input_count(),
            added = bindings.output_count(),
            "map transform constructed"
        );

        Ok(Self {
            source,
            mapper,
            bindings: Arc::new(bindings),
            metadata,
            config,
        })
    }

    pub fn mapper(&self) -> &Arc<dyn RowMapper> {
        &self.mapper
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// The upstream source.
    pub fn input(&self) -> &Arc<dyn RowSource> {
        &self.source
    }

    /// Active set and upstream column set for `request`.
    pub fn resolve(&self, request: &ColumnSet) -> Result<ActiveColumns> {
        let resolved = self.bindings.get_active(request, self.mapper.as_ref())?;

        #[cfg(feature = "tracing")]
        tracing::trace!(
            active = resolved.active.count(),
            fetched = resolved.inputs.count(),
            "resolved active columns"
        );

        Ok(resolved)
    }

    /// Advisory. `Some(true)` when any added column is requested, otherwise
    /// whatever the upstream source prefers for the columns it would read.
    /// `TransformConfig::force_parallel` overrides both.
    pub fn should_use_parallel_cursors(&self, request: &ColumnSet) -> Result<Option<bool>> {
        request.ensure_width(self.bindings.column_count(), "request column set")?;
        if let Some(forced) = self.config.force_parallel {
            return Ok(Some(forced));
        }
        if self.bindings.any_output_active(request) {
            return Ok(Some(true));
        }
        let passthrough = self.bindings.active_passthrough(request);
        Ok(self.source.prefers_parallel(&passthrough))
    }

    pub fn cursor(&self, request: &ColumnSet) -> Result<MapCursor> {
        let resolved = self.resolve(request)?;
        let input = self.source.row_cursor(&resolved.inputs)?;
        self.wrap(input, resolved.active)
    }

    /// Up to `requested` cursors (clamped by the config) over disjoint row
    /// partitions. A short upstream set is split when parallelism is advised.
    pub fn cursor_set(&self, request: &ColumnSet, requested: usize) -> Result<Vec<MapCursor>> {
        let resolved = self.resolve(request)?;
        let n = self.config.clamp_cursors(requested);
        let mut inputs = self.source.row_cursor_set(&resolved.inputs, n)?;
        if inputs.is_empty() {
            return Err(Error::Source("upstream returned no cursors".into()));
        }

        if inputs.len() < n
            && self.config.split_cursors
            && self.should_use_parallel_cursors(request)? == Some(true)
        {
            inputs = split_cursors(inputs, &resolved.inputs, n)?;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(requested, cursors = inputs.len(), "created cursor set");

        inputs
            .into_iter()
            .map(|input| self.wrap(input, resolved.active.clone()))
            .collect()
    }

    fn wrap(&self, input: Box<dyn RowCursor>, active: ColumnSet) -> Result<MapCursor> {
        MapCursor::new(input, Arc::clone(&self.bindings), active, self.mapper.as_ref())
    }

    /// Versioned header plus the mapper's own state.
    pub fn save(&self) -> Result<Vec<u8>> {
        let header = TransformHeader::new(
            self.bindings.input_schema().fingerprint()?,
            self.mapper.signature(),
        );
        let state = self.mapper.save_state()?;
        let bytes = persist::encode(&header, &state)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            loader = %header.loader,
            written = header.versions.written,
            bytes = bytes.len(),
            "saved map transform"
        );

        Ok(bytes)
    }

    /// Rebuild a saved transform over `source`, which must have the schema
    /// the transform was saved with.
    pub fn load(bytes: &[u8], source: Arc<dyn RowSource>, registry: &MapperRegistry) -> Result<Self> {
        Self::load_with_config(bytes, source, registry, TransformConfig::default())
    }

    pub fn load_with_config(
        bytes: &[u8],
        source: Arc<dyn RowSource>,
        registry: &MapperRegistry,
        config: TransformConfig,
    ) -> Result<Self> {
        let (header, state) = persist::decode(bytes)?;
        let fingerprint = source.schema().fingerprint()?;
        if fingerprint != header.schema_fingerprint {
            return Err(Error::Schema(format!(
                "input schema fingerprint {} does not match saved {}",
                fingerprint, header.schema_fingerprint
            )));
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            loader = %header.loader,
            written = header.versions.written,
            readable = header.versions.readable,
            "loading map transform"
        );

        let mapper = registry.create(&header.loader, source.schema(), state)?;
        Self::with_config(source, mapper, config)
    }
}

/// Upstream metadata on input columns, the mapper's declared metadata on
/// output columns.
fn build_metadata(source: &dyn RowSource, bindings: &Bindings, mapper: &dyn RowMapper) -> Result<MetadataDispatcher> {
    let mut metadata = MetadataDispatcher::new(bindings.column_count());

    if let Some(upstream) = source.metadata() {
        if upstream.column_count() != bindings.input_count() {
            return Err(Error::Schema(format!(
                "upstream metadata covers {} columns, schema has {}",
                upstream.column_count(),
                bindings.input_count()
            )));
        }
        for k in 0..bindings.input_count() {
            metadata.builder(k)?.add_all(upstream.items(k)?)?;
        }
    }
    for (j, column) in mapper.output_columns().iter().enumerate() {
        metadata
            .builder(bindings.map_output_index(j))?
            .add_all(&column.metadata)?;
    }

    metadata.seal();
    Ok(metadata)
}

impl RowSource for MapTransform {
    fn schema(&self) -> &Schema {
        self.bindings.schema()
    }

    fn metadata(&self) -> Option<&MetadataDispatcher> {
        Some(&self.metadata)
    }

    fn row_count(&self) -> Option<u64> {
        self.source.row_count()
    }

    fn prefers_parallel(&self, active: &ColumnSet) -> Option<bool> {
        self.should_use_parallel_cursors(active).ok().flatten()
    }

    fn row_cursor(&self, active: &ColumnSet) -> Result<Box<dyn RowCursor>> {
        Ok(Box::new(self.cursor(active)?))
    }

    fn row_cursor_set(&self, active: &ColumnSet, n: usize) -> Result<Vec<Box<dyn RowCursor>>> {
        Ok(self
            .cursor_set(active, n)?
            .into_iter()
            .map(|c| Box::new(c) as Box<dyn RowCursor>)
            .collect())
    }
}
