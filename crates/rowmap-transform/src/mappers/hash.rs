//! Stable blake3 bucketing of a column of any type.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use rowmap_core::column_set::ColumnSet;
use rowmap_core::cursor::{RowCursor, ValueGetter};
use rowmap_core::error::{Error, Result};
use rowmap_core::hash::{hash_scalar, Hash256};
use rowmap_core::metadata::MetadataItem;
use rowmap_core::schema::{DataType, Field, Schema};
use rowmap_core::types::Scalar;

use crate::mapper::{check_output_name, noop_disposer, resolve_input, Disposer, MapperGetters, OutputColumn, RowMapper};

pub const SIGNATURE: &str = "HASH_MAPPER";

/// Metadata kind carrying the bucket count on the output column.
pub const BUCKETS_KIND: &str = "hash.buckets";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashState {
    pub source: String,
    pub output: String,
    pub buckets: u64,
    #[serde(default)]
    pub seed: u64,
}

/// Adds an `Int64` column holding `blake3(seed, value) mod buckets`.
/// Null values hash like any other value, so the output is never null.
pub struct HashMapper {
    state: HashState,
    source: usize,
    input_width: usize,
    outputs: Vec<OutputColumn>,
    live_hashers: Arc<AtomicUsize>,
}

impl HashMapper {
    pub fn new(input: &Schema, state: HashState) -> Result<Self> {
        if state.buckets == 0 {
            return Err(Error::Schema("hash mapper needs at least one bucket".into()));
        }
        let buckets = i64::try_from(state.buckets)
            .map_err(|_| Error::Schema(format!("bucket count {} overflows int64", state.buckets)))?;
        check_output_name(&state.output)?;
        let source = resolve_input(input, &state.source, &[])?;
        let outputs = vec![OutputColumn::new(Field::new(state.output.clone(), DataType::Int64, false))
            .with_metadata(MetadataItem::constant(BUCKETS_KIND, Scalar::I64(buckets))?)];
        Ok(Self {
            state,
            source,
            input_width: input.len(),
            outputs,
            live_hashers: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn load(input: &Schema, state: &[u8]) -> Result<Arc<dyn RowMapper>> {
        let state: HashState = serde_json::from_slice(state)?;
        Ok(Arc::new(Self::new(input, state)?))
    }

    /// Per-cursor hashers not yet released.
    pub fn live_hashers(&self) -> usize {
        self.live_hashers.load(Ordering::Acquire)
    }
}

fn seeded_hasher(seed: u64) -> blake3::Hasher {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seed.to_le_bytes());
    hasher
}

/// Finishes a seeded hasher over `value` and reduces it to a bucket.
fn bucket_with(mut hasher: blake3::Hasher, value: &Scalar, buckets: u64) -> u64 {
    hash_scalar(value, &mut hasher);
    Hash256(hasher.finalize().into()).prefix_u64() % buckets
}

impl RowMapper for HashMapper {
    fn signature(&self) -> &'static str {
        SIGNATURE
    }

    fn output_columns(&self) -> &[OutputColumn] {
        &self.outputs
    }

    fn dependencies(&self, active_outputs: &ColumnSet) -> ColumnSet {
        ColumnSet::from_fn(self.input_width, |k| {
            k == self.source && active_outputs.contains(0)
        })
    }

    fn create_getters(&self, input: &dyn RowCursor, active_outputs: &ColumnSet) -> Result<MapperGetters> {
        if !active_outputs.contains(0) {
            return Ok((vec![None], noop_disposer()));
        }

        let value = input.getter(self.source)?;
        let seed = self.state.seed;
        let buckets = self.state.buckets;
        // Seeded once per cursor; each row clones it instead of rehashing the seed.
        let base = Arc::new(Mutex::new(Some(seeded_hasher(seed))));

        let slot = Arc::clone(&base);
        let getter: ValueGetter = Arc::new(move || {
            let v = value()?;
            let hasher = slot
                .lock()
                .map_err(|_| Error::Invariant("hash state mutex poisoned".into()))?
                .clone()
                .ok_or_else(|| Error::Usage("hash getter used after its cursor was disposed".into()))?;
            let bucket = bucket_with(hasher, &v, buckets);
            // buckets fits in i64 (checked at construction), so bucket does too.
            Ok(Scalar::I64(bucket as i64))
        });

        self.live_hashers.fetch_add(1, Ordering::AcqRel);
        let live = Arc::clone(&self.live_hashers);
        let disposer: Disposer = Box::new(move || {
            if let Ok(mut slot) = base.lock() {
                slot.take();
            }
            live.fetch_sub(1, Ordering::AcqRel);
        });

        Ok((vec![Some(getter)], disposer))
    }

    fn save_state(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.state)?)
    }
}
