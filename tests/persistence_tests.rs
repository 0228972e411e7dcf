//! Save/load of transforms through the versioned header and the registry.

mod common;

use std::sync::Arc;

use common::people;
use rowmap_core::column_set::ColumnSet;
use rowmap_core::cursor::{collect_rows, RowCursor, RowSource};
use rowmap_core::error::{Error, Result};
use rowmap_core::schema::{DataType, Field, Schema};
use rowmap_core::types::Scalar;
use rowmap_transform::mappers::concat::ConcatState;
use rowmap_transform::mappers::hash::HashState;
use rowmap_transform::persist::{self, VERSION_CURRENT, VERSION_READ_BACK};
use rowmap_transform::{
    noop_disposer, ColumnPair, ConcatMapper, HashMapper, LengthMapper, MapTransform, MapperGetters,
    MapperRegistry, OutputColumn, RowMapper,
};

fn all_subsets(width: usize) -> impl Iterator<Item = ColumnSet> {
    (0u32..(1 << width)).map(move |mask| ColumnSet::from_fn(width, |c| mask & (1 << c) != 0))
}

fn assert_equivalent(a: &MapTransform, b: &MapTransform) {
    let fields = |t: &MapTransform| -> Vec<Field> {
        t.mapper()
            .output_columns()
            .iter()
            .map(|c| c.field.clone())
            .collect()
    };
    assert_eq!(fields(a), fields(b));
    assert_eq!(a.schema(), b.schema());

    let outputs = a.bindings().output_count();
    for active in all_subsets(outputs) {
        assert_eq!(a.mapper().dependencies(&active), b.mapper().dependencies(&active));
    }

    let all = ColumnSet::all(a.schema().len());
    let cols: Vec<usize> = (0..a.schema().len()).collect();
    let rows_a = collect_rows(&mut a.cursor(&all).unwrap(), &cols).unwrap();
    let rows_b = collect_rows(&mut b.cursor(&all).unwrap(), &cols).unwrap();
    assert_eq!(rows_a, rows_b);
}

#[test]
fn builtin_mappers_round_trip() {
    let src = people(40);
    let mappers: Vec<Arc<dyn RowMapper>> = vec![
        Arc::new(
            LengthMapper::new(
                src.schema(),
                vec![ColumnPair::new("name", "name_len"), ColumnPair::new("city", "city_len")],
            )
            .unwrap(),
        ),
        Arc::new(
            ConcatMapper::new(
                src.schema(),
                ConcatState {
                    sources: vec!["city".into(), "name".into()],
                    output: "key".into(),
                    separator: "/".into(),
                },
            )
            .unwrap(),
        ),
        Arc::new(
            HashMapper::new(
                src.schema(),
                HashState {
                    source: "id".into(),
                    output: "shard".into(),
                    buckets: 13,
                    seed: 99,
                },
            )
            .unwrap(),
        ),
    ];

    for mapper in mappers {
        let t = MapTransform::new(Arc::clone(&src) as Arc<dyn RowSource>, mapper).unwrap();
        let bytes = t.save().unwrap();
        let back = MapTransform::load(&bytes, Arc::clone(&src) as Arc<dyn RowSource>, MapperRegistry::builtin()).unwrap();
        assert_eq!(back.mapper().signature(), t.mapper().signature());
        assert_equivalent(&t, &back);
        // Saving the reloaded transform is byte-for-byte stable.
        assert_eq!(back.save().unwrap(), bytes);
    }
}

#[test]
fn header_carries_versions_and_loader() {
    let src = people(2);
    let mapper = LengthMapper::new(src.schema(), vec![ColumnPair::new("city", "n")]).unwrap();
    let t = MapTransform::new(src, Arc::new(mapper)).unwrap();
    let bytes = t.save().unwrap();
    assert_eq!(&bytes[..8], &persist::SIGNATURE);

    let (header, state) = persist::decode(&bytes).unwrap();
    assert_eq!(header.versions.written, VERSION_CURRENT);
    assert_eq!(header.loader, "LENGTH_MAPPER");
    assert_eq!(header.schema_fingerprint, t.bindings().input_schema().fingerprint().unwrap());
    assert!(serde_json::from_slice::<serde_json::Value>(state).is_ok());
}

#[test]
fn version_out_of_range_fails_the_load() {
    let src = people(2);
    let mapper = LengthMapper::new(src.schema(), vec![ColumnPair::new("city", "n")]).unwrap();
    let t = MapTransform::new(Arc::clone(&src) as Arc<dyn RowSource>, Arc::new(mapper)).unwrap();
    let bytes = t.save().unwrap();

    let mut too_new = bytes.clone();
    too_new[12..16].copy_from_slice(&(VERSION_CURRENT + 1).to_le_bytes());
    let err = MapTransform::load(&too_new, Arc::clone(&src) as Arc<dyn RowSource>, MapperRegistry::builtin())
        .err()
        .unwrap();
    assert!(matches!(err, Error::Version { readable, .. } if readable == VERSION_CURRENT + 1));

    let mut too_old = bytes;
    too_old[8..12].copy_from_slice(&(VERSION_READ_BACK - 1).to_le_bytes());
    assert!(matches!(
        MapTransform::load(&too_old, src, MapperRegistry::builtin()),
        Err(Error::Version { .. })
    ));
}

#[test]
fn corrupted_state_is_rejected() {
    let src = people(2);
    let mapper = LengthMapper::new(src.schema(), vec![ColumnPair::new("city", "n")]).unwrap();
    let t = MapTransform::new(Arc::clone(&src) as Arc<dyn RowSource>, Arc::new(mapper)).unwrap();
    let mut bytes = t.save().unwrap();
    let mid = bytes.len() - 40;
    bytes[mid] ^= 0x55;
    assert!(matches!(
        MapTransform::load(&bytes, src, MapperRegistry::builtin()),
        Err(Error::Codec(_))
    ));
}

/// Outputs a constant integer taken from its saved state.
struct ConstMapper {
    value: i64,
    width: usize,
    outputs: Vec<OutputColumn>,
}

impl ConstMapper {
    const SIGNATURE: &'static str = "CONST_MAPPER";

    fn new(input: &Schema, value: i64) -> Self {
        Self {
            value,
            width: input.len(),
            outputs: vec![OutputColumn::new(Field::new("k", DataType::Int64, false))],
        }
    }

    fn load(input: &Schema, state: &[u8]) -> Result<Arc<dyn RowMapper>> {
        let value: i64 = serde_json::from_slice(state)?;
        Ok(Arc::new(Self::new(input, value)))
    }
}

impl RowMapper for ConstMapper {
    fn signature(&self) -> &'static str {
        Self::SIGNATURE
    }
    fn output_columns(&self) -> &[OutputColumn] {
        &self.outputs
    }
    fn dependencies(&self, _active_outputs: &ColumnSet) -> ColumnSet {
        ColumnSet::empty(self.width)
    }
    fn create_getters(&self, _input: &dyn RowCursor, active: &ColumnSet) -> Result<MapperGetters> {
        let value = self.value;
        let getter: rowmap_core::cursor::ValueGetter = Arc::new(move || Ok(Scalar::I64(value)));
        Ok((vec![active.contains(0).then_some(getter)], noop_disposer()))
    }
    fn save_state(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.value)?)
    }
}

#[test]
fn custom_mapper_needs_registration() {
    let src = people(3);
    let t = MapTransform::new(
        Arc::clone(&src) as Arc<dyn RowSource>,
        Arc::new(ConstMapper::new(src.schema(), 7)),
    )
    .unwrap();
    let bytes = t.save().unwrap();

    assert!(matches!(
        MapTransform::load(&bytes, Arc::clone(&src) as Arc<dyn RowSource>, MapperRegistry::builtin()),
        Err(Error::Registry(_))
    ));

    let mut registry = MapperRegistry::with_builtins();
    registry.register(ConstMapper::SIGNATURE, ConstMapper::load).unwrap();
    let back = MapTransform::load(&bytes, src, &registry).unwrap();
    let mut cursor = back.cursor(&ColumnSet::from_indices(5, [4]).unwrap()).unwrap();
    let rows = collect_rows(&mut cursor, &[4]).unwrap();
    assert_eq!(rows, vec![vec![Scalar::I64(7)]; 3]);
}

#[test]
fn load_checks_the_input_schema() {
    let src = people(3);
    let mapper = LengthMapper::new(src.schema(), vec![ColumnPair::new("city", "n")]).unwrap();
    let t = MapTransform::new(src, Arc::new(mapper)).unwrap();
    let bytes = t.save().unwrap();

    let other = common::scenario_source();
    assert!(matches!(
        MapTransform::load(&bytes, other, MapperRegistry::builtin()),
        Err(Error::Schema(_))
    ));
}
