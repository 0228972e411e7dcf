//! Cursor sets: splitting a single upstream cursor and draining the
//! partitions from several threads.

mod common;

use std::sync::Arc;
use std::thread;

use common::{people, people_table};
use rowmap_core::column_set::ColumnSet;
use rowmap_core::config::TransformConfig;
use rowmap_core::cursor::{collect_rows, RowCursor, RowSource};
use rowmap_core::types::Scalar;
use rowmap_source::MemorySource;
use rowmap_transform::mappers::concat::ConcatState;
use rowmap_transform::mappers::hash::HashState;
use rowmap_transform::{
    split_cursors, ConcatMapper, HashMapper, MapCursor, MapTransform, RowMapper,
};

type Row = (i64, Vec<Scalar>);

fn drain(mut cursor: MapCursor, cols: &[usize]) -> Vec<Row> {
    let getters: Vec<_> = cols.iter().map(|c| cursor.getter(*c).unwrap()).collect();
    let mut rows = Vec::new();
    while cursor.move_next().unwrap() {
        rows.push((cursor.position(), getters.iter().map(|g| g().unwrap()).collect()));
    }
    rows
}

fn hash_transform(src: Arc<MemorySource>) -> MapTransform {
    let mapper = HashMapper::new(
        src.schema(),
        HashState {
            source: "name".into(),
            output: "shard".into(),
            buckets: 4,
            seed: 3,
        },
    )
    .unwrap();
    MapTransform::new(src, Arc::new(mapper)).unwrap()
}

#[test]
fn split_partitions_reassemble_the_single_traversal() {
    let t = hash_transform(people(101));
    let request = ColumnSet::from_indices(5, [0, 4]).unwrap();
    let expected = drain(t.cursor(&request).unwrap(), &[0, 4]);
    assert_eq!(expected.len(), 101);

    for k in 1..=4 {
        let cursors = t.cursor_set(&request, k).unwrap();
        assert_eq!(cursors.len(), k);

        let mut merged = Vec::new();
        for cursor in cursors {
            let part = drain(cursor, &[0, 4]);
            // Each partition keeps upstream order.
            assert!(part.windows(2).all(|w| w[0].0 < w[1].0));
            merged.extend(part);
        }
        merged.sort_by_key(|(pos, _)| *pos);
        assert_eq!(merged, expected, "k = {k}");
    }
}

#[test]
fn partitions_run_on_separate_threads() {
    let src = people(500);
    let mapper = ConcatMapper::new(
        src.schema(),
        ConcatState {
            sources: vec!["name".into(), "city".into()],
            output: "label".into(),
            separator: "|".into(),
        },
    )
    .unwrap();
    let mapper = Arc::new(mapper);
    let t = MapTransform::new(Arc::clone(&src) as Arc<dyn RowSource>, Arc::clone(&mapper) as Arc<dyn RowMapper>)
        .unwrap();
    let request = ColumnSet::from_indices(5, [0, 4]).unwrap();
    let expected = drain(t.cursor(&request).unwrap(), &[0, 4]);

    let cursors = t.cursor_set(&request, 4).unwrap();
    assert_eq!(cursors.len(), 4);
    assert_eq!(mapper.live_buffers(), 4);

    let mut merged: Vec<Row> = thread::scope(|s| {
        let handles: Vec<_> = cursors
            .into_iter()
            .map(|cursor| s.spawn(move || drain(cursor, &[0, 4])))
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });
    merged.sort_by_key(|(pos, _)| *pos);
    assert_eq!(merged, expected);

    // Every per-cursor buffer was released when its cursor dropped.
    assert_eq!(mapper.live_buffers(), 0);
}

#[test]
fn native_partitions_are_used_as_is() {
    let src = Arc::new(MemorySource::new(people_table(30)).with_native_split(true));
    let t = hash_transform(src);
    let request = ColumnSet::all(5);
    let cursors = t.cursor_set(&request, 3).unwrap();
    assert_eq!(cursors.len(), 3);
    let sizes: Vec<usize> = cursors.into_iter().map(|c| drain(c, &[0]).len()).collect();
    assert_eq!(sizes, vec![10, 10, 10]);
}

#[test]
fn passthrough_only_requests_are_not_split() {
    let t = hash_transform(people(20));
    let request = ColumnSet::from_indices(5, [0, 1]).unwrap();
    assert_eq!(t.should_use_parallel_cursors(&request).unwrap(), None);
    assert_eq!(t.cursor_set(&request, 4).unwrap().len(), 1);

    let config = TransformConfig {
        split_cursors: false,
        ..TransformConfig::default()
    };
    let src = people(20);
    let mapper = HashMapper::new(
        src.schema(),
        HashState {
            source: "id".into(),
            output: "shard".into(),
            buckets: 2,
            seed: 0,
        },
    )
    .unwrap();
    let t = MapTransform::with_config(src, Arc::new(mapper), config).unwrap();
    assert_eq!(t.cursor_set(&ColumnSet::all(5), 4).unwrap().len(), 1);
}

#[test]
fn splitter_works_on_raw_upstream_cursors() {
    let src = people(9);
    let active = ColumnSet::from_indices(4, [0, 2]).unwrap();
    let input = src.row_cursor(&active).unwrap();
    let parts = split_cursors(vec![input], &active, 2).unwrap();
    let mut ids = Vec::new();
    for mut part in parts {
        for row in collect_rows(part.as_mut(), &[0]).unwrap() {
            ids.push(row[0].clone());
        }
        part.dispose();
    }
    ids.sort_by_key(|v| match v {
        Scalar::I64(i) => *i,
        _ => -1,
    });
    assert_eq!(ids, (0..9).map(Scalar::I64).collect::<Vec<_>>());
}
