//! Shared data generators for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use rowmap_core::schema::{DataType, Field, Schema};
use rowmap_core::types::Scalar;
use rowmap_source::{MemorySource, MemoryTable};

/// `{a: int32, b: utf8}` with the single row `(5, "hi")`.
pub fn scenario_source() -> Arc<MemorySource> {
    let schema = Schema::new(vec![
        Field::new("a", DataType::Int32, false),
        Field::new("b", DataType::Utf8, false),
    ]);
    let table = MemoryTable::from_rows(schema, vec![vec![Scalar::I32(5), Scalar::Str("hi".into())]])
        .expect("scenario table");
    Arc::new(MemorySource::new(table))
}

/// `{id: int64, name: utf8?, city: utf8, score: float64}`; every seventh
/// name is null.
pub fn people_schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, true),
        Field::new("city", DataType::Utf8, false),
        Field::new("score", DataType::Float64, false),
    ])
}

pub fn people_table(rows: usize) -> MemoryTable {
    let cities = ["Lisbon", "Oslo", "Kyoto", "Quito"];
    let rows = (0..rows)
        .map(|i| {
            let name = if i % 7 == 3 {
                Scalar::Null
            } else {
                Scalar::Str(format!("person-{i}"))
            };
            vec![
                Scalar::I64(i as i64),
                name,
                Scalar::Str(cities[i % cities.len()].to_string()),
                Scalar::F64(i as f64 * 0.5),
            ]
        })
        .collect();
    MemoryTable::from_rows(people_schema(), rows).expect("people table")
}

pub fn people(rows: usize) -> Arc<MemorySource> {
    Arc::new(MemorySource::new(people_table(rows)))
}
