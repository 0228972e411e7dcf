//! Per-column metadata dispatch.
//!
//! A `MetadataDispatcher` is filled column by column through
//! `ColumnMetadataBuilder`s, then sealed. After sealing it is read-only and
//! can be shared freely across threads; before sealing it cannot be queried.
//!
//! Each entry is a `(kind, type, accessor)` triple. Kinds are unique per
//! column and values are produced on demand by the accessor.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::schema::DataType;
use crate::types::{ColumnType, Scalar};

/// Produces a metadata value on demand.
pub type MetadataGetter = Arc<dyn Fn() -> Scalar + Send + Sync>;

#[derive(Clone)]
pub struct MetadataItem {
    kind: String,
    data_type: DataType,
    getter: MetadataGetter,
}

impl MetadataItem {
    pub fn new(kind: impl Into<String>, data_type: DataType, getter: MetadataGetter) -> Self {
        Self {
            kind: kind.into(),
            data_type,
            getter,
        }
    }

    /// Entry that always yields `value`. `Null` has no type and is rejected.
    pub fn constant(kind: impl Into<String>, value: Scalar) -> Result<Self> {
        let kind = kind.into();
        let data_type = value.data_type().ok_or_else(|| {
            Error::Schema(format!("metadata '{kind}' cannot be a bare null"))
        })?;
        Ok(Self::new(kind, data_type, Arc::new(move || value.clone())))
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn value(&self) -> Scalar {
        (self.getter)()
    }
}

impl fmt::Debug for MetadataItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataItem")
            .field("kind", &self.kind)
            .field("data_type", &self.data_type)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct MetadataDispatcher {
    columns: Vec<Vec<MetadataItem>>,
    sealed: bool,
}

impl MetadataDispatcher {
    pub fn new(column_count: usize) -> Self {
        Self {
            columns: vec![Vec::new(); column_count],
            sealed: false,
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Mutable view of column `col`. Fails once sealed.
    pub fn builder(&mut self, col: usize) -> Result<ColumnMetadataBuilder<'_>> {
        if self.sealed {
            return Err(Error::Usage("metadata dispatcher is sealed".into()));
        }
        let count = self.columns.len();
        let items = self
            .columns
            .get_mut(col)
            .ok_or_else(|| Error::Usage(format!("column {col} out of range ({count} columns)")))?;
        Ok(ColumnMetadataBuilder { col, items })
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// All entries of column `col`, in insertion order.
    pub fn items(&self, col: usize) -> Result<&[MetadataItem]> {
        if !self.sealed {
            return Err(Error::Usage(
                "metadata dispatcher queried before sealing".into(),
            ));
        }
        self.columns
            .get(col)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::Usage(format!("column {col} out of range")))
    }

    pub fn types_for(&self, col: usize) -> Result<Vec<(&str, DataType)>> {
        Ok(self
            .items(col)?
            .iter()
            .map(|item| (item.kind(), item.data_type()))
            .collect())
    }

    /// Type of `kind` on `col`, or `None` when absent.
    pub fn type_of(&self, kind: &str, col: usize) -> Result<Option<DataType>> {
        Ok(self
            .items(col)?
            .iter()
            .find(|item| item.kind == kind)
            .map(|item| item.data_type))
    }

    /// Value of `kind` on `col` as `T`.
    pub fn get<T: ColumnType>(&self, kind: &str, col: usize) -> Result<T> {
        let item = self
            .items(col)?
            .iter()
            .find(|item| item.kind == kind)
            .ok_or_else(|| Error::MissingMetadata {
                column: col,
                kind: kind.to_string(),
            })?;
        if item.data_type != T::DATA_TYPE {
            return Err(Error::TypeMismatch {
                column: col,
                expected: T::DATA_TYPE,
                actual: item.data_type,
            });
        }
        T::from_scalar(item.value()).ok_or(Error::UnexpectedNull { column: col })
    }
}

pub struct ColumnMetadataBuilder<'a> {
    col: usize,
    items: &'a mut Vec<MetadataItem>,
}

impl ColumnMetadataBuilder<'_> {
    /// Fails if `item.kind()` is already present on this column.
    pub fn add(&mut self, item: MetadataItem) -> Result<&mut Self> {
        if self.items.iter().any(|existing| existing.kind == item.kind) {
            return Err(Error::Schema(format!(
                "duplicate metadata kind '{}' on column {}",
                item.kind, self.col
            )));
        }
        self.items.push(item);
        Ok(self)
    }

    pub fn add_all<'i>(&mut self, items: impl IntoIterator<Item = &'i MetadataItem>) -> Result<&mut Self> {
        for item in items {
            self.add(item.clone())?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sealed() -> MetadataDispatcher {
        let mut md = MetadataDispatcher::new(2);
        md.builder(1)
            .unwrap()
            .add(MetadataItem::constant("buckets", Scalar::I64(16)).unwrap())
            .unwrap()
            .add(MetadataItem::constant("origin", Scalar::Str("b".into())).unwrap())
            .unwrap();
        md.seal();
        md
    }

    #[test]
    fn duplicate_kind_fails_immediately() {
        let mut md = MetadataDispatcher::new(1);
        let mut b = md.builder(0).unwrap();
        b.add(MetadataItem::constant("k", Scalar::Bool(true)).unwrap())
            .unwrap();
        assert!(matches!(
            b.add(MetadataItem::constant("k", Scalar::I32(1)).unwrap()),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn sealed_dispatcher_rejects_mutation() {
        let mut md = sealed();
        assert!(matches!(md.builder(0), Err(Error::Usage(_))));
    }

    #[test]
    fn queries_require_seal() {
        let md = MetadataDispatcher::new(1);
        assert!(matches!(md.types_for(0), Err(Error::Usage(_))));
    }

    #[test]
    fn typed_lookup() {
        let md = sealed();
        assert_eq!(md.get::<i64>("buckets", 1).unwrap(), 16);
        assert_eq!(md.type_of("origin", 1).unwrap(), Some(DataType::Utf8));
        assert_eq!(md.type_of("origin", 0).unwrap(), None);
        assert_eq!(
            md.types_for(1).unwrap(),
            vec![("buckets", DataType::Int64), ("origin", DataType::Utf8)]
        );
        assert!(matches!(
            md.get::<i32>("buckets", 1),
            Err(Error::TypeMismatch { column: 1, .. })
        ));
        assert!(matches!(
            md.get::<i64>("absent", 1),
            Err(Error::MissingMetadata { .. })
        ));
    }

    #[test]
    fn null_constant_is_rejected() {
        assert!(MetadataItem::constant("k", Scalar::Null).is_err());
    }
}
