//! Scalar values and the closed set of Rust types they convert to.
//!
//! Every column value crosses the cursor boundary as a `Scalar`. Consumers that
//! know the column type up front use `ColumnType` to get a native value back.

use serde::{Deserialize, Serialize};

use crate::schema::DataType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Bin(Vec<u8>),
}

impl Scalar {
    /// Type of a non-null value. `Null` carries no type of its own.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Scalar::Null => None,
            Scalar::Bool(_) => Some(DataType::Boolean),
            Scalar::I32(_) => Some(DataType::Int32),
            Scalar::I64(_) => Some(DataType::Int64),
            Scalar::F32(_) => Some(DataType::Float32),
            Scalar::F64(_) => Some(DataType::Float64),
            Scalar::Str(_) => Some(DataType::Utf8),
            Scalar::Bin(_) => Some(DataType::Binary),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Whether this value may be stored in a column of type `dt`.
    pub fn fits(&self, dt: DataType) -> bool {
        self.data_type().map_or(true, |t| t == dt)
    }
}

/// A Rust type that a column of a fixed `DataType` converts into.
///
/// Implemented for the primitive set and for `Option<T>`, which maps `Null`
/// to `None`. Plain `T` rejects `Null`.
pub trait ColumnType: Sized + Send + 'static {
    const DATA_TYPE: DataType;

    /// `None` when the value does not hold this type.
    fn from_scalar(value: Scalar) -> Option<Self>;

    fn into_scalar(self) -> Scalar;

    /// Whether `Null` converts successfully.
    fn accepts_null() -> bool {
        false
    }
}

macro_rules! column_type {
    ($ty:ty, $dt:ident, $variant:ident) => {
        impl ColumnType for $ty {
            const DATA_TYPE: DataType = DataType::$dt;

            fn from_scalar(value: Scalar) -> Option<Self> {
                match value {
                    Scalar::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn into_scalar(self) -> Scalar {
                Scalar::$variant(self)
            }
        }
    };
}

column_type!(bool, Boolean, Bool);
column_type!(i32, Int32, I32);
column_type!(i64, Int64, I64);
column_type!(f32, Float32, F32);
column_type!(f64, Float64, F64);
column_type!(String, Utf8, Str);
column_type!(Vec<u8>, Binary, Bin);

impl<T: ColumnType> ColumnType for Option<T> {
    const DATA_TYPE: DataType = T::DATA_TYPE;

    fn from_scalar(value: Scalar) -> Option<Self> {
        match value {
            Scalar::Null => Some(None),
            other => T::from_scalar(other).map(Some),
        }
    }

    fn into_scalar(self) -> Scalar {
        self.map_or(Scalar::Null, T::into_scalar)
    }

    fn accepts_null() -> bool {
        true
    }
}
