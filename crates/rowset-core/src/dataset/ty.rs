use crate::value::{SourceType, Value};

/// The storage type of a cache column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Bool,
    I16,
    I32,
    I64,
    F64,
    Decimal,
    String,
    Bytes,
    Xml,
}

impl Type {
    /// The cache storage type for a source-reported field type.
    ///
    /// Chaptered fields map to `I32` because they materialize as generated
    /// surrogate keys, never as stored nested values.
    pub const fn from_source(src: SourceType) -> Type {
        match src {
            SourceType::Bool => Type::Bool,
            SourceType::I16 => Type::I16,
            SourceType::I32 => Type::I32,
            SourceType::I64 => Type::I64,
            SourceType::F64 => Type::F64,
            SourceType::Decimal => Type::Decimal,
            SourceType::String => Type::String,
            SourceType::Bytes => Type::Bytes,
            SourceType::Xml => Type::Xml,
            SourceType::Rows => Type::I32,
        }
    }

    /// Whether a value may be stored in a column of this type. Null is
    /// accepted here; nullability is enforced separately.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Type::Bool, Value::Bool(_)) => true,
            (Type::I16, Value::I16(_)) => true,
            (Type::I32, Value::I32(_)) => true,
            (Type::I64, Value::I64(_) | Value::I32(_)) => true,
            (Type::F64, Value::F64(_)) => true,
            (Type::Decimal, Value::Decimal(_) | Value::F64(_)) => true,
            (Type::String, Value::String(_)) => true,
            (Type::Bytes, Value::Bytes(_)) => true,
            (Type::Xml, Value::Xml(_) | Value::String(_)) => true,
            _ => false,
        }
    }

    /// Integer types eligible to back an auto-increment chapter key.
    pub const fn is_integer(self) -> bool {
        matches!(self, Type::I16 | Type::I32 | Type::I64)
    }
}
