use std::fmt;

/// A single cell value flowing between a row source and the in-memory cache.
#[derive(Debug, Default, Clone, PartialEq)]
pub enum Value {
    /// Boolean value
    Bool(bool),

    /// Signed 16-bit integer
    I16(i16),

    /// Signed 32-bit integer
    I32(i32),

    /// Signed 64-bit integer
    I64(i64),

    /// 64-bit floating point
    F64(f64),

    /// Provider-precision decimal, carried as its digit string so the
    /// native variant loses nothing in transit.
    Decimal(String),

    /// String value
    String(String),

    /// Raw bytes
    Bytes(Vec<u8>),

    /// An XML document, post-read converted from its provider encoding
    Xml(String),

    /// Null value
    #[default]
    Null,
}

impl Value {
    /// Returns a `Value` representing null
    pub const fn null() -> Self {
        Self::Null
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Name of the value's type, for diagnostics
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::I16(_) => "i16",
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::F64(_) => "f64",
            Self::Decimal(_) => "decimal",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Xml(_) => "xml",
            Self::Null => "null",
        }
    }

    #[track_caller]
    pub fn expect_i32(&self) -> i32 {
        match self {
            Self::I32(v) => *v,
            _ => panic!("expected i32 value; value={self:?}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => v.fmt(f),
            Self::I16(v) => v.fmt(f),
            Self::I32(v) => v.fmt(f),
            Self::I64(v) => v.fmt(f),
            Self::F64(v) => v.fmt(f),
            Self::Decimal(v) => v.fmt(f),
            Self::String(v) => v.fmt(f),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Self::Xml(v) => v.fmt(f),
            Self::Null => f.write_str("null"),
        }
    }
}

impl From<bool> for Value {
    fn from(src: bool) -> Self {
        Self::Bool(src)
    }
}

impl From<i16> for Value {
    fn from(src: i16) -> Self {
        Self::I16(src)
    }
}

impl From<i32> for Value {
    fn from(src: i32) -> Self {
        Self::I32(src)
    }
}

impl From<i64> for Value {
    fn from(src: i64) -> Self {
        Self::I64(src)
    }
}

impl From<f64> for Value {
    fn from(src: f64) -> Self {
        Self::F64(src)
    }
}

impl From<&str> for Value {
    fn from(src: &str) -> Self {
        Self::String(src.to_string())
    }
}

impl From<String> for Value {
    fn from(src: String) -> Self {
        Self::String(src)
    }
}

/// The field type a row source reports for one of its ordinals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Bool,
    I16,
    I32,
    I64,
    F64,
    Decimal,
    String,
    Bytes,

    /// An XML-bearing field; values need post-read conversion to
    /// [`Value::Xml`].
    Xml,

    /// The field's values are themselves nested row sources (a chaptered
    /// column). Materialized as a generated surrogate key.
    Rows,
}

impl SourceType {
    /// Whether fields of this type hold nested row sources.
    pub const fn is_chapter(self) -> bool {
        matches!(self, Self::Rows)
    }
}

/// Which family of values a row source should yield: the provider's own
/// types, or normalized common types.
///
/// Chosen once per fill call and immutable for that call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueVariant {
    /// Normalized standard types
    #[default]
    Common,

    /// Provider-specific types, e.g. precision-preserving decimals
    Native,
}
