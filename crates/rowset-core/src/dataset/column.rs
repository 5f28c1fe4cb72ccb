use super::Type;
use crate::value::Value;

/// A cache table column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// The name of the column in the cache table.
    pub name: String,

    /// The column's storage type.
    pub ty: Type,

    /// Whether or not the column is nullable
    pub nullable: bool,

    /// True if values cannot be assigned through the normal write path.
    /// Server-generated values bypass this transiently.
    pub read_only: bool,

    /// Auto-increment state, when the column generates its own values.
    pub auto_increment: Option<AutoIncrement>,

    /// Maximum length for string columns.
    pub max_length: Option<usize>,

    /// True if values must be unique within the table.
    pub unique: bool,

    /// Value assigned when a loaded row carries null for this column.
    pub default: Option<Value>,

    /// Position of the column within its table. Dense and stable: always
    /// `0..N-1` across the table's columns.
    pub ordinal: usize,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: true,
            read_only: false,
            auto_increment: None,
            max_length: None,
            unique: false,
            default: None,
            ordinal: usize::MAX,
        }
    }

    pub fn auto_increment(mut self, seed: i64, step: i64) -> Self {
        self.auto_increment = Some(AutoIncrement::new(seed, step));
        self
    }

    pub fn not_nullable(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Whether the column can serve as a chapter surrogate key: an
    /// integer-typed auto-increment column.
    pub fn is_chapter_key(&self) -> bool {
        self.auto_increment.is_some() && self.ty.is_integer()
    }
}

/// Auto-increment bookkeeping for a column.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoIncrement {
    pub seed: i64,
    pub step: i64,
    next: i64,
}

impl AutoIncrement {
    pub fn new(seed: i64, step: i64) -> Self {
        Self {
            seed,
            step,
            next: seed,
        }
    }

    /// Takes the next generated value, advancing the counter.
    pub fn next_value(&mut self) -> i64 {
        let value = self.next;
        self.next += self.step;
        value
    }

    /// Moves the counter past an externally assigned value so later
    /// generated values never collide with it.
    pub fn observe(&mut self, value: i64) {
        if self.step > 0 && value >= self.next {
            self.next = value + self.step;
        } else if self.step < 0 && value <= self.next {
            self.next = value + self.step;
        }
    }
}
