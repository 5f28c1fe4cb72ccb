use crate::{
    async_trait,
    value::{SourceType, Value},
    Result,
};

/// One row of the optional rich schema description a source can provide
/// alongside its field metadata.
#[derive(Debug, Clone)]
pub struct SchemaColumn {
    pub name: String,

    /// The column's declared ordinal within the result set.
    pub ordinal: usize,

    pub ty: SourceType,

    /// Declared size, for string/binary fields.
    pub size: Option<usize>,

    pub nullable: bool,

    /// Server-declared "is part of the key" flag.
    pub is_key: bool,

    /// Part of a unique (not necessarily primary) constraint.
    pub is_unique: bool,

    pub is_auto_increment: bool,

    pub is_read_only: bool,

    /// Hidden fields are excluded from the visible field count.
    pub is_hidden: bool,

    /// The source-side table the column belongs to, when known.
    pub base_table: Option<String>,
}

impl SchemaColumn {
    pub fn new(name: impl Into<String>, ordinal: usize, ty: SourceType) -> Self {
        Self {
            name: name.into(),
            ordinal,
            ty,
            size: None,
            nullable: true,
            is_key: false,
            is_unique: false,
            is_auto_increment: false,
            is_read_only: false,
            is_hidden: false,
            base_table: None,
        }
    }
}

/// A streaming cursor over one or more result sets.
///
/// The cursor starts positioned before the first row of the first result
/// set; [`advance_row`] moves to each row in turn. [`advance_result_set`]
/// moves to the next result set, after which field metadata must be
/// re-queried — implementations reset the visible field count to zero
/// before recomputing it, so a zero-field result (e.g. a DDL statement)
/// is detectable.
///
/// [`advance_row`]: RowSource::advance_row
/// [`advance_result_set`]: RowSource::advance_result_set
#[async_trait]
pub trait RowSource: Send {
    /// Number of visible (non-hidden) fields in the current result set.
    fn field_count(&self) -> usize;

    fn field_name(&self, ordinal: usize) -> Result<&str>;

    /// The reported type of the field, or `None` when the provider did not
    /// report one. Callers treat `None` as a hard failure.
    fn field_type(&self, ordinal: usize) -> Option<SourceType>;

    /// Copies the current row's values into `buffer`, returning how many
    /// were written (`min(buffer.len(), field_count)`).
    fn get_values(&mut self, buffer: &mut [Value]) -> Result<usize>;

    /// Takes the nested row source behind a chaptered field of the current
    /// row. `None` when the field's chapter value is null.
    fn take_chapter(&mut self, ordinal: usize) -> Result<Option<Box<dyn RowSource>>>;

    /// The rich per-column schema description, when the provider offers
    /// one for the current result set.
    fn schema_description(&mut self) -> Result<Option<Vec<SchemaColumn>>>;

    /// Advances to the next row of the current result set.
    async fn advance_row(&mut self) -> Result<bool>;

    /// Advances to the next result set.
    async fn advance_result_set(&mut self) -> Result<bool>;

    /// Releases the cursor. After close, [`rows_affected`] reflects the
    /// final count and is trusted over any earlier instantaneous value.
    ///
    /// [`rows_affected`]: RowSource::rows_affected
    async fn close(&mut self) -> Result<()>;

    /// Rows affected by the statement that produced this cursor, when the
    /// provider reports one.
    fn rows_affected(&self) -> Option<u64>;
}
