use rowset_core::{
    driver::{RowSource, SchemaColumn},
    value::{SourceType, Value},
    Error, Result,
};

/// Normalizes a provider cursor behind a uniform capability set, caching
/// the visible field count so it survives between metadata queries.
///
/// The count is reset to zero before each result-set advance and
/// re-queried only on success, so a zero-field result (e.g. a DDL
/// statement in a batch) is detectable.
pub(crate) struct ReaderContainer {
    reader: Box<dyn RowSource>,
    field_count: usize,
}

impl ReaderContainer {
    pub(crate) fn new(reader: Box<dyn RowSource>) -> Self {
        let field_count = reader.field_count();
        Self {
            reader,
            field_count,
        }
    }

    pub(crate) fn field_count(&self) -> usize {
        self.field_count
    }

    pub(crate) fn field_name(&self, ordinal: usize) -> Result<&str> {
        self.reader.field_name(ordinal)
    }

    /// The field's reported type. A source reporting no type is a hard
    /// failure.
    pub(crate) fn field_type(&self, ordinal: usize) -> Result<SourceType> {
        self.reader.field_type(ordinal).ok_or_else(|| {
            Error::mapping(format!("reader returned no field type for ordinal {ordinal}"))
        })
    }

    pub(crate) fn get_values(&mut self, buffer: &mut [Value]) -> Result<usize> {
        self.reader.get_values(buffer)
    }

    pub(crate) fn take_chapter(&mut self, ordinal: usize) -> Result<Option<Box<dyn RowSource>>> {
        self.reader.take_chapter(ordinal)
    }

    pub(crate) fn schema_description(&mut self) -> Result<Option<Vec<SchemaColumn>>> {
        self.reader.schema_description()
    }

    pub(crate) async fn advance_row(&mut self) -> Result<bool> {
        self.reader.advance_row().await
    }

    pub(crate) async fn advance_result_set(&mut self) -> Result<bool> {
        self.field_count = 0;
        let advanced = self.reader.advance_result_set().await?;
        if advanced {
            self.field_count = self.reader.field_count();
        }
        Ok(advanced)
    }

    pub(crate) async fn close(&mut self) -> Result<()> {
        self.reader.close().await
    }

    pub(crate) fn rows_affected(&self) -> Option<u64> {
        self.reader.rows_affected()
    }
}
