use crate::{
    adapter::DataAdapter,
    mapping::{MissingSchemaAction, SchemaType},
    reader::ReaderContainer,
    schema::{ChapterContext, FillTarget, SchemaConfig, SchemaMapping},
};
use rowset_core::{
    driver::RowSource,
    value::Value,
    Error, Result,
};

use async_recursion::async_recursion;
use tokio_util::sync::CancellationToken;

impl DataAdapter {
    /// Materializes every result set the reader yields. `start_record` and
    /// `max_records` apply to the first result set only; later result sets
    /// are named by appending the result-set index to `source_table`.
    /// Returns the number of rows loaded from the first materialized
    /// result set.
    #[async_recursion]
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn fill_from_reader(
        &mut self,
        target: &mut FillTarget<'_>,
        source_table: &str,
        reader: &mut ReaderContainer,
        start_record: usize,
        max_records: usize,
        chapter: Option<&ChapterContext>,
        single_result_set: bool,
        token: &CancellationToken,
    ) -> Result<usize> {
        let mut first_count = None;
        let mut result_set = 0;

        loop {
            if token.is_cancelled() {
                return Err(Error::cancelled());
            }

            // Zero-field result sets (e.g. statements without a row shape
            // in a batch) produce nothing and are stepped over.
            if reader.field_count() > 0 {
                let name = if result_set == 0 {
                    source_table.to_string()
                } else {
                    format!("{source_table}{result_set}")
                };
                let (skip, take) = if result_set == 0 {
                    (start_record, max_records)
                } else {
                    (0, 0)
                };

                let count = self
                    .fill_result_set(target, &name, reader, skip, take, chapter, token)
                    .await?;
                first_count.get_or_insert(count);
            }

            if single_result_set {
                break;
            }
            match reader.advance_result_set().await {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) => {
                    // A failed advance ends the fill; the hook decides
                    // whether the rows already loaded stand.
                    if !self.handle_fill_error(&err, None, &[]) {
                        return Err(err);
                    }
                    break;
                }
            }
            result_set += 1;
        }

        Ok(first_count.unwrap_or(0))
    }

    async fn fill_result_set(
        &mut self,
        target: &mut FillTarget<'_>,
        source_table: &str,
        reader: &mut ReaderContainer,
        start_record: usize,
        max_records: usize,
        chapter: Option<&ChapterContext>,
        token: &CancellationToken,
    ) -> Result<usize> {
        let mapping = {
            let cfg = SchemaConfig {
                mappings: &self.table_mappings,
                missing_mapping: self.missing_mapping_action,
                missing_schema: self.missing_schema_action,
                use_mappings: true,
                with_key_info: self.missing_schema_action == MissingSchemaAction::AddWithKey,
            };
            SchemaMapping::build(&cfg, target, source_table, reader, chapter)?
        };
        let Some(mut mapping) = mapping else {
            return Ok(0);
        };

        for _ in 0..start_record {
            if !reader.advance_row().await? {
                return Ok(0);
            }
        }

        target.table_mut(&mapping.table_name)?.begin_load();
        let result = self
            .drain_rows(target, source_table, &mut mapping, reader, max_records, token)
            .await;
        target.table_mut(&mapping.table_name)?.end_load();

        let count = result?;
        tracing::debug!(
            adapter = self.id(),
            table = %mapping.table_name,
            rows = count,
            "filled result set"
        );
        Ok(count)
    }

    async fn drain_rows(
        &mut self,
        target: &mut FillTarget<'_>,
        source_table: &str,
        mapping: &mut SchemaMapping,
        reader: &mut ReaderContainer,
        max_records: usize,
        token: &CancellationToken,
    ) -> Result<usize> {
        let mut count = 0;

        loop {
            if token.is_cancelled() {
                return Err(Error::cancelled());
            }
            if !reader.advance_row().await? {
                break;
            }

            match self.load_row(target, source_table, mapping, reader, token).await {
                Ok(()) => count += 1,
                Err(err) => {
                    if !self.handle_fill_error(&err, Some(&mapping.table_name), mapping.raw_values())
                    {
                        return Err(err);
                    }
                }
            }

            if max_records != 0 && count >= max_records {
                break;
            }
        }

        Ok(count)
    }

    /// Reads the current row out of the reader, loads it into the
    /// destination table, then recursively materializes any nested row
    /// sources the row carried.
    async fn load_row(
        &mut self,
        target: &mut FillTarget<'_>,
        source_table: &str,
        mapping: &mut SchemaMapping,
        reader: &mut ReaderContainer,
        token: &CancellationToken,
    ) -> Result<()> {
        mapping.clear_scratch();
        reader.get_values(mapping.scratch_mut())?;

        // Detach nested readers before the scratch buffer is consumed.
        let mut nested: Vec<(usize, String, Box<dyn RowSource>)> = vec![];
        if mapping.has_chapters() {
            for ordinal in mapping.chapter_ordinals().collect::<Vec<_>>() {
                if let Some(child) = reader.take_chapter(ordinal)? {
                    let field_name = reader.field_name(ordinal)?.to_string();
                    nested.push((ordinal, field_name, child));
                }
            }
        }

        let load_option = self.load_option();
        let row = {
            let table = target.table_mut(&mapping.table_name)?;
            let values = mapping.map_row(table.columns().len());
            table.load_row(values, load_option)?
        };

        for (ordinal, field_name, child) in nested {
            self.fill_chapter(target, source_table, mapping, row, ordinal, field_name, child, token)
                .await?;
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn fill_chapter(
        &mut self,
        target: &mut FillTarget<'_>,
        source_table: &str,
        mapping: &SchemaMapping,
        row: usize,
        ordinal: usize,
        field_name: String,
        child: Box<dyn RowSource>,
        token: &CancellationToken,
    ) -> Result<()> {
        let mut child_reader = ReaderContainer::new(child);

        let result = async {
            let Some(parent_column) = mapping.destination_of(ordinal) else {
                // The chapter column itself was dropped by the mappings;
                // the nested rows have no parent key to attach to.
                return Ok(());
            };
            let key = target
                .table_mut(&mapping.table_name)?
                .row(row)
                .get(parent_column)
                .clone();

            let context = ChapterContext {
                parent_table: mapping.table_name.clone(),
                parent_column,
                column_name: field_name.clone(),
                value: key,
            };
            let child_source = format!("{source_table}{field_name}");

            self.fill_from_reader(target, &child_source, &mut child_reader, 0, 0, Some(&context), false, token)
                .await
                .map(|_| ())
        }
        .await;

        let close = child_reader.close().await;
        result?;
        close?;
        Ok(())
    }

    /// Routes a failed row load or result-set advance through the fill
    /// error hook. Returns true when the fill should continue.
    fn handle_fill_error(&mut self, err: &Error, table: Option<&str>, values: &[Value]) -> bool {
        if !err.is_recoverable() {
            return false;
        }
        let Some(hook) = self.fill_error_hook.as_mut() else {
            return false;
        };
        let proceed = hook(err, table, values);
        if proceed {
            tracing::debug!(adapter = self.id(), table, %err, "fill error suppressed by hook");
        }
        proceed
    }

    /// Resolves destination schema for every result set without
    /// materializing rows. Key and unique metadata is always propagated
    /// here, whatever the missing-schema policy says for plain fills.
    pub(crate) async fn schema_from_reader(
        &mut self,
        target: &mut FillTarget<'_>,
        schema_type: SchemaType,
        source_table: &str,
        reader: &mut ReaderContainer,
        single_result_set: bool,
        token: &CancellationToken,
    ) -> Result<Vec<String>> {
        let mut tables = vec![];
        let mut result_set = 0;

        loop {
            if token.is_cancelled() {
                return Err(Error::cancelled());
            }

            if reader.field_count() > 0 {
                let name = if result_set == 0 {
                    source_table.to_string()
                } else {
                    format!("{source_table}{result_set}")
                };

                let missing_schema = match self.missing_schema_action {
                    MissingSchemaAction::Add => MissingSchemaAction::AddWithKey,
                    other => other,
                };
                let cfg = SchemaConfig {
                    mappings: &self.table_mappings,
                    missing_mapping: self.missing_mapping_action,
                    missing_schema,
                    use_mappings: schema_type == SchemaType::Mapped,
                    with_key_info: true,
                };
                if let Some(mapping) = SchemaMapping::build(&cfg, target, &name, reader, None)? {
                    tables.push(mapping.table_name);
                }
            }

            if single_result_set || !reader.advance_result_set().await? {
                break;
            }
            result_set += 1;
        }

        Ok(tables)
    }
}
