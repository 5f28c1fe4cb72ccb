use crate::{
    guard::ConnectionGuard,
    mapping::{MissingMappingAction, MissingSchemaAction, SchemaType, TableMapping},
    reader::ReaderContainer,
    schema::FillTarget,
    update::UpdateEvent,
};
use rowset_core::{
    dataset::{DataSet, LoadOption, Table},
    driver::Command,
    value::{Value, ValueVariant},
    Error, Result,
};

use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

static NEXT_ADAPTER_ID: AtomicU64 = AtomicU64::new(1);

/// Decides whether a failed row load aborts the fill. Receives the error,
/// the destination table name (when resolved), and the raw source values
/// of the offending row. Returning `true` continues with the next row.
pub type FillErrorHook = dyn FnMut(&Error, Option<&str>, &[Value]) -> bool + Send;

/// Observes (and may redirect) one row's write, before or after execution.
pub type UpdateHook = dyn FnMut(&mut UpdateEvent) + Send;

/// Bridges a streaming row source to an in-memory [`DataSet`]: fills
/// tables from query results, infers schema, and reconciles row edits
/// back to the source.
pub struct DataAdapter {
    pub select_command: Option<Command>,
    pub insert_command: Option<Command>,
    pub update_command: Option<Command>,
    pub delete_command: Option<Command>,

    pub table_mappings: Vec<TableMapping>,
    pub missing_mapping_action: MissingMappingAction,
    pub missing_schema_action: MissingSchemaAction,

    /// When no explicit fill load option is set, true commits filled rows
    /// as Unchanged, false appends them as Added.
    pub accept_changes_during_fill: bool,

    /// Discard edit history on rows the update pipeline wrote
    /// successfully.
    pub accept_changes_during_update: bool,

    /// Keep processing rows after a per-row write failure, accumulating
    /// row errors instead of halting.
    pub continue_update_on_error: bool,

    /// Overrides the load policy derived from
    /// [`accept_changes_during_fill`](Self::accept_changes_during_fill).
    pub fill_load_option: Option<LoadOption>,

    /// Ask the row source for provider-native values instead of common
    /// normalized ones.
    pub return_provider_specific_types: bool,

    /// 1 executes row commands individually; N batches up to N commands;
    /// 0 batches without bound. Values other than 1 require a connection
    /// with a batch executor.
    pub update_batch_size: usize,

    pub(crate) fill_error_hook: Option<Box<FillErrorHook>>,
    pub(crate) row_updating: Option<Box<UpdateHook>>,
    pub(crate) row_updated: Option<Box<UpdateHook>>,

    id: u64,
}

impl Default for DataAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl DataAdapter {
    pub fn new() -> Self {
        Self {
            select_command: None,
            insert_command: None,
            update_command: None,
            delete_command: None,
            table_mappings: vec![],
            missing_mapping_action: MissingMappingAction::default(),
            missing_schema_action: MissingSchemaAction::default(),
            accept_changes_during_fill: true,
            accept_changes_during_update: true,
            continue_update_on_error: false,
            fill_load_option: None,
            return_provider_specific_types: false,
            update_batch_size: 1,
            fill_error_hook: None,
            row_updating: None,
            row_updated: None,
            id: NEXT_ADAPTER_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Identifier correlating this adapter's log events.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn on_fill_error(
        &mut self,
        hook: impl FnMut(&Error, Option<&str>, &[Value]) -> bool + Send + 'static,
    ) {
        self.fill_error_hook = Some(Box::new(hook));
    }

    pub fn on_row_updating(&mut self, hook: impl FnMut(&mut UpdateEvent) + Send + 'static) {
        self.row_updating = Some(Box::new(hook));
    }

    pub fn on_row_updated(&mut self, hook: impl FnMut(&mut UpdateEvent) + Send + 'static) {
        self.row_updated = Some(Box::new(hook));
    }

    pub(crate) fn value_variant(&self) -> ValueVariant {
        if self.return_provider_specific_types {
            ValueVariant::Native
        } else {
            ValueVariant::Common
        }
    }

    /// The load policy for this fill call: the explicit option when set,
    /// otherwise derived from the accept-changes flag.
    pub(crate) fn load_option(&self) -> LoadOption {
        self.fill_load_option.unwrap_or(if self.accept_changes_during_fill {
            LoadOption::OverwriteChanges
        } else {
            LoadOption::Append
        })
    }

    // --- fill ---

    /// Executes the select command and materializes every result set into
    /// the data set. Returns the number of rows added to or refreshed in
    /// the first table.
    pub async fn fill(&mut self, data_set: &mut DataSet, token: &CancellationToken) -> Result<usize> {
        self.fill_range(data_set, 0, 0, "Table", token).await
    }

    /// Like [`fill`](Self::fill), skipping `start_record` rows and taking
    /// at most `max_records` (0 = unbounded) from the first result set.
    /// `source_table` names the first result set for mapping resolution;
    /// later result sets get numeric suffixes.
    pub async fn fill_range(
        &mut self,
        data_set: &mut DataSet,
        start_record: usize,
        max_records: usize,
        source_table: &str,
        token: &CancellationToken,
    ) -> Result<usize> {
        let mut target = FillTarget::DataSet(data_set);
        self.fill_target(&mut target, start_record, max_records, source_table, false, token)
            .await
    }

    /// Materializes the first result set into one explicit table. Further
    /// result sets are not consumed, and chaptered columns are rejected.
    pub async fn fill_table(&mut self, table: &mut Table, token: &CancellationToken) -> Result<usize> {
        let source_table = table.name.clone();
        let mut target = FillTarget::Table(table);
        self.fill_target(&mut target, 0, 0, &source_table, true, token)
            .await
    }

    async fn fill_target(
        &mut self,
        target: &mut FillTarget<'_>,
        start_record: usize,
        max_records: usize,
        source_table: &str,
        single_result_set: bool,
        token: &CancellationToken,
    ) -> Result<usize> {
        let command = self
            .select_command
            .clone()
            .ok_or_else(|| Error::configuration("fill requires a select command"))?;

        let mut guard = ConnectionGuard::new(command.connection.clone());
        guard.open(token).await?;

        let result = self
            .execute_fill(target, &command, start_record, max_records, source_table, single_result_set, token)
            .await;

        // Close-if-we-opened runs on every path, cancellation included.
        let finish = guard.finish().await;
        let count = result?;
        finish?;
        Ok(count)
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_fill(
        &mut self,
        target: &mut FillTarget<'_>,
        command: &Command,
        start_record: usize,
        max_records: usize,
        source_table: &str,
        single_result_set: bool,
        token: &CancellationToken,
    ) -> Result<usize> {
        if token.is_cancelled() {
            return Err(Error::cancelled());
        }

        let reader = {
            let mut conn = command.connection.lock().await;
            conn.execute_reader(command, self.value_variant()).await?
        };
        let mut reader = ReaderContainer::new(reader);

        let result = self
            .fill_from_reader(
                target,
                source_table,
                &mut reader,
                start_record,
                max_records,
                None,
                single_result_set,
                token,
            )
            .await;

        let close = reader.close().await;
        let count = result?;
        close?;
        Ok(count)
    }

    // --- schema ---

    /// Resolves or creates the destination tables for every result set of
    /// the select command, propagating key information, without
    /// materializing any rows. Returns the destination table names.
    pub async fn fill_schema(
        &mut self,
        data_set: &mut DataSet,
        schema_type: SchemaType,
        token: &CancellationToken,
    ) -> Result<Vec<String>> {
        let mut target = FillTarget::DataSet(data_set);
        self.fill_schema_target(&mut target, schema_type, "Table", false, token)
            .await
    }

    /// Schema-only population of one explicit table from the first result
    /// set.
    pub async fn fill_schema_table(
        &mut self,
        table: &mut Table,
        schema_type: SchemaType,
        token: &CancellationToken,
    ) -> Result<Vec<String>> {
        let source_table = table.name.clone();
        let mut target = FillTarget::Table(table);
        self.fill_schema_target(&mut target, schema_type, &source_table, true, token)
            .await
    }

    async fn fill_schema_target(
        &mut self,
        target: &mut FillTarget<'_>,
        schema_type: SchemaType,
        source_table: &str,
        single_result_set: bool,
        token: &CancellationToken,
    ) -> Result<Vec<String>> {
        let command = self
            .select_command
            .clone()
            .ok_or_else(|| Error::configuration("fill schema requires a select command"))?;

        let mut guard = ConnectionGuard::new(command.connection.clone());
        guard.open(token).await?;

        let result = async {
            if token.is_cancelled() {
                return Err(Error::cancelled());
            }
            let reader = {
                let mut conn = command.connection.lock().await;
                conn.execute_reader(&command, self.value_variant()).await?
            };
            let mut reader = ReaderContainer::new(reader);
            let result = self
                .schema_from_reader(target, schema_type, source_table, &mut reader, single_result_set, token)
                .await;
            let close = reader.close().await;
            let tables = result?;
            close?;
            Ok(tables)
        }
        .await;

        let finish = guard.finish().await;
        let tables = result?;
        finish?;
        Ok(tables)
    }

    // --- update ---

    /// Reconciles dirty rows back to the source, returning the number of
    /// rows written successfully.
    pub async fn update(&mut self, target: UpdateTarget<'_>, token: &CancellationToken) -> Result<u64> {
        match target {
            UpdateTarget::DataSet { data_set, table } => {
                let name = self
                    .table_mappings
                    .iter()
                    .find(|m| m.source_table == table)
                    .map(|m| m.dataset_table.clone())
                    .unwrap_or_else(|| table.to_string());
                let table = data_set.get_mut(&name).ok_or_else(|| {
                    Error::configuration(format!("data set has no table named '{name}'"))
                })?;
                let rows = table.dirty_rows();
                self.update_rows_impl(table, rows, token).await
            }
            UpdateTarget::Table(table) => {
                let rows = table.dirty_rows();
                self.update_rows_impl(table, rows, token).await
            }
            UpdateTarget::Rows { table, rows } => {
                self.update_rows_impl(table, rows.to_vec(), token).await
            }
        }
    }

    /// Reconciles every dirty row of the named table in a data set.
    pub async fn update_data_set(
        &mut self,
        data_set: &mut DataSet,
        table: &str,
        token: &CancellationToken,
    ) -> Result<u64> {
        self.update(UpdateTarget::DataSet { data_set, table }, token).await
    }

    /// Reconciles every dirty row of one table.
    pub async fn update_table(&mut self, table: &mut Table, token: &CancellationToken) -> Result<u64> {
        self.update(UpdateTarget::Table(table), token).await
    }

    /// Reconciles an explicit set of rows, given by ordinal.
    pub async fn update_rows(
        &mut self,
        table: &mut Table,
        rows: &[usize],
        token: &CancellationToken,
    ) -> Result<u64> {
        self.update(UpdateTarget::Rows { table, rows }, token).await
    }
}

/// The shapes dirty rows can be selected from: a whole data set, a single
/// table, or an explicit row set.
pub enum UpdateTarget<'a> {
    DataSet {
        data_set: &'a mut DataSet,
        /// Source-side table name; resolved through the table mappings,
        /// falling back to the literal name.
        table: &'a str,
    },
    Table(&'a mut Table),
    Rows {
        table: &'a mut Table,
        rows: &'a [usize],
    },
}
