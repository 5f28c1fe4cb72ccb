use crate::{adapter::DataAdapter, batch::BatchCommandInfo, guard::ConnectionGuard, reader::ReaderContainer};
use rowset_core::{
    dataset::{RowState, RowVersion, Table},
    driver::{Command, SharedConnection, StatementType},
    value::Value,
    Error, Result,
};

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A hook's verdict on one row's write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateStatus {
    /// Proceed normally.
    #[default]
    Continue,

    /// Treat the row as failed, using the event's error (or a generic one).
    ErrorsOccurred,

    /// Leave this row alone and move to the next.
    SkipCurrentRow,

    /// Leave this row alone and stop processing further rows. Commands
    /// already sitting in an in-flight batch still execute.
    SkipAllRemainingRows,
}

/// One row's write, as seen by the updating/updated hooks. Hooks may
/// rewrite the command, flip the status, and set or clear the error.
pub struct UpdateEvent {
    /// Ordinal of the row in its table.
    pub row: usize,

    pub statement_type: StatementType,

    /// The bound command about to execute (updating) or just executed
    /// (updated).
    pub command: Command,

    pub status: UpdateStatus,

    pub error: Option<Error>,

    /// Affected-row count, populated for the updated hook.
    pub rows_affected: Option<u64>,
}

/// Per-statement-type connection guards, so one update pass opens each
/// distinct connection once and closes only what it opened.
struct ConnectionSlots {
    slots: [Option<ConnectionGuard>; StatementType::COUNT],
}

impl ConnectionSlots {
    fn new() -> Self {
        Self {
            slots: Default::default(),
        }
    }

    /// Opens the connection for `statement_type`'s slot, unless another
    /// slot already guards the same connection. A slot whose command moved
    /// to a different connection releases the old one before opening the
    /// new one.
    async fn ensure_open(
        &mut self,
        statement_type: StatementType,
        connection: &SharedConnection,
        token: &CancellationToken,
    ) -> Result<()> {
        let index = statement_type.index();
        if let Some(guard) = &mut self.slots[index] {
            if Arc::ptr_eq(guard.connection(), connection) {
                return Ok(());
            }
            guard.finish().await?;
            self.slots[index] = None;
        }
        if self
            .slots
            .iter()
            .flatten()
            .any(|guard| Arc::ptr_eq(guard.connection(), connection))
        {
            return Ok(());
        }

        let mut guard = ConnectionGuard::new(connection.clone());
        guard.open(token).await?;
        self.slots[index] = Some(guard);
        Ok(())
    }

    /// Closes every guarded connection. All guards finish even when one
    /// fails; the first error is reported.
    async fn close_all(&mut self) -> Result<()> {
        let mut first_err = None;
        for guard in self.slots.iter_mut().flatten() {
            if let Err(err) = guard.finish().await {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Outcome of classifying a set of executed commands.
struct Classified {
    accepted: u64,
    stop: bool,
}

impl DataAdapter {
    pub(crate) async fn update_rows_impl(
        &mut self,
        table: &mut Table,
        rows: Vec<usize>,
        token: &CancellationToken,
    ) -> Result<u64> {
        let mut slots = ConnectionSlots::new();
        let result = self.run_update(table, &rows, &mut slots, token).await;

        // Connections close on every path, cancellation included.
        let close = slots.close_all().await;
        let accepted = result?;
        close?;

        tracing::debug!(adapter = self.id(), table = %table.name, accepted, "update finished");
        Ok(accepted)
    }

    async fn run_update(
        &mut self,
        table: &mut Table,
        rows: &[usize],
        slots: &mut ConnectionSlots,
        token: &CancellationToken,
    ) -> Result<u64> {
        let batching = self.update_batch_size != 1;
        let flush_at = if self.update_batch_size == 0 {
            usize::MAX
        } else {
            self.update_batch_size
        };

        let mut accepted: u64 = 0;
        let mut pending: Vec<BatchCommandInfo> = vec![];
        let mut pending_commands: Vec<Command> = vec![];
        let mut batch_connection: Option<SharedConnection> = None;
        let mut stop = false;

        for &row in rows {
            if stop {
                break;
            }
            if token.is_cancelled() {
                return Err(Error::cancelled());
            }
            if row >= table.rows().len() {
                return Err(Error::configuration(format!(
                    "row ordinal {row} is out of range for table '{}'",
                    table.name
                )));
            }

            let statement_type = match table.row(row).state() {
                RowState::Added => StatementType::Insert,
                RowState::Modified => StatementType::Update,
                RowState::Deleted => StatementType::Delete,
                RowState::Unchanged | RowState::Detached => continue,
            };

            let mut command = self.command_for(statement_type)?.clone();
            bind_parameters(&mut command, table, row, statement_type);

            let mut event = UpdateEvent {
                row,
                statement_type,
                command,
                status: UpdateStatus::Continue,
                error: None,
                rows_affected: None,
            };
            if let Some(hook) = self.row_updating.as_mut() {
                hook(&mut event);
            }
            match event.status {
                UpdateStatus::Continue => {}
                UpdateStatus::ErrorsOccurred => {
                    let err = event.error.take().unwrap_or_else(|| {
                        Error::row("row update rejected by the updating hook")
                    });
                    self.fail_row(table, row, err)?;
                    continue;
                }
                UpdateStatus::SkipCurrentRow | UpdateStatus::SkipAllRemainingRows => {
                    // A hook that resolved the row itself (the row is no
                    // longer dirty) counts it as handled.
                    if !table.row(row).state().is_dirty() {
                        accepted += 1;
                    }
                    if event.status == UpdateStatus::SkipAllRemainingRows {
                        stop = true;
                    }
                    continue;
                }
            }
            command = event.command;

            if batching {
                if command.feedback.wants_first_record() {
                    return Err(Error::configuration(
                        "first-returned-record feedback is incompatible with batched updates",
                    ));
                }

                // A command on a different connection flushes the batch in
                // flight before starting a new one.
                if let Some(conn) = batch_connection.clone() {
                    if !Arc::ptr_eq(&conn, &command.connection) {
                        let outcome = self
                            .flush_batch(table, &conn, &mut pending, &mut pending_commands)
                            .await?;
                        accepted += outcome.accepted;
                        if outcome.stop {
                            return Ok(accepted);
                        }
                        batch_connection = None;
                    }
                }

                slots
                    .ensure_open(StatementType::Batch, &command.connection, token)
                    .await?;
                let command_id = {
                    let mut conn = command.connection.lock().await;
                    let executor = conn.batch().ok_or_else(|| {
                        Error::configuration("connection does not support batched updates")
                    })?;
                    if pending.is_empty() {
                        executor.clear();
                    }
                    executor.append(&command)?
                };

                let mut info = BatchCommandInfo::new(
                    row,
                    statement_type,
                    command.feedback,
                    command.parameters.len(),
                );
                info.command_id = Some(command_id);
                batch_connection.get_or_insert_with(|| command.connection.clone());
                pending.push(info);
                pending_commands.push(command);

                if pending.len() >= flush_at {
                    let conn = match &batch_connection {
                        Some(conn) => conn.clone(),
                        None => continue,
                    };
                    let outcome = self
                        .flush_batch(table, &conn, &mut pending, &mut pending_commands)
                        .await?;
                    accepted += outcome.accepted;
                    if outcome.stop {
                        return Ok(accepted);
                    }
                }
            } else {
                slots
                    .ensure_open(statement_type, &command.connection, token)
                    .await?;
                let mut info = BatchCommandInfo::new(
                    row,
                    statement_type,
                    command.feedback,
                    command.parameters.len(),
                );
                if let Err(err) = self.exec_single(table, &mut command, &mut info).await {
                    if !err.is_recoverable() {
                        return Err(err);
                    }
                    info.error = Some(err.to_string());
                }

                let outcome = self.classify(table, vec![info], vec![command])?;
                accepted += outcome.accepted;
                if outcome.stop {
                    return Ok(accepted);
                }
            }
        }

        if !pending.is_empty() {
            if let Some(conn) = batch_connection.clone() {
                let outcome = self
                    .flush_batch(table, &conn, &mut pending, &mut pending_commands)
                    .await?;
                accepted += outcome.accepted;
            }
        }

        Ok(accepted)
    }

    fn command_for(&self, statement_type: StatementType) -> Result<&Command> {
        let command = match statement_type {
            StatementType::Insert => &self.insert_command,
            StatementType::Update => &self.update_command,
            StatementType::Delete => &self.delete_command,
            StatementType::Select | StatementType::Batch => &None,
        };
        command.as_ref().ok_or_else(|| {
            Error::configuration(format!(
                "update requires a configured {} command",
                match statement_type {
                    StatementType::Insert => "insert",
                    StatementType::Update => "update",
                    StatementType::Delete => "delete",
                    _ => "write",
                }
            ))
        })
    }

    /// Executes one row's command on its own. First-returned-record
    /// feedback routes through a reader so the returned record refreshes
    /// the row; everything else is a plain non-query execute.
    async fn exec_single(
        &mut self,
        table: &mut Table,
        command: &mut Command,
        info: &mut BatchCommandInfo,
    ) -> Result<()> {
        if command.feedback.wants_first_record()
            && command.statement_type != StatementType::Delete
        {
            let reader = {
                let mut conn = command.connection.lock().await;
                conn.execute_reader(command, self.value_variant()).await?
            };
            let mut reader = ReaderContainer::new(reader);

            let result = copy_first_record(table, info.row, &mut reader).await;
            let close = reader.close().await;
            result?;
            close?;

            // The count is only final once the cursor has drained.
            info.rows_affected = reader.rows_affected();
        } else {
            // Execute writes output parameters back into the command, so
            // the handle is cloned out before the connection is locked.
            let connection = command.connection.clone();
            let affected = {
                let mut conn = connection.lock().await;
                conn.execute(command).await?
            };
            info.rows_affected = Some(affected);
        }
        Ok(())
    }

    /// Executes the in-flight batch, records per-command results into the
    /// ledger, then classifies. A batch-wide failure marks every pending
    /// row failed.
    async fn flush_batch(
        &mut self,
        table: &mut Table,
        connection: &SharedConnection,
        pending: &mut Vec<BatchCommandInfo>,
        commands: &mut Vec<Command>,
    ) -> Result<Classified> {
        if pending.is_empty() {
            return Ok(Classified {
                accepted: 0,
                stop: false,
            });
        }

        let mut infos = std::mem::take(pending);
        let mut batch_commands = std::mem::take(commands);

        {
            let mut conn = connection.lock().await;
            let executor = conn.batch().ok_or_else(|| {
                Error::configuration("connection does not support batched updates")
            })?;

            match executor.execute().await {
                Ok(_total) => {
                    for (info, command) in infos.iter_mut().zip(batch_commands.iter_mut()) {
                        let Some(id) = info.command_id else { continue };
                        info.rows_affected = executor.rows_affected(id)?;
                        if command.feedback.wants_output_parameters() {
                            let count = info.parameter_count;
                            for (index, parameter) in
                                command.parameters.iter_mut().enumerate().take(count)
                            {
                                if parameter.direction.is_output() {
                                    parameter.value = executor.parameter(id, index)?;
                                }
                            }
                        }
                    }
                }
                Err(err) => {
                    if !err.is_recoverable() {
                        return Err(err);
                    }
                    let message = err.to_string();
                    for info in infos.iter_mut() {
                        info.error = Some(message.clone());
                    }
                }
            }
        }

        self.classify(table, infos, batch_commands)
    }

    /// Settles each executed command against its row: runs the updated
    /// hook, records errors, detects concurrency violations, writes
    /// output parameters back, and commits successful rows.
    fn classify(
        &mut self,
        table: &mut Table,
        infos: Vec<BatchCommandInfo>,
        commands: Vec<Command>,
    ) -> Result<Classified> {
        let mut accepted = 0;
        let mut stop = false;
        let mut violations: Vec<usize> = vec![];

        for (mut info, command) in infos.into_iter().zip(commands) {
            let had_error = info.error.is_some();
            let mut event = UpdateEvent {
                row: info.row,
                statement_type: info.statement_type,
                command,
                status: UpdateStatus::Continue,
                error: info.error.take().map(Error::driver),
                rows_affected: info.rows_affected,
            };
            if let Some(hook) = self.row_updated.as_mut() {
                hook(&mut event);
            }

            match event.status {
                UpdateStatus::Continue => {}
                UpdateStatus::ErrorsOccurred => {
                    let err = event.error.take().unwrap_or_else(|| {
                        Error::row("row update rejected by the updated hook")
                    });
                    self.fail_row(table, info.row, err)?;
                    continue;
                }
                UpdateStatus::SkipCurrentRow | UpdateStatus::SkipAllRemainingRows => {
                    // A hook that resolved the row itself (the row is no
                    // longer dirty) counts it as handled.
                    if !table.row(info.row).state().is_dirty() {
                        accepted += 1;
                    }
                    if event.status == UpdateStatus::SkipAllRemainingRows {
                        stop = true;
                    }
                    continue;
                }
            }

            // A hook that clears the error has resolved the failure.
            if let Some(err) = event.error {
                self.fail_row(table, info.row, err)?;
                continue;
            }

            // A hook that cleared an execution error has resolved the row;
            // its unknown affected count is not a violation.
            if !had_error && info.is_concurrency_violation() {
                table.row_mut(info.row).set_error(format!(
                    "concurrency violation: the {} statement affected 0 of the expected 1 records",
                    match info.statement_type {
                        StatementType::Delete => "delete",
                        _ => "update",
                    }
                ));
                violations.push(info.row);
                continue;
            }

            if info.statement_type != StatementType::Delete
                && event.command.feedback.wants_output_parameters()
            {
                // An insert that reached the source settles before the
                // generated values are written back, so they survive as
                // current values rather than pending edits.
                if info.statement_type == StatementType::Insert
                    && info.rows_affected.unwrap_or(0) > 0
                {
                    table.row_mut(info.row).accept_changes();
                }
                apply_output_parameters(table, info.row, &event.command)?;
            }

            if self.accept_changes_during_update {
                let row = table.row_mut(info.row);
                row.clear_error();
                row.accept_changes();
            }
            accepted += 1;
        }

        if !violations.is_empty() {
            let err = Error::concurrency_violation(
                format!(
                    "{} row(s) affected 0 of the expected 1 records",
                    violations.len()
                ),
                violations,
            );
            if !self.continue_update_on_error {
                return Err(err);
            }
            tracing::debug!(adapter = self.id(), %err, "continuing past concurrency violation");
        }

        Ok(Classified { accepted, stop })
    }

    /// Records a row failure; halts the whole pass unless the adapter is
    /// configured to keep going.
    fn fail_row(&self, table: &mut Table, row: usize, err: Error) -> Result<()> {
        table.row_mut(row).set_error(err.to_string());
        if self.continue_update_on_error {
            tracing::debug!(adapter = self.id(), row, %err, "continuing past row failure");
            Ok(())
        } else {
            Err(err)
        }
    }
}

/// Binds a command's input parameters from the row's values. Inserts read
/// the current version and deletes the original, whatever the parameter
/// declares; updates honor each parameter's declared version.
fn bind_parameters(command: &mut Command, table: &Table, row: usize, statement_type: StatementType) {
    for parameter in &mut command.parameters {
        if !parameter.direction.is_input() {
            parameter.value = Value::Null;
            continue;
        }
        let Some(column) = &parameter.source_column else {
            continue;
        };
        let Some(ordinal) = table.column_index(column) else {
            parameter.value = Value::Null;
            continue;
        };

        let version = match statement_type {
            StatementType::Insert => RowVersion::Current,
            StatementType::Delete => RowVersion::Original,
            _ => parameter.source_version,
        };
        let value = table.row(row).version(ordinal, version).clone();

        parameter.value = if parameter.source_null_mapping {
            Value::I32(if value.is_null() { 1 } else { 0 })
        } else {
            value
        };
    }
}

/// Copies server-generated output parameter values back onto the row's
/// mapped columns, bypassing read-only enforcement.
fn apply_output_parameters(table: &mut Table, row: usize, command: &Command) -> Result<()> {
    for parameter in &command.parameters {
        if !parameter.direction.is_output() || parameter.value.is_null() {
            continue;
        }
        let Some(column) = &parameter.source_column else {
            continue;
        };
        if let Some(ordinal) = table.column_index(column) {
            table.write_back(row, ordinal, parameter.value.clone())?;
        }
    }
    Ok(())
}

/// Refreshes the row from the first record the command's cursor returned,
/// matching returned fields to columns by name.
async fn copy_first_record(
    table: &mut Table,
    row: usize,
    reader: &mut ReaderContainer,
) -> Result<()> {
    while reader.field_count() == 0 {
        if !reader.advance_result_set().await? {
            return Ok(());
        }
    }
    if !reader.advance_row().await? {
        return Ok(());
    }

    // The write reached the source, so the pending edit settles first and
    // the returned values land as the row's current values.
    table.row_mut(row).accept_changes();

    let mut values = vec![Value::Null; reader.field_count()];
    reader.get_values(&mut values)?;
    for (index, value) in values.into_iter().enumerate() {
        let name = reader.field_name(index)?.to_string();
        if let Some(ordinal) = table.column_index(&name) {
            table.write_back(row, ordinal, value)?;
        }
    }
    Ok(())
}
