use pretty_assertions::assert_eq;
use rowset::{
    dataset::{Column, RowState, Type},
    driver::Parameter,
    value::Value,
    CancellationToken, DataAdapter, Error, LoadOption, Table, UpdateStatus,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tests::*;

fn table_with_modified_rows(count: usize) -> Table {
    let mut table = Table::new("users");
    table.add_column(Column::new("id", Type::I32)).unwrap();
    table.add_column(Column::new("name", Type::String)).unwrap();
    for i in 0..count {
        table
            .load_row(
                vec![Value::I32(i as i32), Value::from(format!("user {i}"))],
                LoadOption::OverwriteChanges,
            )
            .unwrap();
        table
            .set_value(i, 1, Value::from(format!("user {i} edited")))
            .unwrap();
    }
    table
}

#[tokio::test]
async fn the_updating_hook_can_rewrite_bound_parameters() {
    let conn = FakeConnection::new();
    let calls = conn.calls();
    let shared = conn.into_shared();

    let mut adapter = DataAdapter::new();
    adapter.update_command =
        Some(update(&shared).parameter(Parameter::input("p_name", "name")));
    adapter.on_row_updating(|event| {
        event.command.parameters[0].value = Value::from("overridden");
    });

    let mut table = table_with_modified_rows(1);
    adapter
        .update_table(&mut table, &CancellationToken::new())
        .await
        .unwrap();

    let log = calls.lock().unwrap().clone();
    let bound = log.iter().find_map(|call| match call {
        DriverCall::Execute { parameters, .. } => Some(parameters.clone()),
        _ => None,
    });
    assert_eq!(bound, Some(vec![Value::from("overridden")]));
}

#[tokio::test]
async fn skip_current_row_leaves_the_row_dirty_and_unexecuted() {
    let conn = FakeConnection::new();
    let calls = conn.calls();
    let shared = conn.into_shared();

    let mut adapter = DataAdapter::new();
    adapter.update_command = Some(update(&shared));
    adapter.on_row_updating(|event| {
        if event.row == 0 {
            event.status = UpdateStatus::SkipCurrentRow;
        }
    });

    let mut table = table_with_modified_rows(2);
    let affected = adapter
        .update_table(&mut table, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(affected, 1);

    assert_eq!(table.row(0).state(), RowState::Modified);
    assert_eq!(table.row(1).state(), RowState::Unchanged);
    assert_eq!(
        log_count(&calls, |c| matches!(c, DriverCall::Execute { .. })),
        1
    );
}

#[tokio::test]
async fn an_updating_hook_error_fails_the_row() {
    let conn = FakeConnection::new();
    let calls = conn.calls();
    let shared = conn.into_shared();

    let mut adapter = DataAdapter::new();
    adapter.update_command = Some(update(&shared));
    adapter.on_row_updating(|event| {
        event.status = UpdateStatus::ErrorsOccurred;
        event.error = Some(Error::row("vetoed"));
    });

    let mut table = table_with_modified_rows(1);
    let err = adapter
        .update_table(&mut table, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("vetoed"));
    assert!(table.row(0).error().unwrap().contains("vetoed"));
    assert_eq!(
        log_count(&calls, |c| matches!(c, DriverCall::Execute { .. })),
        0
    );
}

#[tokio::test]
async fn the_updated_hook_can_clear_an_execution_error() {
    let conn = FakeConnection::new().with_execute(ExecOutcome::Fail("transient".into()));
    let shared = conn.into_shared();

    let mut adapter = DataAdapter::new();
    adapter.update_command = Some(update(&shared));
    adapter.on_row_updated(|event| {
        event.error = None;
    });

    let mut table = table_with_modified_rows(1);
    let affected = adapter
        .update_table(&mut table, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(affected, 1);
    assert_eq!(table.row(0).state(), RowState::Unchanged);
    assert!(!table.row(0).has_error());
}

#[tokio::test]
async fn an_updated_hook_skip_leaves_dirty_rows_uncounted() {
    let conn = FakeConnection::new();
    let calls = conn.calls();
    let shared = conn.into_shared();

    let mut adapter = DataAdapter::new();
    adapter.update_command = Some(update(&shared));
    adapter.on_row_updated(|event| {
        event.status = UpdateStatus::SkipCurrentRow;
    });

    let mut table = table_with_modified_rows(1);
    let affected = adapter
        .update_table(&mut table, &CancellationToken::new())
        .await
        .unwrap();

    // The command executed, but the skipped row was never settled.
    assert_eq!(affected, 0);
    assert_eq!(table.row(0).state(), RowState::Modified);
    assert_eq!(
        log_count(&calls, |c| matches!(c, DriverCall::Execute { .. })),
        1
    );
}

#[tokio::test]
async fn an_updated_hook_skip_counts_rows_already_settled() {
    let conn = FakeConnection::new().with_reader(
        ScriptedSource::single(
            ScriptedSet::plain(&[
                ("id", rowset::value::SourceType::I32),
                ("name", rowset::value::SourceType::String),
            ])
            .row(vec![Value::I32(7), Value::from("from the server")]),
        )
        .with_rows_affected(1),
    );
    let shared = conn.into_shared();

    let mut adapter = DataAdapter::new();
    adapter.insert_command = Some(
        insert(&shared)
            .feedback(rowset::driver::WriteFeedback::FirstReturnedRecord)
            .parameter(Parameter::input("p_name", "name")),
    );
    adapter.on_row_updated(|event| {
        event.status = UpdateStatus::SkipCurrentRow;
    });

    let mut table = table_with_modified_rows(0);
    table
        .add_row(vec![Value::Null, Value::from("carol")])
        .unwrap();

    let affected = adapter
        .update_table(&mut table, &CancellationToken::new())
        .await
        .unwrap();

    // The returned record already settled the row, so the skip still
    // counts it as handled.
    assert_eq!(affected, 1);
    assert_eq!(table.row(0).state(), RowState::Unchanged);
}

#[tokio::test]
async fn both_hooks_observe_every_dirty_row() {
    let conn = FakeConnection::new();
    let shared = conn.into_shared();

    let updating = Arc::new(AtomicUsize::new(0));
    let updated = Arc::new(AtomicUsize::new(0));

    let mut adapter = DataAdapter::new();
    adapter.update_command = Some(update(&shared));
    let counter = updating.clone();
    adapter.on_row_updating(move |_| {
        counter.fetch_add(1, Ordering::Relaxed);
    });
    let counter = updated.clone();
    adapter.on_row_updated(move |event| {
        assert_eq!(event.rows_affected, Some(1));
        counter.fetch_add(1, Ordering::Relaxed);
    });

    let mut table = table_with_modified_rows(3);
    adapter
        .update_table(&mut table, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(updating.load(Ordering::Relaxed), 3);
    assert_eq!(updated.load(Ordering::Relaxed), 3);
}
