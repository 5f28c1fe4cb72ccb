use pretty_assertions::assert_eq;
use rowset::{
    dataset::{Column, RowState, Type},
    value::{SourceType, Value},
    CancellationToken, DataAdapter, DataSet, LoadOption, SchemaType, Table, TableMapping,
};
use tests::*;

fn users_table(name: &str) -> Table {
    let mut table = Table::new(name);
    table.add_column(Column::new("id", Type::I32)).unwrap();
    table.add_column(Column::new("name", Type::String)).unwrap();
    table
        .load_row(
            vec![Value::I32(1), Value::from("alice")],
            LoadOption::OverwriteChanges,
        )
        .unwrap();
    table
        .load_row(
            vec![Value::I32(2), Value::from("bob")],
            LoadOption::OverwriteChanges,
        )
        .unwrap();
    table
}

#[tokio::test]
async fn update_resolves_data_set_tables_through_mappings() {
    let conn = FakeConnection::new();
    let shared = conn.into_shared();

    let mut adapter = DataAdapter::new();
    adapter.update_command = Some(update(&shared));
    adapter
        .table_mappings
        .push(TableMapping::new("Table", "users"));

    let mut ds = DataSet::new();
    ds.add_table(users_table("users")).unwrap();
    ds.get_mut("users")
        .unwrap()
        .set_value(0, 1, Value::from("renamed"))
        .unwrap();

    let affected = adapter
        .update_data_set(&mut ds, "Table", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(affected, 1);
    assert_eq!(ds.get("users").unwrap().row(0).state(), RowState::Unchanged);
}

#[tokio::test]
async fn update_with_an_unknown_table_is_a_configuration_error() {
    let conn = FakeConnection::new();
    let shared = conn.into_shared();

    let mut adapter = DataAdapter::new();
    adapter.update_command = Some(update(&shared));

    let mut ds = DataSet::new();
    let err = adapter
        .update_data_set(&mut ds, "missing", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_configuration());
}

#[tokio::test]
async fn update_rows_reconciles_only_the_named_ordinals() {
    let conn = FakeConnection::new();
    let calls = conn.calls();
    let shared = conn.into_shared();

    let mut adapter = DataAdapter::new();
    adapter.update_command = Some(update(&shared));

    let mut table = users_table("users");
    table.set_value(0, 1, Value::from("renamed a")).unwrap();
    table.set_value(1, 1, Value::from("renamed b")).unwrap();

    let affected = adapter
        .update_rows(&mut table, &[1], &CancellationToken::new())
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
async fn update_rows_rejects_out_of_range_ordinals() {
    let conn = FakeConnection::new();
    let shared = conn.into_shared();

    let mut adapter = DataAdapter::new();
    adapter.update_command = Some(update(&shared));

    let mut table = users_table("users");
    let err = adapter
        .update_rows(&mut table, &[9], &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_configuration());
}

#[tokio::test]
async fn a_cancelled_token_stops_the_update_before_any_write() {
    let conn = FakeConnection::new();
    let calls = conn.calls();
    let shared = conn.into_shared();

    let mut adapter = DataAdapter::new();
    adapter.update_command = Some(update(&shared));

    let mut table = users_table("users");
    table.set_value(0, 1, Value::from("renamed")).unwrap();

    let token = CancellationToken::new();
    token.cancel();

    let err = adapter
        .update_table(&mut table, &token)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(table.row(0).state(), RowState::Modified);
}

#[tokio::test]
async fn mid_update_cancellation_keeps_rows_already_written() {
    let conn = FakeConnection::new();
    let calls = conn.calls();
    let shared = conn.into_shared();

    let mut adapter = DataAdapter::new();
    adapter.update_command = Some(update(&shared));

    let token = CancellationToken::new();
    let cancel = token.clone();
    adapter.on_row_updating(move |event| {
        if event.row == 0 {
            cancel.cancel();
        }
    });

    let mut table = users_table("users");
    table.set_value(0, 1, Value::from("renamed a")).unwrap();
    table.set_value(1, 1, Value::from("renamed b")).unwrap();

    let err = adapter.update_table(&mut table, &token).await.unwrap_err();
    assert!(err.is_cancelled());

    // The row written before the cancellation stands settled; the rest
    // stay dirty, and the connection still closes.
    assert_eq!(table.row(0).state(), RowState::Unchanged);
    assert_eq!(table.row(1).state(), RowState::Modified);
    assert_eq!(
        log_count(&calls, |c| matches!(c, DriverCall::Execute { .. })),
        1
    );
    assert_eq!(calls.lock().unwrap().last(), Some(&DriverCall::Close));
}

#[tokio::test]
async fn fill_schema_table_shapes_a_single_table() {
    let source = ScriptedSource::single(
        ScriptedSet::new(vec![
            ScriptedColumn::new("id", SourceType::I32).key(),
            ScriptedColumn::new("name", SourceType::String),
        ])
        .described(),
    );
    let conn = FakeConnection::new().with_reader(source);
    let shared = conn.into_shared();

    let mut adapter = DataAdapter::new();
    adapter.select_command = Some(select(&shared));

    let mut table = Table::new("users");
    let tables = adapter
        .fill_schema_table(&mut table, SchemaType::Mapped, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(tables, vec!["users".to_string()]);
    assert_eq!(table.columns().len(), 2);
    assert_eq!(table.primary_key(), Some(&[0usize][..]));
    assert!(table.rows().is_empty());
}

#[tokio::test]
async fn adapters_get_distinct_ids() {
    let a = DataAdapter::new();
    let b = DataAdapter::new();
    assert_ne!(a.id(), b.id());
}
