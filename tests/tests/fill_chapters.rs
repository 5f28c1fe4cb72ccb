use pretty_assertions::assert_eq;
use rowset::{
    value::{SourceType, Value},
    CancellationToken, DataAdapter, DataSet, Table,
};
use tests::*;

fn line_items(skus: &[&str]) -> ScriptedSource {
    let mut set = ScriptedSet::plain(&[("sku", SourceType::String)]);
    for sku in skus {
        set = set.row(vec![Value::from(*sku)]);
    }
    ScriptedSource::single(set)
}

fn orders_with_items() -> ScriptedSource {
    ScriptedSource::single(
        ScriptedSet::plain(&[("id", SourceType::I32), ("items", SourceType::Rows)])
            .chaptered_row(
                vec![Value::I32(10), Value::Null],
                vec![(1, line_items(&["a", "b"]))],
            )
            .chaptered_row(
                vec![Value::I32(20), Value::Null],
                vec![(1, line_items(&["c"]))],
            ),
    )
}

#[tokio::test]
async fn chaptered_fill_creates_child_table_and_relation() {
    let conn = FakeConnection::new().with_reader(orders_with_items());
    let shared = conn.into_shared();

    let mut adapter = DataAdapter::new();
    adapter.select_command = Some(select(&shared));

    let mut ds = DataSet::new();
    let count = adapter.fill(&mut ds, &CancellationToken::new()).await.unwrap();
    assert_eq!(count, 2);

    // The chaptered field became an auto-generated integer surrogate key.
    let parent = ds.get("Table").unwrap();
    assert_eq!(parent.column(1).name, "items");
    assert!(parent.column(1).auto_increment.is_some());
    assert!(parent.column(1).read_only);
    assert_eq!(parent.row(0).get(1), &Value::I32(0));
    assert_eq!(parent.row(1).get(1), &Value::I32(1));

    // Child rows carry their parent's key in the appended column.
    let child = ds.get("Tableitems").expect("child table");
    assert_eq!(child.columns().len(), 2);
    assert_eq!(child.column(0).name, "sku");
    assert_eq!(child.column(1).name, "items");
    assert_eq!(child.rows().len(), 3);
    assert_eq!(child.row(0).get(0), &Value::from("a"));
    assert_eq!(child.row(0).get(1), &Value::I32(0));
    assert_eq!(child.row(1).get(1), &Value::I32(0));
    assert_eq!(child.row(2).get(0), &Value::from("c"));
    assert_eq!(child.row(2).get(1), &Value::I32(1));

    assert_eq!(ds.relations().len(), 1);
    let relation = &ds.relations()[0];
    assert_eq!(relation.name, "Table_items");
    assert_eq!(relation.parent_table, "Table");
    assert_eq!(relation.parent_column, 1);
    assert_eq!(relation.child_table, "Tableitems");
    assert_eq!(relation.child_column, 1);
}

#[tokio::test]
async fn refilling_chapters_reuses_the_relation() {
    let conn = FakeConnection::new()
        .with_reader(orders_with_items())
        .with_reader(orders_with_items());
    let shared = conn.into_shared();

    let mut adapter = DataAdapter::new();
    adapter.select_command = Some(select(&shared));

    let mut ds = DataSet::new();
    let token = CancellationToken::new();
    adapter.fill(&mut ds, &token).await.unwrap();
    adapter.fill(&mut ds, &token).await.unwrap();

    assert_eq!(ds.relations().len(), 1);
}

#[tokio::test]
async fn fill_table_rejects_chaptered_sources() {
    let conn = FakeConnection::new().with_reader(orders_with_items());
    let shared = conn.into_shared();

    let mut adapter = DataAdapter::new();
    adapter.select_command = Some(select(&shared));

    let mut table = Table::new("orders");
    let err = adapter
        .fill_table(&mut table, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_mapping());
}
