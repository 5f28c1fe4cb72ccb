/// A named parent/child link between two tables, pairing a parent column
/// with the child column holding the same value.
///
/// Created lazily the first time a chaptered column is materialized and
/// never duplicated; the set is checked by name before insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub name: String,
    pub parent_table: String,
    pub parent_column: usize,
    pub child_table: String,
    pub child_column: usize,
}

impl Relation {
    pub fn new(
        name: impl Into<String>,
        parent_table: impl Into<String>,
        parent_column: usize,
        child_table: impl Into<String>,
        child_column: usize,
    ) -> Self {
        Self {
            name: name.into(),
            parent_table: parent_table.into(),
            parent_column,
            child_table: child_table.into(),
            child_column,
        }
    }
}
