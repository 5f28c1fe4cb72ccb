use super::{Column, Row, RowState, Type};
use crate::{value::Value, Error, Result};

/// How a materialized row is committed into a table that may already hold
/// a matching row (by primary key).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOption {
    /// Incoming values replace both versions; the row ends Unchanged.
    OverwriteChanges,

    /// Incoming values replace the original version only; local edits are
    /// kept.
    PreserveChanges,

    /// Incoming values replace the current version; the row is left dirty.
    Upsert,

    /// No key matching; every incoming row is appended as Added.
    Append,
}

/// A unique constraint over a set of columns, compared structurally so the
/// same constraint is never added twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueConstraint {
    /// Ordinals of the constrained columns, sorted.
    pub columns: Vec<usize>,
}

impl UniqueConstraint {
    pub fn new(mut columns: Vec<usize>) -> Self {
        columns.sort_unstable();
        Self { columns }
    }
}

/// A named, ordered collection of columns and rows, with zero-or-one
/// primary key and any number of unique constraints.
#[derive(Debug)]
pub struct Table {
    /// Name of the table
    pub name: String,

    columns: Vec<Column>,
    rows: Vec<Row>,
    primary_key: Option<Vec<usize>>,
    unique_constraints: Vec<UniqueConstraint>,
    loading: bool,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: vec![],
            rows: vec![],
            primary_key: None,
            unique_constraints: vec![],
            loading: false,
        }
    }

    // --- columns ---

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, ordinal: usize) -> &Column {
        &self.columns[ordinal]
    }

    pub fn column_mut(&mut self, ordinal: usize) -> &mut Column {
        &mut self.columns[ordinal]
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Appends a column, assigning the next dense ordinal. Existing rows
    /// are widened with null.
    pub fn add_column(&mut self, mut column: Column) -> Result<usize> {
        if self.column_index(&column.name).is_some() {
            return Err(Error::configuration(format!(
                "table '{}' already has a column named '{}'",
                self.name, column.name
            )));
        }

        let ordinal = self.columns.len();
        column.ordinal = ordinal;
        self.columns.push(column);

        for row in &mut self.rows {
            row.push_default();
        }

        Ok(ordinal)
    }

    // --- keys ---

    pub fn primary_key(&self) -> Option<&[usize]> {
        self.primary_key.as_deref()
    }

    pub fn set_primary_key(&mut self, columns: Vec<usize>) -> Result<()> {
        for &ordinal in &columns {
            if ordinal >= self.columns.len() {
                return Err(Error::configuration(format!(
                    "primary key column ordinal {ordinal} out of range for table '{}'",
                    self.name
                )));
            }
        }
        self.primary_key = Some(columns);
        Ok(())
    }

    pub fn unique_constraints(&self) -> &[UniqueConstraint] {
        &self.unique_constraints
    }

    /// Adds a unique constraint unless a structurally equal one exists.
    pub fn add_unique_constraint(&mut self, constraint: UniqueConstraint) {
        if !self.unique_constraints.contains(&constraint) {
            self.unique_constraints.push(constraint);
        }
    }

    // --- bulk load ---

    pub fn begin_load(&mut self) {
        self.loading = true;
    }

    pub fn end_load(&mut self) {
        self.loading = false;
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    // --- rows ---

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, ordinal: usize) -> &Row {
        &self.rows[ordinal]
    }

    pub fn row_mut(&mut self, ordinal: usize) -> &mut Row {
        &mut self.rows[ordinal]
    }

    /// Ordinals of rows eligible for reconciliation, in table order.
    pub fn dirty_rows(&self) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.state().is_dirty())
            .map(|(i, _)| i)
            .collect()
    }

    /// Appends a locally created row in the Added state.
    pub fn add_row(&mut self, values: Vec<Value>) -> Result<usize> {
        let values = self.prepare_values(values)?;
        self.rows.push(Row::new(values, RowState::Added));
        Ok(self.rows.len() - 1)
    }

    /// Commits one materialized row per the load option, matching existing
    /// rows by primary key when one is declared.
    pub fn load_row(&mut self, values: Vec<Value>, option: LoadOption) -> Result<usize> {
        let values = self.prepare_values(values)?;

        let existing = match option {
            LoadOption::Append => None,
            _ => self.find_by_key(&values),
        };

        let ordinal = match (option, existing) {
            (LoadOption::Append, _) | (LoadOption::Upsert, None) => {
                self.rows.push(Row::new(values, RowState::Added));
                self.rows.len() - 1
            }
            (LoadOption::OverwriteChanges | LoadOption::PreserveChanges, None) => {
                self.rows.push(Row::new(values, RowState::Unchanged));
                self.rows.len() - 1
            }
            (LoadOption::OverwriteChanges, Some(i)) => {
                let row = &mut self.rows[i];
                row.replace_all(values);
                row.accept_changes();
                row.set_state(RowState::Unchanged);
                row.clear_error();
                i
            }
            (LoadOption::PreserveChanges, Some(i)) => {
                let row = &mut self.rows[i];
                if row.state() == RowState::Unchanged {
                    row.replace_all(values);
                } else {
                    row.set_original(values);
                }
                i
            }
            (LoadOption::Upsert, Some(i)) => {
                let row = &mut self.rows[i];
                let was_unchanged = row.state() == RowState::Unchanged;
                if was_unchanged {
                    row.set_original(row.values().to_vec());
                    row.set_state(RowState::Modified);
                }
                row.replace_all(values);
                i
            }
        };

        Ok(ordinal)
    }

    /// Finds a non-detached row whose primary-key values equal those in
    /// `values`. Returns `None` when the table has no primary key.
    pub fn find_by_key(&self, values: &[Value]) -> Option<usize> {
        let pk = self.primary_key.as_deref()?;
        self.rows.iter().position(|row| {
            row.state() != RowState::Detached
                && pk.iter().all(|&ordinal| row.get(ordinal) == &values[ordinal])
        })
    }

    /// Assigns a value through the normal write path, refusing read-only
    /// columns and marking the row Modified.
    pub fn set_value(&mut self, row: usize, ordinal: usize, value: Value) -> Result<()> {
        let column = &self.columns[ordinal];
        if column.read_only {
            return Err(Error::row(format!(
                "column '{}' in table '{}' is read-only",
                column.name, self.name
            )));
        }
        self.check_value(ordinal, &value)?;
        self.rows[row].set(ordinal, value);
        Ok(())
    }

    /// Assigns a server-generated value, bypassing the read-only flag and
    /// leaving the row's state alone.
    pub fn write_back(&mut self, row: usize, ordinal: usize, value: Value) -> Result<()> {
        self.check_value(ordinal, &value)?;
        self.rows[row].overwrite(ordinal, value);
        Ok(())
    }

    pub fn accept_changes(&mut self) {
        for row in &mut self.rows {
            row.accept_changes();
        }
    }

    // Widens, defaults, generates auto-increment values, and validates a
    // value array against the table's columns.
    fn prepare_values(&mut self, mut values: Vec<Value>) -> Result<Vec<Value>> {
        values.resize(self.columns.len(), Value::Null);
        values.truncate(self.columns.len());

        for (ordinal, column) in self.columns.iter_mut().enumerate() {
            let value = &mut values[ordinal];

            if value.is_null() {
                if let Some(auto) = &mut column.auto_increment {
                    *value = match column.ty {
                        Type::I16 => Value::I16(auto.next_value() as i16),
                        Type::I64 => Value::I64(auto.next_value()),
                        _ => Value::I32(auto.next_value() as i32),
                    };
                } else if let Some(default) = &column.default {
                    *value = default.clone();
                }
            } else if let Some(auto) = &mut column.auto_increment {
                match value {
                    Value::I16(v) => auto.observe(*v as i64),
                    Value::I32(v) => auto.observe(*v as i64),
                    Value::I64(v) => auto.observe(*v),
                    _ => {}
                }
            }
        }

        for ordinal in 0..self.columns.len() {
            self.check_value(ordinal, &values[ordinal])?;
        }

        Ok(values)
    }

    fn check_value(&self, ordinal: usize, value: &Value) -> Result<()> {
        let column = &self.columns[ordinal];

        if value.is_null() {
            if !column.nullable {
                return Err(Error::row(format!(
                    "column '{}' in table '{}' does not allow nulls",
                    column.name, self.name
                )));
            }
            return Ok(());
        }

        if !column.ty.accepts(value) {
            return Err(Error::row(format!(
                "value of type {} is not valid for column '{}' ({:?}) in table '{}'",
                value.type_name(),
                column.name,
                column.ty,
                self.name
            )));
        }

        if let (Some(max), Value::String(s)) = (column.max_length, value) {
            if s.len() > max {
                return Err(Error::row(format!(
                    "value exceeds max length {} for column '{}' in table '{}'",
                    max, column.name, self.name
                )));
            }
        }

        Ok(())
    }
}
