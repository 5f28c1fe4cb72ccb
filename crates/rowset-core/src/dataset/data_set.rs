use super::{Relation, Table};
use crate::{Error, Result};

use indexmap::IndexMap;

/// An ordered collection of named tables plus the relations linking them.
#[derive(Debug, Default)]
pub struct DataSet {
    tables: IndexMap<String, Table>,
    relations: Vec<Relation>,
}

impl DataSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tables(&self) -> impl ExactSizeIterator<Item = &Table> {
        self.tables.values()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(name)
    }

    /// The first table in insertion order, if any.
    pub fn first(&self) -> Option<&Table> {
        self.tables.values().next()
    }

    pub fn add_table(&mut self, table: Table) -> Result<&mut Table> {
        if self.tables.contains_key(&table.name) {
            return Err(Error::configuration(format!(
                "data set already contains a table named '{}'",
                table.name
            )));
        }
        let name = table.name.clone();
        self.tables.insert(name.clone(), table);
        Ok(self.tables.get_mut(&name).unwrap())
    }

    /// Returns the named table, creating an empty one if absent.
    pub fn get_or_create(&mut self, name: &str) -> &mut Table {
        self.tables
            .entry(name.to_string())
            .or_insert_with(|| Table::new(name))
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn has_relation(&self, name: &str) -> bool {
        self.relations.iter().any(|r| r.name == name)
    }

    /// Adds a relation unless one with the same name already exists.
    pub fn add_relation(&mut self, relation: Relation) {
        if !self.has_relation(&relation.name) {
            self.relations.push(relation);
        }
    }

    /// Accepts pending edits on every table.
    pub fn accept_changes(&mut self) {
        for table in self.tables.values_mut() {
            table.accept_changes();
        }
    }
}
