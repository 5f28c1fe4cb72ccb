use rowset_core::{Error, Result};

/// A declared correspondence between one source column and one cache
/// column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub source_column: String,
    pub dataset_column: String,
}

/// A declared correspondence between a source-side table identifier and a
/// cache table, with its column mappings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMapping {
    pub source_table: String,
    pub dataset_table: String,
    pub column_mappings: Vec<ColumnMapping>,
}

impl TableMapping {
    pub fn new(source_table: impl Into<String>, dataset_table: impl Into<String>) -> Self {
        Self {
            source_table: source_table.into(),
            dataset_table: dataset_table.into(),
            column_mappings: vec![],
        }
    }

    pub fn column(
        mut self,
        source_column: impl Into<String>,
        dataset_column: impl Into<String>,
    ) -> Self {
        self.column_mappings.push(ColumnMapping {
            source_column: source_column.into(),
            dataset_column: dataset_column.into(),
        });
        self
    }

    /// The mapped cache column for a source column, when one is declared.
    pub fn dataset_column(&self, source_column: &str) -> Option<&str> {
        self.column_mappings
            .iter()
            .find(|m| m.source_column == source_column)
            .map(|m| m.dataset_column.as_str())
    }
}

/// What to do when no mapping exists for a source table or column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingMappingAction {
    /// Map the source name through unchanged.
    #[default]
    Passthrough,

    /// Drop the unmapped table/column.
    Ignore,

    /// Fail the operation.
    Error,
}

/// What to do when a mapped cache table or column does not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingSchemaAction {
    /// Create the missing table/column.
    #[default]
    Add,

    /// Create it and propagate key information from the source schema.
    AddWithKey,

    /// Drop the table/column.
    Ignore,

    /// Fail the operation.
    Error,
}

/// Whether schema population applies table/column mappings or uses raw
/// source names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaType {
    /// Raw source names, mappings bypassed.
    Source,

    /// Names resolved through the configured mappings.
    #[default]
    Mapped,
}

/// The outcome of resolving a source table name through the mappings.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ResolvedTable<'a> {
    /// A declared mapping matched.
    Mapped(&'a TableMapping),

    /// No mapping declared; the source name passes through.
    Passthrough,
}

impl ResolvedTable<'_> {
    pub(crate) fn dataset_table<'b>(&'b self, source_table: &'b str) -> &'b str {
        match self {
            ResolvedTable::Mapped(m) => &m.dataset_table,
            ResolvedTable::Passthrough => source_table,
        }
    }

    /// Resolves one source column per the missing-mapping policy.
    /// `Ok(None)` means the column is dropped.
    pub(crate) fn resolve_column<'b>(
        &'b self,
        source_column: &'b str,
        action: MissingMappingAction,
    ) -> Result<Option<&'b str>> {
        let declared = match self {
            ResolvedTable::Mapped(m) => m.dataset_column(source_column),
            ResolvedTable::Passthrough => None,
        };

        if let Some(name) = declared {
            return Ok(Some(name));
        }

        match action {
            MissingMappingAction::Passthrough => Ok(Some(source_column)),
            MissingMappingAction::Ignore => Ok(None),
            MissingMappingAction::Error => Err(Error::mapping(format!(
                "no column mapping exists for source column '{source_column}'"
            ))),
        }
    }
}

/// Resolves a source table name. `Ok(None)` means the whole result set is
/// dropped.
pub(crate) fn resolve_table<'a>(
    mappings: &'a [TableMapping],
    source_table: &str,
    action: MissingMappingAction,
) -> Result<Option<ResolvedTable<'a>>> {
    if let Some(mapping) = mappings.iter().find(|m| m.source_table == source_table) {
        return Ok(Some(ResolvedTable::Mapped(mapping)));
    }

    match action {
        MissingMappingAction::Passthrough => Ok(Some(ResolvedTable::Passthrough)),
        MissingMappingAction::Ignore => Ok(None),
        MissingMappingAction::Error => Err(Error::mapping(format!(
            "no table mapping exists for source table '{source_table}'"
        ))),
    }
}

/// Disambiguates a name against already-taken names by numeric suffixing:
/// `name`, `name1`, `name2`, ...
pub(crate) fn unique_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    let mut n = 1usize;
    loop {
        let candidate = format!("{base}{n}");
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
