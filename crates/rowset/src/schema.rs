use crate::{
    mapping::{self, MissingMappingAction, MissingSchemaAction, TableMapping},
    reader::ReaderContainer,
};
use rowset_core::{
    dataset::{Column, DataSet, Relation, Table, Type, UniqueConstraint},
    value::{SourceType, Value},
    Error, Result,
};

use std::collections::HashSet;

/// Where materialized rows land: a whole data set, or one explicit table.
pub(crate) enum FillTarget<'a> {
    DataSet(&'a mut DataSet),
    Table(&'a mut Table),
}

impl FillTarget<'_> {
    /// Chapters create child tables and relations, which need a data set.
    pub(crate) fn supports_chapters(&self) -> bool {
        matches!(self, FillTarget::DataSet(_))
    }

    /// Locates the destination table, creating it when the schema policy
    /// allows. `Ok(None)` means the result set is dropped.
    fn resolve_table(&mut self, name: &str, action: MissingSchemaAction) -> Result<Option<()>> {
        match self {
            FillTarget::Table(_) => Ok(Some(())),
            FillTarget::DataSet(ds) => {
                if ds.get(name).is_some() {
                    return Ok(Some(()));
                }
                match action {
                    MissingSchemaAction::Add | MissingSchemaAction::AddWithKey => {
                        ds.add_table(Table::new(name))?;
                        Ok(Some(()))
                    }
                    MissingSchemaAction::Ignore => Ok(None),
                    MissingSchemaAction::Error => Err(Error::mapping(format!(
                        "table '{name}' does not exist and MissingSchemaAction is Error"
                    ))),
                }
            }
        }
    }

    pub(crate) fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        match self {
            FillTarget::Table(t) => Ok(t),
            FillTarget::DataSet(ds) => ds
                .get_mut(name)
                .ok_or_else(|| Error::mapping(format!("table '{name}' is not in the data set"))),
        }
    }

    pub(crate) fn add_relation(&mut self, relation: Relation) {
        if let FillTarget::DataSet(ds) = self {
            ds.add_relation(relation);
        }
    }
}

/// Mapping policies in effect for one fill/schema call.
#[derive(Clone, Copy)]
pub(crate) struct SchemaConfig<'a> {
    pub mappings: &'a [TableMapping],
    pub missing_mapping: MissingMappingAction,
    pub missing_schema: MissingSchemaAction,
    /// False for `SchemaType::Source`: raw names, mappings bypassed.
    pub use_mappings: bool,
    /// Propagate key/unique metadata onto the destination table.
    pub with_key_info: bool,
}

/// Context handed down when materializing a chaptered (nested) result set:
/// identifies the parent column and carries the parent row's chapter key.
pub(crate) struct ChapterContext {
    pub parent_table: String,
    pub parent_column: usize,
    /// The chaptered field's name on the parent source.
    pub column_name: String,
    /// The parent row's generated surrogate key.
    pub value: Value,
}

/// How raw source rows translate into destination rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MapMode {
    /// Source and destination ordinals align; rows copy straight through.
    ExactMatch,

    /// Destination is wider or narrower than the source.
    DifferentSize,

    /// Same width, but ordinals are permuted.
    Reordered,

    /// At least one source ordinal is a chaptered column.
    Chapters,
}

/// The per-result-set resolution of source ordinals to destination
/// columns. Built once when a result set starts, discarded when its rows
/// are drained.
pub(crate) struct SchemaMapping {
    /// Resolved destination table name.
    pub table_name: String,

    pub mode: MapMode,

    /// Per source ordinal: destination ordinal, or `None` when dropped.
    index_map: Vec<Option<usize>>,

    /// Per source ordinal: true when the field is a nested row source.
    chapters: Vec<bool>,

    /// Per source ordinal: true when values need XML conversion.
    xml: Vec<bool>,

    /// Destination ordinal of the chapter-key column, when filling a
    /// child result set.
    chapter_ordinal: Option<usize>,
    chapter_value: Value,

    /// Raw row buffer, sized for the wider of source row and destination
    /// row.
    scratch: Vec<Value>,
    source_fields: usize,
}

impl SchemaMapping {
    /// Resolves the destination table and column map for the reader's
    /// current result set. `Ok(None)` means the result set is unmapped and
    /// its rows must not be materialized.
    pub(crate) fn build(
        cfg: &SchemaConfig<'_>,
        target: &mut FillTarget<'_>,
        source_table: &str,
        reader: &mut ReaderContainer,
        chapter: Option<&ChapterContext>,
    ) -> Result<Option<SchemaMapping>> {
        let resolved = if cfg.use_mappings {
            match mapping::resolve_table(cfg.mappings, source_table, cfg.missing_mapping)? {
                Some(resolved) => resolved,
                None => return Ok(None),
            }
        } else {
            mapping::ResolvedTable::Passthrough
        };

        let table_name = match target {
            FillTarget::Table(t) => t.name.clone(),
            FillTarget::DataSet(_) => resolved.dataset_table(source_table).to_string(),
        };

        if target.resolve_table(&table_name, cfg.missing_schema)?.is_none() {
            return Ok(None);
        }

        let source_columns = Self::source_columns(reader)?;
        let source_fields = reader.field_count();

        let mut index_map = vec![None; source_fields];
        let mut chapters = vec![false; source_fields];
        let mut xml = vec![false; source_fields];
        let mut key_candidates: Vec<usize> = vec![];
        let mut key_dropped = false;
        let mut unique_candidates: Vec<(usize, bool)> = vec![];
        let mut claimed: HashSet<String> = HashSet::new();

        let chapters_supported = target.supports_chapters();
        let table = target.table_mut(&table_name)?;

        for col in &source_columns {
            if col.ordinal >= source_fields {
                continue;
            }
            let is_chapter = col.ty.is_chapter();
            if is_chapter {
                if !chapters_supported {
                    return Err(Error::mapping(format!(
                        "chaptered source column '{}' requires a data set target",
                        col.name
                    )));
                }
                chapters[col.ordinal] = true;
            }
            if col.ty == SourceType::Xml {
                xml[col.ordinal] = true;
            }

            let dest_name = if cfg.use_mappings {
                resolved.resolve_column(&col.name, cfg.missing_mapping)?
            } else {
                Some(col.name.as_str())
            };

            let Some(dest_name) = dest_name else {
                if col.is_key {
                    key_dropped = true;
                }
                continue;
            };

            // Duplicate source names map to suffixed destination names.
            let dest_name = mapping::unique_name(dest_name, |n| claimed.contains(n));
            claimed.insert(dest_name.clone());

            let dest = match table.column_index(&dest_name) {
                Some(dest) => {
                    if is_chapter && !table.column(dest).is_chapter_key() {
                        return Err(Error::mapping(format!(
                            "chaptered source column '{}' maps to existing column '{}' in \
                             table '{}', which is not an integer auto-increment column",
                            col.name, dest_name, table.name
                        )));
                    }
                    Some(dest)
                }
                None => match cfg.missing_schema {
                    MissingSchemaAction::Ignore => None,
                    MissingSchemaAction::Error => {
                        return Err(Error::mapping(format!(
                            "source column '{}' has no corresponding column in table '{}' \
                             and MissingSchemaAction is Error",
                            col.name, table.name
                        )))
                    }
                    MissingSchemaAction::Add | MissingSchemaAction::AddWithKey => {
                        Some(table.add_column(col.destination_column(&dest_name, is_chapter))?)
                    }
                },
            };

            index_map[col.ordinal] = dest;

            match dest {
                Some(dest) if cfg.with_key_info => {
                    if col.is_key {
                        key_candidates.push(dest);
                    } else if col.is_unique {
                        unique_candidates.push((dest, col.nullable));
                    }
                }
                Some(_) => {}
                None => {
                    if col.is_key {
                        key_dropped = true;
                    }
                }
            }
        }

        // A dropped key column abandons the key entirely.
        if cfg.with_key_info && !key_dropped {
            if !key_candidates.is_empty() {
                if table.primary_key().is_none() {
                    table.set_primary_key(key_candidates)?;
                }
            } else if !unique_candidates.is_empty() {
                let columns: Vec<usize> = unique_candidates.iter().map(|&(c, _)| c).collect();
                let all_non_nullable = unique_candidates.iter().all(|&(_, nullable)| !nullable);
                if all_non_nullable && table.primary_key().is_none() {
                    table.set_primary_key(columns)?;
                } else {
                    table.add_unique_constraint(UniqueConstraint::new(columns));
                }
            }
        }

        // Child side of a chapter: a column holding the parent's chapter
        // key, plus the parent/child relation (created once).
        let mut chapter_ordinal = None;
        let mut chapter_value = Value::Null;
        if let Some(ch) = chapter {
            let dest = match table.column_index(&ch.column_name) {
                Some(i) if table.column(i).ty.is_integer() => i,
                Some(_) => {
                    let name =
                        mapping::unique_name(&ch.column_name, |n| table.column_index(n).is_some());
                    table.add_column(Column::new(name, Type::I32))?
                }
                None => table.add_column(Column::new(ch.column_name.clone(), Type::I32))?,
            };
            chapter_ordinal = Some(dest);
            chapter_value = ch.value.clone();

            let relation_name = format!("{}_{}", ch.parent_table, ch.column_name);
            target.add_relation(Relation::new(
                relation_name,
                ch.parent_table.clone(),
                ch.parent_column,
                table_name.clone(),
                dest,
            ));
        }

        if index_map.iter().all(Option::is_none) && chapter_ordinal.is_none() {
            // Nothing mapped; the whole result set is unmapped.
            return Ok(None);
        }

        let table = target.table_mut(&table_name)?;
        let dest_width = table.columns().len();
        let identity = index_map
            .iter()
            .enumerate()
            .all(|(i, m)| *m == Some(i));
        let has_xml = xml.iter().any(|&x| x);

        let mode = if chapters.iter().any(|&c| c) {
            MapMode::Chapters
        } else if dest_width != source_fields || chapter_ordinal.is_some() {
            MapMode::DifferentSize
        } else if !identity || has_xml {
            MapMode::Reordered
        } else {
            MapMode::ExactMatch
        };

        tracing::debug!(
            table = %table_name,
            mode = ?mode,
            source_fields,
            dest_width,
            "resolved schema mapping"
        );

        Ok(Some(SchemaMapping {
            table_name,
            mode,
            index_map,
            chapters,
            xml,
            chapter_ordinal,
            chapter_value,
            scratch: vec![Value::Null; source_fields.max(dest_width)],
            source_fields,
        }))
    }

    fn source_columns(reader: &mut ReaderContainer) -> Result<Vec<SourceColumn>> {
        if let Some(mut described) = reader.schema_description()? {
            described.retain(|c| !c.is_hidden);
            described.sort_by_key(|c| c.ordinal);
            return Ok(described
                .into_iter()
                .map(|c| SourceColumn {
                    ordinal: c.ordinal,
                    name: c.name,
                    ty: c.ty,
                    size: c.size,
                    nullable: c.nullable,
                    is_key: c.is_key,
                    is_unique: c.is_unique,
                    is_auto_increment: c.is_auto_increment,
                    is_read_only: c.is_read_only,
                })
                .collect());
        }

        (0..reader.field_count())
            .map(|ordinal| {
                Ok(SourceColumn {
                    ordinal,
                    name: reader.field_name(ordinal)?.to_string(),
                    ty: reader.field_type(ordinal)?,
                    size: None,
                    nullable: true,
                    is_key: false,
                    is_unique: false,
                    is_auto_increment: false,
                    is_read_only: false,
                })
            })
            .collect()
    }

    /// Buffer for the reader's raw row values.
    pub(crate) fn scratch_mut(&mut self) -> &mut [Value] {
        &mut self.scratch[..self.source_fields]
    }

    /// Clears leftover values from a previous row so an error callback
    /// never observes another row's data.
    pub(crate) fn clear_scratch(&mut self) {
        for value in &mut self.scratch {
            *value = Value::Null;
        }
    }

    pub(crate) fn raw_values(&self) -> &[Value] {
        &self.scratch[..self.source_fields]
    }

    /// Source ordinals holding nested row sources.
    pub(crate) fn chapter_ordinals(&self) -> impl Iterator<Item = usize> + '_ {
        self.chapters
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c)
            .map(|(i, _)| i)
    }

    pub(crate) fn has_chapters(&self) -> bool {
        self.mode == MapMode::Chapters
    }

    pub(crate) fn destination_of(&self, source_ordinal: usize) -> Option<usize> {
        self.index_map[source_ordinal]
    }

    /// Translates the scratch buffer into a destination row of `dest_width`
    /// values. The buffer is left intact so a failed load can still report
    /// the raw source values.
    pub(crate) fn map_row(&mut self, dest_width: usize) -> Vec<Value> {
        if self.mode == MapMode::ExactMatch {
            let mut dest = vec![Value::Null; dest_width];
            for (i, slot) in dest.iter_mut().enumerate() {
                *slot = self.scratch[i].clone();
            }
            return dest;
        }

        let mut dest = vec![Value::Null; dest_width];
        for (src, mapped) in self.index_map.iter().enumerate() {
            let Some(dst) = *mapped else { continue };
            if self.chapters[src] {
                // Chapter surrogate keys are generated at commit time.
                continue;
            }
            let mut value = self.scratch[src].clone();
            if self.xml[src] {
                value = to_xml(value);
            }
            dest[dst] = value;
        }
        if let Some(ordinal) = self.chapter_ordinal {
            dest[ordinal] = self.chapter_value.clone();
        }
        dest
    }
}

/// Normalized view of one source column's metadata, from either the rich
/// schema description or the reader's field metadata.
struct SourceColumn {
    ordinal: usize,
    name: String,
    ty: SourceType,
    size: Option<usize>,
    nullable: bool,
    is_key: bool,
    is_unique: bool,
    is_auto_increment: bool,
    is_read_only: bool,
}

impl SourceColumn {
    /// The destination column to create for this source column.
    fn destination_column(&self, dest_name: &str, is_chapter: bool) -> Column {
        if is_chapter {
            return Column::new(dest_name, Type::I32)
                .auto_increment(0, 1)
                .read_only();
        }

        let mut column = Column::new(dest_name, Type::from_source(self.ty));
        column.nullable = self.nullable;
        column.read_only = self.is_read_only;
        column.unique = self.is_unique;
        if matches!(column.ty, Type::String | Type::Bytes) {
            column.max_length = self.size;
        }
        if self.is_auto_increment && column.ty.is_integer() {
            column = column.auto_increment(0, 1);
        }
        column
    }
}

fn to_xml(value: Value) -> Value {
    match value {
        Value::String(s) => Value::Xml(s),
        other => other,
    }
}
