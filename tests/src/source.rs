use rowset_core::{
    async_trait,
    driver::{RowSource, SchemaColumn},
    value::{SourceType, Value},
    Error, Result,
};

/// One scripted column of a scripted result set.
#[derive(Debug, Clone)]
pub struct ScriptedColumn {
    pub name: String,
    pub ty: SourceType,
    pub nullable: bool,
    pub is_key: bool,
    pub is_unique: bool,
    pub is_auto_increment: bool,
    pub is_read_only: bool,
    pub is_hidden: bool,
    pub size: Option<usize>,
}

impl ScriptedColumn {
    pub fn new(name: impl Into<String>, ty: SourceType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: true,
            is_key: false,
            is_unique: false,
            is_auto_increment: false,
            is_read_only: false,
            is_hidden: false,
            size: None,
        }
    }

    pub fn key(mut self) -> Self {
        self.is_key = true;
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn not_nullable(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.is_hidden = true;
        self
    }
}

/// One row, optionally carrying nested row sources behind chaptered
/// ordinals.
pub struct ScriptedRow {
    pub values: Vec<Value>,
    chapters: Vec<(usize, Option<ScriptedSource>)>,
}

/// One result set: column metadata plus scripted rows. `described` makes
/// the rich schema description available to the consumer.
pub struct ScriptedSet {
    pub columns: Vec<ScriptedColumn>,
    pub rows: Vec<ScriptedRow>,
    pub described: bool,
}

impl ScriptedSet {
    pub fn new(columns: Vec<ScriptedColumn>) -> Self {
        Self {
            columns,
            rows: vec![],
            described: false,
        }
    }

    /// Shorthand for a set of plain (name, type) columns.
    pub fn plain(columns: &[(&str, SourceType)]) -> Self {
        Self::new(
            columns
                .iter()
                .map(|(name, ty)| ScriptedColumn::new(*name, *ty))
                .collect(),
        )
    }

    pub fn described(mut self) -> Self {
        self.described = true;
        self
    }

    pub fn row(mut self, values: Vec<Value>) -> Self {
        self.rows.push(ScriptedRow {
            values,
            chapters: vec![],
        });
        self
    }

    pub fn chaptered_row(
        mut self,
        values: Vec<Value>,
        chapters: Vec<(usize, ScriptedSource)>,
    ) -> Self {
        self.rows.push(ScriptedRow {
            values,
            chapters: chapters
                .into_iter()
                .map(|(ordinal, source)| (ordinal, Some(source)))
                .collect(),
        });
        self
    }
}

/// A fully scripted cursor: a sequence of result sets played back through
/// the [`RowSource`] trait.
pub struct ScriptedSource {
    sets: Vec<ScriptedSet>,
    set_index: usize,
    row: Option<usize>,
    rows_affected: Option<u64>,
    advance_set_failure: Option<String>,
}

impl ScriptedSource {
    pub fn new(sets: Vec<ScriptedSet>) -> Self {
        Self {
            sets,
            set_index: 0,
            row: None,
            rows_affected: None,
            advance_set_failure: None,
        }
    }

    pub fn single(set: ScriptedSet) -> Self {
        Self::new(vec![set])
    }

    pub fn with_rows_affected(mut self, count: u64) -> Self {
        self.rows_affected = Some(count);
        self
    }

    /// Fails the next result-set advance with the given message.
    pub fn failing_next_result_set(mut self, message: impl Into<String>) -> Self {
        self.advance_set_failure = Some(message.into());
        self
    }

    fn current_set(&self) -> Result<&ScriptedSet> {
        self.sets
            .get(self.set_index)
            .ok_or_else(|| Error::driver("cursor is past the last result set"))
    }
}

#[async_trait]
impl RowSource for ScriptedSource {
    fn field_count(&self) -> usize {
        self.sets
            .get(self.set_index)
            .map(|set| set.columns.len())
            .unwrap_or(0)
    }

    fn field_name(&self, ordinal: usize) -> Result<&str> {
        let set = self.current_set()?;
        set.columns
            .get(ordinal)
            .map(|column| column.name.as_str())
            .ok_or_else(|| Error::driver(format!("no field at ordinal {ordinal}")))
    }

    fn field_type(&self, ordinal: usize) -> Option<SourceType> {
        self.sets
            .get(self.set_index)?
            .columns
            .get(ordinal)
            .map(|column| column.ty)
    }

    fn get_values(&mut self, buffer: &mut [Value]) -> Result<usize> {
        let row = self
            .row
            .ok_or_else(|| Error::driver("cursor is not positioned on a row"))?;
        let set = self.current_set()?;
        let values = &set
            .rows
            .get(row)
            .ok_or_else(|| Error::driver("cursor is past the last row"))?
            .values;
        let count = buffer.len().min(values.len());
        buffer[..count].clone_from_slice(&values[..count]);
        Ok(count)
    }

    fn take_chapter(&mut self, ordinal: usize) -> Result<Option<Box<dyn RowSource>>> {
        let row = self
            .row
            .ok_or_else(|| Error::driver("cursor is not positioned on a row"))?;
        let set = self
            .sets
            .get_mut(self.set_index)
            .ok_or_else(|| Error::driver("cursor is past the last result set"))?;
        let taken = set
            .rows
            .get_mut(row)
            .ok_or_else(|| Error::driver("cursor is past the last row"))?
            .chapters
            .iter_mut()
            .find(|(o, _)| *o == ordinal)
            .and_then(|(_, source)| source.take());
        Ok(taken.map(|source| Box::new(source) as Box<dyn RowSource>))
    }

    fn schema_description(&mut self) -> Result<Option<Vec<SchemaColumn>>> {
        let set = self.current_set()?;
        if !set.described {
            return Ok(None);
        }
        Ok(Some(
            set.columns
                .iter()
                .enumerate()
                .map(|(ordinal, column)| SchemaColumn {
                    name: column.name.clone(),
                    ordinal,
                    ty: column.ty,
                    size: column.size,
                    nullable: column.nullable,
                    is_key: column.is_key,
                    is_unique: column.is_unique,
                    is_auto_increment: column.is_auto_increment,
                    is_read_only: column.is_read_only,
                    is_hidden: column.is_hidden,
                    base_table: None,
                })
                .collect(),
        ))
    }

    async fn advance_row(&mut self) -> Result<bool> {
        let rows = self.current_set()?.rows.len();
        let next = match self.row {
            None => 0,
            Some(i) => i + 1,
        };
        if next < rows {
            self.row = Some(next);
            Ok(true)
        } else {
            self.row = Some(rows.saturating_sub(1));
            Ok(false)
        }
    }

    async fn advance_result_set(&mut self) -> Result<bool> {
        if let Some(message) = self.advance_set_failure.take() {
            return Err(Error::driver(message));
        }
        self.row = None;
        if self.set_index + 1 < self.sets.len() {
            self.set_index += 1;
            Ok(true)
        } else {
            self.set_index = self.sets.len();
            Ok(false)
        }
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn rows_affected(&self) -> Option<u64> {
        self.rows_affected
    }
}
