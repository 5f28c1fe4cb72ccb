use crate::value::Value;

/// Edit state of a cache row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    /// No pending edits since the last accept.
    Unchanged,

    /// Created locally; not yet written to the source.
    Added,

    /// Current values differ from the original version.
    Modified,

    /// Marked for deletion; original values still available.
    Deleted,

    /// No longer participates in the table. Detached rows keep their slot
    /// so previously handed-out ordinals stay valid.
    Detached,
}

impl RowState {
    /// Added, Modified, and Deleted rows are eligible for reconciliation.
    pub const fn is_dirty(self) -> bool {
        matches!(self, Self::Added | Self::Modified | Self::Deleted)
    }
}

/// Which version of a row's values to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowVersion {
    #[default]
    Current,
    Original,
    /// The in-progress edit; reads as current outside an edit session.
    Proposed,
    Default,
}

/// A fixed-length array of values indexed by column ordinal, plus edit
/// state and an optional error recorded by a failed write-back.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    current: Vec<Value>,
    /// Present only while the row holds pending edits; `None` means the
    /// original version equals the current one.
    original: Option<Vec<Value>>,
    state: RowState,
    error: Option<String>,
}

impl Row {
    pub(crate) fn new(values: Vec<Value>, state: RowState) -> Self {
        Self {
            current: values,
            original: None,
            state,
            error: None,
        }
    }

    pub fn state(&self) -> RowState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// The current value at `ordinal`.
    pub fn get(&self, ordinal: usize) -> &Value {
        &self.current[ordinal]
    }

    /// The value at `ordinal` for the requested version.
    pub fn version(&self, ordinal: usize, version: RowVersion) -> &Value {
        match version {
            RowVersion::Current | RowVersion::Proposed => &self.current[ordinal],
            RowVersion::Original => self
                .original
                .as_ref()
                .map(|original| &original[ordinal])
                .unwrap_or(&self.current[ordinal]),
            RowVersion::Default => &Value::Null,
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.current
    }

    /// Replaces the value at `ordinal`, capturing the original version and
    /// transitioning Unchanged rows to Modified.
    pub(crate) fn set(&mut self, ordinal: usize, value: Value) {
        if self.original.is_none() && matches!(self.state, RowState::Unchanged | RowState::Modified)
        {
            self.original = Some(self.current.clone());
        }
        self.current[ordinal] = value;
        if self.state == RowState::Unchanged {
            self.state = RowState::Modified;
        }
    }

    /// Overwrites without state transitions; used by the load path.
    pub(crate) fn overwrite(&mut self, ordinal: usize, value: Value) {
        self.current[ordinal] = value;
    }

    pub(crate) fn set_original(&mut self, values: Vec<Value>) {
        self.original = Some(values);
    }

    pub(crate) fn replace_all(&mut self, values: Vec<Value>) {
        self.current = values;
    }

    pub(crate) fn set_state(&mut self, state: RowState) {
        self.state = state;
    }

    /// Widens the row with a null slot when a column is added to its table.
    pub(crate) fn push_default(&mut self) {
        self.current.push(Value::Null);
        if let Some(original) = &mut self.original {
            original.push(Value::Null);
        }
    }

    /// Marks the row for deletion. Added rows detach immediately since the
    /// source never saw them.
    pub fn delete(&mut self) {
        match self.state {
            RowState::Added => self.state = RowState::Detached,
            RowState::Detached => {}
            _ => self.state = RowState::Deleted,
        }
    }

    /// Accepts pending edits: Added/Modified become Unchanged, Deleted
    /// becomes Detached, and the original version is discarded.
    pub fn accept_changes(&mut self) {
        match self.state {
            RowState::Added | RowState::Modified => {
                self.original = None;
                self.state = RowState::Unchanged;
            }
            RowState::Deleted => {
                self.original = None;
                self.state = RowState::Detached;
            }
            RowState::Unchanged | RowState::Detached => {}
        }
    }

    /// Rolls back pending edits: Modified/Deleted restore the original
    /// version, Added rows detach.
    pub fn reject_changes(&mut self) {
        match self.state {
            RowState::Added => self.state = RowState::Detached,
            RowState::Modified | RowState::Deleted => {
                if let Some(original) = self.original.take() {
                    self.current = original;
                }
                self.state = RowState::Unchanged;
            }
            RowState::Unchanged | RowState::Detached => {}
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }
}
