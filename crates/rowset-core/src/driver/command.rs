use super::SharedConnection;
use crate::{dataset::RowVersion, value::Value};

use std::fmt;

/// The declared purpose of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementType {
    Select,
    Insert,
    Update,
    Delete,
    Batch,
}

impl StatementType {
    pub const COUNT: usize = 5;

    /// Slot index for per-statement-type bookkeeping arrays.
    pub const fn index(self) -> usize {
        match self {
            Self::Select => 0,
            Self::Insert => 1,
            Self::Update => 2,
            Self::Delete => 3,
            Self::Batch => 4,
        }
    }
}

/// How a write command feeds server-generated values back into the row
/// it was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteFeedback {
    #[default]
    None,

    /// Output parameter values are copied back onto mapped columns.
    OutputParameters,

    /// The first returned record's values are copied onto the row.
    /// Incompatible with batching.
    FirstReturnedRecord,

    /// Both of the above.
    Both,
}

impl WriteFeedback {
    pub const fn wants_first_record(self) -> bool {
        matches!(self, Self::FirstReturnedRecord | Self::Both)
    }

    pub const fn wants_output_parameters(self) -> bool {
        matches!(self, Self::OutputParameters | Self::Both)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterDirection {
    #[default]
    Input,
    Output,
    InputOutput,
}

impl ParameterDirection {
    pub const fn is_input(self) -> bool {
        matches!(self, Self::Input | Self::InputOutput)
    }

    pub const fn is_output(self) -> bool {
        matches!(self, Self::Output | Self::InputOutput)
    }
}

/// A command parameter, bound from (and written back to) a mapped column.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,

    pub direction: ParameterDirection,

    /// The cache column this parameter is bound from.
    pub source_column: Option<String>,

    /// Which row version update statements read. Insert always reads
    /// current, delete always reads original.
    pub source_version: RowVersion,

    /// When set, the parameter carries a 0/1 null indicator for its source
    /// column instead of the column's value.
    pub source_null_mapping: bool,

    pub value: Value,
}

impl Parameter {
    pub fn input(name: impl Into<String>, source_column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: ParameterDirection::Input,
            source_column: Some(source_column.into()),
            source_version: RowVersion::Current,
            source_null_mapping: false,
            value: Value::Null,
        }
    }

    pub fn output(name: impl Into<String>, source_column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: ParameterDirection::Output,
            source_column: Some(source_column.into()),
            source_version: RowVersion::Current,
            source_null_mapping: false,
            value: Value::Null,
        }
    }

    pub fn version(mut self, version: RowVersion) -> Self {
        self.source_version = version;
        self
    }

    pub fn null_mapping(mut self) -> Self {
        self.source_null_mapping = true;
        self
    }
}

/// A write or read statement, as handed to a [`Connection`] for execution.
///
/// The text is opaque to this crate; generation belongs to the host.
///
/// [`Connection`]: super::Connection
#[derive(Clone)]
pub struct Command {
    pub text: String,

    pub statement_type: StatementType,

    pub feedback: WriteFeedback,

    pub parameters: Vec<Parameter>,

    pub connection: SharedConnection,
}

impl Command {
    pub fn new(
        text: impl Into<String>,
        statement_type: StatementType,
        connection: SharedConnection,
    ) -> Self {
        Self {
            text: text.into(),
            statement_type,
            feedback: WriteFeedback::default(),
            parameters: vec![],
            connection,
        }
    }

    pub fn feedback(mut self, feedback: WriteFeedback) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("text", &self.text)
            .field("statement_type", &self.statement_type)
            .field("feedback", &self.feedback)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}
