use rowset_core::driver::{StatementType, WriteFeedback};

/// Per-row bookkeeping correlating a dirty row to its generated command,
/// used to reconcile execution results back to individual rows.
///
/// Created when a row's command is appended to (or about to execute as)
/// an in-flight batch; consumed once that batch's outcome is classified.
#[derive(Debug)]
pub(crate) struct BatchCommandInfo {
    /// Opaque id returned by the batch executor's append, when batched.
    pub command_id: Option<usize>,

    pub parameter_count: usize,

    /// Ordinal of the row in its table.
    pub row: usize,

    pub statement_type: StatementType,

    pub feedback: WriteFeedback,

    /// Affected-row count recorded at execution, `None` until known.
    pub rows_affected: Option<u64>,

    /// Per-row error recorded during execution or classification.
    pub error: Option<String>,
}

impl BatchCommandInfo {
    pub(crate) fn new(
        row: usize,
        statement_type: StatementType,
        feedback: WriteFeedback,
        parameter_count: usize,
    ) -> Self {
        Self {
            command_id: None,
            parameter_count,
            row,
            statement_type,
            feedback,
            rows_affected: None,
            error: None,
        }
    }

    /// An update/delete that affected zero rows implicates this row in a
    /// concurrency violation.
    pub(crate) fn is_concurrency_violation(&self) -> bool {
        matches!(
            self.statement_type,
            StatementType::Update | StatementType::Delete
        ) && self.rows_affected.unwrap_or(0) == 0
            && self.error.is_none()
    }
}
