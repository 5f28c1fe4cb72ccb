use super::Command;
use crate::{async_trait, value::Value, Result};

/// Batched command execution, supplied directly by a host integration.
///
/// Appended commands are executed together by [`execute`]; per-command
/// results are then read back by the opaque id [`append`] returned.
///
/// [`append`]: BatchExecutor::append
/// [`execute`]: BatchExecutor::execute
#[async_trait]
pub trait BatchExecutor: Send {
    /// Adds a command (text plus a snapshot of its bound parameters) to
    /// the in-flight batch, returning an opaque command id.
    fn append(&mut self, command: &Command) -> Result<usize>;

    /// Discards the in-flight batch.
    fn clear(&mut self);

    /// Executes the batch, returning the total affected-row count.
    async fn execute(&mut self) -> Result<u64>;

    /// Reads back a parameter value for an executed command, by the id
    /// returned from [`append`] and the parameter's index.
    ///
    /// [`append`]: BatchExecutor::append
    fn parameter(&self, command_id: usize, index: usize) -> Result<Value>;

    /// The affected-row count of one executed command, when the executor
    /// tracks per-command counts.
    fn rows_affected(&self, command_id: usize) -> Result<Option<u64>>;
}
