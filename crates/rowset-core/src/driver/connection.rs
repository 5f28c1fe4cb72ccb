use super::{BatchExecutor, Command, RowSource};
use crate::{async_trait, value::ValueVariant, Result};

use std::{fmt::Debug, sync::Arc};
use tokio::sync::Mutex;

/// Observable state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Open,
}

impl ConnectionState {
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

/// An asynchronously openable connection that executes commands.
#[async_trait]
pub trait Connection: Send + Debug {
    fn state(&self) -> ConnectionState;

    async fn open(&mut self) -> Result<()>;

    async fn close(&mut self) -> Result<()>;

    /// Executes a query, yielding a streaming cursor over its results.
    async fn execute_reader(
        &mut self,
        command: &Command,
        variant: ValueVariant,
    ) -> Result<Box<dyn RowSource>>;

    /// Executes a non-query, returning the affected-row count. Output
    /// parameter values are written back into `command.parameters`.
    async fn execute(&mut self, command: &mut Command) -> Result<u64>;

    /// The connection's batch executor, when it supports batching.
    fn batch(&mut self) -> Option<&mut dyn BatchExecutor> {
        None
    }
}

/// A connection handle shareable across the commands of one adapter.
pub type SharedConnection = Arc<Mutex<Box<dyn Connection>>>;

/// Wraps a connection into a [`SharedConnection`] handle.
pub fn shared(connection: impl Connection + 'static) -> SharedConnection {
    Arc::new(Mutex::new(Box::new(connection)))
}
