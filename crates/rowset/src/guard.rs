use rowset_core::{
    driver::{ConnectionState, SharedConnection},
    Error, Result,
};

use tokio_util::sync::CancellationToken;

/// Opens a connection if it is closed and remembers whether it did, so it
/// closes only connections it opened. A caller who pre-opened a
/// connection for reuse across calls never sees it closed underneath
/// them.
///
/// `finish` must run on every exit path, including cancellation
/// unwinding; callers capture the inner result first and finish before
/// propagating it.
pub(crate) struct ConnectionGuard {
    connection: SharedConnection,
    opened: bool,
}

impl ConnectionGuard {
    pub(crate) fn new(connection: SharedConnection) -> Self {
        Self {
            connection,
            opened: false,
        }
    }

    pub(crate) fn connection(&self) -> &SharedConnection {
        &self.connection
    }

    /// Opens the connection unless it is already open.
    pub(crate) async fn open(&mut self, token: &CancellationToken) -> Result<()> {
        if token.is_cancelled() {
            return Err(Error::cancelled());
        }

        let mut conn = self.connection.lock().await;
        if !conn.state().is_open() {
            conn.open().await?;
            self.opened = true;
        }
        Ok(())
    }

    /// Closes the connection if this guard opened it. Idempotent.
    pub(crate) async fn finish(&mut self) -> Result<()> {
        if !self.opened {
            return Ok(());
        }
        self.opened = false;

        let mut conn = self.connection.lock().await;
        if conn.state() == ConnectionState::Open {
            conn.close().await?;
        }
        Ok(())
    }
}
