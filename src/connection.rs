use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::OciDbError;
use crate::native::NativeInterface;
use crate::results::{FetchFlags, ResultSet};
use crate::statement::Statement;
use crate::types::ParamList;

/// An open native session.
///
/// The handle is either present (open) or absent (closed). Dropping the
/// connection closes the session; uncommitted work is rolled back by the
/// engine.
pub struct Connection<N: NativeInterface> {
    native: Arc<N>,
    handle: Option<N::Connection>,
}

impl<N: NativeInterface> Connection<N> {
    pub(crate) fn new(native: Arc<N>, handle: N::Connection) -> Self {
        Self {
            native,
            handle: Some(handle),
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    pub(crate) fn native(&self) -> &N {
        &self.native
    }

    pub(crate) fn handle(&self) -> Result<&N::Connection, OciDbError> {
        self.handle.as_ref().ok_or(OciDbError::ConnectionClosed)
    }

    /// Parse `sql` into a statement ready for binding.
    ///
    /// # Errors
    /// Returns `OciDbError::SqlSyntaxError` if the engine rejects the text, with
    /// the offending offset marked in the error's excerpt, or
    /// `OciDbError::ConnectionClosed` after [`Connection::disconnect`].
    pub fn prepare(&self, sql: &str) -> Result<Statement<'_, N>, OciDbError> {
        let conn = self.handle()?;
        let stmt = self.native.parse(conn, sql).map_err(OciDbError::syntax)?;
        debug!(sql, "statement prepared");
        Ok(Statement::new(self, stmt))
    }

    /// The engine starts a transaction implicitly with the first statement.
    ///
    /// # Errors
    /// Never fails; the signature matches the other transaction calls.
    pub fn start_transaction(&self) -> Result<(), OciDbError> {
        Ok(())
    }

    /// Commit the current transaction. A no-op once disconnected.
    ///
    /// # Errors
    /// Returns `OciDbError::SqlExecutionError` if the engine rejects the commit.
    pub fn commit(&self) -> Result<(), OciDbError> {
        match &self.handle {
            Some(conn) => self.native.commit(conn).map_err(OciDbError::execution),
            None => Ok(()),
        }
    }

    /// Roll back the current transaction. A no-op once disconnected.
    ///
    /// # Errors
    /// Returns `OciDbError::SqlExecutionError` if the engine rejects the rollback.
    pub fn rollback(&self) -> Result<(), OciDbError> {
        match &self.handle {
            Some(conn) => self.native.rollback(conn).map_err(|record| {
                warn!(code = record.code, "rollback failed");
                OciDbError::execution(record)
            }),
            None => Ok(()),
        }
    }

    /// Close the session. Safe to call more than once.
    pub fn disconnect(&mut self) {
        if let Some(conn) = self.handle.take() {
            self.native.close(conn);
            debug!("session closed");
        }
    }

    /// Prepare, bind and execute a DML statement, returning the affected row count.
    ///
    /// Nothing is committed.
    ///
    /// # Errors
    /// Returns any error from preparing, binding or executing the statement.
    pub fn execute(&self, sql: &str, params: ParamList) -> Result<u64, OciDbError> {
        let mut stmt = self.prepare(sql)?;
        stmt.bind(params)?;
        let affected = stmt.exec()?.affected_row_count();
        stmt.close();
        Ok(affected)
    }

    /// Prepare, bind and execute a query and read every row into a [`ResultSet`].
    ///
    /// # Errors
    /// Returns any error from preparing, binding, executing or fetching.
    pub fn query(
        &self,
        sql: &str,
        params: ParamList,
        flags: FetchFlags,
    ) -> Result<ResultSet, OciDbError> {
        let mut stmt = self.prepare(sql)?;
        stmt.bind(params)?;
        let result_set = {
            let mut cursor = stmt.exec()?;
            let results = cursor.rows(flags)?.collect::<Result<Vec<_>, _>>()?;
            ResultSet {
                results,
                rows_affected: cursor.affected_row_count(),
                generated_id: cursor.generated_id().cloned(),
            }
        };
        stmt.close();
        Ok(result_set)
    }
}

impl<N: NativeInterface> Drop for Connection<N> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl<N: NativeInterface> fmt::Debug for Connection<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("connected", &self.is_connected())
            .finish()
    }
}
