// Statement module - a prepared native statement and its bound parameters
//
// - bind: two-phase parameter binding (scalars first, LOB descriptors after)
// - exec: execution, deferred LOB upload and generated-id capture

mod bind;
mod exec;

use std::fmt;

use tracing::trace;

use crate::connection::Connection;
use crate::error::OciDbError;
use crate::native::NativeInterface;
use crate::types::Param;

pub use exec::LOB_CHUNK_SIZE;

/// A typed parameter together with the placeholder it was bound to.
#[derive(Debug)]
pub(crate) struct BoundParam {
    pub(crate) name: String,
    pub(crate) param: Param,
}

/// A LOB descriptor waiting for content once the statement has executed.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PendingUpload {
    /// Index into `Statement::lobs`.
    pub(crate) lob: usize,
    /// Index into `Statement::params`.
    pub(crate) param: usize,
}

/// A parsed native statement.
///
/// Owns the statement handle and every LOB descriptor allocated while
/// binding; all of them are released by [`Statement::close`] or on drop.
pub struct Statement<'c, N: NativeInterface> {
    conn: &'c Connection<N>,
    handle: Option<N::Statement>,
    params: Vec<BoundParam>,
    lobs: Vec<N::Lob>,
    pending: Vec<PendingUpload>,
    generated_id: Option<usize>,
    bind_failed: bool,
}

impl<'c, N: NativeInterface> Statement<'c, N> {
    pub(crate) fn new(conn: &'c Connection<N>, handle: N::Statement) -> Self {
        Self {
            conn,
            handle: Some(handle),
            params: Vec::new(),
            lobs: Vec::new(),
            pending: Vec::new(),
            generated_id: None,
            bind_failed: false,
        }
    }

    fn native(&self) -> &'c N {
        self.conn.native()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.handle.is_none()
    }

    /// Look up a bound typed parameter by placeholder name, with or without the marker.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Param> {
        let wanted = bind::placeholder(name);
        self.params
            .iter()
            .find(|bound| bound.name == wanted)
            .map(|bound| &bound.param)
    }

    /// Placeholder names of the bound typed parameters, in bind order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|bound| bound.name.as_str())
    }

    /// Number of LOB descriptors that will receive content on execution.
    #[must_use]
    pub fn pending_uploads(&self) -> usize {
        self.pending.len()
    }

    /// Set the number of rows the engine prefetches per round trip.
    ///
    /// # Errors
    /// Returns `OciDbError::SqlExecutionError` if the engine rejects the attribute.
    pub fn set_fetch_size(&mut self, rows: u32) -> Result<(), OciDbError> {
        let stmt = self.handle.as_ref().ok_or(OciDbError::StatementClosed)?;
        self.native()
            .set_prefetch(stmt, rows)
            .map_err(OciDbError::execution)
    }

    /// Release the statement handle and all LOB descriptors. Safe to call more than once.
    pub fn close(&mut self) {
        self.release_binds();
        if let Some(stmt) = self.handle.take() {
            self.native().free_statement(stmt);
            trace!("statement released");
        }
    }

    fn release_binds(&mut self) {
        let native = self.native();
        for lob in self.lobs.drain(..) {
            native.free_lob(lob);
        }
        self.pending.clear();
        self.params.clear();
        self.generated_id = None;
    }
}

impl<N: NativeInterface> Drop for Statement<'_, N> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<N: NativeInterface> fmt::Debug for Statement<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("closed", &self.is_closed())
            .field("params", &self.params)
            .field("lobs", &self.lobs.len())
            .field("pending", &self.pending)
            .field("generated_id", &self.generated_id)
            .finish()
    }
}
