use std::fmt;
use std::iter::FusedIterator;
use std::sync::Arc;

use serde::Serialize;
use tracing::trace;

use super::{FetchFlags, Row};
use crate::error::OciDbError;
use crate::native::{FetchMode, NativeInterface, NativeRow, NativeValue};
use crate::types::Value;

/// A server-generated identifier read back from an out-bind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum GeneratedId {
    Int(i64),
    Text(String),
}

impl GeneratedId {
    /// Interpret an out-bind value; `None` when the engine left it empty.
    #[must_use]
    pub fn from_native(value: NativeValue) -> Option<Self> {
        match value {
            NativeValue::Int(i) => Some(GeneratedId::Int(i)),
            NativeValue::Text(s) => Some(GeneratedId::Text(s)),
            NativeValue::Float(f) => Some(GeneratedId::Text(f.to_string())),
            NativeValue::Bytes(b) => Some(GeneratedId::Text(String::from_utf8_lossy(&b).into_owned())),
            NativeValue::Null | NativeValue::Locator(_) => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            GeneratedId::Int(i) => Some(*i),
            GeneratedId::Text(s) => s.parse().ok(),
        }
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            GeneratedId::Int(i) => Value::Int(*i),
            GeneratedId::Text(s) => Value::Text(s.clone()),
        }
    }
}

impl fmt::Display for GeneratedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratedId::Int(i) => write!(f, "{i}"),
            GeneratedId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    Ready,
    Iterated,
    Closed,
}

/// The outcome of executing a statement.
///
/// Borrows the statement, so the statement can be neither closed nor
/// executed again while the cursor is alive.
pub struct ResultCursor<'s, N: NativeInterface> {
    native: &'s N,
    stmt: &'s N::Statement,
    generated_id: Option<GeneratedId>,
    state: CursorState,
}

impl<'s, N: NativeInterface> ResultCursor<'s, N> {
    pub(crate) fn new(native: &'s N, stmt: &'s N::Statement, generated_id: Option<GeneratedId>) -> Self {
        Self {
            native,
            stmt,
            generated_id,
            state: CursorState::Ready,
        }
    }

    /// Start reading rows. Each call to `next` performs one blocking native fetch.
    ///
    /// The cursor is forward-only: rows can be requested once.
    ///
    /// # Errors
    /// Returns `OciDbError::CursorConsumed` on a second call and
    /// `OciDbError::CursorClosed` after [`ResultCursor::close`].
    pub fn rows(&mut self, flags: FetchFlags) -> Result<Rows<'s, N>, OciDbError> {
        match self.state {
            CursorState::Ready => {
                self.state = CursorState::Iterated;
                Ok(Rows {
                    native: self.native,
                    stmt: self.stmt,
                    flags,
                    column_names: None,
                    done: false,
                })
            }
            CursorState::Iterated => Err(OciDbError::CursorConsumed),
            CursorState::Closed => Err(OciDbError::CursorClosed),
        }
    }

    /// The generated id captured when the statement executed.
    #[must_use]
    pub fn generated_id(&self) -> Option<&GeneratedId> {
        self.generated_id.as_ref()
    }

    /// Rows affected by DML. For queries the engine counts rows fetched so far,
    /// so the number is only final once every row has been read.
    #[must_use]
    pub fn affected_row_count(&self) -> u64 {
        self.native.num_rows(self.stmt)
    }

    pub fn close(&mut self) {
        self.state = CursorState::Closed;
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == CursorState::Closed
    }
}

impl<N: NativeInterface> fmt::Debug for ResultCursor<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCursor")
            .field("generated_id", &self.generated_id)
            .field("state", &self.state)
            .finish()
    }
}

/// Lazy, forward-only row iterator. Fused after exhaustion or the first error.
pub struct Rows<'s, N: NativeInterface> {
    native: &'s N,
    stmt: &'s N::Statement,
    flags: FetchFlags,
    column_names: Option<Arc<Vec<String>>>,
    done: bool,
}

impl<N: NativeInterface> Rows<'_, N> {
    fn shape(&mut self, row: NativeRow) -> Row {
        let (names, values): (Vec<String>, Vec<NativeValue>) = row.columns.into_iter().unzip();
        let column_names = match &self.column_names {
            Some(cached) if cached.len() == names.len() => Arc::clone(cached),
            _ => {
                let lowered: Arc<Vec<String>> =
                    Arc::new(names.iter().map(|n| n.to_lowercase()).collect());
                self.column_names = Some(Arc::clone(&lowered));
                lowered
            }
        };
        let values = values.into_iter().map(column_value).collect();
        Row::new(column_names, values, self.flags)
    }
}

fn column_value(value: NativeValue) -> Value {
    match value {
        NativeValue::Null => Value::Null,
        NativeValue::Int(i) => Value::Int(i),
        NativeValue::Float(f) => Value::Float(f),
        NativeValue::Text(s) => Value::Text(s),
        NativeValue::Bytes(b) => Value::Blob(b),
        NativeValue::Locator(locator) => Value::Lob(locator),
    }
}

impl<N: NativeInterface> Iterator for Rows<'_, N> {
    type Item = Result<Row, OciDbError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mode = FetchMode {
            return_lobs: self.flags.returns_lobs(),
        };
        match self.native.fetch_row(self.stmt, mode) {
            Ok(Some(row)) => {
                trace!(columns = row.columns.len(), "row fetched");
                Some(Ok(self.shape(row)))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(record) => {
                self.done = true;
                Some(Err(OciDbError::execution(record)))
            }
        }
    }
}

impl<N: NativeInterface> FusedIterator for Rows<'_, N> {}

impl<N: NativeInterface> fmt::Debug for Rows<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rows")
            .field("flags", &self.flags)
            .field("done", &self.done)
            .finish()
    }
}
