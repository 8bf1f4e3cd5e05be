//! The call-level interface seam.
//!
//! [`NativeInterface`] is the synchronous, handle-based API a database
//! client library exposes: connections, statements and LOB descriptors are
//! opaque handle values, every call blocks, and failures come back as a
//! [`NativeErrorRecord`]. The rest of the crate only talks to the engine
//! through this trait.

use std::borrow::Cow;

use serde::Serialize;

/// Size sentinel telling the native bind call to size the buffer from the value.
pub const BIND_SIZE_UNBOUNDED: i32 = -1;

/// Placeholder marker prefixed to every bind name.
pub const PLACEHOLDER_MARKER: char = ':';

/// Native bind-type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum NativeType {
    /// Character string (`SQLT_CHR`).
    Chr = 1,
    /// Signed integer (`SQLT_INT`).
    Int = 3,
    /// Raw binary (`SQLT_BIN`).
    Bin = 23,
    /// Character LOB descriptor (`SQLT_CLOB`).
    Clob = 112,
    /// Binary LOB descriptor (`SQLT_BLOB`).
    Blob = 113,
    /// PL/SQL boolean (`SQLT_BOL`).
    Bol = 252,
}

impl NativeType {
    /// The numeric code the client library expects.
    #[must_use]
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// Direction of a scalar bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindDirection {
    In,
    /// The engine writes the variable back during execution.
    InOut,
}

/// A scalar value handed to the native bind call.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue<'a> {
    Null,
    Int(i64),
    Bool(bool),
    Text(Cow<'a, str>),
    Bytes(Cow<'a, [u8]>),
}

impl BindValue<'_> {
    /// Detach the value from the borrowed parameter it was rendered from.
    #[must_use]
    pub fn into_owned(self) -> BindValue<'static> {
        match self {
            BindValue::Null => BindValue::Null,
            BindValue::Int(i) => BindValue::Int(i),
            BindValue::Bool(b) => BindValue::Bool(b),
            BindValue::Text(s) => BindValue::Text(Cow::Owned(s.into_owned())),
            BindValue::Bytes(b) => BindValue::Bytes(Cow::Owned(b.into_owned())),
        }
    }
}

/// Arguments of one scalar `bind_by_name` call.
#[derive(Debug, Clone)]
pub struct NativeBind<'a> {
    /// Placeholder name including the marker, e.g. `:p1`.
    pub name: &'a str,
    pub value: BindValue<'a>,
    /// Maximum length in bytes, or [`BIND_SIZE_UNBOUNDED`].
    pub max_len: i32,
    pub native_type: NativeType,
    pub direction: BindDirection,
}

/// Native fetch options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchMode {
    /// Return LOB column content instead of locators.
    pub return_lobs: bool,
}

/// Kind of large object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LobKind {
    Clob,
    Blob,
}

/// Placeholder for a LOB column whose content was not read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LobLocator {
    /// Engine-assigned locator id.
    pub id: u64,
    pub kind: LobKind,
    /// Length in characters (CLOB) or bytes (BLOB).
    pub length: u64,
}

/// A column value as returned by the native fetch or out-bind read.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Locator(LobLocator),
}

/// One fetched row: column names as the engine reports them, with values, in
/// select-list order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NativeRow {
    pub columns: Vec<(String, NativeValue)>,
}

/// An error record as reported by the client library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeErrorRecord {
    /// Engine error code, e.g. `907` for ORA-00907.
    pub code: i32,
    pub message: String,
    /// The statement text the error refers to, when the engine reports it.
    pub sql_text: Option<String>,
    /// Byte offset of the offending position within `sql_text`.
    pub offset: Option<usize>,
}

impl NativeErrorRecord {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            sql_text: None,
            offset: None,
        }
    }

    /// Attach the statement text and offending offset.
    #[must_use]
    pub fn with_sql(mut self, sql_text: impl Into<String>, offset: usize) -> Self {
        self.sql_text = Some(sql_text.into());
        self.offset = Some(offset);
        self
    }
}

/// Synchronous, handle-based call-level interface of a database client library.
///
/// Handles are owned values: the functions that release a handle take it by
/// value, so a released handle cannot be used again. Implementations need not
/// be thread-safe; callers serialize access per connection.
pub trait NativeInterface {
    /// Native session handle.
    type Connection;
    /// Native statement handle.
    type Statement;
    /// Native LOB descriptor.
    type Lob;

    /// Open a new (non-shared) session.
    ///
    /// # Errors
    /// Returns the native error record when the session cannot be opened.
    fn connect(
        &self,
        host: &str,
        user: &str,
        password: &str,
        charset: Option<&str>,
    ) -> Result<Self::Connection, NativeErrorRecord>;

    /// Close a session. Uncommitted work is rolled back by the engine.
    fn close(&self, conn: Self::Connection);

    /// Parse statement text into a statement handle.
    ///
    /// # Errors
    /// Returns the native error record, usually carrying the SQL text and offset.
    fn parse(&self, conn: &Self::Connection, sql: &str) -> Result<Self::Statement, NativeErrorRecord>;

    /// Bind a scalar variable by placeholder name.
    ///
    /// # Errors
    /// Returns the native error record when the name/type/value combination is rejected.
    fn bind_by_name(&self, stmt: &Self::Statement, bind: NativeBind<'_>) -> Result<(), NativeErrorRecord>;

    /// Allocate an empty LOB descriptor scoped to the session.
    ///
    /// # Errors
    /// Returns the native error record when allocation fails.
    fn new_lob(&self, conn: &Self::Connection) -> Result<Self::Lob, NativeErrorRecord>;

    /// Bind a LOB descriptor by placeholder name.
    ///
    /// # Errors
    /// Returns the native error record when the bind is rejected.
    fn bind_lob(
        &self,
        stmt: &Self::Statement,
        name: &str,
        lob: &Self::Lob,
        native_type: NativeType,
    ) -> Result<(), NativeErrorRecord>;

    /// Execute a parsed and bound statement without committing; the
    /// transaction stays open until `commit` or `rollback`.
    ///
    /// # Errors
    /// Returns the native error record when execution fails.
    fn execute(&self, stmt: &Self::Statement) -> Result<(), NativeErrorRecord>;

    /// Move the descriptor's write position to its start.
    ///
    /// # Errors
    /// Returns the native error record when the descriptor is not usable.
    fn lob_rewind(&self, lob: &Self::Lob) -> Result<(), NativeErrorRecord>;

    /// Write one block at the current position; returns the number of bytes written.
    ///
    /// # Errors
    /// Returns the native error record when the write fails.
    fn lob_write(&self, lob: &Self::Lob, block: &[u8]) -> Result<usize, NativeErrorRecord>;

    fn free_lob(&self, lob: Self::Lob);

    /// Read the current value of a bound variable (used for in/out binds).
    ///
    /// # Errors
    /// Returns the native error record when the name is not bound.
    fn bound_value(&self, stmt: &Self::Statement, name: &str) -> Result<NativeValue, NativeErrorRecord>;

    /// Fetch the next row, or `None` once the cursor is exhausted.
    ///
    /// # Errors
    /// Returns the native error record when the fetch fails.
    fn fetch_row(&self, stmt: &Self::Statement, mode: FetchMode) -> Result<Option<NativeRow>, NativeErrorRecord>;

    /// Rows affected by DML, or rows fetched so far for queries.
    fn num_rows(&self, stmt: &Self::Statement) -> u64;

    /// Set the number of rows prefetched per round trip.
    ///
    /// # Errors
    /// Returns the native error record when the attribute cannot be set.
    fn set_prefetch(&self, stmt: &Self::Statement, rows: u32) -> Result<(), NativeErrorRecord>;

    fn free_statement(&self, stmt: Self::Statement);

    /// # Errors
    /// Returns the native error record when the commit fails.
    fn commit(&self, conn: &Self::Connection) -> Result<(), NativeErrorRecord>;

    /// # Errors
    /// Returns the native error record when the rollback fails.
    fn rollback(&self, conn: &Self::Connection) -> Result<(), NativeErrorRecord>;
}
