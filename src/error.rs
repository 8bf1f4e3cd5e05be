use std::fmt::Write;

use thiserror::Error;

use crate::native::NativeErrorRecord;

const MARK_OPEN: &str = ">>>";
const MARK_CLOSE: &str = "<<<";

/// Statement text with the character at the reported error offset marked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlExcerpt {
    /// Offset as reported by the engine.
    pub offset: usize,
    /// The statement text with the offending character wrapped in `>>>` / `<<<`.
    pub marked_sql: String,
}

impl SqlExcerpt {
    /// Mark the character at `offset` in `sql`.
    ///
    /// Offsets past the end mark the (empty) end of the text; offsets inside a
    /// multi-byte character mark that whole character.
    #[must_use]
    pub fn mark(sql: &str, offset: usize) -> Self {
        let mut at = offset.min(sql.len());
        while !sql.is_char_boundary(at) {
            at -= 1;
        }
        let width = sql[at..].chars().next().map_or(0, char::len_utf8);
        let mut marked_sql = String::with_capacity(sql.len() + MARK_OPEN.len() + MARK_CLOSE.len());
        marked_sql.push_str(&sql[..at]);
        marked_sql.push_str(MARK_OPEN);
        marked_sql.push_str(&sql[at..at + width]);
        marked_sql.push_str(MARK_CLOSE);
        marked_sql.push_str(&sql[at + width..]);
        Self { offset, marked_sql }
    }
}

/// A native error record translated into a diagnosable error.
///
/// This is the cause wrapped by every engine-originated [`OciDbError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct OciError {
    message: String,
    code: i32,
    excerpt: Option<SqlExcerpt>,
}

impl OciError {
    /// Translate a native error record.
    ///
    /// When the record carries statement text, the message is extended with
    /// the offset and the marked statement.
    #[must_use]
    pub fn translate(record: NativeErrorRecord) -> Self {
        let NativeErrorRecord {
            code,
            mut message,
            sql_text,
            offset,
        } = record;

        let excerpt = match sql_text {
            Some(sql) if !sql.is_empty() => {
                let excerpt = SqlExcerpt::mark(&sql, offset.unwrap_or(0));
                // writing into a String cannot fail
                let _ = write!(
                    message,
                    "\nOffset: {}\n{}\n",
                    excerpt.offset, excerpt.marked_sql
                );
                Some(excerpt)
            }
            _ => None,
        };

        Self {
            message,
            code,
            excerpt,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Engine-specific error code.
    #[must_use]
    pub fn code(&self) -> i32 {
        self.code
    }

    #[must_use]
    pub fn excerpt(&self) -> Option<&SqlExcerpt> {
        self.excerpt.as_ref()
    }
}

impl From<NativeErrorRecord> for OciError {
    fn from(record: NativeErrorRecord) -> Self {
        OciError::translate(record)
    }
}

#[derive(Debug, Error)]
pub enum OciDbError {
    #[error("Connection error: {message}")]
    ConnectionError {
        message: String,
        #[source]
        source: Option<OciError>,
    },

    #[error("SQL syntax error: {0}")]
    SqlSyntaxError(#[source] OciError),

    #[error("SQL execution error: {0}")]
    SqlExecutionError(#[source] OciError),

    #[error("Bind params error: {name} {value}")]
    BindError {
        name: String,
        value: String,
        #[source]
        source: OciError,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error("LOB source error: {0}")]
    LobSource(#[source] std::io::Error),

    #[error("Connection is closed")]
    ConnectionClosed,

    #[error("Statement is closed")]
    StatementClosed,

    #[error("Result cursor has already been iterated")]
    CursorConsumed,

    #[error("Result cursor is closed")]
    CursorClosed,
}

impl OciDbError {
    pub(crate) fn connection(record: NativeErrorRecord) -> Self {
        let source = OciError::translate(record);
        OciDbError::ConnectionError {
            message: source.message().to_owned(),
            source: Some(source),
        }
    }

    pub(crate) fn syntax(record: NativeErrorRecord) -> Self {
        OciDbError::SqlSyntaxError(OciError::translate(record))
    }

    pub(crate) fn execution(record: NativeErrorRecord) -> Self {
        OciDbError::SqlExecutionError(OciError::translate(record))
    }

    /// The translated native error behind this error, if the engine reported one.
    #[must_use]
    pub fn native_error(&self) -> Option<&OciError> {
        match self {
            OciDbError::ConnectionError { source, .. } => source.as_ref(),
            OciDbError::SqlSyntaxError(e) | OciDbError::SqlExecutionError(e) => Some(e),
            OciDbError::BindError { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Engine error code, if the engine reported one.
    #[must_use]
    pub fn code(&self) -> Option<i32> {
        self.native_error().map(OciError::code)
    }
}
