// Results module - fetch flags, row shaping and the lazy result cursor
//
// - flags: caller-facing fetch flag bits
// - row: a fetched row keyed by column name and/or ordinal
// - cursor: the post-execution cursor and its row iterator

mod cursor;
mod flags;
mod row;

pub use cursor::{GeneratedId, ResultCursor, Rows};
pub use flags::FetchFlags;
pub use row::{Row, RowKey};

/// Rows read eagerly from a cursor, as returned by `Connection::query`.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The fetched rows
    pub results: Vec<Row>,
    /// Row count reported by the engine after all rows were fetched
    pub rows_affected: u64,
    /// Generated id captured at execution time, if one was requested
    pub generated_id: Option<GeneratedId>,
}

impl ResultSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
