use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use regex::Regex;

use crate::native::{
    BindDirection, BindValue, FetchMode, LobKind, LobLocator, NativeBind,
    NativeErrorRecord, NativeInterface, NativeRow, NativeType, NativeValue, PLACEHOLDER_MARKER,
};
use crate::types::{TIMESTAMP_FORMAT, Value};

static QUOTED_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'(?:[^']|'')*'").expect("literal pattern is valid"));

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":([A-Za-z_][A-Za-z0-9_$#]*)").expect("placeholder pattern is valid")
});

/// Mock session handle.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct MockConn(u64);

/// Mock statement handle.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct MockStmt(u64);

/// Mock LOB descriptor.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct MockLob(u64);

impl MockConn {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl MockStmt {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl MockLob {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// A native call as recorded by [`MockOci`].
#[derive(Debug, Clone, PartialEq)]
pub enum MockEvent {
    Connect {
        conn: Option<u64>,
        user: String,
        charset: Option<String>,
    },
    Close {
        conn: u64,
    },
    Parse {
        stmt: Option<u64>,
        sql: String,
    },
    Bind {
        stmt: u64,
        name: String,
        value: BindValue<'static>,
        native_type: NativeType,
        max_len: i32,
        direction: BindDirection,
    },
    NewLob {
        lob: u64,
    },
    BindLob {
        stmt: u64,
        name: String,
        lob: u64,
        native_type: NativeType,
    },
    Execute {
        stmt: u64,
    },
    LobRewind {
        lob: u64,
    },
    LobWrite {
        lob: u64,
        bytes: Vec<u8>,
    },
    ReadBound {
        stmt: u64,
        name: String,
    },
    Fetch {
        stmt: u64,
        return_lobs: bool,
    },
    SetPrefetch {
        stmt: u64,
        rows: u32,
    },
    FreeLob {
        lob: u64,
    },
    FreeStatement {
        stmt: u64,
    },
    Commit {
        conn: u64,
    },
    Rollback {
        conn: u64,
    },
}

/// A scripted column value.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCell {
    Value(NativeValue),
    /// Character LOB: content or a locator depending on the fetch mode.
    Clob(String),
    /// Binary LOB: content or a locator depending on the fetch mode.
    Blob(Vec<u8>),
}

impl From<NativeValue> for MockCell {
    fn from(value: NativeValue) -> Self {
        MockCell::Value(value)
    }
}

impl From<Value> for MockCell {
    fn from(value: Value) -> Self {
        MockCell::Value(match value {
            Value::Null => NativeValue::Null,
            Value::Int(i) => NativeValue::Int(i),
            Value::Float(f) => NativeValue::Float(f),
            Value::Text(s) => NativeValue::Text(s),
            Value::Bool(b) => NativeValue::Int(i64::from(b)),
            Value::Timestamp(ts) => NativeValue::Text(ts.format(TIMESTAMP_FORMAT).to_string()),
            Value::Blob(b) => NativeValue::Bytes(b),
            Value::Lob(locator) => NativeValue::Locator(locator),
        })
    }
}

/// Rows returned for statements whose text matches a registered pattern.
///
/// ```rust
/// use oci_middleware::prelude::*;
/// use oci_middleware::test_utils::{MockCell, MockResult};
///
/// let result = MockResult::new(["ID", "DOC"])
///     .row([MockCell::from(Value::Int(1)), MockCell::Clob("hello".into())]);
/// assert_eq!(result.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockResult {
    columns: Vec<String>,
    rows: Vec<Vec<MockCell>>,
}

impl MockResult {
    #[must_use]
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn row<I, C>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<MockCell>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Default)]
struct Failures {
    connect: Option<NativeErrorRecord>,
    parse: Vec<String>,
    bind: Vec<String>,
    execute: Vec<(String, NativeErrorRecord)>,
    lob_write_after: Option<usize>,
    fetch_after: Option<usize>,
    new_lob: bool,
    commit: bool,
}

#[derive(Debug)]
struct StmtState {
    sql: String,
    placeholders: Vec<String>,
    binds: HashMap<String, NativeValue>,
    out_binds: Vec<String>,
    executed: bool,
    result: Option<MockResult>,
    cursor: usize,
    affected: u64,
    live: bool,
}

#[derive(Debug, Default)]
struct LobState {
    data: Vec<u8>,
    position: usize,
    writes: Vec<Vec<u8>>,
    live: bool,
}

#[derive(Debug, Default)]
struct MockState {
    next_handle: u64,
    connections: HashMap<u64, bool>,
    statements: HashMap<u64, StmtState>,
    lobs: HashMap<u64, LobState>,
    events: Vec<MockEvent>,
    double_releases: usize,
    lob_writes: usize,
    max_write: Option<usize>,
    queries: Vec<(String, MockResult)>,
    affected: Vec<(String, u64)>,
    out_values: HashMap<String, NativeValue>,
    failures: Failures,
}

impl MockState {
    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn conn_live(&self, conn: u64) -> Result<(), NativeErrorRecord> {
        if self.connections.get(&conn).copied().unwrap_or(false) {
            Ok(())
        } else {
            Err(NativeErrorRecord::new(3114, "ORA-03114: not connected to ORACLE"))
        }
    }

    fn stmt_mut(&mut self, stmt: u64) -> Result<&mut StmtState, NativeErrorRecord> {
        self.statements
            .get_mut(&stmt)
            .filter(|s| s.live)
            .ok_or_else(|| NativeErrorRecord::new(1001, "ORA-01001: invalid cursor"))
    }

    fn lob_mut(&mut self, lob: u64) -> Result<&mut LobState, NativeErrorRecord> {
        self.lobs
            .get_mut(&lob)
            .filter(|l| l.live)
            .ok_or_else(|| NativeErrorRecord::new(22275, "ORA-22275: invalid LOB locator specified"))
    }
}

/// An in-memory [`NativeInterface`] for tests.
///
/// Records every native call, tracks which handles are live, and can be
/// scripted to return rows, out-bind values and failures. Clones share the
/// same state, so a test can keep one clone for inspection after handing
/// another to an [`OciDriver`](crate::session::OciDriver).
///
/// Statements are checked the way a server would check them: unbalanced
/// parentheses fail to parse, bind names must appear as placeholders in the
/// statement text, and fetching before executing fails.
#[derive(Debug, Clone, Default)]
pub struct MockOci {
    state: Arc<Mutex<MockState>>,
}

fn normalise(name: &str) -> String {
    format!(
        "{PLACEHOLDER_MARKER}{}",
        name.trim_start_matches(PLACEHOLDER_MARKER).to_lowercase()
    )
}

/// Statement text with quoted literals blanked out, offsets preserved.
fn strip_literals(sql: &str) -> String {
    QUOTED_LITERAL
        .replace_all(sql, |caps: &regex::Captures<'_>| " ".repeat(caps[0].len()))
        .into_owned()
}

fn check_syntax(sql: &str) -> Result<Vec<String>, NativeErrorRecord> {
    if sql.trim().is_empty() {
        return Err(NativeErrorRecord::new(900, "ORA-00900: invalid SQL statement").with_sql(sql, 0));
    }
    let stripped = strip_literals(sql);
    let mut depth = 0usize;
    for (offset, c) in stripped.char_indices() {
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => {
                return Err(NativeErrorRecord::new(933, "ORA-00933: SQL command not properly ended")
                    .with_sql(sql, offset));
            }
            ')' => depth -= 1,
            _ => {}
        }
    }
    if depth > 0 {
        return Err(NativeErrorRecord::new(907, "ORA-00907: missing right parenthesis")
            .with_sql(sql, sql.len()));
    }
    Ok(PLACEHOLDER
        .captures_iter(&stripped)
        .map(|caps| normalise(&caps[1]))
        .collect())
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn native_value(value: BindValue<'_>) -> NativeValue {
    match value {
        BindValue::Null => NativeValue::Null,
        BindValue::Int(i) => NativeValue::Int(i),
        BindValue::Bool(b) => NativeValue::Int(i64::from(b)),
        BindValue::Text(s) => NativeValue::Text(s.into_owned()),
        BindValue::Bytes(b) => NativeValue::Bytes(b.into_owned()),
    }
}

impl MockOci {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return `result` for executed statements whose text contains `pattern`.
    pub fn on_query(&self, pattern: impl Into<String>, result: MockResult) -> &Self {
        self.state().queries.push((pattern.into(), result));
        self
    }

    /// Report `affected` rows for executed statements whose text contains `pattern`.
    pub fn on_execute(&self, pattern: impl Into<String>, affected: u64) -> &Self {
        self.state().affected.push((pattern.into(), affected));
        self
    }

    /// Value the engine writes into the in/out bind `name` on execution.
    pub fn with_out_value(&self, name: &str, value: NativeValue) -> &Self {
        self.state().out_values.insert(normalise(name), value);
        self
    }

    pub fn fail_connect(&self, code: i32, message: impl Into<String>) -> &Self {
        self.state().failures.connect = Some(NativeErrorRecord::new(code, message));
        self
    }

    /// Reject statements containing `pattern` at parse time, at the pattern's offset.
    pub fn fail_parse(&self, pattern: impl Into<String>) -> &Self {
        self.state().failures.parse.push(pattern.into());
        self
    }

    /// Reject binds of placeholder `name`.
    pub fn fail_bind(&self, name: &str) -> &Self {
        self.state().failures.bind.push(normalise(name));
        self
    }

    pub fn fail_execute(&self, pattern: impl Into<String>, code: i32, message: impl Into<String>) -> &Self {
        self.state()
            .failures
            .execute
            .push((pattern.into(), NativeErrorRecord::new(code, message)));
        self
    }

    /// Allow `writes` LOB writes in total, then fail every further write.
    pub fn fail_lob_write_after(&self, writes: usize) -> &Self {
        self.state().failures.lob_write_after = Some(writes);
        self
    }

    /// Fail every fetch after `rows` rows have been returned by a statement.
    pub fn fail_fetch_after(&self, rows: usize) -> &Self {
        self.state().failures.fetch_after = Some(rows);
        self
    }

    pub fn fail_new_lob(&self) -> &Self {
        self.state().failures.new_lob = true;
        self
    }

    pub fn fail_commit(&self) -> &Self {
        self.state().failures.commit = true;
        self
    }

    /// Accept at most `bytes` per LOB write, forcing partial writes.
    pub fn limit_write_size(&self, bytes: usize) -> &Self {
        self.state().max_write = Some(bytes.max(1));
        self
    }

    #[must_use]
    pub fn events(&self) -> Vec<MockEvent> {
        self.state().events.clone()
    }

    pub fn clear_events(&self) {
        self.state().events.clear();
    }

    #[must_use]
    pub fn live_connections(&self) -> usize {
        self.state().connections.values().filter(|live| **live).count()
    }

    #[must_use]
    pub fn live_statements(&self) -> usize {
        self.state().statements.values().filter(|s| s.live).count()
    }

    #[must_use]
    pub fn live_lobs(&self) -> usize {
        self.state().lobs.values().filter(|l| l.live).count()
    }

    /// Releases of handles that were already released.
    #[must_use]
    pub fn double_releases(&self) -> usize {
        self.state().double_releases
    }

    /// Statement text of every successful parse, in order.
    #[must_use]
    pub fn parsed_sql(&self) -> Vec<String> {
        let state = self.state();
        state
            .events
            .iter()
            .filter_map(|event| match event {
                MockEvent::Parse { stmt: Some(_), sql } => Some(sql.clone()),
                _ => None,
            })
            .collect()
    }

    /// Statement text of every execute call, in order.
    #[must_use]
    pub fn executed_sql(&self) -> Vec<String> {
        let state = self.state();
        state
            .events
            .iter()
            .filter_map(|event| match event {
                MockEvent::Execute { stmt, .. } => state.statements.get(stmt).map(|s| s.sql.clone()),
                _ => None,
            })
            .collect()
    }

    /// Placeholder names of every scalar and LOB bind, in call order.
    #[must_use]
    pub fn bound_names(&self) -> Vec<String> {
        self.state()
            .events
            .iter()
            .filter_map(|event| match event {
                MockEvent::Bind { name, .. } | MockEvent::BindLob { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Ids of every LOB descriptor allocated so far.
    #[must_use]
    pub fn allocated_lobs(&self) -> Vec<u64> {
        self.state()
            .events
            .iter()
            .filter_map(|event| match event {
                MockEvent::NewLob { lob } => Some(*lob),
                _ => None,
            })
            .collect()
    }

    /// Blocks written into descriptor `lob`, one entry per native write.
    #[must_use]
    pub fn lob_writes(&self, lob: u64) -> Vec<Vec<u8>> {
        self.state()
            .lobs
            .get(&lob)
            .map(|l| l.writes.clone())
            .unwrap_or_default()
    }

    /// Current content of descriptor `lob`, kept after it is freed.
    #[must_use]
    pub fn lob_content(&self, lob: u64) -> Option<Vec<u8>> {
        self.state().lobs.get(&lob).map(|l| l.data.clone())
    }

    #[must_use]
    pub fn commits(&self) -> usize {
        self.state()
            .events
            .iter()
            .filter(|event| matches!(event, MockEvent::Commit { .. }))
            .count()
    }
}

impl NativeInterface for MockOci {
    type Connection = MockConn;
    type Statement = MockStmt;
    type Lob = MockLob;

    fn connect(
        &self,
        _host: &str,
        user: &str,
        _password: &str,
        charset: Option<&str>,
    ) -> Result<MockConn, NativeErrorRecord> {
        let mut state = self.state();
        let outcome = match state.failures.connect.clone() {
            Some(record) => Err(record),
            None if user.is_empty() => Err(NativeErrorRecord::new(
                1017,
                "ORA-01017: invalid username/password; logon denied",
            )),
            None => {
                let id = state.next_handle();
                state.connections.insert(id, true);
                Ok(MockConn(id))
            }
        };
        state.events.push(MockEvent::Connect {
            conn: outcome.as_ref().ok().map(MockConn::id),
            user: user.to_owned(),
            charset: charset.map(str::to_owned),
        });
        outcome
    }

    fn close(&self, conn: MockConn) {
        let mut state = self.state();
        state.events.push(MockEvent::Close { conn: conn.0 });
        let was_live = state
            .connections
            .get_mut(&conn.0)
            .is_some_and(|live| std::mem::replace(live, false));
        if !was_live {
            state.double_releases += 1;
        }
    }

    fn parse(&self, conn: &MockConn, sql: &str) -> Result<MockStmt, NativeErrorRecord> {
        let mut state = self.state();
        let checked = state.conn_live(conn.0).and_then(|()| {
            if let Some(offset) = state
                .failures
                .parse
                .iter()
                .find_map(|pattern| sql.to_lowercase().find(&pattern.to_lowercase()))
            {
                return Err(NativeErrorRecord::new(904, "ORA-00904: invalid identifier")
                    .with_sql(sql, offset));
            }
            check_syntax(sql)
        });
        let outcome = checked.map(|placeholders| {
            let id = state.next_handle();
            state.statements.insert(
                id,
                StmtState {
                    sql: sql.to_owned(),
                    placeholders,
                    binds: HashMap::new(),
                    out_binds: Vec::new(),
                    executed: false,
                    result: None,
                    cursor: 0,
                    affected: 0,
                    live: true,
                },
            );
            MockStmt(id)
        });
        state.events.push(MockEvent::Parse {
            stmt: outcome.as_ref().ok().map(MockStmt::id),
            sql: sql.to_owned(),
        });
        outcome
    }

    fn bind_by_name(&self, stmt: &MockStmt, bind: NativeBind<'_>) -> Result<(), NativeErrorRecord> {
        let mut state = self.state();
        state.events.push(MockEvent::Bind {
            stmt: stmt.0,
            name: bind.name.to_owned(),
            value: bind.value.clone().into_owned(),
            native_type: bind.native_type,
            max_len: bind.max_len,
            direction: bind.direction,
        });
        let name = normalise(bind.name);
        if state.failures.bind.contains(&name) {
            return Err(NativeErrorRecord::new(
                1480,
                "ORA-01480: trailing null missing from STR bind value",
            ));
        }
        let s = state.stmt_mut(stmt.0)?;
        if !s.placeholders.contains(&name) {
            return Err(NativeErrorRecord::new(1036, "ORA-01036: illegal variable name/number"));
        }
        if bind.direction == BindDirection::InOut && !s.out_binds.contains(&name) {
            s.out_binds.push(name.clone());
        }
        s.binds.insert(name, native_value(bind.value));
        Ok(())
    }

    fn new_lob(&self, conn: &MockConn) -> Result<MockLob, NativeErrorRecord> {
        let mut state = self.state();
        state.conn_live(conn.0)?;
        if state.failures.new_lob {
            return Err(NativeErrorRecord::new(
                22925,
                "ORA-22925: operation would exceed maximum size allowed for a LOB value",
            ));
        }
        let id = state.next_handle();
        state.lobs.insert(
            id,
            LobState {
                live: true,
                ..LobState::default()
            },
        );
        state.events.push(MockEvent::NewLob { lob: id });
        Ok(MockLob(id))
    }

    fn bind_lob(
        &self,
        stmt: &MockStmt,
        name: &str,
        lob: &MockLob,
        native_type: NativeType,
    ) -> Result<(), NativeErrorRecord> {
        let mut state = self.state();
        state.events.push(MockEvent::BindLob {
            stmt: stmt.0,
            name: name.to_owned(),
            lob: lob.0,
            native_type,
        });
        let normalised = normalise(name);
        if state.failures.bind.contains(&normalised) {
            return Err(NativeErrorRecord::new(1036, "ORA-01036: illegal variable name/number"));
        }
        state.lob_mut(lob.0)?;
        let kind = if native_type == NativeType::Blob {
            LobKind::Blob
        } else {
            LobKind::Clob
        };
        let s = state.stmt_mut(stmt.0)?;
        if !s.placeholders.contains(&normalised) {
            return Err(NativeErrorRecord::new(1036, "ORA-01036: illegal variable name/number"));
        }
        s.binds.insert(
            normalised,
            NativeValue::Locator(LobLocator {
                id: lob.0,
                kind,
                length: 0,
            }),
        );
        Ok(())
    }

    fn execute(&self, stmt: &MockStmt) -> Result<(), NativeErrorRecord> {
        let mut state = self.state();
        state.events.push(MockEvent::Execute { stmt: stmt.0 });
        let sql = state.stmt_mut(stmt.0)?.sql.clone();

        if let Some((_, record)) = state
            .failures
            .execute
            .iter()
            .find(|(pattern, _)| contains_ci(&sql, pattern))
        {
            return Err(record.clone());
        }

        let result = state
            .queries
            .iter()
            .find(|(pattern, _)| contains_ci(&sql, pattern))
            .map(|(_, result)| result.clone());
        let affected = state
            .affected
            .iter()
            .find(|(pattern, _)| contains_ci(&sql, pattern))
            .map_or(0, |(_, affected)| *affected);
        let out_values = state.out_values.clone();

        let s = state.stmt_mut(stmt.0)?;
        s.executed = true;
        s.result = result;
        s.cursor = 0;
        s.affected = affected;
        for name in &s.out_binds {
            if let Some(value) = out_values.get(name) {
                s.binds.insert(name.clone(), value.clone());
            }
        }
        Ok(())
    }

    fn lob_rewind(&self, lob: &MockLob) -> Result<(), NativeErrorRecord> {
        let mut state = self.state();
        state.events.push(MockEvent::LobRewind { lob: lob.0 });
        state.lob_mut(lob.0)?.position = 0;
        Ok(())
    }

    fn lob_write(&self, lob: &MockLob, block: &[u8]) -> Result<usize, NativeErrorRecord> {
        let mut state = self.state();
        if state
            .failures
            .lob_write_after
            .is_some_and(|allowed| state.lob_writes >= allowed)
        {
            return Err(NativeErrorRecord::new(1691, "ORA-01691: unable to extend lob segment"));
        }
        let len = state.max_write.map_or(block.len(), |max| max.min(block.len()));
        let written = block[..len].to_vec();
        state.lob_writes += 1;
        state.events.push(MockEvent::LobWrite {
            lob: lob.0,
            bytes: written.clone(),
        });

        let l = state.lob_mut(lob.0)?;
        let end = l.position + len;
        if l.data.len() < end {
            l.data.resize(end, 0);
        }
        l.data[l.position..end].copy_from_slice(&written);
        l.position = end;
        l.writes.push(written);
        Ok(len)
    }

    fn free_lob(&self, lob: MockLob) {
        let mut state = self.state();
        state.events.push(MockEvent::FreeLob { lob: lob.0 });
        let was_live = state
            .lobs
            .get_mut(&lob.0)
            .is_some_and(|l| std::mem::replace(&mut l.live, false));
        if !was_live {
            state.double_releases += 1;
        }
    }

    fn bound_value(&self, stmt: &MockStmt, name: &str) -> Result<NativeValue, NativeErrorRecord> {
        let mut state = self.state();
        state.events.push(MockEvent::ReadBound {
            stmt: stmt.0,
            name: name.to_owned(),
        });
        state
            .stmt_mut(stmt.0)?
            .binds
            .get(&normalise(name))
            .cloned()
            .ok_or_else(|| NativeErrorRecord::new(1036, "ORA-01036: illegal variable name/number"))
    }

    fn fetch_row(&self, stmt: &MockStmt, mode: FetchMode) -> Result<Option<NativeRow>, NativeErrorRecord> {
        let mut state = self.state();
        state.events.push(MockEvent::Fetch {
            stmt: stmt.0,
            return_lobs: mode.return_lobs,
        });
        let fetch_after = state.failures.fetch_after;
        let locator_base = state.next_handle;

        let s = state.stmt_mut(stmt.0)?;
        if !s.executed {
            return Err(NativeErrorRecord::new(
                24374,
                "ORA-24374: define not done before fetch or execute and fetch",
            ));
        }
        if fetch_after.is_some_and(|rows| s.cursor >= rows) {
            return Err(NativeErrorRecord::new(3113, "ORA-03113: end-of-file on communication channel"));
        }
        let Some(result) = &s.result else {
            return Ok(None);
        };
        let Some(cells) = result.rows.get(s.cursor) else {
            return Ok(None);
        };

        let mut locators = 0u64;
        let columns = result
            .columns
            .iter()
            .cloned()
            .zip(cells.iter().cloned().map(|cell| match cell {
                MockCell::Value(value) => value,
                MockCell::Clob(text) if mode.return_lobs => NativeValue::Text(text),
                MockCell::Blob(bytes) if mode.return_lobs => NativeValue::Bytes(bytes),
                MockCell::Clob(text) => {
                    locators += 1;
                    NativeValue::Locator(LobLocator {
                        id: locator_base + locators,
                        kind: LobKind::Clob,
                        length: text.chars().count() as u64,
                    })
                }
                MockCell::Blob(bytes) => {
                    locators += 1;
                    NativeValue::Locator(LobLocator {
                        id: locator_base + locators,
                        kind: LobKind::Blob,
                        length: bytes.len() as u64,
                    })
                }
            }))
            .collect();
        s.cursor += 1;
        state.next_handle += locators;
        Ok(Some(NativeRow { columns }))
    }

    fn num_rows(&self, stmt: &MockStmt) -> u64 {
        let state = self.state();
        state.statements.get(&stmt.0).map_or(0, |s| {
            if s.result.is_some() {
                s.cursor as u64
            } else {
                s.affected
            }
        })
    }

    fn set_prefetch(&self, stmt: &MockStmt, rows: u32) -> Result<(), NativeErrorRecord> {
        let mut state = self.state();
        state.events.push(MockEvent::SetPrefetch { stmt: stmt.0, rows });
        state.stmt_mut(stmt.0).map(|_| ())
    }

    fn free_statement(&self, stmt: MockStmt) {
        let mut state = self.state();
        state.events.push(MockEvent::FreeStatement { stmt: stmt.0 });
        let was_live = state
            .statements
            .get_mut(&stmt.0)
            .is_some_and(|s| std::mem::replace(&mut s.live, false));
        if !was_live {
            state.double_releases += 1;
        }
    }

    fn commit(&self, conn: &MockConn) -> Result<(), NativeErrorRecord> {
        let mut state = self.state();
        state.events.push(MockEvent::Commit { conn: conn.0 });
        state.conn_live(conn.0)?;
        if state.failures.commit {
            return Err(NativeErrorRecord::new(2091, "ORA-02091: transaction rolled back"));
        }
        Ok(())
    }

    fn rollback(&self, conn: &MockConn) -> Result<(), NativeErrorRecord> {
        let mut state = self.state();
        state.events.push(MockEvent::Rollback { conn: conn.0 });
        state.conn_live(conn.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbalanced_parenthesis_reports_end_offset() {
        let sql = "SELECT (1 FROM dual";
        let err = check_syntax(sql).unwrap_err();
        assert_eq!(err.code, 907);
        assert_eq!(err.offset, Some(sql.len()));
    }

    #[test]
    fn placeholders_inside_literals_are_ignored() {
        let names = check_syntax("SELECT ':skip', 'it''s' FROM t WHERE a = :A AND b = :b_2").unwrap();
        assert_eq!(names, vec![":a".to_owned(), ":b_2".to_owned()]);
    }

    #[test]
    fn fetch_before_execute_fails() {
        let mock = MockOci::new();
        let conn = mock.connect("h", "u", "p", None).unwrap();
        let stmt = mock.parse(&conn, "SELECT 1 FROM dual").unwrap();
        let err = mock.fetch_row(&stmt, FetchMode { return_lobs: true }).unwrap_err();
        assert_eq!(err.code, 24374);
        mock.free_statement(stmt);
        mock.close(conn);
        assert_eq!(mock.live_connections(), 0);
        assert_eq!(mock.double_releases(), 0);
    }
}
