use std::io::{self, Cursor, Read};

use oci_middleware::LOB_CHUNK_SIZE;
use oci_middleware::prelude::*;
use oci_middleware::test_utils::{MockEvent, MockOci};
use oci_middleware::types::BindState;

fn connect(mock: &MockOci) -> Result<Connection<MockOci>, OciDbError> {
    let conn = OciDriver::new(mock.clone()).connect("db", "app", "secret", None, None)?;
    mock.clear_events();
    Ok(conn)
}

#[test]
fn blocks_are_written_after_execute_before_the_cursor() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockOci::new();
    let conn = connect(&mock)?;
    let mut stmt = conn.prepare("INSERT INTO files (name, body) VALUES (:name, :body)")?;
    stmt.bind(
        ParamList::new()
            .with_key("name", "report.bin")
            .with_key(
                "body",
                Param::blob(LobData::blocks(vec![
                    b"first".to_vec(),
                    b"second".to_vec(),
                    b"third".to_vec(),
                ])),
            ),
    )?;

    stmt.exec()?;
    let lob = mock.allocated_lobs()[0];
    assert_eq!(
        mock.lob_writes(lob),
        vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]
    );
    assert_eq!(mock.lob_content(lob), Some(b"firstsecondthird".to_vec()));

    let events = mock.events();
    let execute = events
        .iter()
        .position(|e| matches!(e, MockEvent::Execute { .. }))
        .ok_or("statement never executed")?;
    let writes: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, MockEvent::LobWrite { .. }))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(writes.len(), 3);
    assert!(writes.iter().all(|&i| i > execute));
    assert!(!events.iter().any(|e| matches!(e, MockEvent::Fetch { .. })));
    assert!(!events.iter().any(|e| matches!(e, MockEvent::Commit { .. })));

    assert_eq!(stmt.param("body").map(Param::state), Some(BindState::Uploaded));
    Ok(())
}

#[test]
fn uploads_follow_bind_order() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockOci::new();
    let conn = connect(&mock)?;
    let mut stmt = conn.prepare("INSERT INTO docs (a, b) VALUES (:a, :b)")?;
    stmt.bind(
        ParamList::new()
            .with_key("a", Param::text_lob(LobData::text("alpha")))
            .with_key("b", Param::blob(LobData::blocks(vec![b"beta".to_vec()]))),
    )?;
    stmt.exec()?;

    let written: Vec<Vec<u8>> = mock
        .events()
        .into_iter()
        .filter_map(|e| match e {
            MockEvent::LobWrite { bytes, .. } => Some(bytes),
            _ => None,
        })
        .collect();
    assert_eq!(written, vec![b"alpha".to_vec(), b"beta".to_vec()]);
    Ok(())
}

#[test]
fn streams_are_written_in_chunks() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockOci::new();
    let conn = connect(&mock)?;
    let content = vec![7u8; LOB_CHUNK_SIZE * 2 + 100];
    let mut stmt = conn.prepare("INSERT INTO files (body) VALUES (:p1)")?;
    stmt.bind(ParamList::new().push(Param::blob(LobData::stream(Cursor::new(content.clone())))))?;
    stmt.exec()?;

    let lob = mock.allocated_lobs()[0];
    let sizes: Vec<usize> = mock.lob_writes(lob).iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![LOB_CHUNK_SIZE, LOB_CHUNK_SIZE, 100]);
    assert_eq!(mock.lob_content(lob), Some(content));

    // the stream was consumed; executing again writes nothing more
    stmt.exec()?;
    assert_eq!(mock.lob_writes(lob).len(), 3);
    Ok(())
}

#[test]
fn block_content_is_rewritten_on_each_execution() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockOci::new();
    let conn = connect(&mock)?;
    let mut stmt = conn.prepare("INSERT INTO docs (body) VALUES (:body)")?;
    stmt.bind(ParamList::new().with_key("body", Param::text_lob(LobData::text("same"))))?;

    stmt.exec()?;
    stmt.exec()?;
    let lob = mock.allocated_lobs()[0];
    assert_eq!(mock.lob_writes(lob).len(), 2);
    assert_eq!(mock.lob_content(lob), Some(b"same".to_vec()));
    Ok(())
}

#[test]
fn partial_writes_are_continued() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockOci::new();
    mock.limit_write_size(2);
    let conn = connect(&mock)?;
    let mut stmt = conn.prepare("INSERT INTO docs (body) VALUES (:body)")?;
    stmt.bind(ParamList::new().with_key("body", Param::blob(LobData::blocks(vec![b"abcde".to_vec()]))))?;
    stmt.exec()?;

    let lob = mock.allocated_lobs()[0];
    assert_eq!(
        mock.lob_writes(lob),
        vec![b"ab".to_vec(), b"cd".to_vec(), b"e".to_vec()]
    );
    assert_eq!(mock.lob_content(lob), Some(b"abcde".to_vec()));
    Ok(())
}

#[test]
fn empty_content_is_skipped() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockOci::new();
    let conn = connect(&mock)?;
    let mut stmt = conn.prepare("INSERT INTO docs (a, b, c) VALUES (:a, :b, :c)")?;
    stmt.bind(
        ParamList::new()
            .with_key("a", Param::text_lob(LobData::text("")))
            .with_key("b", Param::pending(ParamType::Blob))
            .with_key("c", Param::new(ParamType::Text, "inline text")),
    )?;
    stmt.exec()?;

    let lobs = mock.allocated_lobs();
    assert!(mock.lob_writes(lobs[0]).is_empty());
    assert!(mock.lob_writes(lobs[1]).is_empty());
    assert_eq!(mock.lob_writes(lobs[2]), vec![b"inline text".to_vec()]);
    Ok(())
}

#[test]
fn every_block_gets_one_write() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockOci::new();
    let conn = connect(&mock)?;
    let mut stmt = conn.prepare("INSERT INTO docs (body) VALUES (:body)")?;
    stmt.bind(ParamList::new().with_key(
        "body",
        Param::blob(LobData::blocks(vec![b"a".to_vec(), Vec::new(), b"c".to_vec()])),
    ))?;
    stmt.exec()?;

    let lob = mock.allocated_lobs()[0];
    assert_eq!(
        mock.lob_writes(lob),
        vec![b"a".to_vec(), Vec::new(), b"c".to_vec()]
    );
    assert_eq!(mock.lob_content(lob), Some(b"ac".to_vec()));
    Ok(())
}

#[test]
fn failed_write_surfaces_and_leaks_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockOci::new();
    mock.fail_lob_write_after(1);
    let conn = connect(&mock)?;
    {
        let mut stmt = conn.prepare("INSERT INTO files (body) VALUES (:p1)")?;
        stmt.bind(ParamList::new().push(Param::blob(LobData::blocks(vec![
            b"one".to_vec(),
            b"two".to_vec(),
            b"three".to_vec(),
        ]))))?;
        let err = stmt.exec().unwrap_err();
        assert!(matches!(err, OciDbError::SqlExecutionError(_)));
        assert_eq!(err.code(), Some(1691));
        conn.rollback()?;
    }
    assert_eq!(mock.live_statements(), 0);
    assert_eq!(mock.live_lobs(), 0);
    assert_eq!(mock.double_releases(), 0);
    assert!(
        mock.events()
            .iter()
            .any(|e| matches!(e, MockEvent::Rollback { .. }))
    );
    Ok(())
}

struct FailingReader;

impl Read for FailingReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::other("disk went away"))
    }
}

#[test]
fn unreadable_stream_is_a_source_error() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockOci::new();
    let conn = connect(&mock)?;
    let mut stmt = conn.prepare("INSERT INTO files (body) VALUES (:p1)")?;
    stmt.bind(ParamList::new().push(Param::blob(LobData::stream(FailingReader))))?;
    assert!(matches!(stmt.exec(), Err(OciDbError::LobSource(_))));
    Ok(())
}

#[test]
fn descriptor_allocation_failure_releases_everything() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockOci::new();
    mock.fail_new_lob();
    let conn = connect(&mock)?;
    {
        let mut stmt = conn.prepare("INSERT INTO files (name, body) VALUES (:p1, :p2)")?;
        let err = stmt
            .bind(
                ParamList::new()
                    .push("x")
                    .push(Param::blob(LobData::blocks(vec![b"y".to_vec()]))),
            )
            .unwrap_err();
        assert!(matches!(err, OciDbError::BindError { ref name, .. } if name == ":p2"));
    }
    assert_eq!(mock.live_statements(), 0);
    assert_eq!(mock.live_lobs(), 0);
    Ok(())
}
