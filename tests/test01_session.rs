use oci_middleware::prelude::*;
use oci_middleware::session::session_statement;
use oci_middleware::test_utils::{MockEvent, MockOci};

#[test]
fn connect_applies_settings_in_order_then_commits() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockOci::new();
    let driver = OciDriver::new(mock.clone());
    let conn = driver.connect("db:1521/ORCL", "APP", "secret", Some("app"), Some("AL32UTF8"))?;
    assert!(conn.is_connected());

    assert_eq!(
        mock.parsed_sql(),
        vec![
            "ALTER SESSION SET nls_numeric_characters = '. '",
            "ALTER SESSION SET nls_sort = binary_ci",
            "ALTER SESSION SET nls_comp = linguistic",
            "ALTER SESSION SET nls_date_format = 'YYYY-MM-DD HH24:MI:SS'",
            "ALTER SESSION SET nls_timestamp_format = 'YYYY-MM-DD HH24:MI:SSXFF'",
            "ALTER SESSION SET nls_timestamp_tz_format = 'YYYY-MM-DD HH24:MI:SSXFF TZR'",
        ]
    );
    assert_eq!(mock.executed_sql().len(), 6);
    assert_eq!(mock.commits(), 1);
    assert_eq!(mock.live_statements(), 0);

    let events = mock.events();
    assert!(matches!(
        &events[0],
        MockEvent::Connect { user, charset: Some(cs), .. } if user == "APP" && cs == "AL32UTF8"
    ));
    assert!(matches!(events.last(), Some(MockEvent::Commit { .. })));
    Ok(())
}

#[test]
fn other_schema_is_switched_to_last() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockOci::new();
    let driver = OciDriver::new(mock.clone());
    let _conn = driver.connect("db", "APP", "secret", Some("REPORTING"), None)?;

    let parsed = mock.parsed_sql();
    assert_eq!(parsed.len(), 7);
    assert_eq!(
        parsed.last().map(String::as_str),
        Some("ALTER SESSION SET current_schema = REPORTING")
    );
    Ok(())
}

#[test]
fn no_schema_means_no_switch() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockOci::new();
    let driver = OciDriver::new(mock.clone());
    let _conn = driver.connect("db", "app", "secret", None, None)?;
    assert!(
        mock.parsed_sql()
            .iter()
            .all(|sql| !sql.contains("current_schema"))
    );
    Ok(())
}

#[test]
fn configured_settings_replace_defaults() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockOci::new();
    let params = SessionParams::from_json(
        r#"{"nls_territory": "'GERMANY'", "NLS_DATE_FORMAT": "'DD.MM.YYYY'"}"#,
    )?;
    let driver = OciDriver::new(mock.clone()).with_session_params(params);
    let _conn = driver.connect("db", "app", "secret", None, None)?;

    assert_eq!(
        mock.parsed_sql(),
        vec![
            session_statement("nls_territory", "'GERMANY'"),
            session_statement("nls_date_format", "'DD.MM.YYYY'"),
            session_statement("nls_timestamp_format", "'YYYY-MM-DD HH24:MI:SSXFF'"),
            session_statement("nls_timestamp_tz_format", "'YYYY-MM-DD HH24:MI:SSXFF TZR'"),
        ]
    );
    Ok(())
}

#[test]
fn connect_with_options() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockOci::new();
    let driver = OciDriver::new(mock.clone());
    let opts = ConnectOptions::builder("db:1521/ORCL", "app", "secret")
        .schema("audit")
        .finish();
    let conn = driver.connect_with(&opts)?;
    assert!(conn.is_connected());
    assert!(
        mock.parsed_sql()
            .contains(&"ALTER SESSION SET current_schema = audit".to_owned())
    );
    assert_eq!(driver.dbms_name(), "oracle");
    Ok(())
}

#[test]
fn native_connect_failure_is_a_connection_error() {
    let mock = MockOci::new();
    mock.fail_connect(12154, "ORA-12154: TNS:could not resolve the connect identifier specified");
    let driver = OciDriver::new(mock.clone());

    let err = driver
        .connect("nowhere", "app", "secret", None, None)
        .unwrap_err();
    assert!(matches!(err, OciDbError::ConnectionError { .. }));
    assert_eq!(err.code(), Some(12154));
    assert_eq!(mock.live_connections(), 0);
}

#[test]
fn failed_setting_closes_the_session() {
    let mock = MockOci::new();
    mock.fail_parse("nls_comp");
    let driver = OciDriver::new(mock.clone());

    let err = driver.connect("db", "app", "secret", None, None).unwrap_err();
    assert!(matches!(err, OciDbError::SqlSyntaxError(_)));
    assert_eq!(mock.commits(), 0);
    assert_eq!(mock.live_connections(), 0);
    assert_eq!(mock.live_statements(), 0);
    assert_eq!(mock.double_releases(), 0);
}

#[test]
fn failed_commit_reports_and_closes() {
    let mock = MockOci::new();
    mock.fail_commit();
    let driver = OciDriver::new(mock.clone());

    let err = driver.connect("db", "app", "secret", None, None).unwrap_err();
    match &err {
        OciDbError::ConnectionError { message, source } => {
            assert_eq!(message, "Can't commit session settings");
            assert_eq!(source.as_ref().map(OciError::code), Some(2091));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(mock.live_connections(), 0);
}

#[test]
fn disconnect_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let mock = MockOci::new();
    let driver = OciDriver::new(mock.clone());
    let mut conn = driver.connect("db", "app", "secret", None, None)?;

    conn.disconnect();
    conn.disconnect();
    assert!(!conn.is_connected());
    drop(conn);

    assert_eq!(mock.live_connections(), 0);
    assert_eq!(mock.double_releases(), 0);
    Ok(())
}

#[test]
fn closed_connection_refuses_work() -> Result<(), Box<dyn std::error::Error>> {
    let driver = OciDriver::new(MockOci::new());
    let mut conn = driver.connect("db", "app", "secret", None, None)?;
    conn.disconnect();

    assert!(matches!(
        conn.prepare("SELECT 1 FROM dual"),
        Err(OciDbError::ConnectionClosed)
    ));
    conn.commit()?;
    conn.rollback()?;
    Ok(())
}
