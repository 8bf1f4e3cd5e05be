use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{ConnectOptions, SessionParams};
use crate::connection::Connection;
use crate::error::OciDbError;
use crate::native::NativeInterface;

/// Date and time formats every session gets unless the configured settings name them.
pub const FIXED_SESSION_PARAMS: [(&str, &str); 3] = [
    ("nls_date_format", "'YYYY-MM-DD HH24:MI:SS'"),
    ("nls_timestamp_format", "'YYYY-MM-DD HH24:MI:SSXFF'"),
    ("nls_timestamp_tz_format", "'YYYY-MM-DD HH24:MI:SSXFF TZR'"),
];

const SCHEMA_PARAM: &str = "current_schema";

/// `ALTER SESSION` statement for one setting.
#[must_use]
pub fn session_statement(name: &str, value: &str) -> String {
    format!("ALTER SESSION SET {name} = {value}")
}

/// Opens sessions through a native interface and applies session settings.
///
/// ```rust
/// use oci_middleware::prelude::*;
/// use oci_middleware::test_utils::MockOci;
///
/// let driver = OciDriver::new(MockOci::new());
/// let conn = driver.connect("db:1521/ORCL", "app", "secret", Some("reporting"), None)?;
/// assert!(conn.is_connected());
/// # Ok::<(), OciDbError>(())
/// ```
pub struct OciDriver<N: NativeInterface> {
    native: Arc<N>,
    session_params: SessionParams,
}

impl<N: NativeInterface> OciDriver<N> {
    pub fn new(native: N) -> Self {
        Self::from_shared(Arc::new(native))
    }

    pub fn from_shared(native: Arc<N>) -> Self {
        Self {
            native,
            session_params: SessionParams::default(),
        }
    }

    #[must_use]
    pub fn native(&self) -> &Arc<N> {
        &self.native
    }

    #[must_use]
    pub fn dbms_name(&self) -> &'static str {
        "oracle"
    }

    #[must_use]
    pub fn session_params(&self) -> &SessionParams {
        &self.session_params
    }

    /// Replace the configured session settings. The previous map is discarded, not merged.
    pub fn set_session_params(&mut self, session_params: SessionParams) -> &mut Self {
        self.session_params = session_params;
        self
    }

    #[must_use]
    pub fn with_session_params(mut self, session_params: SessionParams) -> Self {
        self.session_params = session_params;
        self
    }

    /// The settings a session for `user` will receive, in application order.
    ///
    /// Configured settings come first, then the fixed date formats they do not
    /// already name, then `current_schema` when `schema` differs from `user`
    /// (compared case-insensitively).
    #[must_use]
    pub fn effective_session_params(&self, user: &str, schema: Option<&str>) -> SessionParams {
        let mut params = self.session_params.clone();
        for (name, value) in FIXED_SESSION_PARAMS {
            params.insert_if_absent(name, value);
        }
        if let Some(schema) = schema.filter(|s| !s.is_empty())
            && schema.to_lowercase() != user.to_lowercase()
        {
            params.set_unchecked(SCHEMA_PARAM, schema);
        }
        params
    }

    /// Open a session and apply the session settings, then commit them.
    ///
    /// # Errors
    /// Returns `OciDbError::ConnectionError` if the session cannot be opened or
    /// the settings cannot be committed; a setting the engine rejects surfaces as
    /// `OciDbError::SqlSyntaxError` or `OciDbError::SqlExecutionError`. The
    /// session is closed again on every error path.
    pub fn connect(
        &self,
        host: &str,
        user: &str,
        password: &str,
        schema: Option<&str>,
        charset: Option<&str>,
    ) -> Result<Connection<N>, OciDbError> {
        debug!(host, user, "opening session");
        let handle = self
            .native
            .connect(host, user, password, charset)
            .map_err(OciDbError::connection)?;
        let conn = Connection::new(Arc::clone(&self.native), handle);

        let params = self.effective_session_params(user, schema);
        for (name, value) in params.iter() {
            debug!(param = name, "applying session setting");
            let mut stmt = conn.prepare(&session_statement(name, value))?;
            stmt.exec()?;
        }

        conn.commit().map_err(|e| {
            warn!(host, user, "session settings could not be committed");
            OciDbError::ConnectionError {
                message: "Can't commit session settings".into(),
                source: e.native_error().cloned(),
            }
        })?;
        debug!(settings = params.len(), "session ready");
        Ok(conn)
    }

    /// [`OciDriver::connect`] from a [`ConnectOptions`].
    ///
    /// # Errors
    /// Same as [`OciDriver::connect`].
    pub fn connect_with(&self, opts: &ConnectOptions) -> Result<Connection<N>, OciDbError> {
        self.connect(
            &opts.host,
            &opts.user,
            &opts.password,
            opts.schema.as_deref(),
            opts.charset.as_deref(),
        )
    }
}

impl<N: NativeInterface> fmt::Debug for OciDriver<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OciDriver")
            .field("session_params", &self.session_params)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockOci;

    fn names(params: &SessionParams) -> Vec<&str> {
        params.iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn same_schema_adds_no_switch() {
        let driver = OciDriver::new(MockOci::new());
        let params = driver.effective_session_params("APP", Some("app"));
        assert!(!params.contains(SCHEMA_PARAM));
        assert_eq!(
            names(&params),
            vec![
                "nls_numeric_characters",
                "nls_sort",
                "nls_comp",
                "nls_date_format",
                "nls_timestamp_format",
                "nls_timestamp_tz_format",
            ]
        );
    }

    #[test]
    fn other_schema_adds_switch_last() {
        let driver = OciDriver::new(MockOci::new());
        let params = driver.effective_session_params("APP", Some("REPORTING"));
        assert_eq!(params.get(SCHEMA_PARAM), Some("REPORTING"));
        assert_eq!(names(&params).last(), Some(&SCHEMA_PARAM));
    }

    #[test]
    fn missing_schema_adds_no_switch() {
        let driver = OciDriver::new(MockOci::new());
        assert!(!driver.effective_session_params("APP", None).contains(SCHEMA_PARAM));
    }

    #[test]
    fn configured_formats_win_over_fixed_ones() {
        let custom = SessionParams::new()
            .with("NLS_DATE_FORMAT", "'DD.MM.YYYY'")
            .unwrap();
        let driver = OciDriver::new(MockOci::new()).with_session_params(custom);
        let params = driver.effective_session_params("app", None);
        assert_eq!(params.get("nls_date_format"), Some("'DD.MM.YYYY'"));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn setter_replaces_instead_of_merging() {
        let mut driver = OciDriver::new(MockOci::new());
        driver.set_session_params(SessionParams::new().with("nls_comp", "binary").unwrap());
        assert_eq!(driver.session_params().len(), 1);
        assert!(!driver.session_params().contains("nls_sort"));
    }

    #[test]
    fn renders_alter_session() {
        assert_eq!(
            session_statement("nls_sort", "binary_ci"),
            "ALTER SESSION SET nls_sort = binary_ci"
        );
    }
}
