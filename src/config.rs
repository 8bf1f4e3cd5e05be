use std::fmt;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::OciDbError;

static SESSION_PARAM_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_$#]*$").expect("session parameter pattern is valid")
});

/// Ordered `ALTER SESSION` settings applied right after connecting.
///
/// Names are normalised to lowercase and must be plain identifiers; values are
/// SQL fragments inserted verbatim, so string values carry their own quotes.
///
/// ```rust
/// use oci_middleware::prelude::*;
///
/// let params = SessionParams::from_json(r#"{"NLS_SORT": "binary", "nls_comp": "binary"}"#)?;
/// assert_eq!(params.get("nls_sort"), Some("binary"));
/// # Ok::<(), OciDbError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "IndexMap<String, String>",
    into = "IndexMap<String, String>"
)]
pub struct SessionParams {
    params: IndexMap<String, String>,
}

impl SessionParams {
    /// An empty set of settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            params: IndexMap::new(),
        }
    }

    /// Parse settings from a JSON object.
    ///
    /// # Errors
    /// Returns `OciDbError::ConfigError` if the JSON is malformed or a name is not an identifier.
    pub fn from_json(json: &str) -> Result<Self, OciDbError> {
        serde_json::from_str(json)
            .map_err(|e| OciDbError::ConfigError(format!("invalid session parameters: {e}")))
    }

    /// Set `name` to `value`, replacing any previous value for that name.
    ///
    /// # Errors
    /// Returns `OciDbError::ConfigError` if `name` is not a plain identifier.
    pub fn insert(
        &mut self,
        name: impl AsRef<str>,
        value: impl Into<String>,
    ) -> Result<(), OciDbError> {
        let name = validate_name(name.as_ref())?;
        self.params.insert(name, value.into());
        Ok(())
    }

    /// Builder-style [`SessionParams::insert`].
    ///
    /// # Errors
    /// Returns `OciDbError::ConfigError` if `name` is not a plain identifier.
    pub fn with(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Result<Self, OciDbError> {
        self.insert(name, value)?;
        Ok(self)
    }

    /// Set `name` only if it is not present yet.
    pub(crate) fn insert_if_absent(&mut self, name: &str, value: &str) {
        self.params
            .entry(name.to_ascii_lowercase())
            .or_insert_with(|| value.to_owned());
    }

    /// Set a name already known to be a valid identifier, replacing any previous value.
    pub(crate) fn set_unchecked(&mut self, name: &str, value: &str) {
        self.params.insert(name.to_ascii_lowercase(), value.to_owned());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(&name.to_ascii_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl Default for SessionParams {
    /// Numeric characters, sort and comparison collation.
    fn default() -> Self {
        let mut params = IndexMap::new();
        params.insert("nls_numeric_characters".to_owned(), "'. '".to_owned());
        params.insert("nls_sort".to_owned(), "binary_ci".to_owned());
        params.insert("nls_comp".to_owned(), "linguistic".to_owned());
        Self { params }
    }
}

impl TryFrom<IndexMap<String, String>> for SessionParams {
    type Error = OciDbError;

    fn try_from(map: IndexMap<String, String>) -> Result<Self, Self::Error> {
        let mut params = SessionParams::new();
        for (name, value) in map {
            params.insert(name, value)?;
        }
        Ok(params)
    }
}

impl From<SessionParams> for IndexMap<String, String> {
    fn from(params: SessionParams) -> Self {
        params.params
    }
}

fn validate_name(name: &str) -> Result<String, OciDbError> {
    if SESSION_PARAM_NAME.is_match(name) {
        Ok(name.to_ascii_lowercase())
    } else {
        Err(OciDbError::ConfigError(format!(
            "`{name}` is not a valid session parameter name"
        )))
    }
}

/// Everything needed to open a session.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectOptions {
    /// Connect string: an easy-connect `host[:port]/service` or a TNS alias.
    pub host: String,
    pub user: String,
    pub password: String,
    /// Schema to switch to when it differs from `user`.
    #[serde(default)]
    pub schema: Option<String>,
    /// Client character set, e.g. `AL32UTF8`.
    #[serde(default)]
    pub charset: Option<String>,
}

impl ConnectOptions {
    #[must_use]
    pub fn new(host: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            password: password.into(),
            schema: None,
            charset: None,
        }
    }

    #[must_use]
    pub fn builder(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> ConnectOptionsBuilder {
        ConnectOptionsBuilder::new(host, user, password)
    }

    /// Parse options from JSON.
    ///
    /// # Errors
    /// Returns `OciDbError::ConfigError` if the JSON does not describe valid options.
    pub fn from_json(json: &str) -> Result<Self, OciDbError> {
        serde_json::from_str(json)
            .map_err(|e| OciDbError::ConfigError(format!("invalid connect options: {e}")))
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"***")
            .field("schema", &self.schema)
            .field("charset", &self.charset)
            .finish()
    }
}

/// Fluent builder for [`ConnectOptions`].
#[derive(Debug, Clone)]
pub struct ConnectOptionsBuilder {
    opts: ConnectOptions,
}

impl ConnectOptionsBuilder {
    #[must_use]
    pub fn new(host: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            opts: ConnectOptions::new(host, user, password),
        }
    }

    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.opts.schema = Some(schema.into());
        self
    }

    #[must_use]
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.opts.charset = Some(charset.into());
        self
    }

    #[must_use]
    pub fn finish(self) -> ConnectOptions {
        self.opts
    }
}
