use std::fmt;
use std::io::Read;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::OciDbError;
use crate::native::LobLocator;

/// Format matching the session's `nls_date_format`.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Abstract parameter type tags accepted from callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    #[serde(alias = "int")]
    Integer,
    #[serde(alias = "bool")]
    Boolean,
    Float,
    #[serde(alias = "str")]
    String,
    /// Character large object.
    #[serde(alias = "clob")]
    Text,
    /// Binary large object.
    Blob,
    /// Raw binary bound inline.
    #[serde(alias = "bin")]
    Binary,
}

impl ParamType {
    /// Whether values of this type are bound through a LOB descriptor.
    #[must_use]
    pub fn is_lob(self) -> bool {
        matches!(self, ParamType::Text | ParamType::Blob)
    }
}

impl FromStr for ParamType {
    type Err = OciDbError;

    /// Parse a caller-supplied tag. Unknown tags are a configuration fault.
    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.to_ascii_lowercase().as_str() {
            "integer" | "int" => Ok(ParamType::Integer),
            "boolean" | "bool" => Ok(ParamType::Boolean),
            "float" => Ok(ParamType::Float),
            "string" | "str" => Ok(ParamType::String),
            "text" | "clob" => Ok(ParamType::Text),
            "blob" => Ok(ParamType::Blob),
            "binary" | "bin" => Ok(ParamType::Binary),
            other => Err(OciDbError::ConfigError(format!(
                "parameter type `{other}` is not supported"
            ))),
        }
    }
}

/// Values used as untyped parameters and returned in fetched rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Timestamp(NaiveDateTime),
    Blob(Vec<u8>),
    /// A LOB column fetched without materialising its content.
    Lob(LobLocator),
}

impl Value {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        if let Value::Int(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let Value::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let Value::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_lob(&self) -> Option<&LobLocator> {
        if let Value::Lob(locator) = self {
            Some(locator)
        } else {
            None
        }
    }

    /// Human-readable rendering used in bind error messages.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Value::Null => "(null)".to_owned(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Timestamp(ts) => ts.format(TIMESTAMP_FORMAT).to_string(),
            Value::Blob(_) => "(binary)".to_owned(),
            Value::Lob(_) => "(lob)".to_owned(),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Blob(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::Timestamp(value)
    }
}

/// Content destined for a LOB descriptor.
pub enum LobData {
    /// Ordered blocks, written one native call per block.
    Blocks(Vec<Vec<u8>>),
    /// A reader drained in fixed-size chunks; consumed by the first upload.
    Stream(Box<dyn Read + Send>),
}

impl LobData {
    #[must_use]
    pub fn blocks<I, B>(blocks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        LobData::Blocks(blocks.into_iter().map(Into::into).collect())
    }

    /// Text content as a single UTF-8 block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        LobData::Blocks(vec![text.into().into_bytes()])
    }

    #[must_use]
    pub fn stream(reader: impl Read + Send + 'static) -> Self {
        LobData::Stream(Box::new(reader))
    }

    /// True when there is nothing to upload.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            LobData::Blocks(blocks) => blocks.iter().all(Vec::is_empty),
            LobData::Stream(_) => false,
        }
    }
}

impl fmt::Debug for LobData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LobData::Blocks(blocks) => f
                .debug_struct("Blocks")
                .field("count", &blocks.len())
                .field("bytes", &blocks.iter().map(Vec::len).sum::<usize>())
                .finish(),
            LobData::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// The value carried by a typed parameter.
#[derive(Debug)]
pub enum ParamValue {
    Scalar(Value),
    Lob(LobData),
}

impl ParamValue {
    #[must_use]
    pub fn as_scalar(&self) -> Option<&Value> {
        if let ParamValue::Scalar(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn render(&self) -> String {
        match self {
            ParamValue::Scalar(value) => value.render(),
            ParamValue::Lob(_) => "(lob)".to_owned(),
        }
    }
}

impl<T: Into<Value>> From<T> for ParamValue {
    fn from(value: T) -> Self {
        ParamValue::Scalar(value.into())
    }
}

impl From<LobData> for ParamValue {
    fn from(value: LobData) -> Self {
        ParamValue::Lob(value)
    }
}

/// Where a parameter is in the two-phase bind protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindState {
    Unbound,
    /// Bound inline during the scalar phase.
    ScalarBound,
    /// A LOB descriptor is bound but nothing will be written into it.
    LobBound,
    /// A LOB descriptor is bound and waits for content after execution.
    DeferredForUpload,
    /// Content has been written into the bound descriptor.
    Uploaded,
}

impl BindState {
    #[must_use]
    pub fn is_bound(self) -> bool {
        !matches!(self, BindState::Unbound)
    }
}

/// A typed bind variable.
///
/// ```rust
/// use oci_middleware::prelude::*;
///
/// let id = Param::pending(ParamType::Integer).named("id").generated_id();
/// let body = Param::new(ParamType::Blob, LobData::blocks(vec![b"abc".to_vec()]));
/// # let _ = (id, body);
/// ```
#[derive(Debug)]
pub struct Param {
    name: Option<String>,
    param_type: ParamType,
    value: Option<ParamValue>,
    size: Option<u32>,
    generated_id: bool,
    upload: bool,
    state: BindState,
}

impl Param {
    /// Create an unbound parameter. LOB parameters are flagged for upload.
    pub fn new(param_type: ParamType, value: impl Into<ParamValue>) -> Self {
        let mut param = Self::pending(param_type);
        param.value = Some(value.into());
        param
    }

    /// A parameter whose value is not known yet, e.g. a generated-id output.
    #[must_use]
    pub fn pending(param_type: ParamType) -> Self {
        Self {
            name: None,
            param_type,
            value: None,
            size: None,
            generated_id: false,
            upload: param_type.is_lob(),
            state: BindState::Unbound,
        }
    }

    #[must_use]
    pub fn int(value: i64) -> Self {
        Self::new(ParamType::Integer, value)
    }

    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        let value: String = value.into();
        Self::new(ParamType::String, value)
    }

    #[must_use]
    pub fn text_lob(data: LobData) -> Self {
        Self::new(ParamType::Text, data)
    }

    #[must_use]
    pub fn blob(data: LobData) -> Self {
        Self::new(ParamType::Blob, data)
    }

    /// An output LOB: bound to a descriptor, never written by the adapter.
    #[must_use]
    pub fn lob_output(param_type: ParamType) -> Self {
        Self::pending(param_type).with_upload(false)
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Declared maximum size in bytes.
    #[must_use]
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Designate this parameter to receive a server-generated id.
    #[must_use]
    pub fn generated_id(mut self) -> Self {
        self.generated_id = true;
        self
    }

    #[must_use]
    pub fn with_upload(mut self, upload: bool) -> Self {
        self.upload = upload;
        self
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn param_type(&self) -> ParamType {
        self.param_type
    }

    #[must_use]
    pub fn value(&self) -> Option<&ParamValue> {
        self.value.as_ref()
    }

    #[must_use]
    pub fn size(&self) -> Option<u32> {
        self.size
    }

    #[must_use]
    pub fn is_generated_id(&self) -> bool {
        self.generated_id
    }

    #[must_use]
    pub fn is_for_upload(&self) -> bool {
        self.upload
    }

    #[must_use]
    pub fn state(&self) -> BindState {
        self.state
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.state.is_bound()
    }

    pub(crate) fn value_mut(&mut self) -> Option<&mut ParamValue> {
        self.value.as_mut()
    }

    pub(crate) fn set_value(&mut self, value: ParamValue) {
        self.value = Some(value);
    }

    pub(crate) fn take_value(&mut self) -> Option<ParamValue> {
        self.value.take()
    }

    pub(crate) fn transition(&mut self, to: BindState) -> Result<(), OciDbError> {
        let allowed = matches!(
            (self.state, to),
            (
                BindState::Unbound,
                BindState::ScalarBound | BindState::LobBound | BindState::DeferredForUpload
            ) | (
                BindState::DeferredForUpload | BindState::Uploaded,
                BindState::Uploaded
            )
        );
        if allowed {
            self.state = to;
            Ok(())
        } else {
            Err(OciDbError::ParameterError(format!(
                "parameter {} cannot move from {:?} to {:?}",
                self.name.as_deref().unwrap_or("(unnamed)"),
                self.state,
                to
            )))
        }
    }
}

/// One entry of a parameter list.
#[derive(Debug)]
pub enum BindEntry {
    /// Untyped value; its native type is inferred.
    Raw(Value),
    Param(Param),
}

impl From<Param> for BindEntry {
    fn from(param: Param) -> Self {
        BindEntry::Param(param)
    }
}

impl<T: Into<Value>> From<T> for BindEntry {
    fn from(value: T) -> Self {
        BindEntry::Raw(value.into())
    }
}

/// Ordered parameters for one statement; entries are positional or keyed.
///
/// ```rust
/// use oci_middleware::prelude::*;
///
/// let params = ParamList::new()
///     .push(10)
///     .push(Param::string("alice").named("name"))
///     .with_key("active", true);
/// assert_eq!(params.len(), 3);
/// ```
#[derive(Debug, Default)]
pub struct ParamList {
    entries: Vec<(Option<String>, BindEntry)>,
}

impl ParamList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional entry.
    #[must_use]
    pub fn push(mut self, entry: impl Into<BindEntry>) -> Self {
        self.entries.push((None, entry.into()));
        self
    }

    /// Append an entry bound under `key`.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>, entry: impl Into<BindEntry>) -> Self {
        self.entries.push((Some(key.into()), entry.into()));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<(Option<String>, BindEntry)> {
        self.entries
    }
}

impl<E: Into<BindEntry>> FromIterator<E> for ParamList {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|e| (None, e.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lob_params_default_to_upload() {
        assert!(Param::blob(LobData::blocks(vec![b"x".to_vec()])).is_for_upload());
        assert!(!Param::int(1).is_for_upload());
        assert!(!Param::lob_output(ParamType::Text).is_for_upload());
    }

    #[test]
    fn bind_state_rejects_double_bind() {
        let mut p = Param::int(1).named("a");
        p.transition(BindState::ScalarBound).unwrap();
        assert!(p.is_bound());
        let err = p.transition(BindState::ScalarBound).unwrap_err();
        assert!(matches!(err, OciDbError::ParameterError(_)));
    }

    #[test]
    fn upload_requires_deferred_bind() {
        let mut p = Param::text_lob(LobData::text("abc"));
        assert!(p.transition(BindState::Uploaded).is_err());
        p.transition(BindState::DeferredForUpload).unwrap();
        p.transition(BindState::Uploaded).unwrap();
        // re-executing a statement uploads again
        p.transition(BindState::Uploaded).unwrap();
    }

    #[test]
    fn parses_type_tags() {
        assert_eq!("INT".parse::<ParamType>().unwrap(), ParamType::Integer);
        assert_eq!("clob".parse::<ParamType>().unwrap(), ParamType::Text);
        let err = "date".parse::<ParamType>().unwrap_err();
        assert!(matches!(err, OciDbError::ConfigError(_)));
    }

    #[test]
    fn deserializes_type_tags() {
        let tags: Vec<ParamType> = serde_json::from_str(r#"["integer","bool","blob","bin"]"#).unwrap();
        assert_eq!(
            tags,
            vec![ParamType::Integer, ParamType::Boolean, ParamType::Blob, ParamType::Binary]
        );
        assert!(serde_json::from_str::<ParamType>(r#""cursor""#).is_err());
    }

    #[test]
    fn empty_blocks_are_empty() {
        assert!(LobData::blocks(Vec::<Vec<u8>>::new()).is_empty());
        assert!(LobData::blocks(vec![Vec::new()]).is_empty());
        assert!(!LobData::text("a").is_empty());
    }

    #[test]
    fn renders_values_for_diagnostics() {
        assert_eq!(Value::Int(7).render(), "7");
        assert_eq!(Value::Null.render(), "(null)");
        assert_eq!(Value::Blob(vec![1]).render(), "(binary)");
        assert_eq!(ParamValue::Lob(LobData::text("x")).render(), "(lob)");
    }
}
