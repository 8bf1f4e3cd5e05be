use std::borrow::Cow;

use tracing::{debug, trace};

use super::{BoundParam, PendingUpload, Statement};
use crate::error::{OciDbError, OciError};
use crate::native::{
    BIND_SIZE_UNBOUNDED, BindDirection, BindValue, NativeBind, NativeErrorRecord,
    NativeInterface, PLACEHOLDER_MARKER,
};
use crate::type_map::{infer_native_type, native_type};
use crate::types::{
    BindEntry, BindState, Param, ParamList, ParamValue, TIMESTAMP_FORMAT, Value,
};

/// Prefix `name` with the placeholder marker unless it already carries one.
pub(crate) fn placeholder(name: &str) -> String {
    format!(
        "{PLACEHOLDER_MARKER}{}",
        name.trim_start_matches(PLACEHOLDER_MARKER)
    )
}

/// Render a scalar value the way the native bind call takes it.
///
/// Floats and timestamps travel as text in the session's numeric and date formats.
pub(crate) fn scalar_bind_value(value: &Value) -> Result<BindValue<'_>, OciDbError> {
    Ok(match value {
        Value::Null => BindValue::Null,
        Value::Int(i) => BindValue::Int(*i),
        Value::Float(f) => BindValue::Text(Cow::Owned(f.to_string())),
        Value::Text(s) => BindValue::Text(Cow::Borrowed(s)),
        Value::Bool(b) => BindValue::Bool(*b),
        Value::Timestamp(ts) => BindValue::Text(Cow::Owned(ts.format(TIMESTAMP_FORMAT).to_string())),
        Value::Blob(bytes) => BindValue::Bytes(Cow::Borrowed(bytes)),
        Value::Lob(_) => {
            return Err(OciDbError::ParameterError(
                "a fetched LOB locator cannot be bound as a value".into(),
            ));
        }
    })
}

fn bind_error(name: &str, value: String, record: NativeErrorRecord) -> OciDbError {
    OciDbError::BindError {
        name: name.to_owned(),
        value,
        source: OciError::translate(record),
    }
}

/// A declared size of zero means no limit.
fn declared_size(param: &Param) -> i32 {
    param
        .size()
        .filter(|&size| size > 0)
        .map_or(BIND_SIZE_UNBOUNDED, |size| i32::try_from(size).unwrap_or(i32::MAX))
}

impl<N: NativeInterface> Statement<'_, N> {
    /// Bind a parameter list.
    ///
    /// Entries are named by their key, else by the parameter's own name, else
    /// `p1`, `p2`, ... counting unnamed entries only. Scalars are bound first;
    /// LOB parameters are then bound to freshly allocated descriptors, and
    /// those flagged for upload are filled by [`Statement::exec`].
    ///
    /// Binding again replaces the previous binds and releases their descriptors.
    ///
    /// # Errors
    /// Returns `OciDbError::BindError` naming the rejected parameter, or
    /// `OciDbError::ParameterError` for parameters that cannot be bound at all.
    /// After a failed bind the statement refuses to execute until bound again.
    pub fn bind(&mut self, params: ParamList) -> Result<(), OciDbError> {
        self.release_binds();
        self.bind_failed = true;

        let native = self.native();
        let conn = self.conn.handle()?;
        let stmt = self.handle.as_ref().ok_or(OciDbError::StatementClosed)?;

        let mut unnamed = 0usize;
        let mut deferred: Vec<(String, Param)> = Vec::new();

        for (key, entry) in params.into_entries() {
            let explicit = key.as_deref().or(match &entry {
                BindEntry::Param(param) => param.name(),
                BindEntry::Raw(_) => None,
            });
            let name = match explicit.filter(|n| !n.is_empty()) {
                Some(n) => placeholder(n),
                None => {
                    unnamed += 1;
                    format!("{PLACEHOLDER_MARKER}p{unnamed}")
                }
            };

            match entry {
                BindEntry::Raw(value) => {
                    let bind = NativeBind {
                        name: &name,
                        value: scalar_bind_value(&value)?,
                        max_len: BIND_SIZE_UNBOUNDED,
                        native_type: infer_native_type(&value),
                        direction: BindDirection::In,
                    };
                    trace!(name = %name, native_type = ?bind.native_type, "binding raw value");
                    native
                        .bind_by_name(stmt, bind)
                        .map_err(|record| bind_error(&name, value.render(), record))?;
                }
                BindEntry::Param(mut param) => {
                    if param.is_generated_id() {
                        if param.param_type().is_lob() {
                            return Err(OciDbError::ParameterError(format!(
                                "{name}: a LOB parameter cannot receive a generated id"
                            )));
                        }
                        if self.generated_id.is_some() {
                            return Err(OciDbError::ParameterError(format!(
                                "{name}: only one parameter may receive a generated id"
                            )));
                        }
                    }
                    if param.param_type().is_lob() {
                        deferred.push((name, param));
                        continue;
                    }

                    let value = match param.value() {
                        None => BindValue::Null,
                        Some(ParamValue::Scalar(value)) => scalar_bind_value(value)?,
                        Some(ParamValue::Lob(_)) => {
                            return Err(OciDbError::ParameterError(format!(
                                "{name}: LOB content needs a text or blob parameter"
                            )));
                        }
                    };
                    let bind = NativeBind {
                        name: &name,
                        value,
                        max_len: declared_size(&param),
                        native_type: native_type(&param),
                        direction: if param.is_generated_id() {
                            BindDirection::InOut
                        } else {
                            BindDirection::In
                        },
                    };
                    trace!(name = %name, native_type = ?bind.native_type, "binding scalar parameter");
                    native.bind_by_name(stmt, bind).map_err(|record| {
                        let rendered = param.value().map_or_else(|| "(null)".to_owned(), ParamValue::render);
                        bind_error(&name, rendered, record)
                    })?;

                    param.transition(BindState::ScalarBound)?;
                    if param.is_generated_id() {
                        self.generated_id = Some(self.params.len());
                    }
                    self.params.push(BoundParam { name, param });
                }
            }
        }

        for (name, mut param) in deferred {
            let native_type = native_type(&param);
            let lob = native
                .new_lob(conn)
                .map_err(|record| bind_error(&name, "(descriptor)".to_owned(), record))?;
            let lob_index = self.lobs.len();
            self.lobs.push(lob);

            trace!(name = %name, native_type = ?native_type, "binding LOB descriptor");
            native
                .bind_lob(stmt, &name, &self.lobs[lob_index], native_type)
                .map_err(|record| bind_error(&name, "(descriptor)".to_owned(), record))?;

            if param.is_for_upload() {
                param.transition(BindState::DeferredForUpload)?;
                self.pending.push(PendingUpload {
                    lob: lob_index,
                    param: self.params.len(),
                });
            } else {
                param.transition(BindState::LobBound)?;
            }
            self.params.push(BoundParam { name, param });
        }

        debug!(
            params = self.params.len(),
            lobs = self.lobs.len(),
            pending_uploads = self.pending.len(),
            "parameters bound"
        );
        self.bind_failed = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn placeholder_adds_marker_once() {
        assert_eq!(placeholder("id"), ":id");
        assert_eq!(placeholder(":id"), ":id");
    }

    #[test]
    fn floats_and_timestamps_bind_as_text() {
        assert_eq!(
            scalar_bind_value(&Value::Float(12.5)).unwrap(),
            BindValue::Text(Cow::Borrowed("12.5"))
        );
        let ts = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 0)
            .unwrap();
        assert_eq!(
            scalar_bind_value(&Value::Timestamp(ts)).unwrap(),
            BindValue::Text(Cow::Borrowed("2024-03-09 07:05:00"))
        );
    }

    #[test]
    fn locators_are_not_bindable() {
        let locator = crate::native::LobLocator {
            id: 1,
            kind: crate::native::LobKind::Clob,
            length: 0,
        };
        assert!(matches!(
            scalar_bind_value(&Value::Lob(locator)),
            Err(OciDbError::ParameterError(_))
        ));
    }
}
