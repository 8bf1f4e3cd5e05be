use std::io::{ErrorKind, Read};

use tracing::debug;

use super::Statement;
use crate::error::OciDbError;
use crate::native::{NativeErrorRecord, NativeInterface};
use crate::results::{GeneratedId, ResultCursor};
use crate::types::{BindState, LobData, Param, ParamValue, Value};

/// Bytes read from a streamed LOB source per native write.
pub const LOB_CHUNK_SIZE: usize = 8 * 1024;

fn write_block<N: NativeInterface>(native: &N, lob: &N::Lob, block: &[u8]) -> Result<(), OciDbError> {
    if block.is_empty() {
        native.lob_write(lob, block).map_err(OciDbError::execution)?;
        return Ok(());
    }
    let mut rest = block;
    while !rest.is_empty() {
        let written = native.lob_write(lob, rest).map_err(OciDbError::execution)?;
        if written == 0 {
            return Err(OciDbError::execution(NativeErrorRecord::new(
                0,
                "LOB write made no progress",
            )));
        }
        rest = &rest[written.min(rest.len())..];
    }
    Ok(())
}

fn write_stream<N: NativeInterface>(
    native: &N,
    lob: &N::Lob,
    reader: &mut dyn Read,
) -> Result<(), OciDbError> {
    let mut buf = vec![0u8; LOB_CHUNK_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => write_block(native, lob, &buf[..n])?,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(OciDbError::LobSource(e)),
        }
    }
}

/// Write a deferred parameter's content into its descriptor.
///
/// Absent or empty values are skipped. Streamed content is consumed.
fn upload<N: NativeInterface>(native: &N, lob: &N::Lob, param: &mut Param) -> Result<(), OciDbError> {
    let consumed = match param.value_mut() {
        None | Some(ParamValue::Scalar(Value::Null)) => return Ok(()),
        Some(ParamValue::Lob(data)) if data.is_empty() => return Ok(()),
        Some(ParamValue::Lob(LobData::Blocks(blocks))) => {
            native.lob_rewind(lob).map_err(OciDbError::execution)?;
            for block in blocks.iter() {
                write_block(native, lob, block)?;
            }
            false
        }
        Some(ParamValue::Lob(LobData::Stream(reader))) => {
            native.lob_rewind(lob).map_err(OciDbError::execution)?;
            write_stream(native, lob, reader.as_mut())?;
            true
        }
        Some(ParamValue::Scalar(Value::Text(text))) => {
            if text.is_empty() {
                return Ok(());
            }
            native.lob_rewind(lob).map_err(OciDbError::execution)?;
            write_block(native, lob, text.as_bytes())?;
            false
        }
        Some(ParamValue::Scalar(Value::Blob(bytes))) => {
            if bytes.is_empty() {
                return Ok(());
            }
            native.lob_rewind(lob).map_err(OciDbError::execution)?;
            write_block(native, lob, bytes)?;
            false
        }
        Some(ParamValue::Scalar(other)) => {
            return Err(OciDbError::ParameterError(format!(
                "{} cannot be written into a LOB",
                other.render()
            )));
        }
    };
    if consumed {
        param.take_value();
    }
    param.transition(BindState::Uploaded)
}

impl<N: NativeInterface> Statement<'_, N> {
    /// Execute the statement without committing, then upload deferred LOB
    /// content and capture the generated id.
    ///
    /// LOB content is written block by block, in bind order, after the native
    /// execute call and before the cursor is returned. Wrap the call in a
    /// transaction and roll back on error: a failed upload leaves the statement
    /// executed with its LOB columns in an unspecified state.
    ///
    /// # Errors
    /// Returns `OciDbError::SqlExecutionError` if execution or a LOB write fails,
    /// `OciDbError::LobSource` if a streamed source cannot be read, and
    /// `OciDbError::ParameterError` if the last bind failed.
    pub fn exec(&mut self) -> Result<ResultCursor<'_, N>, OciDbError> {
        if self.bind_failed {
            return Err(OciDbError::ParameterError(
                "statement cannot be executed after a failed bind".into(),
            ));
        }
        let native = self.native();
        let stmt = self.handle.as_ref().ok_or(OciDbError::StatementClosed)?;

        native
            .execute(stmt)
            .map_err(OciDbError::execution)?;

        for upload_at in &self.pending {
            let lob = &self.lobs[upload_at.lob];
            let bound = &mut self.params[upload_at.param];
            upload(native, lob, &mut bound.param)?;
        }
        debug!(uploads = self.pending.len(), "statement executed");

        let generated_id = match self.generated_id {
            Some(index) => {
                let bound = &mut self.params[index];
                let value = native
                    .bound_value(stmt, &bound.name)
                    .map_err(OciDbError::execution)?;
                let id = GeneratedId::from_native(value);
                bound.param.set_value(ParamValue::Scalar(
                    id.as_ref().map_or(Value::Null, GeneratedId::to_value),
                ));
                id
            }
            None => None,
        };

        Ok(ResultCursor::new(native, stmt, generated_id))
    }
}
