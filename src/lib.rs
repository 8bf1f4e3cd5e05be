//! Synchronous driver adapter for an OCI-style call-level interface.
//!
//! The adapter sits between an engine-agnostic execution API (prepare, bind,
//! execute, iterate, transaction control) and a native client library exposed
//! through [`native::NativeInterface`]. It applies session settings on
//! connect, binds parameters in two phases so LOB content is streamed after
//! execution, captures server-generated ids and turns native error records
//! into errors that point at the offending SQL.
//!
//! ```rust
//! use oci_middleware::prelude::*;
//! use oci_middleware::test_utils::{MockOci, MockResult};
//!
//! let mock = MockOci::new();
//! mock.on_query(
//!     "SELECT id",
//!     MockResult::new(["ID", "NAME"]).row([Value::Int(1), Value::from("alice")]),
//! );
//!
//! let driver = OciDriver::new(mock);
//! let conn = driver.connect("db:1521/ORCL", "app", "secret", None, None)?;
//! let rs = conn.query("SELECT id, name FROM users WHERE id = :p1", ParamList::new().push(1), FetchFlags::ASSOC)?;
//! assert_eq!(rs.results[0].get("name").and_then(Value::as_text), Some("alice"));
//! # Ok::<(), OciDbError>(())
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod native;
pub mod prelude;
pub mod results;
pub mod session;
pub mod statement;
pub mod type_map;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{ConnectOptions, ConnectOptionsBuilder, SessionParams};
pub use connection::Connection;
pub use error::{OciDbError, OciError, SqlExcerpt};
pub use native::NativeInterface;
pub use results::{FetchFlags, GeneratedId, ResultCursor, ResultSet, Row, RowKey, Rows};
pub use session::OciDriver;
pub use statement::{LOB_CHUNK_SIZE, Statement};
pub use types::{BindEntry, BindState, LobData, Param, ParamList, ParamType, ParamValue, Value};
