//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types so callers can start
//! with a single `use oci_middleware::prelude::*;`.

pub use crate::config::{ConnectOptions, ConnectOptionsBuilder, SessionParams};
pub use crate::connection::Connection;
pub use crate::error::{OciDbError, OciError, SqlExcerpt};
pub use crate::native::{LobKind, LobLocator, NativeInterface};
pub use crate::results::{FetchFlags, GeneratedId, ResultCursor, ResultSet, Row, RowKey, Rows};
pub use crate::session::OciDriver;
pub use crate::statement::Statement;
pub use crate::types::{LobData, Param, ParamList, ParamType, Value};
