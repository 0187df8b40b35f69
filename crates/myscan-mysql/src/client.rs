//! The seam between the query layer and a MySQL client library.
//!
//! A [`Driver`] turns a connection descriptor into a live [`ClientHandle`].
//! The handle mirrors the small part of the C client API the query layer
//! needs: submit a statement, then ask for a buffered or streaming
//! [`RawResult`], the declared column count, the affected-row count and
//! the last error text.
//!
//! Handles are only ever touched while the owning connection's lock is
//! held, so implementations need not be `Sync`.

use std::fmt;

use myscan_core::Result;

use crate::types::RawField;

/// One row as delivered by the text protocol; `None` is SQL NULL.
pub type RawRow = Vec<Option<Vec<u8>>>;

/// Error reported by the server or the client library for a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    /// MySQL error number, e.g. 1146 for a missing table
    pub code: u16,
    pub message: String,
}

impl ServerError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl std::error::Error for ServerError {}

/// Establishes sessions.
pub trait Driver: Send + Sync {
    /// Connect using an opaque descriptor.
    ///
    /// Failures are reported as `Error::Connection`.
    #[allow(clippy::result_large_err)]
    fn connect(&self, descriptor: &str) -> Result<Box<dyn ClientHandle>>;
}

/// An established session.
pub trait ClientHandle: Send {
    /// Send a statement to the server.
    fn real_query(&mut self, sql: &str) -> std::result::Result<(), ServerError>;

    /// Read the whole result of the last statement into memory.
    ///
    /// `None` when the statement produced no result set, or when reading it
    /// failed; [`field_count`](Self::field_count) tells the two apart.
    fn store_result(&mut self) -> Option<Box<dyn RawResult>>;

    /// Start reading the result of the last statement row by row.
    ///
    /// Until the returned result is exhausted or dropped the session cannot
    /// accept another statement.
    fn use_result(&mut self) -> Option<Box<dyn RawResult>>;

    /// Columns declared by the last statement.
    fn field_count(&self) -> usize;

    /// Rows changed by the last non-result statement.
    fn affected_rows(&self) -> u64;

    /// Text of the last error, empty if none.
    fn error(&self) -> String;

    /// Release the session. Called exactly once, when the last owner lets go.
    fn close(&mut self) {}
}

/// The result set of one statement, buffered or streaming.
pub trait RawResult: Send {
    fn field_count(&self) -> usize;

    /// Column metadata in server order.
    fn field(&self, index: usize) -> Option<&RawField>;

    /// Next row, or `None` once the result is exhausted.
    fn fetch_row(&mut self) -> std::result::Result<Option<RawRow>, ServerError>;
}
