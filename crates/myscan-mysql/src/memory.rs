//! An in-process [`Driver`] with scripted replies.
//!
//! `MemoryDriver` answers statements from a table of canned [`Reply`]s
//! instead of talking to a server. It records every statement it receives
//! and counts sessions, which makes it useful for testing code built on
//! [`Connection`](crate::Connection) and for dry runs.
//!
//! ```rust,ignore
//! use myscan_mysql::memory::{MemoryDriver, Reply};
//! use myscan_mysql::{Connection, FieldType, RawField, ResultStreaming};
//!
//! let driver = MemoryDriver::new().reply(
//!     "SELECT 1",
//!     Reply::rows(vec![RawField::new("1", FieldType::LongLong)], vec![vec![Some(b"1".to_vec())]]),
//! );
//! let conn = Connection::open(&driver, "host=localhost")?;
//! let result = conn.query("SELECT 1", ResultStreaming::AllowStreaming)?;
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use myscan_core::Result;
use myscan_core::error::{ConnectionError, ConnectionErrorKind, Error};

use crate::client::{ClientHandle, Driver, RawResult, RawRow, ServerError};
use crate::types::RawField;

/// Byte that ends each statement in the recorded wire log.
pub const WIRE_TERMINATOR: u8 = 0;

/// How the scripted server answers one statement.
#[derive(Debug, Clone)]
pub enum Reply {
    /// A result set
    Rows {
        fields: Vec<RawField>,
        rows: Vec<RawRow>,
    },
    /// A result set whose transfer breaks after the given rows
    BrokenRows {
        fields: Vec<RawField>,
        rows: Vec<RawRow>,
        error: ServerError,
    },
    /// A statement without a result set
    Affected(u64),
    /// The statement is rejected at submission
    Fail(ServerError),
    /// Columns are declared but the result cannot be retrieved
    LostResult { field_count: usize, message: String },
}

impl Reply {
    pub fn rows(fields: Vec<RawField>, rows: Vec<RawRow>) -> Self {
        Reply::Rows { fields, rows }
    }

    pub fn fail(code: u16, message: impl Into<String>) -> Self {
        Reply::Fail(ServerError::new(code, message))
    }
}

struct Rejection {
    kind: ConnectionErrorKind,
    message: String,
}

#[derive(Default)]
struct MemoryState {
    replies: Mutex<HashMap<String, Reply>>,
    fallback: Mutex<Option<Reply>>,
    rejections: Mutex<HashMap<String, Rejection>>,
    unreachable: Mutex<Option<String>>,
    statements: Mutex<Vec<String>>,
    wire: Mutex<Vec<u8>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

/// Lock a bookkeeping mutex; a panicked test thread must not hide the log.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Scripted driver. Clones share the same script and log.
#[derive(Clone, Default)]
pub struct MemoryDriver {
    state: Arc<MemoryState>,
}

impl std::fmt::Debug for MemoryDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDriver")
            .field("opened", &self.state.opened.load(Ordering::Relaxed))
            .field("closed", &self.state.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl MemoryDriver {
    /// A driver that accepts every descriptor and answers unknown
    /// statements with zero affected rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `sql` with `reply`.
    #[must_use]
    pub fn reply(self, sql: impl Into<String>, reply: Reply) -> Self {
        lock(&self.state.replies).insert(sql.into(), reply);
        self
    }

    /// Answer statements without a scripted reply with `reply`.
    #[must_use]
    pub fn otherwise(self, reply: Reply) -> Self {
        *lock(&self.state.fallback) = Some(reply);
        self
    }

    /// Refuse to connect with `descriptor`.
    #[must_use]
    pub fn reject(
        self,
        descriptor: impl Into<String>,
        kind: ConnectionErrorKind,
        message: impl Into<String>,
    ) -> Self {
        lock(&self.state.rejections).insert(
            descriptor.into(),
            Rejection {
                kind,
                message: message.into(),
            },
        );
        self
    }

    /// Refuse every connection attempt, as if the server were down.
    #[must_use]
    pub fn unreachable(self, message: impl Into<String>) -> Self {
        *lock(&self.state.unreachable) = Some(message.into());
        self
    }

    /// Statements received so far, in arrival order.
    pub fn statements(&self) -> Vec<String> {
        lock(&self.state.statements).clone()
    }

    /// Statements as transmitted byte by byte, each ended by
    /// [`WIRE_TERMINATOR`]. Interleaved submissions would show up here as
    /// mixed bytes.
    pub fn wire_frames(&self) -> Vec<Vec<u8>> {
        lock(&self.state.wire)
            .split(|b| *b == WIRE_TERMINATOR)
            .filter(|frame| !frame.is_empty())
            .map(<[u8]>::to_vec)
            .collect()
    }

    /// Sessions handed out and not yet released.
    pub fn open_sessions(&self) -> usize {
        let closed = self.state.closed.load(Ordering::Acquire);
        self.state.opened.load(Ordering::Acquire).saturating_sub(closed)
    }

    /// Sessions released so far.
    pub fn closed_sessions(&self) -> usize {
        self.state.closed.load(Ordering::Acquire)
    }
}

impl Driver for MemoryDriver {
    fn connect(&self, descriptor: &str) -> Result<Box<dyn ClientHandle>> {
        if let Some(message) = lock(&self.state.unreachable).as_ref() {
            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Refused,
                message: message.clone(),
                source: None,
            }));
        }
        if let Some(rejection) = lock(&self.state.rejections).get(descriptor) {
            return Err(Error::Connection(ConnectionError {
                kind: rejection.kind,
                message: rejection.message.clone(),
                source: None,
            }));
        }

        self.state.opened.fetch_add(1, Ordering::AcqRel);
        Ok(Box::new(MemoryHandle {
            state: Arc::clone(&self.state),
            pending: None,
            field_count: 0,
            affected_rows: 0,
            error: String::new(),
        }))
    }
}

struct MemoryHandle {
    state: Arc<MemoryState>,
    pending: Option<Reply>,
    field_count: usize,
    affected_rows: u64,
    error: String,
}

impl MemoryHandle {
    fn transmit(&self, sql: &str) {
        for byte in sql.bytes() {
            lock(&self.state.wire).push(byte);
            std::thread::yield_now();
        }
        lock(&self.state.wire).push(WIRE_TERMINATOR);
        lock(&self.state.statements).push(sql.to_string());
    }

    fn lookup(&self, sql: &str) -> Reply {
        if let Some(reply) = lock(&self.state.replies).get(sql) {
            return reply.clone();
        }
        lock(&self.state.fallback)
            .clone()
            .unwrap_or(Reply::Affected(0))
    }

    fn take_result(&mut self) -> Option<Box<dyn RawResult>> {
        match self.pending.take()? {
            Reply::Rows { fields, rows } => Some(Box::new(MemoryResult {
                fields,
                rows: rows.into(),
                error: None,
            })),
            Reply::BrokenRows {
                fields,
                rows,
                error,
            } => Some(Box::new(MemoryResult {
                fields,
                rows: rows.into(),
                error: Some(error),
            })),
            Reply::LostResult { message, .. } => {
                self.error = message;
                None
            }
            Reply::Affected(_) | Reply::Fail(_) => None,
        }
    }
}

impl ClientHandle for MemoryHandle {
    fn real_query(&mut self, sql: &str) -> std::result::Result<(), ServerError> {
        self.transmit(sql);
        self.pending = None;
        self.field_count = 0;
        self.affected_rows = 0;
        self.error.clear();

        match self.lookup(sql) {
            Reply::Fail(err) => {
                self.error = err.message.clone();
                Err(err)
            }
            Reply::Affected(n) => {
                self.affected_rows = n;
                Ok(())
            }
            reply => {
                self.field_count = match &reply {
                    Reply::Rows { fields, .. } | Reply::BrokenRows { fields, .. } => fields.len(),
                    Reply::LostResult { field_count, .. } => *field_count,
                    Reply::Affected(_) | Reply::Fail(_) => 0,
                };
                self.pending = Some(reply);
                Ok(())
            }
        }
    }

    fn store_result(&mut self) -> Option<Box<dyn RawResult>> {
        self.take_result()
    }

    fn use_result(&mut self) -> Option<Box<dyn RawResult>> {
        self.take_result()
    }

    fn field_count(&self) -> usize {
        self.field_count
    }

    fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    fn error(&self) -> String {
        self.error.clone()
    }

    fn close(&mut self) {
        self.state.closed.fetch_add(1, Ordering::AcqRel);
    }
}

struct MemoryResult {
    fields: Vec<RawField>,
    rows: VecDeque<RawRow>,
    error: Option<ServerError>,
}

impl RawResult for MemoryResult {
    fn field_count(&self) -> usize {
        self.fields.len()
    }

    fn field(&self, index: usize) -> Option<&RawField> {
        self.fields.get(index)
    }

    fn fetch_row(&mut self) -> std::result::Result<Option<RawRow>, ServerError> {
        if let Some(row) = self.rows.pop_front() {
            return Ok(Some(row));
        }
        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldType;

    #[test]
    fn scripted_replies_and_log() {
        let driver = MemoryDriver::new()
            .reply("DELETE FROM t", Reply::Affected(4))
            .reply("BAD", Reply::fail(1064, "syntax error"));
        let mut handle = driver.connect("host=x").unwrap();

        handle.real_query("DELETE FROM t").unwrap();
        assert_eq!(handle.affected_rows(), 4);
        assert_eq!(handle.field_count(), 0);
        assert!(handle.store_result().is_none());

        let err = handle.real_query("BAD").unwrap_err();
        assert_eq!(err.code, 1064);
        assert_eq!(handle.error(), "syntax error");

        assert_eq!(driver.statements(), vec!["DELETE FROM t", "BAD"]);
        assert_eq!(driver.wire_frames(), vec![b"DELETE FROM t".to_vec(), b"BAD".to_vec()]);
    }

    #[test]
    fn rows_are_served_once() {
        let driver = MemoryDriver::new().reply(
            "SELECT a",
            Reply::rows(
                vec![RawField::new("a", FieldType::Long)],
                vec![vec![Some(b"7".to_vec())]],
            ),
        );
        let mut handle = driver.connect("host=x").unwrap();
        handle.real_query("SELECT a").unwrap();
        assert_eq!(handle.field_count(), 1);

        let mut result = handle.use_result().unwrap();
        assert_eq!(result.field(0).map(|f| f.name.as_str()), Some("a"));
        assert_eq!(result.fetch_row().unwrap(), Some(vec![Some(b"7".to_vec())]));
        assert_eq!(result.fetch_row().unwrap(), None);
        assert!(handle.store_result().is_none());
    }

    #[test]
    fn connection_failures() {
        let driver = MemoryDriver::new().reject(
            "host=x password=wrong",
            ConnectionErrorKind::Authentication,
            "Access denied for user 'root'",
        );
        assert!(driver.connect("host=x password=wrong").is_err());
        assert!(driver.connect("host=x").is_ok());

        let down = MemoryDriver::new().unreachable("Can't connect to MySQL server");
        let err = down.connect("host=x").err().unwrap();
        assert!(err.is_connection_error());
        assert_eq!(down.open_sessions(), 0);
    }

    #[test]
    fn session_count_never_underflows() {
        let driver = MemoryDriver::new();
        // A close observed before its matching open
        driver.state.closed.fetch_add(1, Ordering::AcqRel);
        assert_eq!(driver.open_sessions(), 0);
        assert_eq!(driver.closed_sessions(), 1);
    }
}
