//! MySQL connection: session ownership and query execution.
//!
//! A [`Connection`] owns one session obtained from a [`Driver`]. All
//! statements go through a per-connection lock, so one connection can be
//! shared between threads; submissions are serialized, never interleaved.
//!
//! Each statement yields a [`QueryResult`]: an affected-row count for
//! DDL/DML, or a [`ResultSet`] that is either fully buffered or streams
//! rows from the session.
//!
//! # Streaming results
//!
//! A streaming result keeps reading from the session after `query`
//! returns, so the session cannot take another statement until the result
//! is exhausted or dropped. Submissions in the meantime fail with
//! `StateErrorKind::StreamActive`. The result also holds a counted claim on
//! the session: closing the connection while a stream is alive detaches the
//! connection immediately but releases the session only once the stream is
//! dropped.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use myscan_core::error::{QueryError, StateError, StateErrorKind};
use myscan_core::{Error, Field, Result};

use crate::client::{ClientHandle, Driver, RawResult};
use crate::config::{ConnectionOptions, redact_descriptor};
use crate::mapping::TypeMapper;
use crate::result::{QueryResult, ResultSet};

static DEBUG_PRINT_QUERIES: AtomicBool = AtomicBool::new(false);

/// Whether a statement may hand back a streaming result.
///
/// Streaming is only a preference: statements without a result set always
/// come back as a row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultStreaming {
    /// Read rows from the session as they are consumed
    AllowStreaming,
    /// Buffer the whole result before returning
    #[default]
    ForceMaterialization,
}

/// Index metadata for a remote table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexInfo {
    pub table: String,
    pub column_names: Vec<String>,
    pub is_unique: bool,
    pub is_primary: bool,
}

/// The session plus the lock that guards it.
pub(crate) struct SharedHandle {
    client: Mutex<Box<dyn ClientHandle>>,
    stream_active: AtomicBool,
}

impl SharedHandle {
    fn new(client: Box<dyn ClientHandle>) -> Self {
        Self {
            client: Mutex::new(client),
            stream_active: AtomicBool::new(false),
        }
    }

    #[allow(clippy::result_large_err)]
    fn lock(&self) -> Result<MutexGuard<'_, Box<dyn ClientHandle>>> {
        self.client.lock().map_err(|_| {
            Error::State(StateError {
                kind: StateErrorKind::Poisoned,
                message: "connection lock poisoned by a panicked query".to_string(),
            })
        })
    }
}

impl Drop for SharedHandle {
    fn drop(&mut self) {
        let client = match self.client.get_mut() {
            Ok(client) => client,
            Err(poisoned) => poisoned.into_inner(),
        };
        client.close();
        tracing::debug!("MySQL session released");
    }
}

/// Marks the session as busy with a streaming result.
///
/// Dropping the claim frees the session for the next statement.
pub(crate) struct StreamClaim {
    shared: Arc<SharedHandle>,
}

impl StreamClaim {
    fn acquire(shared: &Arc<SharedHandle>) -> Self {
        shared.stream_active.store(true, Ordering::Release);
        Self {
            shared: Arc::clone(shared),
        }
    }
}

impl Drop for StreamClaim {
    fn drop(&mut self) {
        self.shared.stream_active.store(false, Ordering::Release);
    }
}

/// What the session reported for one submitted statement.
struct Submission {
    result: Option<Box<dyn RawResult>>,
    field_count: usize,
    affected_rows: u64,
    error: String,
    claim: Option<StreamClaim>,
}

/// A connection to a MySQL server.
///
/// A connection is either open or closed; closing is idempotent and also
/// happens on drop. Moving a connection moves the session; [`take`](Self::take)
/// does the same through a `&mut` and leaves the source closed.
pub struct Connection {
    handle: Option<Arc<SharedHandle>>,
    descriptor: String,
    options: ConnectionOptions,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("open", &self.is_open())
            .field("descriptor", &redact_descriptor(&self.descriptor))
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Default for Connection {
    /// A closed connection with an empty descriptor.
    fn default() -> Self {
        Self {
            handle: None,
            descriptor: String::new(),
            options: ConnectionOptions::default(),
        }
    }
}

impl Connection {
    /// Open a session with default options.
    #[allow(clippy::result_large_err)]
    pub fn open(driver: &dyn Driver, descriptor: &str) -> Result<Self> {
        Self::open_with_options(driver, descriptor, ConnectionOptions::default())
    }

    /// Open a session.
    ///
    /// Connection failures from the driver are returned unchanged.
    #[allow(clippy::result_large_err)]
    #[tracing::instrument(
        level = "debug",
        skip(driver, descriptor),
        fields(descriptor = %redact_descriptor(descriptor))
    )]
    pub fn open_with_options(
        driver: &dyn Driver,
        descriptor: &str,
        options: ConnectionOptions,
    ) -> Result<Self> {
        let client = driver.connect(descriptor).map_err(|e| {
            tracing::debug!(error = %e, "MySQL connect failed");
            e
        })?;
        tracing::debug!("MySQL connection opened");
        Ok(Self {
            handle: Some(Arc::new(SharedHandle::new(client))),
            descriptor: descriptor.to_string(),
            options,
        })
    }

    /// Is a session attached?
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Detach the session. Does nothing if already closed.
    pub fn close(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if Arc::strong_count(&handle) > 1 {
            tracing::warn!(
                descriptor = %redact_descriptor(&self.descriptor),
                "closing MySQL connection while a streaming result is alive; \
                 the session is released when the result is dropped"
            );
        }
        drop(handle);
    }

    /// Move the session out, leaving this connection closed.
    #[must_use]
    pub fn take(&mut self) -> Connection {
        std::mem::take(self)
    }

    /// The descriptor this connection was opened with.
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// The descriptor with any password masked.
    pub fn redacted_descriptor(&self) -> String {
        redact_descriptor(&self.descriptor)
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Is a streaming result still reading from this session?
    pub fn has_active_stream(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|h| h.stream_active.load(Ordering::Acquire))
    }

    /// Run a statement without resolving column types.
    ///
    /// Result sets come back with no [`Field`] descriptors.
    #[allow(clippy::result_large_err)]
    pub fn query(&self, sql: &str, streaming: ResultStreaming) -> Result<QueryResult> {
        self.query_internal(sql, streaming, None)
    }

    /// Run a statement and type its columns with `mapper`.
    #[allow(clippy::result_large_err)]
    pub fn query_with_mapping(
        &self,
        sql: &str,
        streaming: ResultStreaming,
        mapper: &dyn TypeMapper,
    ) -> Result<QueryResult> {
        self.query_internal(sql, streaming, Some(mapper))
    }

    /// Run a statement and type its columns with this connection's
    /// configured mapping.
    #[allow(clippy::result_large_err)]
    pub fn query_mapped(&self, sql: &str, streaming: ResultStreaming) -> Result<QueryResult> {
        let mapping: &dyn TypeMapper = &self.options.type_mapping;
        self.query_internal(sql, streaming, Some(mapping))
    }

    /// Run a statement for its side effects only.
    ///
    /// Any result set is buffered and discarded, so no stream is left open.
    #[allow(clippy::result_large_err)]
    pub fn execute(&self, sql: &str) -> Result<()> {
        self.query_internal(sql, ResultStreaming::ForceMaterialization, None)?;
        Ok(())
    }

    /// Index metadata for `table_name`. Not collected yet; always empty.
    pub fn get_index_info(&self, _table_name: &str) -> Vec<IndexInfo> {
        Vec::new()
    }

    /// Echo every statement, on every connection, to stderr.
    ///
    /// Meant to be flipped once while diagnosing; it is a plain process-wide
    /// flag with no ordering against queries already in flight.
    pub fn debug_set_print_queries(print: bool) {
        DEBUG_PRINT_QUERIES.store(print, Ordering::Relaxed);
    }

    /// Is the process-wide statement echo on?
    pub fn debug_print_queries() -> bool {
        DEBUG_PRINT_QUERIES.load(Ordering::Relaxed)
    }

    #[allow(clippy::result_large_err)]
    fn shared(&self) -> Result<&Arc<SharedHandle>> {
        self.handle
            .as_ref()
            .ok_or_else(|| Error::State(StateError::closed("MySQL connection is closed")))
    }

    /// Submit `sql` and collect everything the session reports about it.
    ///
    /// The lock covers submission, the result request and the metadata
    /// reads, but not row fetches from a streaming result.
    #[allow(clippy::result_large_err)]
    fn submit(&self, sql: &str, streaming: bool) -> Result<Submission> {
        let shared = self.shared()?;
        let mut client = shared.lock()?;

        if shared.stream_active.load(Ordering::Acquire) {
            return Err(Error::State(StateError {
                kind: StateErrorKind::StreamActive,
                message: format!(
                    "cannot run \"{}\": a streaming result is still reading from this connection",
                    sql
                ),
            }));
        }

        if self.options.print_queries || Self::debug_print_queries() {
            echo_query(sql);
        }
        tracing::trace!(sql = %sql, streaming, "Submitting query");

        if let Err(err) = client.real_query(sql) {
            tracing::debug!(sql = %sql, code = err.code, "Query rejected by server");
            return Err(Error::Query(QueryError::submission(sql, err.message)));
        }

        let result = if streaming {
            client.use_result()
        } else {
            client.store_result()
        };
        let claim = match (&result, streaming) {
            (Some(_), true) => Some(StreamClaim::acquire(shared)),
            _ => None,
        };
        let error = if result.is_none() {
            client.error()
        } else {
            String::new()
        };

        Ok(Submission {
            field_count: client.field_count(),
            affected_rows: client.affected_rows(),
            result,
            error,
            claim,
        })
    }

    #[allow(clippy::result_large_err)]
    fn query_internal(
        &self,
        sql: &str,
        streaming: ResultStreaming,
        mapper: Option<&dyn TypeMapper>,
    ) -> Result<QueryResult> {
        let wants_stream = streaming == ResultStreaming::AllowStreaming;
        let submission = self.submit(sql, wants_stream)?;

        let Some(raw) = submission.result else {
            // No result set: fine for DDL/DML, an error if columns were declared
            if submission.field_count != 0 {
                return Err(Error::Query(QueryError::missing_result(
                    sql,
                    submission.error,
                )));
            }
            tracing::debug!(
                affected_rows = submission.affected_rows,
                "Statement returned no result set"
            );
            return Ok(QueryResult::RowCount(submission.affected_rows));
        };

        let fields = match mapper {
            Some(mapper) => map_fields(sql, raw.as_ref(), submission.field_count, mapper)?,
            None => Vec::new(),
        };
        tracing::debug!(
            columns = submission.field_count,
            streaming = submission.claim.is_some(),
            typed = mapper.is_some(),
            "Statement returned a result set"
        );

        Ok(QueryResult::Rows(ResultSet::new(
            sql,
            raw,
            submission.field_count,
            fields,
            submission.claim,
        )))
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Build one `Field` per declared column, in server order.
#[allow(clippy::result_large_err)]
fn map_fields(
    sql: &str,
    raw: &dyn RawResult,
    field_count: usize,
    mapper: &dyn TypeMapper,
) -> Result<Vec<Field>> {
    (0..field_count)
        .map(|i| {
            let field = raw.field(i).ok_or_else(|| {
                Error::Query(QueryError::missing_result(
                    sql,
                    format!(
                        "result declares {} columns but has no metadata for column {}",
                        field_count, i
                    ),
                ))
            })?;
            Ok(Field::new(
                field.name().map(str::to_string),
                mapper.field_to_logical_type(field),
            ))
        })
        .collect()
}

/// Echo failures are ignored; they must not affect the query.
fn echo_query(sql: &str) {
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{}", sql);
}
