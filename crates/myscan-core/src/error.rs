//! Error types for myscan operations.

use std::fmt;

/// The primary error type for all myscan operations.
#[derive(Debug)]
pub enum Error {
    /// Connection-related errors (connect, authentication, bad descriptor)
    Connection(ConnectionError),
    /// Query submission and result retrieval errors
    Query(QueryError),
    /// Operation not valid in the current connection state
    State(StateError),
    /// A fetched value could not be read as the requested Rust type
    Type(TypeError),
    /// Transaction bookkeeping errors
    Transaction(TransactionError),
    /// Configuration errors
    Config(ConfigError),
    /// I/O errors
    Io(std::io::Error),
    /// Free-form error raised by an embedding caller
    Custom(String),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// The session could not be established
    Connect,
    /// Authentication failed
    Authentication,
    /// The connection descriptor could not be understood
    InvalidDescriptor,
    /// Connection refused
    Refused,
    /// The server went away mid-session
    Disconnected,
}

/// An error reported while running a statement.
///
/// `sql` holds the statement text exactly as submitted and `message` the
/// server's error text verbatim.
#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// The server rejected the statement
    Submission,
    /// The server declared result columns but no result could be obtained
    MissingResult,
    /// Reading a row from an open result failed
    Fetch,
}

#[derive(Debug)]
pub struct StateError {
    pub kind: StateErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateErrorKind {
    /// The connection has been closed
    Closed,
    /// A streaming result is still reading from the connection
    StreamActive,
    /// A thread panicked while holding the connection lock
    Poisoned,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// No transaction registered under the given id
    NotFound,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Is this an error raised before any session existed or one that lost it?
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Io(_))
    }

    /// Was this raised because the connection was already closed?
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            Error::State(StateError {
                kind: StateErrorKind::Closed,
                ..
            })
        )
    }

    /// Get the query kind, if this is a query error.
    pub fn query_kind(&self) -> Option<QueryErrorKind> {
        match self {
            Error::Query(q) => Some(q.kind),
            _ => None,
        }
    }

    /// The statement behind a query error.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }
}

impl QueryError {
    /// A statement the server refused to run.
    pub fn submission(sql: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: QueryErrorKind::Submission,
            sql: Some(sql.into()),
            message: message.into(),
            source: None,
        }
    }

    /// A statement that declared result columns without delivering a result.
    pub fn missing_result(sql: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: QueryErrorKind::MissingResult,
            sql: Some(sql.into()),
            message: message.into(),
            source: None,
        }
    }
}

impl StateError {
    pub fn closed(message: impl Into<String>) -> Self {
        Self {
            kind: StateErrorKind::Closed,
            message: message.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Query(e) => write!(f, "{}", e),
            Error::State(e) => write!(f, "Invalid connection state: {}", e.message),
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::Transaction(e) => write!(f, "Transaction error: {}", e.message),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sql = self.sql.as_deref().unwrap_or("");
        match self.kind {
            QueryErrorKind::Submission => {
                write!(f, "Failed to run query \"{}\": {}", sql, self.message)
            }
            QueryErrorKind::MissingResult => write!(
                f,
                "Failed to fetch result for query \"{}\": {}",
                sql, self.message
            ),
            QueryErrorKind::Fetch => {
                write!(f, "Failed to read row for query \"{}\": {}", sql, self.message)
            }
        }
    }
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<StateError> for Error {
    fn from(err: StateError) -> Self {
        Error::State(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

/// Result type alias for myscan operations.
pub type Result<T> = std::result::Result<T, Error>;
