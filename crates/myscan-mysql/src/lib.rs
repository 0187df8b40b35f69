//! MySQL connection and query layer for myscan.
//!
//! This crate sits between an analytical engine and a MySQL client library.
//! It does not speak the wire protocol itself; a [`Driver`] supplies live
//! sessions and this crate provides:
//!
//! - Session ownership with idempotent close and move semantics
//! - Serialized statement submission on a shared connection
//! - Buffered or streaming result sets
//! - Mapping of MySQL column metadata onto engine logical types
//! - A process-wide switch to echo every statement to stderr
//! - Per-transaction connections through [`TransactionManager`]
//!
//! # Example
//!
//! ```rust,ignore
//! use myscan_mysql::{Connection, ResultStreaming, TypeMappingContext};
//!
//! let conn = Connection::open(&driver, "host=localhost user=root database=shop")?;
//! conn.execute("CREATE TABLE t (id INT UNSIGNED, name VARCHAR(20))")?;
//!
//! let mapping = TypeMappingContext::new().tinyint1_as_boolean(true);
//! let mut result = conn.query_with_mapping("SELECT * FROM t", ResultStreaming::AllowStreaming, &mapping)?;
//! if let Some(rows) = result.as_result_set() {
//!     for row in rows {
//!         let row = row?;
//!         println!("{:?}", row.into_values());
//!     }
//! }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod mapping;
pub mod memory;
pub mod result;
pub mod transaction;
pub mod types;

pub use client::{ClientHandle, Driver, RawResult, RawRow, ServerError};
pub use config::{ConnectionOptions, redact_descriptor};
pub use connection::{Connection, IndexInfo, ResultStreaming};
pub use mapping::{TypeMapper, TypeMappingContext};
pub use memory::{MemoryDriver, Reply};
pub use result::{QueryResult, ResultSet};
pub use transaction::{TransactionId, TransactionManager};
pub use types::{FieldType, RawField};
