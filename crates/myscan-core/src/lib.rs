//! Core types for myscan.
//!
//! This crate holds the vocabulary shared between the MySQL layer and the
//! engine that embeds it:
//!
//! - `Error` taxonomy and the `Result` alias
//! - `Value` and `Row` for fetched data
//! - `LogicalType`, the engine's column type system
//! - `Field`, a named, typed result column

pub mod error;
pub mod field;
pub mod row;
pub mod types;
pub mod value;

pub use error::{Error, Result};
pub use field::Field;
pub use row::{ColumnInfo, FromValue, Row};
pub use types::LogicalType;
pub use value::Value;
