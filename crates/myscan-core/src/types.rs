//! Logical types of the embedding engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Widest decimal the engine stores exactly.
pub const MAX_DECIMAL_WIDTH: u8 = 38;

/// A column type in the embedding engine's type system.
///
/// Remote column metadata is mapped onto these by a type mapper; rows are
/// then decoded with the logical type as the target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalType {
    Boolean,

    // Signed integers
    TinyInt,
    SmallInt,
    Integer,
    BigInt,

    // Unsigned integers
    UTinyInt,
    USmallInt,
    UInteger,
    UBigInt,

    Float,
    Double,

    /// Fixed point with `width` total digits, `scale` after the point
    Decimal { width: u8, scale: u8 },

    Varchar,
    Blob,
    Json,

    Date,
    Time,
    Timestamp,
    TimestampTz,
}

impl LogicalType {
    /// Build a decimal type, falling back to DOUBLE when `width` is out of range.
    #[must_use]
    pub fn decimal(width: u8, scale: u8) -> Self {
        if width == 0 || width > MAX_DECIMAL_WIDTH {
            LogicalType::Double
        } else {
            LogicalType::Decimal {
                width,
                scale: scale.min(width),
            }
        }
    }

    /// Get the SQL type name for this type.
    pub fn sql_name(&self) -> String {
        match self {
            LogicalType::Boolean => "BOOLEAN".to_string(),
            LogicalType::TinyInt => "TINYINT".to_string(),
            LogicalType::SmallInt => "SMALLINT".to_string(),
            LogicalType::Integer => "INTEGER".to_string(),
            LogicalType::BigInt => "BIGINT".to_string(),
            LogicalType::UTinyInt => "UTINYINT".to_string(),
            LogicalType::USmallInt => "USMALLINT".to_string(),
            LogicalType::UInteger => "UINTEGER".to_string(),
            LogicalType::UBigInt => "UBIGINT".to_string(),
            LogicalType::Float => "FLOAT".to_string(),
            LogicalType::Double => "DOUBLE".to_string(),
            LogicalType::Decimal { width, scale } => format!("DECIMAL({}, {})", width, scale),
            LogicalType::Varchar => "VARCHAR".to_string(),
            LogicalType::Blob => "BLOB".to_string(),
            LogicalType::Json => "JSON".to_string(),
            LogicalType::Date => "DATE".to_string(),
            LogicalType::Time => "TIME".to_string(),
            LogicalType::Timestamp => "TIMESTAMP".to_string(),
            LogicalType::TimestampTz => "TIMESTAMP WITH TIME ZONE".to_string(),
        }
    }

    /// Check if this is an integer type (signed or unsigned).
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            LogicalType::TinyInt
                | LogicalType::SmallInt
                | LogicalType::Integer
                | LogicalType::BigInt
                | LogicalType::UTinyInt
                | LogicalType::USmallInt
                | LogicalType::UInteger
                | LogicalType::UBigInt
        )
    }

    /// Check if this is an unsigned integer type.
    pub const fn is_unsigned(&self) -> bool {
        matches!(
            self,
            LogicalType::UTinyInt
                | LogicalType::USmallInt
                | LogicalType::UInteger
                | LogicalType::UBigInt
        )
    }

    /// Check if this is a date/time type.
    pub const fn is_temporal(&self) -> bool {
        matches!(
            self,
            LogicalType::Date
                | LogicalType::Time
                | LogicalType::Timestamp
                | LogicalType::TimestampTz
        )
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql_name())
    }
}
