//! Mapping remote column metadata onto engine logical types.

use myscan_core::LogicalType;
use serde::{Deserialize, Serialize};

use crate::types::{FieldType, RawField};

/// Translates a remote column descriptor into the engine's type system.
///
/// The embedding engine supplies one of these when it wants typed `Field`
/// descriptors on a result; see [`crate::Connection::query_with_mapping`].
pub trait TypeMapper {
    fn field_to_logical_type(&self, field: &RawField) -> LogicalType;
}

/// Default mapper, driven by a few engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeMappingContext {
    /// Read `TINYINT(1)` as BOOLEAN
    pub tinyint1_as_boolean: bool,
    /// Read `BIT(1)` as BOOLEAN
    pub bit1_as_boolean: bool,
    /// Read TIME as TIME; off by default since MySQL TIME spans beyond 24h
    pub time_as_time: bool,
}

impl TypeMappingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tinyint1_as_boolean(mut self, enabled: bool) -> Self {
        self.tinyint1_as_boolean = enabled;
        self
    }

    pub fn bit1_as_boolean(mut self, enabled: bool) -> Self {
        self.bit1_as_boolean = enabled;
        self
    }

    pub fn time_as_time(mut self, enabled: bool) -> Self {
        self.time_as_time = enabled;
        self
    }
}

impl TypeMapper for TypeMappingContext {
    fn field_to_logical_type(&self, field: &RawField) -> LogicalType {
        let unsigned = field.is_unsigned();
        match field.column_type {
            FieldType::Tiny => {
                if self.tinyint1_as_boolean && field.length == 1 {
                    LogicalType::Boolean
                } else if unsigned {
                    LogicalType::UTinyInt
                } else {
                    LogicalType::TinyInt
                }
            }
            FieldType::Short => signed_or_unsigned(
                unsigned,
                LogicalType::SmallInt,
                LogicalType::USmallInt,
            ),
            FieldType::Int24 | FieldType::Long => {
                signed_or_unsigned(unsigned, LogicalType::Integer, LogicalType::UInteger)
            }
            FieldType::LongLong => {
                signed_or_unsigned(unsigned, LogicalType::BigInt, LogicalType::UBigInt)
            }
            FieldType::Year => LogicalType::Integer,
            FieldType::Float => LogicalType::Float,
            FieldType::Double => LogicalType::Double,
            FieldType::Decimal | FieldType::NewDecimal => decimal_type(field),
            FieldType::Date | FieldType::NewDate => LogicalType::Date,
            FieldType::Time | FieldType::Time2 => {
                if self.time_as_time {
                    LogicalType::Time
                } else {
                    LogicalType::Varchar
                }
            }
            FieldType::DateTime | FieldType::DateTime2 => LogicalType::Timestamp,
            FieldType::Timestamp | FieldType::Timestamp2 => LogicalType::TimestampTz,
            FieldType::Bit => {
                if self.bit1_as_boolean && field.length == 1 {
                    LogicalType::Boolean
                } else {
                    LogicalType::Blob
                }
            }
            FieldType::Json => LogicalType::Json,
            FieldType::Geometry => LogicalType::Blob,
            FieldType::Null => LogicalType::Varchar,
            other if other.is_string_family() => {
                if field.is_binary() {
                    LogicalType::Blob
                } else {
                    LogicalType::Varchar
                }
            }
            _ => LogicalType::Varchar,
        }
    }
}

fn signed_or_unsigned(
    unsigned: bool,
    signed: LogicalType,
    unsigned_ty: LogicalType,
) -> LogicalType {
    if unsigned { unsigned_ty } else { signed }
}

/// The display length of a DECIMAL counts the sign and the decimal point.
fn decimal_type(field: &RawField) -> LogicalType {
    let mut width = i64::from(field.length);
    if field.decimals > 0 {
        width -= 1;
    }
    if !field.is_unsigned() {
        width -= 1;
    }
    match u8::try_from(width) {
        Ok(width) => LogicalType::decimal(width, field.decimals),
        Err(_) => LogicalType::Double,
    }
}
