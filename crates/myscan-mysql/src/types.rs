//! Remote column metadata and text-value decoding.
//!
//! MySQL reports a type code, flags, a display length, a decimal count and a
//! character set for every result column. Result rows in the text protocol
//! arrive as byte strings; [`decode_text_value`] turns them into [`Value`]s
//! for a given target [`LogicalType`].

#![allow(clippy::cast_possible_truncation)]

use myscan_core::{LogicalType, Value};

/// MySQL field type codes.
///
/// These are the `MYSQL_TYPE_*` constants from the MySQL C API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldType {
    Decimal = 0x00,
    Tiny = 0x01,
    Short = 0x02,
    Long = 0x03,
    Float = 0x04,
    Double = 0x05,
    Null = 0x06,
    Timestamp = 0x07,
    LongLong = 0x08,
    Int24 = 0x09,
    Date = 0x0A,
    Time = 0x0B,
    DateTime = 0x0C,
    Year = 0x0D,
    NewDate = 0x0E,
    VarChar = 0x0F,
    Bit = 0x10,
    Timestamp2 = 0x11,
    DateTime2 = 0x12,
    Time2 = 0x13,
    Json = 0xF5,
    NewDecimal = 0xF6,
    Enum = 0xF7,
    Set = 0xF8,
    TinyBlob = 0xF9,
    MediumBlob = 0xFA,
    LongBlob = 0xFB,
    Blob = 0xFC,
    VarString = 0xFD,
    String = 0xFE,
    Geometry = 0xFF,
}

impl FieldType {
    /// Parse a field type from its wire code. Unknown codes are read as CHAR.
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => FieldType::Decimal,
            0x01 => FieldType::Tiny,
            0x02 => FieldType::Short,
            0x03 => FieldType::Long,
            0x04 => FieldType::Float,
            0x05 => FieldType::Double,
            0x06 => FieldType::Null,
            0x07 => FieldType::Timestamp,
            0x08 => FieldType::LongLong,
            0x09 => FieldType::Int24,
            0x0A => FieldType::Date,
            0x0B => FieldType::Time,
            0x0C => FieldType::DateTime,
            0x0D => FieldType::Year,
            0x0E => FieldType::NewDate,
            0x0F => FieldType::VarChar,
            0x10 => FieldType::Bit,
            0x11 => FieldType::Timestamp2,
            0x12 => FieldType::DateTime2,
            0x13 => FieldType::Time2,
            0xF5 => FieldType::Json,
            0xF6 => FieldType::NewDecimal,
            0xF7 => FieldType::Enum,
            0xF8 => FieldType::Set,
            0xF9 => FieldType::TinyBlob,
            0xFA => FieldType::MediumBlob,
            0xFB => FieldType::LongBlob,
            0xFC => FieldType::Blob,
            0xFD => FieldType::VarString,
            0xFE => FieldType::String,
            0xFF => FieldType::Geometry,
            _ => FieldType::String,
        }
    }

    /// Character-ish types whose payload is text unless the charset is binary.
    #[must_use]
    pub const fn is_string_family(self) -> bool {
        matches!(
            self,
            FieldType::VarChar
                | FieldType::VarString
                | FieldType::String
                | FieldType::Enum
                | FieldType::Set
                | FieldType::TinyBlob
                | FieldType::MediumBlob
                | FieldType::LongBlob
                | FieldType::Blob
        )
    }

    /// Get the MySQL type name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            FieldType::Decimal | FieldType::NewDecimal => "DECIMAL",
            FieldType::Tiny => "TINYINT",
            FieldType::Short => "SMALLINT",
            FieldType::Long => "INT",
            FieldType::Float => "FLOAT",
            FieldType::Double => "DOUBLE",
            FieldType::Null => "NULL",
            FieldType::Timestamp | FieldType::Timestamp2 => "TIMESTAMP",
            FieldType::LongLong => "BIGINT",
            FieldType::Int24 => "MEDIUMINT",
            FieldType::Date | FieldType::NewDate => "DATE",
            FieldType::Time | FieldType::Time2 => "TIME",
            FieldType::DateTime | FieldType::DateTime2 => "DATETIME",
            FieldType::Year => "YEAR",
            FieldType::VarChar | FieldType::VarString => "VARCHAR",
            FieldType::Bit => "BIT",
            FieldType::Json => "JSON",
            FieldType::Enum => "ENUM",
            FieldType::Set => "SET",
            FieldType::TinyBlob => "TINYBLOB",
            FieldType::MediumBlob => "MEDIUMBLOB",
            FieldType::LongBlob => "LONGBLOB",
            FieldType::Blob => "BLOB",
            FieldType::String => "CHAR",
            FieldType::Geometry => "GEOMETRY",
        }
    }
}

/// Column flags in result set metadata.
pub mod column_flags {
    pub const NOT_NULL: u16 = 1;
    pub const PRIMARY_KEY: u16 = 2;
    pub const UNSIGNED: u16 = 32;
    pub const BINARY: u16 = 128;
}

/// Character set numbers that matter for type mapping.
pub mod charset {
    /// The `binary` pseudo charset: string columns carrying raw bytes.
    pub const BINARY: u16 = 63;
    pub const UTF8MB4_GENERAL_CI: u16 = 45;
}

/// One column descriptor as reported by the server (`MYSQL_FIELD`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawField {
    /// Column name or alias; may be empty
    pub name: String,
    /// Table name or alias
    pub table: String,
    pub column_type: FieldType,
    pub flags: u16,
    /// Display length in characters
    pub length: u32,
    pub decimals: u8,
    pub charset: u16,
}

impl RawField {
    /// A nullable, signed, utf8mb4 column.
    pub fn new(name: impl Into<String>, column_type: FieldType) -> Self {
        Self {
            name: name.into(),
            table: String::new(),
            column_type,
            flags: 0,
            length: 0,
            decimals: 0,
            charset: charset::UTF8MB4_GENERAL_CI,
        }
    }

    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    #[must_use]
    pub fn length(mut self, length: u32) -> Self {
        self.length = length;
        self
    }

    #[must_use]
    pub fn decimals(mut self, decimals: u8) -> Self {
        self.decimals = decimals;
        self
    }

    #[must_use]
    pub fn unsigned(mut self) -> Self {
        self.flags |= column_flags::UNSIGNED;
        self
    }

    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.flags |= column_flags::NOT_NULL;
        self
    }

    /// Mark the column as carrying bytes (binary charset and flag).
    #[must_use]
    pub fn binary(mut self) -> Self {
        self.flags |= column_flags::BINARY;
        self.charset = charset::BINARY;
        self
    }

    /// The name, or `None` when the server sent an empty one.
    pub fn name(&self) -> Option<&str> {
        (!self.name.is_empty()).then_some(self.name.as_str())
    }

    #[must_use]
    pub const fn is_unsigned(&self) -> bool {
        self.flags & column_flags::UNSIGNED != 0
    }

    #[must_use]
    pub const fn is_not_null(&self) -> bool {
        self.flags & column_flags::NOT_NULL != 0
    }

    #[must_use]
    pub const fn is_binary(&self) -> bool {
        self.charset == charset::BINARY
    }
}

/// Decode one text-protocol value into the engine type `target`.
///
/// Values that do not parse as the target type are kept as text rather
/// than dropped.
pub fn decode_text_value(target: &LogicalType, data: &[u8]) -> Value {
    if matches!(target, LogicalType::Blob) {
        return Value::Bytes(data.to_vec());
    }
    if matches!(target, LogicalType::Boolean) {
        return decode_bool(data);
    }

    let text = String::from_utf8_lossy(data);
    match target {
        LogicalType::TinyInt => parse_or_text(&text, Value::TinyInt),
        LogicalType::SmallInt => parse_or_text(&text, Value::SmallInt),
        LogicalType::Integer => parse_or_text(&text, Value::Int),
        LogicalType::BigInt => parse_or_text(&text, Value::BigInt),
        LogicalType::UTinyInt => parse_or_text(&text, Value::UTinyInt),
        LogicalType::USmallInt => parse_or_text(&text, Value::USmallInt),
        LogicalType::UInteger => parse_or_text(&text, Value::UInt),
        LogicalType::UBigInt => parse_or_text(&text, Value::UBigInt),
        LogicalType::Float => parse_or_text(&text, Value::Float),
        LogicalType::Double => parse_or_text(&text, Value::Double),
        LogicalType::Decimal { .. } => Value::Decimal(text.into_owned()),
        LogicalType::Json => serde_json::from_str(&text)
            .map_or_else(|_| Value::Text(text.into_owned()), Value::Json),
        _ => Value::Text(text.into_owned()),
    }
}

fn parse_or_text<T: std::str::FromStr>(text: &str, wrap: impl FnOnce(T) -> Value) -> Value {
    text.trim()
        .parse::<T>()
        .map_or_else(|_| Value::Text(text.to_string()), wrap)
}

/// TINYINT(1) arrives as "0"/"1", BIT(1) as a single raw byte.
fn decode_bool(data: &[u8]) -> Value {
    match data {
        b"0" => Value::Bool(false),
        b"1" => Value::Bool(true),
        _ => {
            let text = String::from_utf8_lossy(data);
            match text.trim().parse::<i64>() {
                Ok(v) => Value::Bool(v != 0),
                Err(_) => Value::Bool(data.iter().any(|b| *b != 0)),
            }
        }
    }
}
