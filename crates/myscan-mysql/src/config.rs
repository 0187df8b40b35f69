//! Connection options and descriptor handling.
//!
//! The connection descriptor itself is opaque to this crate and is handed
//! to the [`Driver`](crate::Driver) untouched. Options here only control
//! how the query layer behaves on top of the session.

use std::sync::LazyLock;

use myscan_core::Result;
use myscan_core::error::{ConfigError, Error};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::mapping::TypeMappingContext;

/// Per-connection behaviour of the query layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    /// Echo every statement to stderr before it is submitted
    pub print_queries: bool,
    /// Type mapping applied by [`Connection::query_mapped`](crate::Connection::query_mapped)
    pub type_mapping: TypeMappingContext,
}

impl ConnectionOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Echo statements for this connection only.
    pub fn print_queries(mut self, enabled: bool) -> Self {
        self.print_queries = enabled;
        self
    }

    /// Set the type mapping settings.
    pub fn type_mapping(mut self, mapping: TypeMappingContext) -> Self {
        self.type_mapping = mapping;
        self
    }

    /// Load options from a JSON document, e.g. an engine settings blob.
    #[allow(clippy::result_large_err)]
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            Error::Config(ConfigError {
                message: format!("Invalid connection options: {}", e),
                source: Some(Box::new(e)),
            })
        })
    }
}

static KEY_VALUE_SECRET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(password|passwd|pwd)(\s*=\s*)('[^']*'|"[^"]*"|\S+)"#)
        .unwrap_or_else(|e| panic!("invalid password pattern: {e}"))
});

// The password may itself contain '/' or '@', so it runs to the last '@'.
static URI_SECRET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(mysql://[^:/@\s]*):\S*@")
        .unwrap_or_else(|e| panic!("invalid uri pattern: {e}"))
});

/// Mask passwords in a descriptor so it can be logged.
///
/// Handles both `key=value` descriptors (`host=db password=secret`) and
/// URIs (`mysql://user:secret@db/schema`).
pub fn redact_descriptor(descriptor: &str) -> String {
    let masked = KEY_VALUE_SECRET.replace_all(descriptor, "${1}${2}***");
    URI_SECRET.replace_all(&masked, "${1}:***@").into_owned()
}
