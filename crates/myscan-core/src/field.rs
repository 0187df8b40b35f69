//! Column descriptors attached to result sets.

use crate::types::LogicalType;
use serde::{Deserialize, Serialize};

/// One result column as seen by the engine.
///
/// `name` is `None` when the server reported an empty column name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: Option<String>,
    pub logical_type: LogicalType,
}

impl Field {
    pub fn new(name: Option<String>, logical_type: LogicalType) -> Self {
        Self { name, logical_type }
    }

    /// Name to show the user; unnamed columns get a positional fallback.
    pub fn display_name(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("column{}", index))
    }
}
