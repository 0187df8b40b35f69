//! Statement results.

use std::sync::Arc;

use myscan_core::error::{QueryError, QueryErrorKind};
use myscan_core::{ColumnInfo, Error, Field, LogicalType, Result, Row, Value};

use crate::client::RawResult;
use crate::connection::StreamClaim;
use crate::mapping::{TypeMapper, TypeMappingContext};
use crate::types::{RawField, decode_text_value};

/// Outcome of one statement.
#[derive(Debug)]
pub enum QueryResult {
    /// A statement without a result set; holds the affected-row count
    RowCount(u64),
    /// A statement with a result set
    Rows(ResultSet),
}

impl QueryResult {
    /// Affected rows, for statements without a result set.
    pub fn affected_rows(&self) -> Option<u64> {
        match self {
            QueryResult::RowCount(n) => Some(*n),
            QueryResult::Rows(_) => None,
        }
    }

    pub fn is_row_count(&self) -> bool {
        matches!(self, QueryResult::RowCount(_))
    }

    pub fn as_result_set(&mut self) -> Option<&mut ResultSet> {
        match self {
            QueryResult::Rows(rs) => Some(rs),
            QueryResult::RowCount(_) => None,
        }
    }

    pub fn into_result_set(self) -> Option<ResultSet> {
        match self {
            QueryResult::Rows(rs) => Some(rs),
            QueryResult::RowCount(_) => None,
        }
    }
}

/// Rows of one statement, either buffered or read from the session on demand.
///
/// A streaming result keeps its connection's session busy until it is
/// exhausted or dropped.
pub struct ResultSet {
    sql: String,
    raw: Box<dyn RawResult>,
    column_count: usize,
    fields: Vec<Field>,
    columns: Arc<ColumnInfo>,
    targets: Vec<LogicalType>,
    claim: Option<StreamClaim>,
    streaming: bool,
    exhausted: bool,
}

impl std::fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSet")
            .field("sql", &self.sql)
            .field("column_count", &self.column_count)
            .field("fields", &self.fields)
            .field("streaming", &self.streaming)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl ResultSet {
    pub(crate) fn new(
        sql: &str,
        raw: Box<dyn RawResult>,
        column_count: usize,
        fields: Vec<Field>,
        claim: Option<StreamClaim>,
    ) -> Self {
        // Untyped results still decode with the default mapping
        let fallback = TypeMappingContext::default();
        let mut names = Vec::with_capacity(column_count);
        let mut targets = Vec::with_capacity(column_count);
        for i in 0..column_count {
            let raw_field = raw.field(i);
            let name = match (fields.get(i), raw_field) {
                (Some(field), _) => field.display_name(i),
                (None, Some(rf)) => rf
                    .name()
                    .map_or_else(|| format!("column{}", i), str::to_string),
                (None, None) => format!("column{}", i),
            };
            let target = match (fields.get(i), raw_field) {
                (Some(field), _) => field.logical_type.clone(),
                (None, Some(rf)) => fallback.field_to_logical_type(rf),
                (None, None) => LogicalType::Varchar,
            };
            names.push(name);
            targets.push(target);
        }

        Self {
            sql: sql.to_string(),
            raw,
            column_count,
            fields,
            columns: Arc::new(ColumnInfo::new(names)),
            targets,
            streaming: claim.is_some(),
            claim,
            exhausted: false,
        }
    }

    /// The statement that produced this result.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Columns declared by the server.
    pub fn column_count(&self) -> usize {
        self.column_count
    }

    /// Typed column descriptors; empty unless a type mapper was supplied.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Server metadata for column `index`.
    pub fn raw_field(&self, index: usize) -> Option<&RawField> {
        self.raw.field(index)
    }

    pub fn column_info(&self) -> Arc<ColumnInfo> {
        Arc::clone(&self.columns)
    }

    /// Is this result read from the session as it is consumed?
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Does a streaming result still hold its session?
    pub fn is_live(&self) -> bool {
        self.claim.is_some()
    }

    /// Fetch and decode the next row.
    ///
    /// Once this returns `Ok(None)` or an error, a streaming result hands
    /// its session back to the connection.
    #[allow(clippy::result_large_err)]
    pub fn fetch_row(&mut self) -> Result<Option<Row>> {
        if self.exhausted {
            return Ok(None);
        }
        match self.raw.fetch_row() {
            Ok(Some(raw_row)) => Ok(Some(self.decode(raw_row))),
            Ok(None) => {
                self.finish();
                Ok(None)
            }
            Err(err) => {
                self.finish();
                Err(Error::Query(QueryError {
                    kind: QueryErrorKind::Fetch,
                    sql: Some(self.sql.clone()),
                    message: err.message.clone(),
                    source: Some(Box::new(err)),
                }))
            }
        }
    }

    /// Fetch every remaining row.
    #[allow(clippy::result_large_err)]
    pub fn fetch_all(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.fetch_row()? {
            rows.push(row);
        }
        Ok(rows)
    }

    fn finish(&mut self) {
        self.exhausted = true;
        if self.claim.take().is_some() {
            tracing::trace!(sql = %self.sql, "Streaming result finished");
        }
    }

    fn decode(&self, raw_row: Vec<Option<Vec<u8>>>) -> Row {
        let mut values = Vec::with_capacity(self.column_count);
        let mut cells = raw_row.into_iter();
        for target in &self.targets {
            let value = match cells.next().flatten() {
                Some(bytes) => decode_text_value(target, &bytes),
                None => Value::Null,
            };
            values.push(value);
        }
        Row::with_columns(Arc::clone(&self.columns), values)
    }
}

impl Iterator for ResultSet {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.fetch_row().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{RawRow, ServerError};
    use crate::types::FieldType;
    use std::collections::VecDeque;

    struct Fixed {
        fields: Vec<RawField>,
        rows: VecDeque<RawRow>,
        fail_at_end: bool,
    }

    impl RawResult for Fixed {
        fn field_count(&self) -> usize {
            self.fields.len()
        }

        fn field(&self, index: usize) -> Option<&RawField> {
            self.fields.get(index)
        }

        fn fetch_row(&mut self) -> std::result::Result<Option<RawRow>, ServerError> {
            match self.rows.pop_front() {
                Some(row) => Ok(Some(row)),
                None if self.fail_at_end => Err(ServerError::new(2013, "Lost connection")),
                None => Ok(None),
            }
        }
    }

    fn fixed(fail_at_end: bool) -> Box<dyn RawResult> {
        Box::new(Fixed {
            fields: vec![
                RawField::new("id", FieldType::LongLong).unsigned(),
                RawField::new("", FieldType::VarString),
            ],
            rows: VecDeque::from(vec![
                vec![Some(b"1".to_vec()), Some(b"one".to_vec())],
                vec![Some(b"2".to_vec()), None],
            ]),
            fail_at_end,
        })
    }

    #[test]
    fn untyped_result_decodes_with_default_mapping() {
        let mut rs = ResultSet::new("SELECT id, name FROM t", fixed(false), 2, Vec::new(), None);
        assert!(rs.fields().is_empty());
        assert!(!rs.is_streaming());

        let rows = rs.fetch_all().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get(0), Some(&Value::UBigInt(1)));
        assert_eq!(rows[0].get_by_name("column1"), Some(&Value::Text("one".into())));
        assert_eq!(rows[1].get(1), Some(&Value::Null));
        assert!(rs.fetch_row().unwrap().is_none());
    }

    #[test]
    fn typed_fields_drive_decoding() {
        let fields = vec![
            Field::new(Some("id".into()), LogicalType::Varchar),
            Field::new(None, LogicalType::Varchar),
        ];
        let mut rs = ResultSet::new("SELECT 1", fixed(false), 2, fields, None);
        let row = rs.next().unwrap().unwrap();
        assert_eq!(row.get(0), Some(&Value::Text("1".into())));
    }

    #[test]
    fn fetch_errors_carry_sql() {
        let mut rs = ResultSet::new("SELECT id FROM t", fixed(true), 2, Vec::new(), None);
        assert_eq!(rs.by_ref().take(2).count(), 2);
        let err = rs.fetch_row().unwrap_err();
        assert_eq!(err.query_kind(), Some(QueryErrorKind::Fetch));
        assert_eq!(err.sql(), Some("SELECT id FROM t"));
        // Exhausted after an error
        assert!(rs.fetch_row().unwrap().is_none());
    }

    #[test]
    fn row_count_helpers() {
        let rc = QueryResult::RowCount(3);
        assert_eq!(rc.affected_rows(), Some(3));
        assert!(rc.is_row_count());
        assert!(rc.into_result_set().is_none());
    }
}
