use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use myscan_core::error::{ConnectionErrorKind, QueryErrorKind, StateErrorKind};
use myscan_core::{Error, LogicalType, Value};

use myscan_mysql::{
    Connection, ConnectionOptions, FieldType, MemoryDriver, QueryResult, RawField, Reply,
    ResultStreaming, TypeMappingContext,
};

const DESCRIPTOR: &str = "host=localhost user=root password=secret database=shop";

fn products() -> Reply {
    Reply::rows(
        vec![
            RawField::new("id", FieldType::Long).unsigned().not_null(),
            RawField::new("name", FieldType::VarString).length(80),
            RawField::new("price", FieldType::NewDecimal)
                .length(10)
                .decimals(2),
            RawField::new("in_stock", FieldType::Tiny).length(1),
        ],
        vec![
            vec![
                Some(b"1".to_vec()),
                Some(b"lamp".to_vec()),
                Some(b"19.99".to_vec()),
                Some(b"1".to_vec()),
            ],
            vec![
                Some(b"2".to_vec()),
                None,
                Some(b"5.00".to_vec()),
                Some(b"0".to_vec()),
            ],
        ],
    )
}

fn shop() -> MemoryDriver {
    MemoryDriver::new().reply("SELECT * FROM products", products())
}

fn assert_state(err: &Error, expected: StateErrorKind) {
    match err {
        Error::State(state) => assert_eq!(state.kind, expected),
        other => panic!("expected state error {:?}, got {:?}", expected, other),
    }
}

#[test]
fn failed_open_yields_no_connection() {
    let driver = MemoryDriver::new().reject(
        DESCRIPTOR,
        ConnectionErrorKind::Authentication,
        "Access denied for user 'root'@'localhost'",
    );

    let err = Connection::open(&driver, DESCRIPTOR).unwrap_err();
    match err {
        Error::Connection(e) => {
            assert_eq!(e.kind, ConnectionErrorKind::Authentication);
            assert!(e.message.contains("Access denied"));
        }
        other => panic!("expected connection error, got {:?}", other),
    }
    assert_eq!(driver.open_sessions(), 0);
}

#[test]
fn open_then_close() {
    let driver = shop();
    let mut conn = Connection::open(&driver, DESCRIPTOR).unwrap();
    assert!(conn.is_open());

    conn.close();
    assert!(!conn.is_open());
    conn.close();
    assert!(!conn.is_open());
    assert_eq!(driver.closed_sessions(), 1);

    let err = conn.execute("SELECT 1").unwrap_err();
    assert_state(&err, StateErrorKind::Closed);
}

#[test]
fn ddl_returns_row_count_in_either_mode() {
    let driver =
        MemoryDriver::new().reply("DELETE FROM products WHERE id > 10", Reply::Affected(3));
    let conn = Connection::open(&driver, DESCRIPTOR).unwrap();

    for mode in [
        ResultStreaming::AllowStreaming,
        ResultStreaming::ForceMaterialization,
    ] {
        let result = conn.query("CREATE TABLE t (id INT)", mode).unwrap();
        assert!(matches!(result, QueryResult::RowCount(0)));
        assert!(!conn.has_active_stream());

        let result = conn.query("DELETE FROM products WHERE id > 10", mode).unwrap();
        assert_eq!(result.affected_rows(), Some(3));
    }
}

#[test]
fn select_fields_only_with_mapping() {
    let driver = shop();
    let conn = Connection::open(&driver, DESCRIPTOR).unwrap();

    let plain = conn
        .query("SELECT * FROM products", ResultStreaming::ForceMaterialization)
        .unwrap()
        .into_result_set()
        .unwrap();
    assert_eq!(plain.column_count(), 4);
    assert!(plain.fields().is_empty());

    let mapping = TypeMappingContext::new().tinyint1_as_boolean(true);
    let typed = conn
        .query_with_mapping(
            "SELECT * FROM products",
            ResultStreaming::ForceMaterialization,
            &mapping,
        )
        .unwrap()
        .into_result_set()
        .unwrap();
    let types: Vec<_> = typed.fields().iter().map(|f| f.logical_type.clone()).collect();
    assert_eq!(
        types,
        vec![
            LogicalType::UInteger,
            LogicalType::Varchar,
            LogicalType::decimal(8, 2),
            LogicalType::Boolean,
        ]
    );
    assert_eq!(typed.fields()[1].name.as_deref(), Some("name"));
}

#[test]
fn unnamed_columns_have_no_field_name() {
    let driver = MemoryDriver::new().reply(
        "SELECT 1 + 1",
        Reply::rows(
            vec![RawField::new("", FieldType::LongLong)],
            vec![vec![Some(b"2".to_vec())]],
        ),
    );
    let conn = Connection::open(&driver, DESCRIPTOR).unwrap();

    let mut rs = conn
        .query_mapped("SELECT 1 + 1", ResultStreaming::ForceMaterialization)
        .unwrap()
        .into_result_set()
        .unwrap();
    assert_eq!(rs.fields()[0].name, None);
    let row = rs.fetch_row().unwrap().unwrap();
    assert_eq!(row.get_by_name("column0"), Some(&Value::BigInt(2)));
}

#[test]
fn query_mapped_uses_connection_options() {
    let driver = shop();
    let options = ConnectionOptions::new()
        .type_mapping(TypeMappingContext::new().tinyint1_as_boolean(true));
    let conn = Connection::open_with_options(&driver, DESCRIPTOR, options).unwrap();

    let mut rs = conn
        .query_mapped("SELECT * FROM products", ResultStreaming::AllowStreaming)
        .unwrap()
        .into_result_set()
        .unwrap();
    assert_eq!(rs.fields()[3].logical_type, LogicalType::Boolean);

    let rows = rs.fetch_all().unwrap();
    assert!(rows[0].get_named::<bool>("in_stock").unwrap());
    assert!(!rows[1].get_named::<bool>("in_stock").unwrap());
    assert_eq!(rows[1].get_by_name("name"), Some(&Value::Null));
    assert_eq!(
        rows[0].get_by_name("price"),
        Some(&Value::Decimal("19.99".to_string()))
    );
}

#[test]
fn execute_never_leaves_a_stream() {
    let driver = shop();
    let conn = Connection::open(&driver, DESCRIPTOR).unwrap();

    conn.execute("SELECT * FROM products").unwrap();
    assert!(!conn.has_active_stream());
    conn.execute("SELECT * FROM products").unwrap();
    assert_eq!(driver.statements().len(), 2);
}

#[test]
fn streaming_result_releases_connection_when_exhausted() {
    let driver = shop();
    let conn = Connection::open(&driver, DESCRIPTOR).unwrap();

    let mut rs = conn
        .query("SELECT * FROM products", ResultStreaming::AllowStreaming)
        .unwrap()
        .into_result_set()
        .unwrap();
    assert!(rs.is_streaming());
    assert!(rs.is_live());

    let err = conn.execute("SELECT 1").unwrap_err();
    assert_state(&err, StateErrorKind::StreamActive);

    let first = rs.next().unwrap().unwrap();
    assert_eq!(first.get_as::<u64>(0).unwrap(), 1);
    assert!(conn.has_active_stream());

    assert_eq!(rs.by_ref().count(), 1);
    assert!(!rs.is_live());
    assert!(!conn.has_active_stream());
    conn.execute("SELECT 1").unwrap();
}

#[test]
fn materialized_result_does_not_hold_connection() {
    let driver = shop();
    let conn = Connection::open(&driver, DESCRIPTOR).unwrap();

    let rs = conn
        .query("SELECT * FROM products", ResultStreaming::ForceMaterialization)
        .unwrap()
        .into_result_set()
        .unwrap();
    assert!(!rs.is_streaming());
    assert!(!conn.has_active_stream());
    conn.execute("SELECT 1").unwrap();
    drop(rs);
}

#[test]
fn close_with_live_stream_defers_release() {
    let driver = shop();
    let mut conn = Connection::open(&driver, DESCRIPTOR).unwrap();

    let mut rs = conn
        .query("SELECT * FROM products", ResultStreaming::AllowStreaming)
        .unwrap()
        .into_result_set()
        .unwrap();
    conn.close();
    assert!(!conn.is_open());
    assert_eq!(driver.closed_sessions(), 0);

    assert_eq!(rs.fetch_all().unwrap().len(), 2);
    assert_eq!(driver.closed_sessions(), 1);
}

#[test]
fn broken_stream_reports_fetch_error_and_frees_connection() {
    let driver = MemoryDriver::new().reply(
        "SELECT id FROM big",
        Reply::BrokenRows {
            fields: vec![RawField::new("id", FieldType::Long)],
            rows: vec![vec![Some(b"1".to_vec())]],
            error: myscan_mysql::ServerError::new(
                2013,
                "Lost connection to MySQL server during query",
            ),
        },
    );
    let conn = Connection::open(&driver, DESCRIPTOR).unwrap();

    let mut rs = conn
        .query("SELECT id FROM big", ResultStreaming::AllowStreaming)
        .unwrap()
        .into_result_set()
        .unwrap();
    assert!(rs.fetch_row().unwrap().is_some());
    let err = rs.fetch_row().unwrap_err();
    assert_eq!(err.query_kind(), Some(QueryErrorKind::Fetch));
    assert!(err.to_string().contains("Lost connection"));
    assert!(!conn.has_active_stream());
}

#[test]
fn submission_error_carries_query_and_server_text() {
    let sql = "SELECT * FROM nonexistent_table";
    let driver = MemoryDriver::new().reply(
        sql,
        Reply::fail(1146, "Table 'shop.nonexistent_table' doesn't exist"),
    );
    let conn = Connection::open(&driver, DESCRIPTOR).unwrap();

    let err = conn.query(sql, ResultStreaming::ForceMaterialization).unwrap_err();
    assert_eq!(err.query_kind(), Some(QueryErrorKind::Submission));
    assert_eq!(err.sql(), Some(sql));
    let text = err.to_string();
    assert!(text.contains(sql));
    assert!(text.contains("Table 'shop.nonexistent_table' doesn't exist"));

    // The session stays usable
    assert!(conn.is_open());
    conn.execute("SELECT 1").unwrap();
}

#[test]
fn declared_columns_without_result_is_an_error() {
    let driver = MemoryDriver::new().reply(
        "SELECT * FROM huge",
        Reply::LostResult {
            field_count: 3,
            message: "Out of memory".to_string(),
        },
    );
    let conn = Connection::open(&driver, DESCRIPTOR).unwrap();

    for mode in [
        ResultStreaming::AllowStreaming,
        ResultStreaming::ForceMaterialization,
    ] {
        let err = conn.query("SELECT * FROM huge", mode).unwrap_err();
        assert_eq!(err.query_kind(), Some(QueryErrorKind::MissingResult));
        assert!(err.to_string().contains("SELECT * FROM huge"));
        assert!(err.to_string().contains("Out of memory"));
    }
}

#[test]
fn take_transfers_the_session() {
    let driver = shop();
    let mut source = Connection::open(&driver, DESCRIPTOR).unwrap();
    let dest = source.take();
    assert!(dest.is_open());
    assert!(!source.is_open());

    drop(source);
    assert!(dest.is_open());
    assert_eq!(driver.open_sessions(), 1);

    let moved = dest;
    assert!(moved.is_open());
    drop(moved);
    assert_eq!(driver.open_sessions(), 0);
}

#[test]
fn concurrent_submissions_are_not_interleaved() {
    let driver = MemoryDriver::new();
    let conn = Arc::new(Connection::open(&driver, DESCRIPTOR).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let conn = Arc::clone(&conn);
            thread::spawn(move || {
                for i in 0..25 {
                    conn.execute(&format!("INSERT INTO log VALUES ({t}, {i}, 'payload')"))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let expected: HashSet<Vec<u8>> = (0..4)
        .flat_map(|t| (0..25).map(move |i| format!("INSERT INTO log VALUES ({t}, {i}, 'payload')")))
        .map(String::into_bytes)
        .collect();
    let frames = driver.wire_frames();
    assert_eq!(frames.len(), 100);
    for frame in &frames {
        assert!(
            expected.contains(frame),
            "interleaved statement on the wire: {:?}",
            String::from_utf8_lossy(frame)
        );
    }
}

#[test]
fn print_queries_does_not_change_results() {
    let driver = shop();
    let conn = Connection::open_with_options(
        &driver,
        DESCRIPTOR,
        ConnectionOptions::new().print_queries(true),
    )
    .unwrap();
    let rs = conn
        .query("SELECT * FROM products", ResultStreaming::ForceMaterialization)
        .unwrap()
        .into_result_set()
        .unwrap();
    assert_eq!(rs.count(), 2);
}

#[test]
fn index_info_is_empty() {
    let driver = shop();
    let conn = Connection::open(&driver, DESCRIPTOR).unwrap();
    assert!(conn.get_index_info("products").is_empty());
    assert!(driver.statements().is_empty());
}
