use casesql::types::error::{Error, ExecError, SessionError};
use casesql::{QueryResult, Session, Value};

fn row_count(session: &mut Session, table: &str) -> usize {
    session.exec(&format!("SELECT * FROM {}", table)).values.len()
}

#[test]
fn created_table_lists_declared_columns() {
    let mut session = Session::open();
    session
        .run("CREATE TABLE gadget (serial INTEGER, label TEXT, price REAL, notes BLOB)")
        .unwrap();

    let database = session.database().unwrap();
    assert!(database.catalog().resolve("gadget").is_ok());

    let result = session.exec("SELECT * FROM gadget");
    assert_eq!(
        result,
        QueryResult {
            columns: vec!["serial".into(), "label".into(), "price".into(), "notes".into()],
            values: vec![],
            error: None,
        }
    );
}

#[test]
fn inserted_rows_come_back_cell_for_cell() {
    let mut session = Session::open();
    session
        .run("CREATE TABLE t (i INTEGER, r REAL, s TEXT, n INTEGER)")
        .unwrap();
    session.run("INSERT INTO t VALUES (1, 2.5, 'one', NULL)").unwrap();
    session.run("INSERT INTO t VALUES (2, -0.5, 'two', 7)").unwrap();
    session.run("INSERT INTO t VALUES (3, 0.0, 'three', NULL)").unwrap();
    session.run("DELETE FROM t WHERE i = 3").unwrap();

    let result = session.exec("SELECT * FROM t");
    assert_eq!(result.values.len(), 2);
    let expected: Vec<Value> = vec![1.into(), 2.5.into(), "one".into(), Value::Null];
    assert_eq!(result.values.iter().filter(|row| **row == expected).count(), 1);
    let expected: Vec<Value> = vec![2.into(), (-0.5).into(), "two".into(), 7.into()];
    assert_eq!(result.values.iter().filter(|row| **row == expected).count(), 1);
}

#[test]
fn repeated_select_is_identical() {
    let mut session = Session::open();
    session
        .run("CREATE TABLE t (a INT, b TEXT); INSERT INTO t VALUES (2, 'x'), (1, 'y'), (2, 'z')")
        .unwrap();

    let sql = "SELECT a, COUNT(*) FROM t GROUP BY a";
    let first = session.exec(sql);
    let second = session.exec(sql);
    assert!(!first.is_error());
    assert_eq!(first, second);
}

#[test]
fn empty_table_is_not_an_error() {
    let mut session = Session::open();
    session.run("CREATE TABLE t (a INT, b TEXT)").unwrap();

    let result = session.exec("SELECT b, a FROM t");
    assert_eq!(result.columns, vec!["b", "a"]);
    assert!(result.values.is_empty());
    assert!(result.error.is_none());
}

#[test]
fn wrong_arity_leaves_table_unchanged() {
    let mut session = Session::open();
    session.run("CREATE TABLE t (a INT, b TEXT)").unwrap();
    session.run("INSERT INTO t VALUES (1, 'kept')").unwrap();

    let result = session.exec("INSERT INTO t VALUES (2)");
    assert!(result.error.is_some_and(|e| !e.is_empty()));
    assert!(result.columns.is_empty());
    assert!(result.values.is_empty());
    assert_eq!(row_count(&mut session, "t"), 1);

    let err = session.run("INSERT INTO t VALUES (2, 'b', 'c')").unwrap_err();
    assert!(matches!(err, Error::Execution(ExecError::ArityMismatch { .. })));
    assert_eq!(row_count(&mut session, "t"), 1);
}

#[test]
fn select_by_id() {
    let mut session = Session::open();
    session.run("CREATE TABLE t (id INTEGER, name TEXT)").unwrap();
    session.run("INSERT INTO t VALUES (1, 'Alice')").unwrap();

    let result = session.exec("SELECT name FROM t WHERE id = 1");
    assert_eq!(
        result,
        QueryResult {
            columns: vec!["name".into()],
            values: vec![vec![Value::from("Alice")]],
            error: None,
        }
    );
}

#[test]
fn missing_table_is_reported() {
    let mut session = Session::open();
    let result = session.exec("SELECT * FROM nonexistent");
    assert!(result.columns.is_empty());
    assert!(result.values.is_empty());
    let message = result.error.unwrap();
    assert!(message.contains("nonexistent"), "{}", message);
}

#[test]
fn schema_load_stops_at_malformed_statement() {
    let mut session = Session::open();
    let schema = [
        "CREATE TABLE a (x INT)",
        "CREATE TABLE b (y INT)",
        "CREATE TABLE c (z INT",
        "CREATE TABLE d (w INT)",
        "CREATE TABLE e (v INT)",
    ];

    let err = session.load_schema(&schema).unwrap_err();
    assert_eq!(err.index, 2);
    assert_eq!(err.statement, schema[2]);
    assert!(matches!(err.source, Error::Parser(_)));
    assert!(err.to_string().starts_with("schema statement 3 failed"));

    let catalog = session.database().unwrap().catalog();
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.table_names(), vec!["a", "b"]);
}

#[test]
fn constraint_messages_match_sqlite() {
    let mut session = Session::open();
    session
        .run("CREATE TABLE t (id INTEGER PRIMARY KEY, code TEXT NOT NULL, a INT, b INT, UNIQUE (a, b))")
        .unwrap();
    session.run("INSERT INTO t VALUES (1, 'x', 1, 1)").unwrap();

    let result = session.exec("INSERT INTO t (id, a, b) VALUES (2, 5, 5)");
    assert!(result.error.unwrap().contains("NOT NULL constraint failed: t.code"));

    let result = session.exec("INSERT INTO t VALUES (2, 'y', 1, 1)");
    assert!(result.error.unwrap().contains("UNIQUE constraint failed: t.a, t.b"));

    let result = session.exec("INSERT INTO t VALUES (1, 'z', 2, 2)");
    assert!(result.error.unwrap().contains("UNIQUE constraint failed: t.id"));

    assert_eq!(row_count(&mut session, "t"), 1);
}

#[test]
fn failed_statement_in_run_keeps_earlier_effects() {
    let mut session = Session::open();
    let err = session
        .run("CREATE TABLE t (a INT); INSERT INTO t VALUES (1); INSERT INTO t VALUES (1, 2); INSERT INTO t VALUES (3)")
        .unwrap_err();
    assert!(matches!(err, Error::Execution(_)));
    assert_eq!(session.exec("SELECT a FROM t").values, vec![vec![Value::from(1)]]);
}

#[test]
fn sessions_are_isolated() {
    let mut first = Session::open();
    let mut second = Session::open();
    first.run("CREATE TABLE only_here (a INT)").unwrap();

    assert!(!first.exec("SELECT * FROM only_here").is_error());
    assert!(second.exec("SELECT * FROM only_here").is_error());
}

#[test]
fn closed_session_rejects_work() {
    let mut session = Session::new();
    assert_eq!(
        session.run("SELECT 1").unwrap_err(),
        Error::Session(SessionError::NotReady)
    );
    assert!(session.exec("SELECT 1").is_error());

    session.initialize().unwrap();
    assert_eq!(session.exec("SELECT 1").values, vec![vec![Value::from(1)]]);

    session.close();
    session.close();
    assert!(session.exec("SELECT 1").is_error());
    assert_eq!(session.initialize(), Err(SessionError::Closed));
}

#[test]
fn integer_key_continues_after_largest_live_key() {
    let mut session = Session::open();
    session.run("CREATE TABLE t (id INTEGER PRIMARY KEY, v INT)").unwrap();
    for i in 0..2000 {
        session.run(&format!("INSERT INTO t (v) VALUES ({})", i)).unwrap();
    }
    session.run("DELETE FROM t WHERE id > 1500").unwrap();
    session.run("INSERT INTO t (v) VALUES (-1)").unwrap();

    let result = session.exec("SELECT id FROM t WHERE v = -1");
    assert_eq!(result.values, vec![vec![Value::from(1501)]]);
    let result = session.exec("INSERT INTO t VALUES (1501, 0)");
    assert!(result.error.unwrap().contains("UNIQUE constraint failed: t.id"));
}

#[test]
fn swapping_keys_in_one_update_succeeds() {
    let mut session = Session::open();
    session
        .run("CREATE TABLE t (id INTEGER PRIMARY KEY, code TEXT UNIQUE); INSERT INTO t VALUES (1, 'a'), (2, 'b')")
        .unwrap();
    session
        .run("UPDATE t SET code = CASE code WHEN 'a' THEN 'b' ELSE 'a' END")
        .unwrap();

    let result = session.exec("SELECT id, code FROM t ORDER BY id");
    assert_eq!(
        result.values,
        vec![vec![Value::from(1), Value::from("b")], vec![Value::from(2), Value::from("a")]]
    );
    assert!(session.exec("INSERT INTO t VALUES (3, 'a')").is_error());
}

#[test]
fn huge_real_is_not_an_integer_key() {
    let mut session = Session::open();
    session.run("CREATE TABLE t (id INTEGER PRIMARY KEY)").unwrap();

    let result = session.exec("INSERT INTO t VALUES (1e30)");
    assert!(result.error.unwrap().contains("datatype mismatch for t.id"));
    session.run("INSERT INTO t VALUES (4.0)").unwrap();
    assert_eq!(session.exec("SELECT id FROM t").values, vec![vec![Value::from(4)]]);
}
