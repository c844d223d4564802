use std::fs;

use casesql::{CaseError, CaseRegistry, Value};

#[test]
fn registry_reads_case_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("library.sql"),
        "-- books and loans\n\
         CREATE TABLE book (id INTEGER PRIMARY KEY, title TEXT NOT NULL);\n\
         INSERT INTO book (title) VALUES ('Dune'), ('Emma');\n\
         CREATE TABLE loan (book_id INT, who TEXT);\n\
         INSERT INTO loan VALUES (2, 'sam; jo');\n",
    )
    .unwrap();
    fs::write(dir.path().join("shop.sql"), "CREATE TABLE product (sku TEXT);").unwrap();
    fs::write(dir.path().join("README.md"), "not a case").unwrap();

    let registry = CaseRegistry::from_dir(dir.path()).unwrap();
    assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["library", "shop"]);
    assert_eq!(registry.get("library").unwrap().len(), 4);

    let mut session = registry.open_session("library").unwrap();
    let result = session.exec(
        "SELECT b.title, l.who FROM book b JOIN loan l ON l.book_id = b.id",
    );
    assert_eq!(result.columns, vec!["title", "who"]);
    assert_eq!(result.values, vec![vec![Value::from("Emma"), Value::from("sam; jo")]]);
}

#[test]
fn each_session_gets_a_fresh_copy() {
    let mut registry = CaseRegistry::new();
    registry.register("counter", ["CREATE TABLE c (n INT)", "INSERT INTO c VALUES (1)"]);

    let mut first = registry.open_session("counter").unwrap();
    first.run("INSERT INTO c VALUES (2)").unwrap();

    let mut second = registry.open_session("counter").unwrap();
    assert_eq!(first.exec("SELECT * FROM c").values.len(), 2);
    assert_eq!(second.exec("SELECT * FROM c").values.len(), 1);
}

#[test]
fn unknown_case_message() {
    let registry = CaseRegistry::new();
    let err = registry.get("nope").unwrap_err();
    assert_eq!(err.to_string(), "No case found with ID nope");
}

#[test]
fn missing_directory_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = CaseRegistry::from_dir(dir.path().join("absent")).unwrap_err();
    assert!(matches!(err, CaseError::Io { .. }));
}

#[test]
fn broken_case_reports_statement() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("broken.sql"),
        "CREATE TABLE a (x INT);\nCREATE TABLE a (y INT);\nCREATE TABLE b (z INT);\n",
    )
    .unwrap();

    let registry = CaseRegistry::from_dir(dir.path()).unwrap();
    let Err(CaseError::Load { case, source }) = registry.open_session("broken") else {
        panic!("expected load failure");
    };
    assert_eq!(case, "broken");
    assert_eq!(source.index, 1);
    assert_eq!(source.statement, "CREATE TABLE a (y INT)");
}
