use common::run_slt;

mod common;

#[test]
fn test_mutation() {
    run_slt("tests/resources/sql/mutation.slt");
}

#[test]
fn test_ddl() {
    run_slt("tests/resources/sql/ddl.slt");
}
