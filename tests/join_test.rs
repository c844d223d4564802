use common::run_slt;

mod common;

#[test]
fn test_join() {
    run_slt("tests/resources/sql/join.slt");
}
