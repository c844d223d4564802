use common::run_slt;

mod common;

#[test]
fn test_expression() {
    run_slt("tests/resources/sql/expression.slt");
}
