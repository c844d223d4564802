use common::run_slt;

mod common;

#[test]
fn test_select() {
    run_slt("tests/resources/sql/select.slt");
}

#[test]
fn test_order_limit() {
    run_slt("tests/resources/sql/order_limit.slt");
}
