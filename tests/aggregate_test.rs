use common::run_slt;

mod common;

#[test]
fn test_aggregate() {
    run_slt("tests/resources/sql/aggregate.slt");
}
