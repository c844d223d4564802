use tracing::debug;

use crate::catalog::Catalog;
use crate::executor::ExecutionEngine;
use crate::optimizer::Optimizer;
use crate::parser::{SQLParser, Statement};
use crate::planner::Planner;
use crate::storage::StorageEngine;
use crate::types::{error::Error, ResultSet};

/// One engine instance: the statement pipeline plus the catalog and storage
/// it runs against.
#[derive(Debug, Default)]
pub struct Database {
    parser: SQLParser,
    planner: Planner,
    optimizer: Optimizer,
    executor: ExecutionEngine,

    catalog: Catalog,
    storage: StorageEngine,
}

impl Database {
    pub fn new() -> Database {
        Database::default()
    }

    /// Runs text holding exactly one statement.
    pub fn execute(&mut self, sql: &str) -> Result<ResultSet, Error> {
        let statement = self.parser.parse(sql)?;
        self.execute_statement(&statement)
    }

    /// Parses the whole script, then runs its statements in order. The first
    /// failure stops the script; earlier statements keep their effects.
    pub fn execute_script(&mut self, sql: &str) -> Result<Vec<ResultSet>, Error> {
        let statements = self.parser.parse_script(sql)?;
        statements
            .iter()
            .map(|statement| self.execute_statement(statement))
            .collect()
    }

    pub fn execute_statement(&mut self, statement: &Statement) -> Result<ResultSet, Error> {
        let plan = self.planner.build(statement, &self.catalog)?;
        debug!(kind = statement.kind(), "built plan");
        let plan = self.optimizer.optimize(plan);
        self.executor
            .execute(plan, &mut self.catalog, &mut self.storage)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn storage(&self) -> &StorageEngine {
        &self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    #[test]
    fn statements_flow_through_the_pipeline() {
        let mut db = Database::new();
        db.execute("CREATE TABLE t (id INTEGER, name TEXT)").unwrap();
        let inserted = db.execute("INSERT INTO t VALUES (1, 'a'), (2, 'b')").unwrap();
        assert_eq!(inserted.rows_affected, 2);

        let result = db.execute("SELECT name FROM t WHERE id > 1").unwrap();
        assert_eq!(result.rows().collect::<Vec<_>>(), vec![&vec![Value::from("b")]]);
    }

    #[test]
    fn script_stops_at_first_failure() {
        let mut db = Database::new();
        let err = db
            .execute_script("CREATE TABLE a (x INT); CREATE TABLE a (y INT); CREATE TABLE b (z INT)")
            .unwrap_err();
        assert!(matches!(err, Error::Catalog(_)));
        assert_eq!(db.catalog().table_names(), vec!["a"]);
    }

    #[test]
    fn unparsable_script_runs_nothing() {
        let mut db = Database::new();
        assert!(db.execute_script("CREATE TABLE a (x INT); SELEC 1").is_err());
        assert!(db.catalog().is_empty());
    }
}
