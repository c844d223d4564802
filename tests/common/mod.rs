use casesql::{types::error::Error, Database, Value};
use sqllogictest::{self, DBOutput, DefaultColumnType};

pub struct DatabaseTestHelper(pub Database);

impl sqllogictest::DB for DatabaseTestHelper {
    type Error = Error;
    type ColumnType = DefaultColumnType;

    fn run(&mut self, sql: &str) -> Result<DBOutput<Self::ColumnType>, Self::Error> {
        let result_set = self.0.execute(sql)?;
        if !result_set.is_query() {
            return Ok(DBOutput::StatementComplete(result_set.rows_affected));
        }

        let rows: Vec<Vec<String>> = result_set
            .rows()
            .map(|row| row.iter().map(Value::to_string).collect())
            .collect();
        let types = vec![DefaultColumnType::Any; result_set.output_schema.len()];
        Ok(DBOutput::Rows { types, rows })
    }
}

pub fn run_slt(path: &str) {
    let mut tester = sqllogictest::Runner::new(DatabaseTestHelper(Database::new()));
    tester.run_file(path).unwrap();
}
