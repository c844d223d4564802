//! SQL text to [`Statement`] trees.
//!
//! Tokenizing and the grammar come from `sqlparser` with the SQLite dialect;
//! the resulting tree is lowered into the smaller [`ast`] the planner works
//! on. Constructs the engine cannot execute are rejected here.

pub mod ast;
mod lower;
mod split;

use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use tracing::trace;

use crate::types::error::ParseError;

pub use ast::Statement;
pub use split::split_statements;

#[derive(Debug)]
pub struct SQLParser {
    dialect: SQLiteDialect,
}

impl Default for SQLParser {
    fn default() -> Self {
        SQLParser::new()
    }
}

impl SQLParser {
    pub fn new() -> SQLParser {
        SQLParser {
            dialect: SQLiteDialect {},
        }
    }

    /// Parses text holding exactly one statement.
    pub fn parse(&self, sql: &str) -> Result<Statement, ParseError> {
        let mut statements = self.parse_script(sql)?;
        match statements.len() {
            0 => Err(ParseError::Empty),
            1 => Ok(statements.remove(0)),
            n => Err(ParseError::MultipleStatements(n)),
        }
    }

    /// Parses every semicolon-separated statement. Nothing is returned unless
    /// the whole text parses.
    pub fn parse_script(&self, sql: &str) -> Result<Vec<Statement>, ParseError> {
        let ast = Parser::parse_sql(&self.dialect, sql)?;
        trace!(statements = ast.len(), "parsed sql");
        ast.into_iter().map(lower::lower_statement).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::ast::*;
    use super::*;
    use crate::types::Value;

    fn parse(sql: &str) -> Statement {
        SQLParser::new().parse(sql).unwrap()
    }

    #[test]
    fn create_table_records_constraints() {
        let Statement::CreateTable(create) = parse(
            "CREATE TABLE person (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INT DEFAULT 18, UNIQUE (name, age))",
        ) else {
            panic!("expected CREATE TABLE");
        };

        assert_eq!(create.name, "person");
        assert_eq!(create.columns.len(), 3);
        assert!(create.columns[0].primary_key);
        assert!(create.columns[1].not_null);
        assert_eq!(create.columns[2].default, Some(Expr::Literal(Value::Integer(18))));
        assert_eq!(create.unique, vec![vec!["name".to_string(), "age".to_string()]]);
    }

    #[test]
    fn insert_values_are_lowered_row_by_row() {
        let Statement::Insert(insert) = parse("INSERT INTO t (a, b) VALUES (1, 'x'), (-2, NULL)")
        else {
            panic!("expected INSERT");
        };

        assert_eq!(insert.columns, vec!["a", "b"]);
        assert_eq!(
            insert.source,
            InsertSource::Values(vec![
                vec![
                    Expr::Literal(Value::Integer(1)),
                    Expr::Literal(Value::Text("x".into()))
                ],
                vec![Expr::Literal(Value::Integer(-2)), Expr::Literal(Value::Null)],
            ])
        );
    }

    #[test]
    fn select_keeps_clause_structure() {
        let Statement::Select(select) =
            parse("SELECT DISTINCT p.name AS who, COUNT(*) FROM person p LEFT JOIN pet ON p.id = pet.owner WHERE age > 3 GROUP BY p.name ORDER BY who DESC LIMIT 5")
        else {
            panic!("expected SELECT");
        };

        assert!(select.distinct);
        assert_eq!(select.projection.len(), 2);
        assert_eq!(select.from[0].table.relation(), "p");
        assert_eq!(select.from[0].joins[0].kind, JoinKind::LeftOuter);
        assert_eq!(select.group_by.len(), 1);
        assert!(!select.order_by[0].asc);
        assert_eq!(select.limit, Some(Expr::Literal(Value::Integer(5))));

        let SelectItem::Expr { expr, .. } = &select.projection[1] else {
            panic!("expected expression item");
        };
        assert!(expr.is_aggregate_call());
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(
            parse("select name from t where id = 1"),
            parse("SELECT name FROM t WHERE id = 1")
        );
    }

    #[test]
    fn malformed_text_is_a_parse_error() {
        let parser = SQLParser::new();
        for sql in [
            "SELEC * FROM t",
            "SELECT (1 FROM t",
            "INSERT INTO t",
            "SELECT * FROM t extra garbage here",
        ] {
            assert!(
                matches!(parser.parse(sql), Err(ParseError::Syntax(_))),
                "{sql} should not parse"
            );
        }
    }

    #[test]
    fn single_statement_entry_point_rejects_scripts() {
        let parser = SQLParser::new();
        assert_eq!(
            parser.parse("SELECT 1; SELECT 2").unwrap_err(),
            ParseError::MultipleStatements(2)
        );
        assert_eq!(parser.parse("  ").unwrap_err(), ParseError::Empty);
        assert_eq!(parser.parse_script("SELECT 1; SELECT 2;").unwrap().len(), 2);
    }

    #[test]
    fn unsupported_statements_are_rejected() {
        let parser = SQLParser::new();
        assert!(matches!(
            parser.parse("CREATE INDEX idx ON t (a)"),
            Err(ParseError::Unsupported(_))
        ));
        assert!(matches!(
            parser.parse("SELECT * FROM t WHERE a IN (SELECT a FROM u)"),
            Err(ParseError::Unsupported(_))
        ));
    }
}
