mod expr;

use tracing::debug;

use crate::catalog::{Catalog, ColumnDef, KeyConstraint, TableSchema};
use crate::executor::ExprEvaluator;
use crate::parser::ast::{
    self, BinaryOp, CreateTable, Expr, FromItem, InsertSource, JoinConstraint, JoinKind, Select,
    SelectItem, Statement, TableRef,
};
use crate::storage::TableId;
use crate::types::error::{Error, ExecError};
use crate::types::{Column, Value};

pub use expr::{
    like_to_regex, AggregateCall, AggregateFunction, BoundExpr, LikePattern, ScalarFunction,
};
use expr::{AggregateCollector, Binder};

/// Columns produced by a plan node, in row order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputSchema {
    pub columns: Vec<Column>,
}

impl OutputSchema {
    pub fn new(columns: Vec<Column>) -> OutputSchema {
        OutputSchema { columns }
    }

    fn for_table(table: &TableSchema, relation: &str) -> OutputSchema {
        OutputSchema::new(
            table
                .columns
                .iter()
                .map(|c| Column::qualified(relation, c.name.clone()))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    fn concat(&self, other: &OutputSchema) -> OutputSchema {
        let mut columns = self.columns.clone();
        columns.extend(other.columns.iter().cloned());
        OutputSchema::new(columns)
    }

    /// Finds the position of `name`, optionally qualified by a table name or
    /// alias. Both comparisons ignore ASCII case.
    pub fn resolve(&self, table: Option<&str>, name: &str) -> Result<usize, ExecError> {
        let mut matches = self.columns.iter().enumerate().filter(|(_, c)| {
            c.name.eq_ignore_ascii_case(name)
                && table.map_or(true, |t| {
                    c.relation
                        .as_deref()
                        .map_or(false, |r| r.eq_ignore_ascii_case(t))
                })
        });

        let display = || match table {
            Some(t) => format!("{}.{}", t, name),
            None => name.to_string(),
        };
        match (matches.next(), matches.next()) {
            (Some((index, _)), None) => Ok(index),
            (Some(_), Some(_)) => Err(ExecError::AmbiguousColumn(display())),
            (None, _) => Err(ExecError::UnknownColumn(display())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub index: usize,
    pub asc: bool,
}

#[derive(Debug)]
pub struct PlanNode {
    pub output_schema: OutputSchema,
    pub node: Node,
}

#[derive(Debug)]
pub enum Node {
    Scan {
        table: TableId,
        filter: Option<BoundExpr>,
    },
    NestedLoopJoin {
        left: Box<PlanNode>,
        right: Box<PlanNode>,
        kind: JoinKind,
        predicate: Option<BoundExpr>,
    },
    Filter {
        predicate: BoundExpr,
        child: Box<PlanNode>,
    },
    /// Emits one row per group: the group's first input row followed by one
    /// value per aggregate call.
    Aggregation {
        group_by: Vec<BoundExpr>,
        aggregates: Vec<AggregateCall>,
        child: Box<PlanNode>,
    },
    Projection {
        exprs: Vec<BoundExpr>,
        child: Box<PlanNode>,
    },
    /// Drops rows whose first `width` values repeat an earlier row.
    Distinct {
        width: usize,
        child: Box<PlanNode>,
    },
    Sort {
        keys: Vec<SortKey>,
        child: Box<PlanNode>,
    },
    Limit {
        limit: Option<u64>,
        offset: u64,
        child: Box<PlanNode>,
    },
    /// A single row with no columns.
    Empty,
}

impl PlanNode {
    fn new(output_schema: OutputSchema, node: Node) -> PlanNode {
        PlanNode {
            output_schema,
            node,
        }
    }
}

#[derive(Debug)]
pub enum InsertRows {
    Values(Vec<Vec<BoundExpr>>),
    Query(PlanNode),
}

#[derive(Debug)]
pub enum Plan {
    Query(PlanNode),
    CreateTable {
        schema: TableSchema,
        if_not_exists: bool,
    },
    DropTable {
        names: Vec<String>,
        if_exists: bool,
    },
    /// `targets[i]` is the table position receiving the i-th supplied value.
    Insert {
        table: TableSchema,
        targets: Vec<usize>,
        rows: InsertRows,
    },
    Update {
        table: TableSchema,
        assignments: Vec<(usize, BoundExpr)>,
        filter: Option<BoundExpr>,
    },
    Delete {
        table: TableSchema,
        filter: Option<BoundExpr>,
    },
}

#[derive(Debug, Default)]
pub struct Planner {}

impl Planner {
    pub fn new() -> Planner {
        Planner {}
    }

    pub fn build(&self, statement: &Statement, catalog: &Catalog) -> Result<Plan, Error> {
        debug!(kind = statement.kind(), "planning statement");
        match statement {
            Statement::Select(select) => Ok(Plan::Query(self.build_select(select, catalog)?)),
            Statement::CreateTable(create) => self.build_create_table(create),
            Statement::DropTable(drop) => Ok(Plan::DropTable {
                names: drop.names.clone(),
                if_exists: drop.if_exists,
            }),
            Statement::Insert(insert) => self.build_insert(insert, catalog),
            Statement::Update(update) => {
                let table = catalog.resolve(&update.table)?.clone();
                let schema = OutputSchema::for_table(&table, &table.name);
                let mut binder = Binder::new(&schema);

                let assignments = update
                    .assignments
                    .iter()
                    .map(|a| {
                        let index = table
                            .column_index(&a.column)
                            .ok_or_else(|| ExecError::UnknownColumn(a.column.clone()))?;
                        Ok((index, binder.bind(&a.value)?))
                    })
                    .collect::<Result<Vec<_>, ExecError>>()?;
                let filter = update
                    .selection
                    .as_ref()
                    .map(|e| binder.bind(e))
                    .transpose()?;

                Ok(Plan::Update {
                    table,
                    assignments,
                    filter,
                })
            }
            Statement::Delete(delete) => {
                let table = catalog.resolve(&delete.table)?.clone();
                let schema = OutputSchema::for_table(&table, &table.name);
                let filter = delete
                    .selection
                    .as_ref()
                    .map(|e| Binder::new(&schema).bind(e))
                    .transpose()?;

                Ok(Plan::Delete { table, filter })
            }
        }
    }

    fn build_create_table(&self, create: &CreateTable) -> Result<Plan, Error> {
        let mut columns = Vec::with_capacity(create.columns.len());
        for spec in &create.columns {
            let mut column = ColumnDef::new(spec.name.clone(), spec.data_type.clone());
            column.primary_key = spec.primary_key;
            column.nullable = !(spec.not_null || spec.primary_key);
            column.default = spec.default.as_ref().map(evaluate_constant).transpose()?;
            columns.push(column);
        }

        let position = |name: &String| {
            columns
                .iter()
                .position(|c: &ColumnDef| c.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| ExecError::UnknownColumn(name.clone()))
        };

        let mut primary: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.primary_key)
            .map(|(i, _)| i)
            .collect();
        if !create.primary_key.is_empty() {
            if !primary.is_empty() {
                return Err(ExecError::InvalidArgument(format!(
                    "table \"{}\" has more than one primary key",
                    create.name
                ))
                .into());
            }
            primary = create
                .primary_key
                .iter()
                .map(position)
                .collect::<Result<_, _>>()?;
        }
        if primary.len() > 1 && create.primary_key.is_empty() {
            return Err(ExecError::InvalidArgument(format!(
                "table \"{}\" has more than one primary key",
                create.name
            ))
            .into());
        }

        let mut keys = Vec::new();
        if !primary.is_empty() {
            keys.push(KeyConstraint {
                columns: primary,
                primary: true,
            });
        }
        for (i, spec) in create.columns.iter().enumerate() {
            if spec.unique && !spec.primary_key {
                keys.push(KeyConstraint {
                    columns: vec![i],
                    primary: false,
                });
            }
        }
        for names in &create.unique {
            keys.push(KeyConstraint {
                columns: names.iter().map(position).collect::<Result<_, _>>()?,
                primary: false,
            });
        }

        for key in keys.iter().filter(|k| k.primary) {
            for &index in &key.columns {
                columns[index].primary_key = true;
                columns[index].nullable = false;
            }
        }

        Ok(Plan::CreateTable {
            schema: TableSchema::new(create.name.clone(), columns, keys),
            if_not_exists: create.if_not_exists,
        })
    }

    fn build_insert(&self, insert: &ast::Insert, catalog: &Catalog) -> Result<Plan, Error> {
        let table = catalog.resolve(&insert.table)?.clone();

        let targets: Vec<usize> = if insert.columns.is_empty() {
            (0..table.width()).collect()
        } else {
            insert
                .columns
                .iter()
                .map(|name| {
                    table.column_index(name).ok_or_else(|| {
                        ExecError::UnknownColumn(format!("{}.{}", table.name, name))
                    })
                })
                .collect::<Result<_, _>>()?
        };

        let arity = |found: usize| -> Result<(), ExecError> {
            if found != targets.len() {
                return Err(ExecError::ArityMismatch {
                    table: table.name.clone(),
                    expected: targets.len(),
                    found,
                });
            }
            Ok(())
        };

        let rows = match &insert.source {
            InsertSource::Values(rows) => {
                let empty = OutputSchema::default();
                let mut binder = Binder::new(&empty);
                let mut bound = Vec::with_capacity(rows.len());
                for row in rows {
                    arity(row.len())?;
                    bound.push(
                        row.iter()
                            .map(|e| binder.bind(e))
                            .collect::<Result<Vec<_>, _>>()?,
                    );
                }
                InsertRows::Values(bound)
            }
            InsertSource::Query(select) => {
                let node = self.build_select(select, catalog)?;
                arity(node.output_schema.len())?;
                InsertRows::Query(node)
            }
        };

        Ok(Plan::Insert {
            table,
            targets,
            rows,
        })
    }

    fn build_select(&self, select: &Select, catalog: &Catalog) -> Result<PlanNode, Error> {
        let mut node = self.build_from(&select.from, catalog)?;
        let input = node.output_schema.clone();

        if let Some(selection) = &select.selection {
            if selection.contains_aggregate() {
                return Err(ExecError::InvalidArgument("misuse of aggregate function".into()).into());
            }
            let predicate = Binder::new(&input).bind(selection)?;
            node = PlanNode::new(
                input.clone(),
                Node::Filter {
                    predicate,
                    child: Box::new(node),
                },
            );
        }

        let aggregated = !select.group_by.is_empty()
            || select.having.as_ref().map_or(false, Expr::contains_aggregate)
            || select.order_by.iter().any(|o| o.expr.contains_aggregate())
            || select.projection.iter().any(|item| match item {
                SelectItem::Expr { expr, .. } => expr.contains_aggregate(),
                _ => false,
            });
        if select.having.is_some() && !aggregated {
            return Err(ExecError::InvalidArgument(
                "a GROUP BY clause is required before HAVING".into(),
            )
            .into());
        }

        let mut collector = AggregateCollector::new(input.len());
        let mut binder = if aggregated {
            Binder::with_aggregates(&input, &mut collector)
        } else {
            Binder::new(&input)
        };

        // Visible output columns.
        let mut exprs = Vec::new();
        let mut columns = Vec::new();
        let mut items = Vec::new();
        let mut aliases = Vec::new();
        for item in &select.projection {
            match item {
                SelectItem::Wildcard => {
                    if input.is_empty() {
                        return Err(ExecError::InvalidArgument("no tables specified".into()).into());
                    }
                    for (i, column) in input.columns.iter().enumerate() {
                        exprs.push(BoundExpr::Column(i));
                        columns.push(Column::new(column.name.clone()));
                        items.push(None);
                        aliases.push(None);
                    }
                }
                SelectItem::QualifiedWildcard(relation) => {
                    let before = exprs.len();
                    for (i, column) in input.columns.iter().enumerate() {
                        if column
                            .relation
                            .as_deref()
                            .map_or(false, |r| r.eq_ignore_ascii_case(relation))
                        {
                            exprs.push(BoundExpr::Column(i));
                            columns.push(Column::new(column.name.clone()));
                            items.push(None);
                            aliases.push(None);
                        }
                    }
                    if exprs.len() == before {
                        return Err(ExecError::UnknownColumn(format!("{}.*", relation)).into());
                    }
                }
                SelectItem::Expr { expr, alias, text } => {
                    let bound = binder.bind(expr)?;
                    let name = match (alias, &bound) {
                        (Some(alias), _) => alias.clone(),
                        (None, BoundExpr::Column(i)) if matches!(expr, Expr::Column { .. }) => {
                            input.columns[*i].name.clone()
                        }
                        _ => text.clone(),
                    };
                    exprs.push(bound);
                    columns.push(Column::new(name));
                    items.push(Some(expr));
                    aliases.push(alias.clone());
                }
            }
        }
        let visible = exprs.len();

        let having = select
            .having
            .as_ref()
            .map(|e| binder.bind(e))
            .transpose()?;

        // ORDER BY terms that are not output columns are appended as hidden
        // columns and trimmed after sorting.
        let mut keys = Vec::with_capacity(select.order_by.len());
        for item in &select.order_by {
            let index = match &item.expr {
                Expr::Literal(Value::Integer(position)) => {
                    if *position < 1 || *position as usize > visible {
                        return Err(ExecError::InvalidArgument(format!(
                            "ORDER BY term out of range - should be between 1 and {}",
                            visible
                        ))
                        .into());
                    }
                    *position as usize - 1
                }
                expr => {
                    let by_alias = match expr {
                        Expr::Column { table: None, name } => aliases
                            .iter()
                            .position(|a| a.as_deref().map_or(false, |a| a.eq_ignore_ascii_case(name))),
                        _ => None,
                    };
                    match by_alias {
                        Some(index) => index,
                        None => match items.iter().position(|item| *item == Some(expr)) {
                            Some(index) => index,
                            None => {
                                exprs.push(binder.bind(expr)?);
                                columns.push(Column::new(String::new()));
                                exprs.len() - 1
                            }
                        },
                    }
                }
            };
            keys.push(SortKey {
                index,
                asc: item.asc,
            });
        }
        drop(binder);

        if aggregated {
            let mut group_binder = Binder::new(&input);
            let group_by = select
                .group_by
                .iter()
                .map(|e| {
                    if e.contains_aggregate() {
                        return Err(ExecError::InvalidArgument(
                            "aggregate functions are not allowed in the GROUP BY clause".into(),
                        ));
                    }
                    group_binder.bind(e)
                })
                .collect::<Result<Vec<_>, _>>()?;

            let mut schema = input.clone();
            for call in &collector.calls {
                schema
                    .columns
                    .push(Column::new(format!("{:?}", call.function).to_lowercase()));
            }
            node = PlanNode::new(
                schema.clone(),
                Node::Aggregation {
                    group_by,
                    aggregates: collector.calls,
                    child: Box::new(node),
                },
            );
            if let Some(predicate) = having {
                node = PlanNode::new(
                    schema,
                    Node::Filter {
                        predicate,
                        child: Box::new(node),
                    },
                );
            }
        }

        let hidden = exprs.len() - visible;
        let projected = OutputSchema::new(columns);
        node = PlanNode::new(
            projected.clone(),
            Node::Projection {
                exprs,
                child: Box::new(node),
            },
        );

        if select.distinct {
            node = PlanNode::new(
                projected.clone(),
                Node::Distinct {
                    width: visible,
                    child: Box::new(node),
                },
            );
        }

        if !keys.is_empty() {
            node = PlanNode::new(
                projected.clone(),
                Node::Sort {
                    keys,
                    child: Box::new(node),
                },
            );
        }

        let limit = match &select.limit {
            Some(expr) => {
                let limit = constant_integer(expr, "LIMIT")?;
                (limit >= 0).then_some(limit as u64)
            }
            None => None,
        };
        let offset = match &select.offset {
            Some(expr) => constant_integer(expr, "OFFSET")?.max(0) as u64,
            None => 0,
        };
        if limit.is_some() || offset > 0 {
            node = PlanNode::new(
                projected.clone(),
                Node::Limit {
                    limit,
                    offset,
                    child: Box::new(node),
                },
            );
        }

        if hidden > 0 {
            let trimmed = OutputSchema::new(projected.columns[..visible].to_vec());
            node = PlanNode::new(
                trimmed,
                Node::Projection {
                    exprs: (0..visible).map(BoundExpr::Column).collect(),
                    child: Box::new(node),
                },
            );
        }

        Ok(node)
    }

    fn build_from(&self, from: &[FromItem], catalog: &Catalog) -> Result<PlanNode, Error> {
        let Some((first, rest)) = from.split_first() else {
            return Ok(PlanNode::new(OutputSchema::default(), Node::Empty));
        };

        let mut node = self.build_from_item(first, catalog)?;
        for item in rest {
            let right = self.build_from_item(item, catalog)?;
            node = join(node, right, JoinKind::Cross, None);
        }
        Ok(node)
    }

    fn build_from_item(&self, item: &FromItem, catalog: &Catalog) -> Result<PlanNode, Error> {
        let mut node = self.build_table(&item.table, catalog)?;

        for join_item in &item.joins {
            let right = self.build_table(&join_item.table, catalog)?;
            let combined = node.output_schema.concat(&right.output_schema);

            let predicate = match &join_item.constraint {
                JoinConstraint::On(expr) => Some(Binder::new(&combined).bind(expr)?),
                JoinConstraint::Using(names) => {
                    let offset = node.output_schema.len();
                    names
                        .iter()
                        .map(|name| {
                            let left = node.output_schema.resolve(None, name)?;
                            let right = right.output_schema.resolve(None, name)?;
                            Ok(BoundExpr::Binary {
                                left: Box::new(BoundExpr::Column(left)),
                                op: BinaryOp::Eq,
                                right: Box::new(BoundExpr::Column(offset + right)),
                            })
                        })
                        .collect::<Result<Vec<_>, ExecError>>()?
                        .into_iter()
                        .reduce(|acc, eq| BoundExpr::Binary {
                            left: Box::new(acc),
                            op: BinaryOp::And,
                            right: Box::new(eq),
                        })
                }
                JoinConstraint::None => None,
            };

            node = join(node, right, join_item.kind, predicate);
        }

        Ok(node)
    }

    fn build_table(&self, table: &TableRef, catalog: &Catalog) -> Result<PlanNode, Error> {
        let schema = catalog.resolve(&table.name)?;
        Ok(PlanNode::new(
            OutputSchema::for_table(schema, table.relation()),
            Node::Scan {
                table: schema.id,
                filter: None,
            },
        ))
    }
}

fn join(left: PlanNode, right: PlanNode, kind: JoinKind, predicate: Option<BoundExpr>) -> PlanNode {
    PlanNode::new(
        left.output_schema.concat(&right.output_schema),
        Node::NestedLoopJoin {
            left: Box::new(left),
            right: Box::new(right),
            kind,
            predicate,
        },
    )
}

/// Evaluates an expression that may not reference any column.
fn evaluate_constant(expr: &Expr) -> Result<Value, ExecError> {
    let empty = OutputSchema::default();
    let bound = Binder::new(&empty).bind(expr)?;
    ExprEvaluator::evaluate(&bound, &[])
}

fn constant_integer(expr: &Expr, clause: &str) -> Result<i64, ExecError> {
    match evaluate_constant(expr)? {
        Value::Integer(n) => Ok(n),
        other => Err(ExecError::TypeMismatch(format!(
            "{} must be an integer, found {}",
            clause,
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SQLParser;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        let parser = SQLParser::new();
        let planner = Planner::new();
        for sql in [
            "CREATE TABLE person (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INT)",
            "CREATE TABLE pet (id INTEGER PRIMARY KEY, owner INT, name TEXT)",
        ] {
            let Plan::CreateTable { schema, .. } =
                planner.build(&parser.parse(sql).unwrap(), &catalog).unwrap()
            else {
                panic!("expected CREATE TABLE plan");
            };
            catalog.define_table(schema).unwrap();
        }
        catalog
    }

    fn plan(sql: &str) -> Result<Plan, Error> {
        let statement = SQLParser::new().parse(sql).unwrap();
        Planner::new().build(&statement, &catalog())
    }

    fn query(sql: &str) -> PlanNode {
        match plan(sql).unwrap() {
            Plan::Query(node) => node,
            other => panic!("expected query plan, got {:?}", other),
        }
    }

    #[test]
    fn output_names_follow_columns_aliases_and_text() {
        let node = query("SELECT NAME, age AS years, age + 1, COUNT(*) FROM person GROUP BY name");
        assert_eq!(
            node.output_schema.names(),
            vec!["name", "years", "age + 1", "COUNT(*)"]
        );
    }

    #[test]
    fn unknown_and_ambiguous_columns_fail_at_plan_time() {
        assert_eq!(
            plan("SELECT nope FROM person").unwrap_err(),
            Error::Execution(ExecError::UnknownColumn("nope".into()))
        );
        assert_eq!(
            plan("SELECT name FROM person JOIN pet ON person.id = pet.owner").unwrap_err(),
            Error::Execution(ExecError::AmbiguousColumn("name".into()))
        );
        assert!(plan("SELECT person.name, pet.name FROM person JOIN pet ON person.id = pet.owner").is_ok());
    }

    #[test]
    fn missing_table_is_a_catalog_error() {
        assert!(matches!(
            plan("SELECT * FROM ghost"),
            Err(Error::Catalog(crate::types::error::CatalogError::NoSuchTable(_)))
        ));
    }

    #[test]
    fn hidden_sort_columns_are_trimmed() {
        let node = query("SELECT name FROM person ORDER BY age DESC");
        assert_eq!(node.output_schema.names(), vec!["name"]);
        let Node::Projection { child, .. } = node.node else {
            panic!("expected trimming projection");
        };
        assert!(matches!(child.node, Node::Sort { .. }));
        assert_eq!(child.output_schema.len(), 2);
    }

    #[test]
    fn order_by_alias_and_position_reuse_output_columns() {
        for sql in [
            "SELECT name, age AS years FROM person ORDER BY years",
            "SELECT name, age FROM person ORDER BY 2",
            "SELECT name, age FROM person ORDER BY age",
        ] {
            let node = query(sql);
            let Node::Sort { keys, .. } = node.node else {
                panic!("expected sort on top for {}", sql);
            };
            assert_eq!(keys, vec![SortKey { index: 1, asc: true }]);
        }
        assert!(plan("SELECT name FROM person ORDER BY 3").is_err());
    }

    #[test]
    fn insert_arity_is_checked() {
        assert_eq!(
            plan("INSERT INTO person VALUES (1, 'a')").unwrap_err(),
            Error::Execution(ExecError::ArityMismatch {
                table: "person".into(),
                expected: 3,
                found: 2
            })
        );
        let Plan::Insert { targets, .. } = plan("INSERT INTO person (name, id) VALUES ('a', 1)").unwrap()
        else {
            panic!("expected insert plan");
        };
        assert_eq!(targets, vec![1, 0]);
    }

    #[test]
    fn primary_key_columns_are_not_nullable() {
        let Plan::CreateTable { schema, .. } =
            plan("CREATE TABLE k (a TEXT, b INT, PRIMARY KEY (a, b), UNIQUE (b))").unwrap()
        else {
            panic!("expected CREATE TABLE plan");
        };
        assert!(!schema.columns[0].nullable && !schema.columns[1].nullable);
        assert_eq!(schema.keys.len(), 2);
        assert_eq!(schema.keys[0].columns, vec![0, 1]);
    }

    #[test]
    fn aggregates_outside_projection_are_rejected() {
        assert!(plan("SELECT name FROM person WHERE COUNT(*) > 1").is_err());
        assert!(plan("SELECT name FROM person HAVING age > 1").is_err());
    }
}
