mod aggregation;
mod distinct;
mod empty;
mod expression;
mod filter;
mod limit;
mod mutation;
mod nested_join;
mod projection;
mod scan;
mod sort;

use std::collections::VecDeque;

use tracing::debug;

use crate::catalog::Catalog;
use crate::planner::{InsertRows, Node, OutputSchema, Plan, PlanNode};
use crate::storage::StorageEngine;
use crate::types::error::{CatalogError, Error};
use crate::types::{Chunk, ResultSet, Row};

use self::{
    aggregation::Aggregation, distinct::Distinct, empty::Empty, filter::Filter, limit::Limit,
    nested_join::NestedLoopJoin, projection::Projection, scan::Scan, sort::Sort,
};

pub use expression::{Caster, ExprEvaluator};

const VECTOR_SIZE_THRESHOLD: usize = crate::storage::CHUNK_SIZE;

/// A pull-based operator. An empty chunk signals the end of the input.
pub trait Executor {
    fn get_output_schema(&self) -> OutputSchema;
    fn next_chunk(&mut self) -> Result<Chunk, Error>;
}

/// Rows waiting to be handed out in chunks.
pub struct Buffer {
    rows: VecDeque<Row>,
}

impl Buffer {
    pub fn new() -> Buffer {
        Buffer {
            rows: VecDeque::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.rows.len()
    }

    pub fn add_row(&mut self, row: Row) {
        self.rows.push_back(row);
    }

    pub fn get_sized_chunk(&mut self, size: usize) -> Chunk {
        let n = size.min(self.rows.len());
        Chunk::new(self.rows.drain(..n).collect())
    }
}

/// Pulls every chunk out of `executor`.
fn drain(executor: &mut dyn Executor) -> Result<Vec<Chunk>, Error> {
    let mut chunks = Vec::new();
    loop {
        let chunk = executor.next_chunk()?;
        if chunk.is_empty() {
            return Ok(chunks);
        }
        chunks.push(chunk);
    }
}

struct ExecutorBuilder {}

impl ExecutorBuilder {
    fn build<'a>(
        plan_node: PlanNode,
        storage: &'a StorageEngine,
    ) -> Result<Box<dyn Executor + 'a>, Error> {
        let output_schema = plan_node.output_schema;
        Ok(match plan_node.node {
            Node::Scan { table, filter } => {
                Box::new(Scan::new(storage.reader(table)?, filter, output_schema))
            }
            Node::NestedLoopJoin {
                left,
                right,
                kind,
                predicate,
            } => Box::new(NestedLoopJoin::new(
                Self::build(*left, storage)?,
                Self::build(*right, storage)?,
                kind,
                predicate,
                output_schema,
            )),
            Node::Filter { predicate, child } => Box::new(Filter::new(
                Self::build(*child, storage)?,
                predicate,
                output_schema,
            )),
            Node::Aggregation {
                group_by,
                aggregates,
                child,
            } => Box::new(Aggregation::new(
                Self::build(*child, storage)?,
                group_by,
                aggregates,
                output_schema,
            )),
            Node::Projection { exprs, child } => Box::new(Projection::new(
                Self::build(*child, storage)?,
                exprs,
                output_schema,
            )),
            Node::Distinct { width, child } => Box::new(Distinct::new(
                Self::build(*child, storage)?,
                width,
                output_schema,
            )),
            Node::Sort { keys, child } => Box::new(Sort::new(
                Self::build(*child, storage)?,
                keys,
                output_schema,
            )),
            Node::Limit {
                limit,
                offset,
                child,
            } => Box::new(Limit::new(
                Self::build(*child, storage)?,
                limit,
                offset,
                output_schema,
            )),
            Node::Empty => Box::new(Empty::new()),
        })
    }
}

#[derive(Debug, Default)]
pub struct ExecutionEngine {}

impl ExecutionEngine {
    pub fn new() -> ExecutionEngine {
        ExecutionEngine {}
    }

    pub fn execute(
        &self,
        plan: Plan,
        catalog: &mut Catalog,
        storage: &mut StorageEngine,
    ) -> Result<ResultSet, Error> {
        match plan {
            Plan::Query(root) => {
                let output_schema = root.output_schema.columns.clone();
                let mut executor = ExecutorBuilder::build(root, storage)?;
                let chunks = drain(executor.as_mut())?;
                debug!(
                    rows = chunks.iter().map(Chunk::len).sum::<usize>(),
                    "query finished"
                );
                Ok(ResultSet {
                    output_schema,
                    chunks,
                    rows_affected: 0,
                })
            }
            Plan::CreateTable {
                schema,
                if_not_exists,
            } => {
                if if_not_exists && catalog.contains(&schema.name) {
                    return Ok(ResultSet::default());
                }
                let table = catalog.define_table(schema)?;
                let keys = table.keys.iter().map(|k| k.columns.clone()).collect();
                storage.create_partition(table.id, table.width(), keys);
                Ok(ResultSet::default())
            }
            Plan::DropTable { names, if_exists } => {
                // Check every name first so a failing statement drops nothing.
                if !if_exists {
                    if let Some(missing) = names.iter().find(|n| !catalog.contains(n)) {
                        return Err(CatalogError::NoSuchTable(missing.clone()).into());
                    }
                }
                let existing: Vec<&String> = names.iter().filter(|n| catalog.contains(n)).collect();
                for name in existing {
                    let table = catalog.drop_table(name)?;
                    storage.drop_partition(table.id);
                    debug!(table = %table.name, "dropped table");
                }
                Ok(ResultSet::default())
            }
            Plan::Insert {
                table,
                targets,
                rows,
            } => {
                let rows = match rows {
                    InsertRows::Values(rows) => rows
                        .iter()
                        .map(|row| {
                            row.iter()
                                .map(|e| ExprEvaluator::evaluate(e, &[]))
                                .collect::<Result<Row, _>>()
                        })
                        .collect::<Result<Vec<_>, _>>()?,
                    InsertRows::Query(root) => {
                        let mut executor = ExecutorBuilder::build(root, storage)?;
                        drain(executor.as_mut())?
                            .into_iter()
                            .flat_map(|chunk| chunk.rows)
                            .collect()
                    }
                };
                let affected = mutation::insert(&table, &targets, rows, storage)?;
                Ok(ResultSet::affected(affected))
            }
            Plan::Update {
                table,
                assignments,
                filter,
            } => {
                let affected = mutation::update(&table, &assignments, filter.as_ref(), storage)?;
                Ok(ResultSet::affected(affected))
            }
            Plan::Delete { table, filter } => {
                let affected = mutation::delete(&table, filter.as_ref(), storage)?;
                Ok(ResultSet::affected(affected))
            }
        }
    }
}
