use crate::executor::{Executor, ExprEvaluator};
use crate::planner::{BoundExpr, OutputSchema};
use crate::types::{error::Error, Chunk};

pub struct Filter<'a> {
    output_schema: OutputSchema,
    predicate: BoundExpr,
    child: Box<dyn Executor + 'a>,
}

impl<'a> Filter<'a> {
    pub fn new(
        child: Box<dyn Executor + 'a>,
        predicate: BoundExpr,
        output_schema: OutputSchema,
    ) -> Filter<'a> {
        Filter {
            output_schema,
            predicate,
            child,
        }
    }
}

impl Executor for Filter<'_> {
    fn next_chunk(&mut self) -> Result<Chunk, Error> {
        loop {
            let chunk = self.child.next_chunk()?;
            if chunk.is_empty() {
                return Ok(chunk);
            }

            let mut rows = Vec::new();
            for row in chunk.rows {
                if ExprEvaluator::is_truthy(&self.predicate, &row)? {
                    rows.push(row);
                }
            }
            if !rows.is_empty() {
                return Ok(Chunk::new(rows));
            }
        }
    }

    fn get_output_schema(&self) -> OutputSchema {
        self.output_schema.clone()
    }
}
