use crate::executor::{Executor, ExprEvaluator};
use crate::planner::{BoundExpr, OutputSchema};
use crate::types::{error::Error, Chunk, Row};

pub struct Projection<'a> {
    output_schema: OutputSchema,
    exprs: Vec<BoundExpr>,
    child: Box<dyn Executor + 'a>,
}

impl<'a> Projection<'a> {
    pub fn new(
        child: Box<dyn Executor + 'a>,
        exprs: Vec<BoundExpr>,
        output_schema: OutputSchema,
    ) -> Projection<'a> {
        Projection {
            output_schema,
            exprs,
            child,
        }
    }
}

impl Executor for Projection<'_> {
    fn next_chunk(&mut self) -> Result<Chunk, Error> {
        let chunk = self.child.next_chunk()?;

        let rows = chunk
            .rows
            .iter()
            .map(|row| {
                self.exprs
                    .iter()
                    .map(|expr| ExprEvaluator::evaluate(expr, row))
                    .collect::<Result<Row, _>>()
            })
            .collect::<Result<Vec<Row>, _>>()?;

        Ok(Chunk::new(rows))
    }

    fn get_output_schema(&self) -> OutputSchema {
        self.output_schema.clone()
    }
}
