use crate::planner::{BoundExpr, OutputSchema};
use crate::storage::StorageReader;
use crate::types::{error::Error, Chunk, Row};

use super::{Executor, ExprEvaluator};

pub struct Scan<'a> {
    output_schema: OutputSchema,
    filter: Option<BoundExpr>,

    reader: Box<dyn StorageReader + 'a>,
}

impl<'a> Scan<'a> {
    pub fn new(
        reader: impl StorageReader + 'a,
        filter: Option<BoundExpr>,
        output_schema: OutputSchema,
    ) -> Scan<'a> {
        Scan {
            output_schema,
            filter,
            reader: Box::new(reader),
        }
    }
}

impl Executor for Scan<'_> {
    fn next_chunk(&mut self) -> Result<Chunk, Error> {
        loop {
            let chunk = self.reader.next_chunk();
            let Some(filter) = &self.filter else {
                return Ok(chunk);
            };
            if chunk.is_empty() {
                return Ok(chunk);
            }

            let mut rows: Vec<Row> = Vec::with_capacity(chunk.len());
            for row in chunk.rows {
                if ExprEvaluator::is_truthy(filter, &row)? {
                    rows.push(row);
                }
            }
            // A fully filtered chunk is not the end of the table.
            if !rows.is_empty() {
                return Ok(Chunk::new(rows));
            }
        }
    }

    fn get_output_schema(&self) -> OutputSchema {
        self.output_schema.clone()
    }
}
