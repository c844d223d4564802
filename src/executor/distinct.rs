use std::collections::BTreeSet;

use crate::executor::Executor;
use crate::planner::OutputSchema;
use crate::types::{error::Error, Chunk, Value};

/// Streams rows whose leading `width` values have not been seen before.
/// Trailing columns, such as hidden sort keys, do not take part.
pub struct Distinct<'a> {
    output_schema: OutputSchema,
    width: usize,
    child: Box<dyn Executor + 'a>,

    seen: BTreeSet<Vec<Value>>,
}

impl<'a> Distinct<'a> {
    pub fn new(child: Box<dyn Executor + 'a>, width: usize, output_schema: OutputSchema) -> Distinct<'a> {
        Distinct {
            output_schema,
            width,
            child,
            seen: BTreeSet::new(),
        }
    }
}

impl Executor for Distinct<'_> {
    fn next_chunk(&mut self) -> Result<Chunk, Error> {
        loop {
            let chunk = self.child.next_chunk()?;
            if chunk.is_empty() {
                return Ok(chunk);
            }

            let mut rows = Vec::new();
            for row in chunk.rows {
                let key = row[..self.width.min(row.len())].to_vec();
                if self.seen.insert(key) {
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
