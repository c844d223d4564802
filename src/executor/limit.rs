use crate::executor::Executor;
use crate::planner::OutputSchema;
use crate::types::{error::Error, Chunk};

use super::{Buffer, VECTOR_SIZE_THRESHOLD};

pub struct Limit<'a> {
    output_schema: OutputSchema,
    /// Rows still to be emitted; `None` means unbounded.
    remaining: Option<u64>,
    /// Rows still to be skipped.
    offset: u64,
    child: Box<dyn Executor + 'a>,

    buffer: Buffer,
}

impl<'a> Limit<'a> {
    pub fn new(
        child: Box<dyn Executor + 'a>,
        limit: Option<u64>,
        offset: u64,
        output_schema: OutputSchema,
    ) -> Limit<'a> {
        Limit {
            output_schema,
            remaining: limit,
            offset,
            child,
            buffer: Buffer::new(),
        }
    }
}

impl Executor for Limit<'_> {
    fn next_chunk(&mut self) -> Result<Chunk, Error> {
        while self.remaining != Some(0) && self.buffer.size() < VECTOR_SIZE_THRESHOLD {
            let next_chunk = self.child.next_chunk()?;
            if next_chunk.is_empty() {
                break;
            }

            for row in next_chunk.rows {
                if self.offset > 0 {
                    self.offset -= 1;
                    continue;
                }
                match &mut self.remaining {
                    Some(0) => break,
                    Some(n) => *n -= 1,
                    None => {}
                }
                self.buffer.add_row(row);
            }
        }

        Ok(self.buffer.get_sized_chunk(VECTOR_SIZE_THRESHOLD))
    }

    fn get_output_schema(&self) -> OutputSchema {
        self.output_schema.clone()
    }
}
