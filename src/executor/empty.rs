use crate::executor::Executor;
use crate::planner::OutputSchema;
use crate::types::{error::Error, Chunk};

/// Source for SELECT without FROM: one row with no columns, then nothing.
pub struct Empty {
    polled: bool,
}

impl Empty {
    pub fn new() -> Empty {
        Empty { polled: false }
    }
}

impl Executor for Empty {
    fn next_chunk(&mut self) -> Result<Chunk, Error> {
        if self.polled {
            return Ok(Chunk::default());
        }
        self.polled = true;
        Ok(Chunk::new(vec![vec![]]))
    }

    fn get_output_schema(&self) -> OutputSchema {
        OutputSchema::default()
    }
}
