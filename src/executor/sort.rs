use std::cmp::Ordering;
use std::collections::VecDeque;

use crate::executor::Executor;
use crate::planner::{OutputSchema, SortKey};
use crate::types::{error::Error, Chunk, Row};

use super::{drain, VECTOR_SIZE_THRESHOLD};

/// Materializes its input and emits it in key order. The sort is stable and
/// NULL sorts before every other value.
pub struct Sort<'a> {
    output_schema: OutputSchema,
    keys: Vec<SortKey>,
    child: Box<dyn Executor + 'a>,

    rows: Option<VecDeque<Row>>,
}

impl<'a> Sort<'a> {
    pub fn new(child: Box<dyn Executor + 'a>, keys: Vec<SortKey>, output_schema: OutputSchema) -> Sort<'a> {
        Sort {
            output_schema,
            keys,
            child,
            rows: None,
        }
    }

    fn compare(&self, left: &Row, right: &Row) -> Ordering {
        for key in &self.keys {
            let ordering = left[key.index].cmp(&right[key.index]);
            let ordering = if key.asc { ordering } else { ordering.reverse() };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

impl Executor for Sort<'_> {
    fn next_chunk(&mut self) -> Result<Chunk, Error> {
        if self.rows.is_none() {
            let mut rows: Vec<Row> = drain(self.child.as_mut())?
                .into_iter()
                .flat_map(|chunk| chunk.rows)
                .collect();
            rows.sort_by(|l, r| self.compare(l, r));
            self.rows = Some(rows.into());
        }

        let rows = match self.rows.as_mut() {
            Some(rows) => rows,
            None => return Ok(Chunk::default()),
        };
        let n = VECTOR_SIZE_THRESHOLD.min(rows.len());
        Ok(Chunk::new(rows.drain(..n).collect()))
    }

    fn get_output_schema(&self) -> OutputSchema {
        self.output_schema.clone()
    }
}
