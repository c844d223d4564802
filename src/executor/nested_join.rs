use crate::parser::ast::JoinKind;
use crate::planner::{BoundExpr, OutputSchema};
use crate::types::{error::Error, Chunk, Row, Value};

use super::{drain, Buffer, Executor, ExprEvaluator, VECTOR_SIZE_THRESHOLD};

/// Joins every left row against the fully materialized right input.
pub struct NestedLoopJoin<'a> {
    output_schema: OutputSchema,
    child_left: Box<dyn Executor + 'a>,
    child_right: Box<dyn Executor + 'a>,
    kind: JoinKind,
    predicate: Option<BoundExpr>,

    buffer: Buffer,
    right_rows: Option<Vec<Row>>,
}

impl<'a> NestedLoopJoin<'a> {
    pub fn new(
        child_left: Box<dyn Executor + 'a>,
        child_right: Box<dyn Executor + 'a>,
        kind: JoinKind,
        predicate: Option<BoundExpr>,
        output_schema: OutputSchema,
    ) -> NestedLoopJoin<'a> {
        NestedLoopJoin {
            output_schema,
            child_left,
            child_right,
            kind,
            predicate,
            buffer: Buffer::new(),
            right_rows: None,
        }
    }

    fn fill_buffer(&mut self, right_rows: &[Row]) -> Result<(), Error> {
        while self.buffer.size() < VECTOR_SIZE_THRESHOLD {
            let next_chunk = self.child_left.next_chunk()?;
            if next_chunk.is_empty() {
                break;
            }
            for left_row in next_chunk.rows {
                self.join_row(left_row, right_rows)?;
            }
        }
        Ok(())
    }

    fn join_row(&mut self, left_row: Row, right_rows: &[Row]) -> Result<(), Error> {
        let mut matched = false;
        for right_row in right_rows {
            let mut row = left_row.clone();
            row.extend(right_row.iter().cloned());

            let keep = match &self.predicate {
                Some(predicate) => ExprEvaluator::is_truthy(predicate, &row)?,
                None => true,
            };
            if keep {
                matched = true;
                self.buffer.add_row(row);
            }
        }

        if !matched && self.kind == JoinKind::LeftOuter {
            let right_width = self.output_schema.len() - left_row.len();
            let mut row = left_row;
            row.resize(row.len() + right_width, Value::Null);
            self.buffer.add_row(row);
        }
        Ok(())
    }
}

impl Executor for NestedLoopJoin<'_> {
    fn next_chunk(&mut self) -> Result<Chunk, Error> {
        let right_rows = match self.right_rows.take() {
            Some(rows) => rows,
            None => drain(self.child_right.as_mut())?
                .into_iter()
                .flat_map(|chunk| chunk.rows)
                .collect(),
        };

        let filled = self.fill_buffer(&right_rows);
        self.right_rows = Some(right_rows);
        filled?;

        Ok(self.buffer.get_sized_chunk(VECTOR_SIZE_THRESHOLD))
    }

    fn get_output_schema(&self) -> OutputSchema {
        self.output_schema.clone()
    }
}
