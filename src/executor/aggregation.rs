use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::executor::Executor;
use crate::parser::ast::BinaryOp;
use crate::planner::{AggregateCall, AggregateFunction, BoundExpr, OutputSchema};
use crate::types::error::{Error, ExecError};
use crate::types::{Chunk, Row, Value};

use super::expression::ExprEvaluator;
use super::VECTOR_SIZE_THRESHOLD;

type GroupByKey = Vec<Value>;
type AggregationColumns = Vec<Box<dyn Accumulator>>;

pub trait Accumulator {
    fn accumulate(&mut self, value: &Value) -> Result<(), Error>;
    fn aggregate(&self) -> Result<Value, Error>;
}

pub struct Aggregation<'a> {
    output_schema: OutputSchema,
    child: Box<dyn Executor + 'a>,
    group_by: Vec<BoundExpr>,
    aggregates: Vec<AggregateCall>,

    rows: Option<VecDeque<Row>>,
}

impl<'a> Aggregation<'a> {
    pub fn new(
        child: Box<dyn Executor + 'a>,
        group_by: Vec<BoundExpr>,
        aggregates: Vec<AggregateCall>,
        output_schema: OutputSchema,
    ) -> Aggregation<'a> {
        Aggregation {
            output_schema,
            child,
            group_by,
            aggregates,
            rows: None,
        }
    }

    fn new_accumulators(&self) -> AggregationColumns {
        self.aggregates.iter().map(new_accumulator).collect()
    }

    fn accumulate_row(&self, accumulators: &mut AggregationColumns, row: &Row) -> Result<(), Error> {
        for (call, accumulator) in self.aggregates.iter().zip(accumulators.iter_mut()) {
            let value = match &call.arg {
                Some(arg) => ExprEvaluator::evaluate(arg, row)?,
                // COUNT(*) counts rows, so any non-null marker will do.
                None => Value::Integer(1),
            };
            accumulator.accumulate(&value)?;
        }
        Ok(())
    }

    /// Consumes the whole input. Groups come out ordered by key.
    fn init_accumulators(&mut self) -> Result<VecDeque<Row>, Error> {
        let mut groups: BTreeMap<GroupByKey, (Row, AggregationColumns)> = BTreeMap::new();

        loop {
            let chunk = self.child.next_chunk()?;
            if chunk.is_empty() {
                break;
            }
            for row in chunk.rows {
                let key = self
                    .group_by
                    .iter()
                    .map(|expr| ExprEvaluator::evaluate(expr, &row))
                    .collect::<Result<GroupByKey, _>>()?;

                let (_, accumulators) = groups
                    .entry(key)
                    .or_insert_with(|| (row.clone(), self.new_accumulators()));
                self.accumulate_row(accumulators, &row)?;
            }
        }

        // Without GROUP BY an empty input still yields one row.
        if groups.is_empty() && self.group_by.is_empty() {
            let width = self.output_schema.len() - self.aggregates.len();
            groups.insert(Vec::new(), (vec![Value::Null; width], self.new_accumulators()));
        }

        groups
            .into_values()
            .map(|(mut row, accumulators)| {
                for accumulator in &accumulators {
                    row.push(accumulator.aggregate()?);
                }
                Ok(row)
            })
            .collect()
    }
}

impl Executor for Aggregation<'_> {
    fn next_chunk(&mut self) -> Result<Chunk, Error> {
        let rows = match self.rows.take() {
            Some(rows) => rows,
            None => self.init_accumulators()?,
        };
        let rows = self.rows.insert(rows);

        let n = VECTOR_SIZE_THRESHOLD.min(rows.len());
        Ok(Chunk::new(rows.drain(..n).collect()))
    }

    fn get_output_schema(&self) -> OutputSchema {
        self.output_schema.clone()
    }
}

fn new_accumulator(call: &AggregateCall) -> Box<dyn Accumulator> {
    let accumulator: Box<dyn Accumulator> = match call.function {
        AggregateFunction::Count => Box::new(CountAccumulator::new()),
        AggregateFunction::Sum => Box::new(SumAccumulator::new()),
        AggregateFunction::Total => Box::new(TotalAccumulator::new()),
        AggregateFunction::Avg => Box::new(AvgAccumulator::new()),
        AggregateFunction::Min => Box::new(MinAccumulator::new()),
        AggregateFunction::Max => Box::new(MaxAccumulator::new()),
    };
    if call.distinct {
        Box::new(DistinctAccumulator::new(accumulator))
    } else {
        accumulator
    }
}

fn numeric(value: &Value, function: &str) -> Result<(), Error> {
    match value {
        Value::Text(_) | Value::Blob(_) => Err(ExecError::TypeMismatch(format!(
            "{}() of {} value",
            function,
            value.type_name()
        ))
        .into()),
        _ => Ok(()),
    }
}

/// Feeds each distinct non-null value to the wrapped accumulator once.
struct DistinctAccumulator {
    seen: BTreeSet<Value>,
    inner: Box<dyn Accumulator>,
}

impl DistinctAccumulator {
    fn new(inner: Box<dyn Accumulator>) -> DistinctAccumulator {
        DistinctAccumulator {
            seen: BTreeSet::new(),
            inner,
        }
    }
}

impl Accumulator for DistinctAccumulator {
    fn accumulate(&mut self, value: &Value) -> Result<(), Error> {
        if value.is_null() || !self.seen.insert(value.clone()) {
            return Ok(());
        }
        self.inner.accumulate(value)
    }

    fn aggregate(&self) -> Result<Value, Error> {
        self.inner.aggregate()
    }
}

struct CountAccumulator {
    count: i64,
}

impl CountAccumulator {
    fn new() -> CountAccumulator {
        CountAccumulator { count: 0 }
    }
}

impl Accumulator for CountAccumulator {
    fn accumulate(&mut self, value: &Value) -> Result<(), Error> {
        if !value.is_null() {
            self.count += 1;
        }
        Ok(())
    }

    fn aggregate(&self) -> Result<Value, Error> {
        Ok(Value::Integer(self.count))
    }
}

struct SumAccumulator {
    sum: Option<Value>,
}

impl SumAccumulator {
    fn new() -> SumAccumulator {
        SumAccumulator { sum: None }
    }
}

impl Accumulator for SumAccumulator {
    fn accumulate(&mut self, value: &Value) -> Result<(), Error> {
        if value.is_null() {
            return Ok(());
        }
        numeric(value, "sum")?;

        self.sum = Some(match self.sum.take() {
            Some(sum) => ExprEvaluator::evaluate_binary_op(&sum, BinaryOp::Plus, value)?,
            None => value.clone(),
        });
        Ok(())
    }

    fn aggregate(&self) -> Result<Value, Error> {
        Ok(self.sum.clone().unwrap_or(Value::Null))
    }
}

struct TotalAccumulator {
    total: f64,
}

impl TotalAccumulator {
    fn new() -> TotalAccumulator {
        TotalAccumulator { total: 0.0 }
    }
}

impl Accumulator for TotalAccumulator {
    fn accumulate(&mut self, value: &Value) -> Result<(), Error> {
        if value.is_null() {
            return Ok(());
        }
        numeric(value, "total")?;
        self.total += value.as_f64().unwrap_or(0.0);
        Ok(())
    }

    fn aggregate(&self) -> Result<Value, Error> {
        Ok(Value::Real(self.total))
    }
}

struct AvgAccumulator {
    count: u64,
    sum: f64,
}

impl AvgAccumulator {
    fn new() -> AvgAccumulator {
        AvgAccumulator { count: 0, sum: 0.0 }
    }
}

impl Accumulator for AvgAccumulator {
    fn accumulate(&mut self, value: &Value) -> Result<(), Error> {
        if value.is_null() {
            return Ok(());
        }
        numeric(value, "avg")?;
        self.sum += value.as_f64().unwrap_or(0.0);
        self.count += 1;
        Ok(())
    }

    fn aggregate(&self) -> Result<Value, Error> {
        if self.count == 0 {
            return Ok(Value::Null);
        }
        Ok(Value::Real(self.sum / self.count as f64))
    }
}

struct MinAccumulator {
    min: Option<Value>,
}

impl MinAccumulator {
    fn new() -> MinAccumulator {
        MinAccumulator { min: None }
    }
}

impl Accumulator for MinAccumulator {
    fn accumulate(&mut self, value: &Value) -> Result<(), Error> {
        if value.is_null() {
            return Ok(());
        }
        if self.min.as_ref().map_or(true, |min| value < min) {
            self.min = Some(value.clone());
        }
        Ok(())
    }

    fn aggregate(&self) -> Result<Value, Error> {
        Ok(self.min.clone().unwrap_or(Value::Null))
    }
}

struct MaxAccumulator {
    max: Option<Value>,
}

impl MaxAccumulator {
    fn new() -> MaxAccumulator {
        MaxAccumulator { max: None }
    }
}

impl Accumulator for MaxAccumulator {
    fn accumulate(&mut self, value: &Value) -> Result<(), Error> {
        if value.is_null() {
            return Ok(());
        }
        if self.max.as_ref().map_or(true, |max| value > max) {
            self.max = Some(value.clone());
        }
        Ok(())
    }

    fn aggregate(&self) -> Result<Value, Error> {
        Ok(self.max.clone().unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(accumulator: &mut dyn Accumulator, values: &[Value]) -> Value {
        for value in values {
            accumulator.accumulate(value).unwrap();
        }
        accumulator.aggregate().unwrap()
    }

    #[test]
    fn nulls_are_ignored() {
        let values = [Value::Integer(3), Value::Null, Value::Integer(5)];
        assert_eq!(run(&mut CountAccumulator::new(), &values), Value::Integer(2));
        assert_eq!(run(&mut SumAccumulator::new(), &values), Value::Integer(8));
        assert_eq!(run(&mut AvgAccumulator::new(), &values), Value::Real(4.0));
        assert_eq!(run(&mut MinAccumulator::new(), &values), Value::Integer(3));
        assert_eq!(run(&mut MaxAccumulator::new(), &values), Value::Integer(5));
    }

    #[test]
    fn empty_input_results() {
        assert_eq!(run(&mut CountAccumulator::new(), &[]), Value::Integer(0));
        assert_eq!(run(&mut SumAccumulator::new(), &[]), Value::Null);
        assert_eq!(run(&mut TotalAccumulator::new(), &[]), Value::Real(0.0));
        assert_eq!(run(&mut AvgAccumulator::new(), &[]), Value::Null);
    }

    #[test]
    fn sum_switches_to_real_when_needed() {
        let values = [Value::Integer(1), Value::Real(0.5)];
        assert_eq!(run(&mut SumAccumulator::new(), &values), Value::Real(1.5));
    }

    #[test]
    fn sum_of_text_is_rejected() {
        let mut sum = SumAccumulator::new();
        assert!(sum.accumulate(&Value::Text("x".into())).is_err());
    }

    #[test]
    fn distinct_counts_each_value_once() {
        let mut count = DistinctAccumulator::new(Box::new(CountAccumulator::new()));
        let values = [1.into(), 1.into(), 2.into(), Value::Null];
        assert_eq!(run(&mut count, &values), Value::Integer(2));
    }
}
