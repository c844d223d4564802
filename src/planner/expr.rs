//! Expressions with column references resolved to row positions.

use regex::Regex;

use crate::catalog::Affinity;
use crate::parser::ast::{BinaryOp, Expr, UnaryOp};
use crate::types::{error::ExecError, Value};

use super::OutputSchema;

#[derive(Debug, Clone)]
pub enum BoundExpr {
    Column(usize),
    Literal(Value),
    Unary {
        op: UnaryOp,
        expr: Box<BoundExpr>,
    },
    Binary {
        left: Box<BoundExpr>,
        op: BinaryOp,
        right: Box<BoundExpr>,
    },
    IsNull {
        expr: Box<BoundExpr>,
        negated: bool,
    },
    Between {
        expr: Box<BoundExpr>,
        low: Box<BoundExpr>,
        high: Box<BoundExpr>,
        negated: bool,
    },
    InList {
        expr: Box<BoundExpr>,
        list: Vec<BoundExpr>,
        negated: bool,
    },
    Like {
        expr: Box<BoundExpr>,
        pattern: LikePattern,
        negated: bool,
    },
    Case {
        operand: Option<Box<BoundExpr>>,
        branches: Vec<(BoundExpr, BoundExpr)>,
        else_result: Option<Box<BoundExpr>>,
    },
    Cast {
        expr: Box<BoundExpr>,
        affinity: Affinity,
    },
    Function {
        function: ScalarFunction,
        args: Vec<BoundExpr>,
    },
}

/// A LIKE pattern; literal patterns are compiled once at plan time.
#[derive(Debug, Clone)]
pub enum LikePattern {
    Compiled(Regex),
    Dynamic(Box<BoundExpr>),
}

/// Translates a LIKE pattern into an anchored regex. Only ASCII letters
/// match regardless of case.
pub fn like_to_regex(pattern: &str) -> Result<Regex, ExecError> {
    let mut source = String::from("(?s)^");
    for c in pattern.chars() {
        match c {
            '%' => source.push_str(".*"),
            '_' => source.push('.'),
            c if c.is_ascii_alphabetic() => {
                source.push('[');
                source.push(c.to_ascii_lowercase());
                source.push(c.to_ascii_uppercase());
                source.push(']');
            }
            c => source.push_str(&regex::escape(&c.to_string())),
        }
    }
    source.push('$');
    Regex::new(&source).map_err(|e| ExecError::InvalidArgument(e.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarFunction {
    Abs,
    Coalesce,
    IfNull,
    Length,
    Lower,
    Upper,
    Trim,
    LTrim,
    RTrim,
    Round,
    Substr,
    Typeof,
    Replace,
    Min,
    Max,
}

impl ScalarFunction {
    pub fn from_name(name: &str) -> Option<ScalarFunction> {
        Some(match name {
            "ABS" => ScalarFunction::Abs,
            "COALESCE" => ScalarFunction::Coalesce,
            "IFNULL" => ScalarFunction::IfNull,
            "LENGTH" => ScalarFunction::Length,
            "LOWER" => ScalarFunction::Lower,
            "UPPER" => ScalarFunction::Upper,
            "TRIM" => ScalarFunction::Trim,
            "LTRIM" => ScalarFunction::LTrim,
            "RTRIM" => ScalarFunction::RTrim,
            "ROUND" => ScalarFunction::Round,
            "SUBSTR" => ScalarFunction::Substr,
            "TYPEOF" => ScalarFunction::Typeof,
            "REPLACE" => ScalarFunction::Replace,
            "MIN" => ScalarFunction::Min,
            "MAX" => ScalarFunction::Max,
            _ => return None,
        })
    }

    fn accepts(&self, args: usize) -> bool {
        match self {
            ScalarFunction::Abs
            | ScalarFunction::Length
            | ScalarFunction::Lower
            | ScalarFunction::Upper
            | ScalarFunction::Typeof => args == 1,
            ScalarFunction::Trim | ScalarFunction::LTrim | ScalarFunction::RTrim => {
                args == 1 || args == 2
            }
            ScalarFunction::Round => args == 1 || args == 2,
            ScalarFunction::Substr => args == 2 || args == 3,
            ScalarFunction::IfNull => args == 2,
            ScalarFunction::Replace => args == 3,
            ScalarFunction::Coalesce | ScalarFunction::Min | ScalarFunction::Max => args >= 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Total,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    fn from_name(name: &str) -> Option<AggregateFunction> {
        Some(match name {
            "COUNT" => AggregateFunction::Count,
            "SUM" => AggregateFunction::Sum,
            "TOTAL" => AggregateFunction::Total,
            "AVG" => AggregateFunction::Avg,
            "MIN" => AggregateFunction::Min,
            "MAX" => AggregateFunction::Max,
            _ => return None,
        })
    }
}

/// One aggregate evaluated per group. `arg` is `None` for `COUNT(*)`.
#[derive(Debug, Clone)]
pub struct AggregateCall {
    pub function: AggregateFunction,
    pub arg: Option<BoundExpr>,
    pub distinct: bool,
}

/// Aggregate calls met while binding the clauses of a grouped SELECT.
///
/// Every call becomes a column appended after the input columns of the
/// aggregation output; identical calls share one column.
pub struct AggregateCollector {
    input_width: usize,
    seen: Vec<Expr>,
    pub calls: Vec<AggregateCall>,
}

impl AggregateCollector {
    pub fn new(input_width: usize) -> AggregateCollector {
        AggregateCollector {
            input_width,
            seen: Vec::new(),
            calls: Vec::new(),
        }
    }
}

/// Resolves names in [`Expr`] trees against an [`OutputSchema`].
pub struct Binder<'a> {
    schema: &'a OutputSchema,
    aggregates: Option<&'a mut AggregateCollector>,
}

impl<'a> Binder<'a> {
    /// A binder for clauses where aggregate calls are not allowed.
    pub fn new(schema: &'a OutputSchema) -> Binder<'a> {
        Binder {
            schema,
            aggregates: None,
        }
    }

    pub fn with_aggregates(
        schema: &'a OutputSchema,
        aggregates: &'a mut AggregateCollector,
    ) -> Binder<'a> {
        Binder {
            schema,
            aggregates: Some(aggregates),
        }
    }

    pub fn bind(&mut self, expr: &Expr) -> Result<BoundExpr, ExecError> {
        if expr.is_aggregate_call() {
            return self.bind_aggregate(expr);
        }

        Ok(match expr {
            Expr::Column { table, name } => {
                BoundExpr::Column(self.schema.resolve(table.as_deref(), name)?)
            }
            Expr::Literal(value) => BoundExpr::Literal(value.clone()),
            Expr::Unary { op, expr } => BoundExpr::Unary {
                op: *op,
                expr: self.bind_boxed(expr)?,
            },
            Expr::Binary { left, op, right } => BoundExpr::Binary {
                left: self.bind_boxed(left)?,
                op: *op,
                right: self.bind_boxed(right)?,
            },
            Expr::IsNull { expr, negated } => BoundExpr::IsNull {
                expr: self.bind_boxed(expr)?,
                negated: *negated,
            },
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => BoundExpr::Between {
                expr: self.bind_boxed(expr)?,
                low: self.bind_boxed(low)?,
                high: self.bind_boxed(high)?,
                negated: *negated,
            },
            Expr::InList {
                expr,
                list,
                negated,
            } => BoundExpr::InList {
                expr: self.bind_boxed(expr)?,
                list: list
                    .iter()
                    .map(|e| self.bind(e))
                    .collect::<Result<_, _>>()?,
                negated: *negated,
            },
            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                let pattern = match pattern.as_ref() {
                    Expr::Literal(Value::Text(text)) => LikePattern::Compiled(like_to_regex(text)?),
                    other => LikePattern::Dynamic(self.bind_boxed(other)?),
                };
                BoundExpr::Like {
                    expr: self.bind_boxed(expr)?,
                    pattern,
                    negated: *negated,
                }
            }
            Expr::Case {
                operand,
                branches,
                else_result,
            } => BoundExpr::Case {
                operand: operand.as_ref().map(|e| self.bind_boxed(e)).transpose()?,
                branches: branches
                    .iter()
                    .map(|(when, then)| Ok((self.bind(when)?, self.bind(then)?)))
                    .collect::<Result<_, ExecError>>()?,
                else_result: else_result
                    .as_ref()
                    .map(|e| self.bind_boxed(e))
                    .transpose()?,
            },
            Expr::Cast { expr, type_name } => BoundExpr::Cast {
                expr: self.bind_boxed(expr)?,
                affinity: Affinity::from_type_name(type_name),
            },
            Expr::Function {
                name,
                args,
                distinct,
                wildcard,
            } => {
                let function = ScalarFunction::from_name(name)
                    .ok_or_else(|| ExecError::Unsupported(format!("no such function: {}", name)))?;
                if *distinct || *wildcard || !function.accepts(args.len()) {
                    return Err(ExecError::InvalidArgument(format!(
                        "wrong number of arguments to function {}()",
                        name
                    )));
                }
                BoundExpr::Function {
                    function,
                    args: args
                        .iter()
                        .map(|e| self.bind(e))
                        .collect::<Result<_, _>>()?,
                }
            }
        })
    }

    fn bind_boxed(&mut self, expr: &Expr) -> Result<Box<BoundExpr>, ExecError> {
        Ok(Box::new(self.bind(expr)?))
    }

    fn bind_aggregate(&mut self, expr: &Expr) -> Result<BoundExpr, ExecError> {
        let Expr::Function {
            name,
            args,
            distinct,
            wildcard,
        } = expr
        else {
            return Err(ExecError::InvalidArgument(format!("not an aggregate call: {:?}", expr)));
        };

        let schema = self.schema;
        let collector = self
            .aggregates
            .as_deref_mut()
            .ok_or_else(|| ExecError::InvalidArgument(format!("misuse of aggregate: {}()", name)))?;

        if let Some(slot) = collector.seen.iter().position(|seen| seen == expr) {
            return Ok(BoundExpr::Column(collector.input_width + slot));
        }

        let function = AggregateFunction::from_name(name)
            .ok_or_else(|| ExecError::Unsupported(format!("no such function: {}", name)))?;
        let arg = match (args.as_slice(), *wildcard) {
            ([], true) if function == AggregateFunction::Count => None,
            ([arg], false) => {
                if arg.contains_aggregate() {
                    return Err(ExecError::InvalidArgument(format!(
                        "misuse of aggregate function {}()",
                        name
                    )));
                }
                // Arguments see the input rows, never other aggregates.
                Some(Binder::new(schema).bind(arg)?)
            }
            _ => {
                return Err(ExecError::InvalidArgument(format!(
                    "wrong number of arguments to function {}()",
                    name
                )))
            }
        };

        collector.seen.push(expr.clone());
        collector.calls.push(AggregateCall {
            function,
            arg,
            distinct: *distinct,
        });
        Ok(BoundExpr::Column(collector.input_width + collector.calls.len() - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Column;

    fn schema() -> OutputSchema {
        OutputSchema::new(vec![
            Column::qualified("t", "id"),
            Column::qualified("t", "name"),
            Column::qualified("u", "id"),
        ])
    }

    #[test]
    fn columns_bind_to_positions() {
        let schema = schema();
        let mut binder = Binder::new(&schema);
        let bound = binder.bind(&Expr::column("NAME")).unwrap();
        assert!(matches!(bound, BoundExpr::Column(1)));

        let qualified = Expr::Column {
            table: Some("u".into()),
            name: "id".into(),
        };
        assert!(matches!(binder.bind(&qualified).unwrap(), BoundExpr::Column(2)));
    }

    #[test]
    fn unqualified_duplicate_names_are_ambiguous() {
        let schema = schema();
        let err = Binder::new(&schema).bind(&Expr::column("id")).unwrap_err();
        assert_eq!(err, ExecError::AmbiguousColumn("id".into()));
    }

    #[test]
    fn aggregates_need_a_collector() {
        let schema = schema();
        let count = Expr::Function {
            name: "COUNT".into(),
            args: vec![],
            distinct: false,
            wildcard: true,
        };
        assert!(Binder::new(&schema).bind(&count).is_err());

        let mut collector = AggregateCollector::new(schema.len());
        let mut binder = Binder::with_aggregates(&schema, &mut collector);
        assert!(matches!(binder.bind(&count).unwrap(), BoundExpr::Column(3)));
        assert!(matches!(binder.bind(&count).unwrap(), BoundExpr::Column(3)));
        assert_eq!(collector.calls.len(), 1);
    }

    #[test]
    fn like_patterns_match_case_insensitively() {
        let regex = like_to_regex("a%_c").unwrap();
        assert!(regex.is_match("ABxc"));
        assert!(regex.is_match("a..zc"));
        assert!(!regex.is_match("ac"));
        assert!(like_to_regex("100%").unwrap().is_match("100 percent"));
        assert!(!like_to_regex("a.b").unwrap().is_match("axb"));
    }

    #[test]
    fn like_folds_only_ascii_letters() {
        assert!(like_to_regex("k").unwrap().is_match("K"));
        assert!(!like_to_regex("é").unwrap().is_match("É"));
        assert!(!like_to_regex("k").unwrap().is_match("\u{212A}"));
        assert!(like_to_regex("straße").unwrap().is_match("STRAße"));
    }
}
