//! Conversion from the `sqlparser` tree into [`super::ast`].

use sqlparser::ast as sql;

use crate::types::{error::ParseError, Value};

use super::ast::*;

type Result<T> = std::result::Result<T, ParseError>;

fn unsupported<T>(what: impl Into<String>) -> Result<T> {
    Err(ParseError::Unsupported(what.into()))
}

fn object_name(name: &sql::ObjectName) -> Result<String> {
    match name.0.last() {
        Some(ident) => Ok(ident.value.clone()),
        None => Err(ParseError::Syntax("missing object name".to_string())),
    }
}

pub fn lower_statement(statement: sql::Statement) -> Result<Statement> {
    match statement {
        sql::Statement::Query(query) => Ok(Statement::Select(lower_query(*query)?)),
        sql::Statement::CreateTable {
            name,
            columns,
            constraints,
            if_not_exists,
            ..
        } => lower_create_table(name, columns, constraints, if_not_exists),
        sql::Statement::Drop {
            object_type: sql::ObjectType::Table,
            if_exists,
            names,
            ..
        } => Ok(Statement::DropTable(DropTable {
            names: names.iter().map(object_name).collect::<Result<_>>()?,
            if_exists,
        })),
        sql::Statement::Insert {
            or,
            table_name,
            columns,
            source,
            ..
        } => {
            if or.is_some() {
                return unsupported("INSERT OR <conflict clause>");
            }
            lower_insert(table_name, columns, *source)
        }
        sql::Statement::Update {
            table,
            assignments,
            from,
            selection,
            ..
        } => {
            if from.is_some() {
                return unsupported("UPDATE ... FROM");
            }
            let table = lower_table_with_joins(table)?;
            if !table.joins.is_empty() {
                return unsupported("UPDATE of a join");
            }
            Ok(Statement::Update(Update {
                table: table.table.name,
                assignments: assignments
                    .into_iter()
                    .map(lower_assignment)
                    .collect::<Result<_>>()?,
                selection: selection.map(lower_expr).transpose()?,
            }))
        }
        sql::Statement::Delete {
            from, selection, ..
        } => {
            let mut from = from.into_iter();
            let table = match (from.next(), from.next()) {
                (Some(table), None) => lower_table_with_joins(table)?,
                _ => return unsupported("DELETE from more than one table"),
            };
            if !table.joins.is_empty() {
                return unsupported("DELETE of a join");
            }
            Ok(Statement::Delete(Delete {
                table: table.table.name,
                selection: selection.map(lower_expr).transpose()?,
            }))
        }
        other => unsupported(statement_keyword(&other)),
    }
}

// First words of the rendered statement, enough to name it in an error.
fn statement_keyword(statement: &sql::Statement) -> String {
    statement
        .to_string()
        .split_whitespace()
        .take(2)
        .collect::<Vec<_>>()
        .join(" ")
}

fn lower_create_table(
    name: sql::ObjectName,
    columns: Vec<sql::ColumnDef>,
    constraints: Vec<sql::TableConstraint>,
    if_not_exists: bool,
) -> Result<Statement> {
    let columns = columns
        .into_iter()
        .map(lower_column_def)
        .collect::<Result<Vec<_>>>()?;

    let mut primary_key = Vec::new();
    let mut unique = Vec::new();
    for constraint in constraints {
        match constraint {
            sql::TableConstraint::Unique {
                columns,
                is_primary,
                ..
            } => {
                let names = columns.into_iter().map(|c| c.value).collect();
                if is_primary {
                    if !primary_key.is_empty() {
                        return Err(ParseError::Syntax(
                            "table has more than one primary key".to_string(),
                        ));
                    }
                    primary_key = names;
                } else {
                    unique.push(names);
                }
            }
            // Foreign keys and checks are accepted and not enforced.
            _ => {}
        }
    }

    Ok(Statement::CreateTable(CreateTable {
        name: object_name(&name)?,
        columns,
        primary_key,
        unique,
        if_not_exists,
    }))
}

fn lower_column_def(column: sql::ColumnDef) -> Result<ColumnSpec> {
    let mut spec = ColumnSpec {
        name: column.name.value,
        data_type: column.data_type.to_string(),
        not_null: false,
        primary_key: false,
        unique: false,
        default: None,
    };

    for option in column.options {
        match option.option {
            sql::ColumnOption::Null => spec.not_null = false,
            sql::ColumnOption::NotNull => spec.not_null = true,
            sql::ColumnOption::Default(expr) => spec.default = Some(lower_expr(expr)?),
            sql::ColumnOption::Unique { is_primary, .. } => {
                if is_primary {
                    spec.primary_key = true;
                } else {
                    spec.unique = true;
                }
            }
            _ => {}
        }
    }

    Ok(spec)
}

fn lower_insert(
    table_name: sql::ObjectName,
    columns: Vec<sql::Ident>,
    source: sql::Query,
) -> Result<Statement> {
    let source = match source.body.as_ref() {
        sql::SetExpr::Values(values) => InsertSource::Values(
            values
                .rows
                .iter()
                .map(|row| row.iter().cloned().map(lower_expr).collect::<Result<Vec<_>>>())
                .collect::<Result<_>>()?,
        ),
        _ => InsertSource::Query(Box::new(lower_query(source)?)),
    };

    Ok(Statement::Insert(Insert {
        table: object_name(&table_name)?,
        columns: columns.into_iter().map(|c| c.value).collect(),
        source,
    }))
}

fn lower_assignment(assignment: sql::Assignment) -> Result<Assignment> {
    let column = match assignment.id.last() {
        Some(ident) => ident.value.clone(),
        None => return Err(ParseError::Syntax("empty assignment target".to_string())),
    };
    Ok(Assignment {
        column,
        value: lower_expr(assignment.value)?,
    })
}

fn lower_query(query: sql::Query) -> Result<Select> {
    let sql::Query {
        with,
        body,
        order_by,
        limit,
        offset,
        ..
    } = query;

    if with.is_some() {
        return unsupported("WITH");
    }

    let mut select = match *body {
        sql::SetExpr::Select(select) => lower_select(*select)?,
        sql::SetExpr::SetOperation { op, .. } => return unsupported(op.to_string()),
        sql::SetExpr::Values(_) => return unsupported("VALUES as a query"),
        _ => return unsupported("nested query"),
    };

    select.order_by = order_by
        .into_iter()
        .map(|item| {
            Ok(OrderByItem {
                expr: lower_expr(item.expr)?,
                asc: item.asc.unwrap_or(true),
            })
        })
        .collect::<Result<_>>()?;
    select.limit = limit.map(lower_expr).transpose()?;
    select.offset = offset.map(|offset| lower_expr(offset.value)).transpose()?;

    Ok(select)
}

fn lower_select(select: sql::Select) -> Result<Select> {
    let sql::Select {
        distinct,
        projection,
        from,
        selection,
        group_by,
        having,
        ..
    } = select;

    let distinct = match distinct {
        None => false,
        Some(sql::Distinct::Distinct) => true,
        Some(sql::Distinct::On(_)) => return unsupported("DISTINCT ON"),
    };

    Ok(Select {
        distinct,
        projection: projection
            .into_iter()
            .map(lower_select_item)
            .collect::<Result<_>>()?,
        from: from
            .into_iter()
            .map(lower_table_with_joins)
            .collect::<Result<_>>()?,
        selection: selection.map(lower_expr).transpose()?,
        group_by: group_by.into_iter().map(lower_expr).collect::<Result<_>>()?,
        having: having.map(lower_expr).transpose()?,
        ..Select::default()
    })
}

fn lower_select_item(item: sql::SelectItem) -> Result<SelectItem> {
    match item {
        sql::SelectItem::UnnamedExpr(expr) => {
            let text = expr.to_string();
            Ok(SelectItem::Expr {
                expr: lower_expr(expr)?,
                alias: None,
                text,
            })
        }
        sql::SelectItem::ExprWithAlias { expr, alias } => {
            let text = expr.to_string();
            Ok(SelectItem::Expr {
                expr: lower_expr(expr)?,
                alias: Some(alias.value),
                text,
            })
        }
        sql::SelectItem::Wildcard(_) => Ok(SelectItem::Wildcard),
        sql::SelectItem::QualifiedWildcard(name, _) => {
            Ok(SelectItem::QualifiedWildcard(object_name(&name)?))
        }
    }
}

fn lower_table_with_joins(table: sql::TableWithJoins) -> Result<FromItem> {
    Ok(FromItem {
        table: lower_table_factor(table.relation)?,
        joins: table
            .joins
            .into_iter()
            .map(lower_join)
            .collect::<Result<_>>()?,
    })
}

fn lower_table_factor(factor: sql::TableFactor) -> Result<TableRef> {
    match factor {
        sql::TableFactor::Table { name, alias, .. } => Ok(TableRef {
            name: object_name(&name)?,
            alias: alias.map(|alias| alias.name.value),
        }),
        _ => unsupported("derived tables in FROM"),
    }
}

fn lower_join(join: sql::Join) -> Result<Join> {
    let table = lower_table_factor(join.relation)?;
    let (kind, constraint) = match join.join_operator {
        sql::JoinOperator::Inner(constraint) => (JoinKind::Inner, constraint),
        sql::JoinOperator::LeftOuter(constraint) => (JoinKind::LeftOuter, constraint),
        sql::JoinOperator::CrossJoin => (JoinKind::Cross, sql::JoinConstraint::None),
        _ => return unsupported("only INNER, LEFT and CROSS joins are supported"),
    };

    let constraint = match constraint {
        sql::JoinConstraint::On(expr) => JoinConstraint::On(lower_expr(expr)?),
        sql::JoinConstraint::Using(columns) => {
            JoinConstraint::Using(columns.into_iter().map(|c| c.value).collect())
        }
        sql::JoinConstraint::None => JoinConstraint::None,
        sql::JoinConstraint::Natural => return unsupported("NATURAL JOIN"),
    };

    Ok(Join {
        table,
        kind,
        constraint,
    })
}

fn boxed(expr: sql::Expr) -> Result<Box<Expr>> {
    Ok(Box::new(lower_expr(expr)?))
}

pub fn lower_expr(expr: sql::Expr) -> Result<Expr> {
    match expr {
        sql::Expr::Identifier(ident) => Ok(Expr::column(ident.value)),
        sql::Expr::CompoundIdentifier(mut idents) => {
            if idents.len() != 2 {
                return unsupported(format!(
                    "column reference {}",
                    sql::Expr::CompoundIdentifier(idents)
                ));
            }
            let name = idents.pop().map(|i| i.value).unwrap_or_default();
            let table = idents.pop().map(|i| i.value);
            Ok(Expr::Column { table, name })
        }
        sql::Expr::Value(value) => Ok(Expr::Literal(lower_value(value)?)),
        sql::Expr::Nested(expr) => lower_expr(*expr),
        sql::Expr::UnaryOp { op, expr } => match (op, *expr) {
            // Fold the sign into numeric literals so i64::MIN is representable.
            (sql::UnaryOperator::Minus, sql::Expr::Value(sql::Value::Number(n, _))) => {
                Ok(Expr::Literal(parse_number(&format!("-{}", n))?))
            }
            (sql::UnaryOperator::Minus, expr) => Ok(Expr::Unary {
                op: UnaryOp::Minus,
                expr: boxed(expr)?,
            }),
            (sql::UnaryOperator::Plus, expr) => Ok(Expr::Unary {
                op: UnaryOp::Plus,
                expr: boxed(expr)?,
            }),
            (sql::UnaryOperator::Not, expr) => Ok(Expr::Unary {
                op: UnaryOp::Not,
                expr: boxed(expr)?,
            }),
            (op, _) => unsupported(format!("unary operator {}", op)),
        },
        sql::Expr::BinaryOp { left, op, right } => Ok(Expr::Binary {
            left: boxed(*left)?,
            op: lower_binary_op(op)?,
            right: boxed(*right)?,
        }),
        sql::Expr::IsNull(expr) => Ok(Expr::IsNull {
            expr: boxed(*expr)?,
            negated: false,
        }),
        sql::Expr::IsNotNull(expr) => Ok(Expr::IsNull {
            expr: boxed(*expr)?,
            negated: true,
        }),
        sql::Expr::Between {
            expr,
            negated,
            low,
            high,
        } => Ok(Expr::Between {
            expr: boxed(*expr)?,
            low: boxed(*low)?,
            high: boxed(*high)?,
            negated,
        }),
        sql::Expr::InList {
            expr,
            list,
            negated,
        } => Ok(Expr::InList {
            expr: boxed(*expr)?,
            list: list.into_iter().map(lower_expr).collect::<Result<_>>()?,
            negated,
        }),
        sql::Expr::Like {
            negated,
            expr,
            pattern,
            ..
        }
        | sql::Expr::ILike {
            negated,
            expr,
            pattern,
            ..
        } => Ok(Expr::Like {
            expr: boxed(*expr)?,
            pattern: boxed(*pattern)?,
            negated,
        }),
        sql::Expr::Case {
            operand,
            conditions,
            results,
            else_result,
            ..
        } => Ok(Expr::Case {
            operand: operand.map(|e| boxed(*e)).transpose()?,
            branches: conditions
                .into_iter()
                .zip(results)
                .map(|(when, then)| Ok((lower_expr(when)?, lower_expr(then)?)))
                .collect::<Result<_>>()?,
            else_result: else_result.map(|e| boxed(*e)).transpose()?,
        }),
        sql::Expr::Cast {
            expr, data_type, ..
        } => Ok(Expr::Cast {
            expr: boxed(*expr)?,
            type_name: data_type.to_string(),
        }),
        sql::Expr::Trim {
            expr,
            trim_where,
            trim_what,
            ..
        } => {
            let name = match trim_where {
                None | Some(sql::TrimWhereField::Both) => "TRIM",
                Some(sql::TrimWhereField::Leading) => "LTRIM",
                Some(sql::TrimWhereField::Trailing) => "RTRIM",
            };
            let mut args = vec![lower_expr(*expr)?];
            if let Some(what) = trim_what {
                args.push(lower_expr(*what)?);
            }
            Ok(Expr::Function {
                name: name.to_string(),
                args,
                distinct: false,
                wildcard: false,
            })
        }
        sql::Expr::Function(function) => lower_function(function),
        sql::Expr::Subquery(_) | sql::Expr::InSubquery { .. } | sql::Expr::Exists { .. } => {
            unsupported("subqueries")
        }
        other => unsupported(format!("expression {}", other)),
    }
}

fn lower_function(function: sql::Function) -> Result<Expr> {
    if function.over.is_some() {
        return unsupported("window functions");
    }

    let name = object_name(&function.name)?.to_ascii_uppercase();
    let mut args = Vec::new();
    let mut wildcard = false;
    for arg in function.args {
        match arg {
            sql::FunctionArg::Unnamed(sql::FunctionArgExpr::Expr(expr)) => {
                args.push(lower_expr(expr)?)
            }
            sql::FunctionArg::Unnamed(sql::FunctionArgExpr::Wildcard) => wildcard = true,
            other => return unsupported(format!("function argument {}", other)),
        }
    }

    Ok(Expr::Function {
        name,
        args,
        distinct: function.distinct,
        wildcard,
    })
}

fn lower_binary_op(op: sql::BinaryOperator) -> Result<BinaryOp> {
    Ok(match op {
        sql::BinaryOperator::Plus => BinaryOp::Plus,
        sql::BinaryOperator::Minus => BinaryOp::Minus,
        sql::BinaryOperator::Multiply => BinaryOp::Multiply,
        sql::BinaryOperator::Divide => BinaryOp::Divide,
        sql::BinaryOperator::Modulo => BinaryOp::Modulo,
        sql::BinaryOperator::StringConcat => BinaryOp::Concat,
        sql::BinaryOperator::Eq => BinaryOp::Eq,
        sql::BinaryOperator::NotEq => BinaryOp::NotEq,
        sql::BinaryOperator::Lt => BinaryOp::Lt,
        sql::BinaryOperator::LtEq => BinaryOp::LtEq,
        sql::BinaryOperator::Gt => BinaryOp::Gt,
        sql::BinaryOperator::GtEq => BinaryOp::GtEq,
        sql::BinaryOperator::And => BinaryOp::And,
        sql::BinaryOperator::Or => BinaryOp::Or,
        other => return unsupported(format!("operator {}", other)),
    })
}

fn parse_number(text: &str) -> Result<Value> {
    if let Ok(i) = text.parse::<i64>() {
        return Ok(Value::Integer(i));
    }
    text.parse::<f64>()
        .map(Value::Real)
        .map_err(|_| ParseError::InvalidLiteral(text.to_string()))
}

fn parse_hex(text: &str) -> Result<Value> {
    if text.len() % 2 != 0 {
        return Err(ParseError::InvalidLiteral(format!("X'{}'", text)));
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&text[i..i + 2], 16))
        .collect::<std::result::Result<Vec<u8>, _>>()
        .map(Value::Blob)
        .map_err(|_| ParseError::InvalidLiteral(format!("X'{}'", text)))
}

fn lower_value(value: sql::Value) -> Result<Value> {
    match value {
        sql::Value::Number(n, _) => parse_number(&n),
        sql::Value::SingleQuotedString(s) | sql::Value::DoubleQuotedString(s) => Ok(Value::Text(s)),
        sql::Value::HexStringLiteral(s) => parse_hex(&s),
        sql::Value::Boolean(b) => Ok(Value::Integer(b as i64)),
        sql::Value::Null => Ok(Value::Null),
        other => unsupported(format!("literal {}", other)),
    }
}
