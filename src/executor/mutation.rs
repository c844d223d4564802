//! INSERT, UPDATE and DELETE.
//!
//! Every statement computes and validates its complete effect before the
//! first write, so a constraint failure leaves the table as it was.

use std::collections::BTreeSet;

use tracing::debug;

use crate::catalog::TableSchema;
use crate::planner::BoundExpr;
use crate::storage::{RowId, StorageEngine};
use crate::types::error::{Error, ExecError};
use crate::types::{Row, Value};

use super::ExprEvaluator;

pub fn insert(
    table: &TableSchema,
    targets: &[usize],
    rows: Vec<Row>,
    storage: &mut StorageEngine,
) -> Result<u64, Error> {
    let defaults: Row = table
        .columns
        .iter()
        .map(|c| c.default.clone().unwrap_or(Value::Null))
        .collect();

    let mut new_rows = Vec::with_capacity(rows.len());
    for values in rows {
        if values.len() != targets.len() {
            return Err(ExecError::ArityMismatch {
                table: table.name.clone(),
                expected: targets.len(),
                found: values.len(),
            }
            .into());
        }
        let mut row = defaults.clone();
        for (&index, value) in targets.iter().zip(values) {
            row[index] = value;
        }
        new_rows.push(row);
    }

    if let Some(key) = table.integer_primary_key() {
        let largest = match primary_key_index(table) {
            Some(index) => storage.last_key(table.id, index)?.and_then(|t| t[0].as_i64()),
            None => None,
        };
        let mut next = largest.map_or(1, |max| max.saturating_add(1));
        for row in &mut new_rows {
            row[key] = match &row[key] {
                Value::Null => Value::Integer(next),
                value => Value::Integer(integer_key(table, key, value)?),
            };
            if let Value::Integer(assigned) = row[key] {
                next = next.max(assigned.saturating_add(1));
            }
        }
    }

    for row in &new_rows {
        check_not_null(table, row)?;
    }
    check_keys(table, storage, new_rows.iter(), &BTreeSet::new())?;

    let count = new_rows.len() as u64;
    for row in new_rows {
        storage.insert(table.id, row)?;
    }
    debug!(table = %table.name, rows = count, "inserted rows");
    Ok(count)
}

pub fn update(
    table: &TableSchema,
    assignments: &[(usize, BoundExpr)],
    filter: Option<&BoundExpr>,
    storage: &mut StorageEngine,
) -> Result<u64, Error> {
    let ipk = table.integer_primary_key();

    let mut changes: Vec<(RowId, Row)> = Vec::new();
    for (row_id, row) in storage.scan(table.id)? {
        if !matches(filter, row)? {
            continue;
        }
        // Every assignment sees the row as it was before the statement.
        let mut updated = row.clone();
        for (index, expr) in assignments {
            updated[*index] = ExprEvaluator::evaluate(expr, row)?;
        }
        if let Some(key) = ipk {
            if !updated[key].is_null() {
                updated[key] = Value::Integer(integer_key(table, key, &updated[key])?);
            }
        }
        check_not_null(table, &updated)?;
        changes.push((row_id, updated));
    }
    let replaced: BTreeSet<RowId> = changes.iter().map(|(row_id, _)| *row_id).collect();
    check_keys(table, storage, changes.iter().map(|(_, row)| row), &replaced)?;

    let count = changes.len() as u64;
    for (row_id, row) in changes {
        storage.update(table.id, row_id, row)?;
    }
    debug!(table = %table.name, rows = count, "updated rows");
    Ok(count)
}

pub fn delete(
    table: &TableSchema,
    filter: Option<&BoundExpr>,
    storage: &mut StorageEngine,
) -> Result<u64, Error> {
    let mut doomed = Vec::new();
    for (row_id, row) in storage.scan(table.id)? {
        if matches(filter, row)? {
            doomed.push(row_id);
        }
    }

    let count = doomed.len() as u64;
    for row_id in doomed {
        storage.delete(table.id, row_id)?;
    }
    debug!(table = %table.name, rows = count, "deleted rows");
    Ok(count)
}

fn matches(filter: Option<&BoundExpr>, row: &Row) -> Result<bool, ExecError> {
    match filter {
        Some(predicate) => ExprEvaluator::is_truthy(predicate, row),
        None => Ok(true),
    }
}

// Values stored in an INTEGER PRIMARY KEY column must be integers.
fn integer_key(table: &TableSchema, key: usize, value: &Value) -> Result<i64, ExecError> {
    let mismatch = || {
        ExecError::TypeMismatch(format!(
            "datatype mismatch for {}.{}",
            table.name, table.columns[key].name
        ))
    };
    match value {
        Value::Integer(i) => Ok(*i),
        Value::Real(_) => value.as_i64().ok_or_else(mismatch),
        Value::Text(text) => text.trim().parse::<i64>().map_err(|_| mismatch()),
        _ => Err(mismatch()),
    }
}

fn check_not_null(table: &TableSchema, row: &Row) -> Result<(), ExecError> {
    for (column, value) in table.columns.iter().zip(row) {
        if !column.nullable && value.is_null() {
            return Err(ExecError::ConstraintViolation(format!(
                "NOT NULL constraint failed: {}.{}",
                table.name, column.name
            )));
        }
    }
    Ok(())
}

// Position of the PRIMARY KEY among the table's indexed keys.
fn primary_key_index(table: &TableSchema) -> Option<usize> {
    table.keys.iter().position(|k| k.primary)
}

/// Fails if a written row shares a key with another written row, or with a
/// stored row that is not among `replaced`. Keys containing NULL never
/// collide.
fn check_keys<'r>(
    table: &TableSchema,
    storage: &StorageEngine,
    rows: impl Iterator<Item = &'r Row> + Clone,
    replaced: &BTreeSet<RowId>,
) -> Result<(), Error> {
    for (index, key) in table.keys.iter().enumerate() {
        let mut seen = BTreeSet::new();
        for row in rows.clone() {
            let tuple: Vec<Value> = key.columns.iter().map(|&i| row[i].clone()).collect();
            if tuple.iter().any(Value::is_null) {
                continue;
            }
            let stored = storage
                .find_key(table.id, index, &tuple)?
                .is_some_and(|holder| !replaced.contains(&holder));
            if stored || !seen.insert(tuple) {
                let columns: Vec<String> = key
                    .columns
                    .iter()
                    .map(|&i| format!("{}.{}", table.name, table.columns[i].name))
                    .collect();
                return Err(ExecError::ConstraintViolation(format!(
                    "UNIQUE constraint failed: {}",
                    columns.join(", ")
                ))
                .into());
            }
        }
    }
    Ok(())
}
