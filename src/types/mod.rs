pub mod error;

use std::cmp::Ordering;
use std::fmt;

use serde::{Serialize, Serializer};
use tabled::{builder::Builder, settings::Style};

/// A single dynamically typed cell.
///
/// Columns carry a declared type, but cells are stored exactly as they were
/// written, so every row position may hold any variant.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name reported by `TYPEOF`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Real(f) if f.fract() == 0.0 && (I64_LOWER..I64_UPPER).contains(f) => {
                Some(*f as i64)
            }
            _ => None,
        }
    }

    /// Text rendering used by string functions and `||`.
    pub fn to_text(&self) -> String {
        match self {
            Value::Blob(b) => String::from_utf8_lossy(b).into_owned(),
            Value::Text(s) => s.clone(),
            other => other.to_string(),
        }
    }

    // NULL < INTEGER/REAL < TEXT < BLOB
    fn storage_class(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Integer(_) | Value::Real(_) => 1,
            Value::Text(_) => 2,
            Value::Blob(_) => 3,
        }
    }
}

// -2^63 and 2^63: every real in between truncates to an exact i64.
const I64_LOWER: f64 = -9_223_372_036_854_775_808.0;
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

// Exact comparison; `i as f64` would round above 2^53.
fn compare_int_real(i: i64, f: f64) -> Ordering {
    if f.is_nan() {
        return (i as f64).total_cmp(&f);
    }
    if f >= I64_UPPER {
        return Ordering::Less;
    }
    if f < I64_LOWER {
        return Ordering::Greater;
    }
    let whole = f.trunc();
    i.cmp(&(whole as i64)).then_with(|| {
        if f > whole {
            Ordering::Less
        } else if f < whole {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    })
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Integer(l), Value::Integer(r)) => l.cmp(r),
            (Value::Integer(l), Value::Real(r)) => compare_int_real(*l, *r),
            (Value::Real(l), Value::Integer(r)) => compare_int_real(*r, *l).reverse(),
            (Value::Real(l), Value::Real(r)) => l.partial_cmp(r).unwrap_or_else(|| l.total_cmp(r)),
            (Value::Text(l), Value::Text(r)) => l.cmp(r),
            (Value::Blob(l), Value::Blob(r)) => l.cmp(r),
            (l, r) => l.storage_class().cmp(&r.storage_class()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) if r.is_finite() && r.fract() == 0.0 && r.abs() < 1e15 => {
                write!(f, "{:.1}", r)
            }
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => write!(f, "{}", s),
            Value::Blob(bytes) => {
                write!(f, "X'")?;
                for byte in bytes {
                    write!(f, "{:02X}", byte)?;
                }
                write!(f, "'")
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Real(r) => serializer.serialize_f64(*r),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Blob(b) => serializer.serialize_bytes(b),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Integer(value as i64)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

pub type Row = Vec<Value>;

/// An output column. `relation` is the table name or alias the column can be
/// qualified with.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub relation: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Column {
        Column {
            name: name.into(),
            relation: None,
        }
    }

    pub fn qualified(relation: impl Into<String>, name: impl Into<String>) -> Column {
        Column {
            name: name.into(),
            relation: Some(relation.into()),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct Chunk {
    pub rows: Vec<Row>,
}

impl Chunk {
    pub fn new(rows: Vec<Row>) -> Chunk {
        Chunk { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Everything one statement produced inside the engine.
#[derive(Debug, Default)]
pub struct ResultSet {
    pub output_schema: Vec<Column>,
    pub chunks: Vec<Chunk>,
    /// Rows written by INSERT, UPDATE or DELETE.
    pub rows_affected: u64,
}

impl ResultSet {
    pub fn affected(rows_affected: u64) -> ResultSet {
        ResultSet {
            rows_affected,
            ..ResultSet::default()
        }
    }

    pub fn is_query(&self) -> bool {
        !self.output_schema.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.chunks.iter().flat_map(|chunk| chunk.rows.iter())
    }

    pub fn row_count(&self) -> usize {
        self.chunks.iter().map(Chunk::len).sum()
    }
}

/// The shape handed across the session boundary.
///
/// `values[i].len() == columns.len()` for every row. Statements without a
/// result set, and failed statements, have both vectors empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub values: Vec<Row>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResult {
    pub fn from_error(message: impl Into<String>) -> QueryResult {
        QueryResult {
            columns: Vec::new(),
            values: Vec::new(),
            error: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

impl From<ResultSet> for QueryResult {
    fn from(result_set: ResultSet) -> Self {
        let columns = result_set
            .output_schema
            .into_iter()
            .map(|column| column.name)
            .collect();
        let values = result_set
            .chunks
            .into_iter()
            .flat_map(|chunk| chunk.rows)
            .collect();

        QueryResult {
            columns,
            values,
            error: None,
        }
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(error) = &self.error {
            return write!(f, "Error: {}", error);
        }
        if self.columns.is_empty() {
            return Ok(());
        }

        let mut builder = Builder::default();
        builder.set_header(self.columns.clone());
        for row in &self.values {
            builder.push_record(row.iter().map(Value::to_string));
        }

        let mut table = builder.build();
        table.with(Style::rounded());
        write!(f, "{}", table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_values_compare_across_variants() {
        assert_eq!(Value::Integer(1), Value::Real(1.0));
        assert!(Value::Integer(2) > Value::Real(1.5));
        assert!(Value::Real(-0.5) < Value::Integer(0));
        assert!(Value::Integer(-3) < Value::Real(-2.5));
    }

    #[test]
    fn large_integers_compare_exactly_with_reals() {
        let big = Value::Integer(9_007_199_254_740_993);
        let near = Value::Real(9_007_199_254_740_992.0);
        assert_ne!(big, near);
        assert!(big > near);
        assert!(Value::Integer(i64::MAX) < Value::Real(9.3e18));
        assert!(Value::Integer(i64::MIN) > Value::Real(-1e19));
        assert_eq!(Value::Integer(i64::MIN), Value::Real(-9_223_372_036_854_775_808.0));
    }

    #[test]
    fn out_of_range_reals_are_not_integers() {
        assert_eq!(Value::Real(42.0).as_i64(), Some(42));
        assert_eq!(Value::Real(1e30).as_i64(), None);
        assert_eq!(Value::Real(-1e19).as_i64(), None);
        assert_eq!(Value::Real(9_223_372_036_854_775_808.0).as_i64(), None);
    }

    #[test]
    fn storage_classes_order_null_number_text_blob() {
        let mut values = vec![
            Value::Blob(vec![0]),
            Value::Text("a".into()),
            Value::Integer(10),
            Value::Null,
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Integer(10),
                Value::Text("a".into()),
                Value::Blob(vec![0]),
            ]
        );
    }

    #[test]
    fn display_matches_shell_rendering() {
        assert_eq!(Value::Real(3.0).to_string(), "3.0");
        assert_eq!(Value::Real(2.5).to_string(), "2.5");
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Blob(vec![0xca, 0xfe]).to_string(), "X'CAFE'");
    }

    #[test]
    fn query_result_serializes_without_error_field() {
        let result = QueryResult {
            columns: vec!["id".into(), "name".into()],
            values: vec![vec![Value::Integer(1), Value::Text("Alice".into())]],
            error: None,
        };
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(json, r#"{"columns":["id","name"],"values":[[1,"Alice"]]}"#);
    }
}
