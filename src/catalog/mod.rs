//! Table schema registry.
//!
//! Table and column names are matched case-insensitively; the spelling used
//! in `CREATE TABLE` is kept for output.

use std::collections::BTreeMap;

use tracing::debug;

use crate::storage::TableId;
use crate::types::{error::CatalogError, Value};

/// Type affinity derived from a declared column type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Integer,
    Real,
    Numeric,
    Text,
    Blob,
}

impl Affinity {
    pub fn from_type_name(type_name: &str) -> Affinity {
        let upper = type_name.to_ascii_uppercase();
        if upper.contains("INT") {
            Affinity::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            Affinity::Text
        } else if upper.is_empty() || upper.contains("BLOB") {
            Affinity::Blob
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            Affinity::Real
        } else {
            Affinity::Numeric
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub declared_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub default: Option<Value>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> ColumnDef {
        ColumnDef {
            name: name.into(),
            declared_type: declared_type.into(),
            nullable: true,
            primary_key: false,
            default: None,
        }
    }
}

/// A PRIMARY KEY or UNIQUE constraint over column positions.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyConstraint {
    pub columns: Vec<usize>,
    pub primary: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub id: TableId,
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub keys: Vec<KeyConstraint>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>, keys: Vec<KeyConstraint>) -> TableSchema {
        TableSchema {
            id: 0,
            name: name.into(),
            columns,
            keys,
        }
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// The column that aliases the row id: a lone `INTEGER PRIMARY KEY`.
    /// NULLs written to it are replaced with the next free integer.
    pub fn integer_primary_key(&self) -> Option<usize> {
        let key = self.keys.iter().find(|k| k.primary)?;
        match key.columns.as_slice() {
            [index] if self.columns[*index].declared_type.eq_ignore_ascii_case("INTEGER") => {
                Some(*index)
            }
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Catalog {
    tables: BTreeMap<String, TableSchema>,
    next_table_id: TableId,
}

impl Default for Catalog {
    fn default() -> Self {
        Catalog {
            tables: BTreeMap::new(),
            next_table_id: 1,
        }
    }
}

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl Catalog {
    pub fn new() -> Catalog {
        Catalog::default()
    }

    /// Registers `schema` under a fresh table id and returns the stored entry.
    pub fn define_table(&mut self, mut schema: TableSchema) -> Result<&TableSchema, CatalogError> {
        let table_key = key(&schema.name);
        if self.tables.contains_key(&table_key) {
            return Err(CatalogError::TableExists(schema.name));
        }
        if schema.columns.is_empty() {
            return Err(CatalogError::NoColumns(schema.name));
        }
        for (i, column) in schema.columns.iter().enumerate() {
            if schema.columns[..i]
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(&column.name))
            {
                return Err(CatalogError::DuplicateColumn(column.name.clone()));
            }
        }

        schema.id = self.next_table_id;
        self.next_table_id += 1;
        debug!(table = %schema.name, id = schema.id, "defined table");

        Ok(self.tables.entry(table_key).or_insert(schema))
    }

    pub fn resolve(&self, name: &str) -> Result<&TableSchema, CatalogError> {
        self.tables
            .get(&key(name))
            .ok_or_else(|| CatalogError::NoSuchTable(name.to_string()))
    }

    /// Removes the entry. The caller drops the matching storage partition.
    pub fn drop_table(&mut self, name: &str) -> Result<TableSchema, CatalogError> {
        self.tables
            .remove(&key(name))
            .ok_or_else(|| CatalogError::NoSuchTable(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(&key(name))
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.values().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> TableSchema {
        TableSchema::new(
            "People",
            vec![ColumnDef::new("id", "INTEGER"), ColumnDef::new("name", "TEXT")],
            vec![KeyConstraint {
                columns: vec![0],
                primary: true,
            }],
        )
    }

    #[test]
    fn names_resolve_case_insensitively() {
        let mut catalog = Catalog::new();
        catalog.define_table(people()).unwrap();

        let schema = catalog.resolve("PEOPLE").unwrap();
        assert_eq!(schema.name, "People");
        assert_eq!(schema.column_names(), vec!["id", "name"]);
        assert_eq!(schema.column_index("NAME"), Some(1));
    }

    #[test]
    fn duplicate_table_is_rejected() {
        let mut catalog = Catalog::new();
        catalog.define_table(people()).unwrap();
        assert_eq!(
            catalog.define_table(people()).unwrap_err(),
            CatalogError::TableExists("People".to_string())
        );
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn table_ids_are_fresh_after_drop() {
        let mut catalog = Catalog::new();
        let first = catalog.define_table(people()).unwrap().id;
        catalog.drop_table("people").unwrap();
        let second = catalog.define_table(people()).unwrap().id;
        assert_ne!(first, second);
    }

    #[test]
    fn dropping_unknown_table_signals_error() {
        let mut catalog = Catalog::new();
        assert_eq!(
            catalog.drop_table("ghost").unwrap_err(),
            CatalogError::NoSuchTable("ghost".to_string())
        );
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let mut catalog = Catalog::new();
        let schema = TableSchema::new(
            "t",
            vec![ColumnDef::new("a", "INT"), ColumnDef::new("A", "TEXT")],
            Vec::new(),
        );
        assert_eq!(
            catalog.define_table(schema).unwrap_err(),
            CatalogError::DuplicateColumn("A".to_string())
        );
    }

    #[test]
    fn integer_primary_key_is_detected() {
        assert_eq!(people().integer_primary_key(), Some(0));

        let mut text_key = people();
        text_key.columns[0].declared_type = "TEXT".to_string();
        assert_eq!(text_key.integer_primary_key(), None);
    }

    #[test]
    fn affinity_follows_type_name_rules() {
        assert_eq!(Affinity::from_type_name("BIGINT"), Affinity::Integer);
        assert_eq!(Affinity::from_type_name("VARCHAR(20)"), Affinity::Text);
        assert_eq!(Affinity::from_type_name("DOUBLE PRECISION"), Affinity::Real);
        assert_eq!(Affinity::from_type_name(""), Affinity::Blob);
        assert_eq!(Affinity::from_type_name("DECIMAL(10,2)"), Affinity::Numeric);
    }
}
