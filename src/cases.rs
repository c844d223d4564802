//! Case id to schema lookup.
//!
//! A case schema is an ordered list of SQL statements that builds and fills
//! the tables of one case. Schemas are registered up front, either in code or
//! from a directory of `<case id>.sql` files.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::parser::split_statements;
use crate::session::{LoadError, Session};

#[derive(Debug, Error)]
pub enum CaseError {
    #[error("No case found with ID {0}")]
    UnknownCase(String),
    #[error("cannot read case schemas from {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("case {case} failed to load: {source}")]
    Load {
        case: String,
        source: LoadError,
    },
}

#[derive(Debug, Clone, Default)]
pub struct CaseRegistry {
    cases: BTreeMap<String, Vec<String>>,
}

impl CaseRegistry {
    pub fn new() -> CaseRegistry {
        CaseRegistry::default()
    }

    /// Reads every `*.sql` file in `dir`. The file stem is the case id.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<CaseRegistry, CaseError> {
        let dir = dir.as_ref();
        let io_error = |path: &Path| {
            let path = path.to_path_buf();
            move |source| CaseError::Io { path, source }
        };

        let mut registry = CaseRegistry::new();
        for entry in fs::read_dir(dir).map_err(io_error(dir))? {
            let path = entry.map_err(io_error(dir))?.path();
            if path.extension().map_or(true, |ext| ext != "sql") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let script = fs::read_to_string(&path).map_err(io_error(&path))?;
            let statements = split_statements(&script);
            debug!(case = id, statements = statements.len(), "read case schema");
            registry.register(id, statements);
        }

        info!(dir = %dir.display(), cases = registry.len(), "loaded case registry");
        Ok(registry)
    }

    /// Adds or replaces the schema for `id`.
    pub fn register<I, S>(&mut self, id: impl Into<String>, statements: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cases
            .insert(id.into(), statements.into_iter().map(Into::into).collect());
    }

    pub fn get(&self, id: &str) -> Result<&[String], CaseError> {
        self.cases
            .get(id)
            .map(Vec::as_slice)
            .ok_or_else(|| CaseError::UnknownCase(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.cases.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.cases.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// A fresh ready session with the schema of `id` loaded.
    pub fn open_session(&self, id: &str) -> Result<Session, CaseError> {
        let statements = self.get(id)?;
        let mut session = Session::open();
        session
            .load_schema(statements)
            .map_err(|source| CaseError::Load {
                case: id.to_string(),
                source,
            })?;
        info!(case = id, "case loaded");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    #[test]
    fn unknown_case_is_reported_by_id() {
        let registry = CaseRegistry::new();
        let err = registry.open_session("missing").unwrap_err();
        assert_eq!(err.to_string(), "No case found with ID missing");
    }

    #[test]
    fn registered_case_opens_loaded_session() {
        let mut registry = CaseRegistry::new();
        registry.register(
            "library",
            ["CREATE TABLE book (id INTEGER, title TEXT)", "INSERT INTO book VALUES (1, 'Dune')"],
        );

        let mut session = registry.open_session("library").unwrap();
        let result = session.exec("SELECT title FROM book");
        assert_eq!(result.values, vec![vec![Value::from("Dune")]]);
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["library"]);
    }

    #[test]
    fn failing_schema_names_the_case() {
        let mut registry = CaseRegistry::new();
        registry.register("broken", ["CREATE TABLE a (x INT)", "INSERT INTO nowhere VALUES (1)"]);

        match registry.open_session("broken") {
            Err(CaseError::Load { case, source }) => {
                assert_eq!(case, "broken");
                assert_eq!(source.index, 1);
            }
            other => panic!("expected load error, got {:?}", other.map(|_| ())),
        }
    }
}
