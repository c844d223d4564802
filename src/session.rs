//! The boundary a host talks to.
//!
//! A [`Session`] owns one [`Database`] and moves through
//! `Uninitialized -> Ready -> Closed`. Statements are accepted only while
//! `Ready`. `run` reports failures as errors, while `exec` always hands back
//! a [`QueryResult`] with failures in its `error` field.
//!
//! Calls take `&mut self`, so one session cannot run two statements at once.
//! A host sharing a session between threads must serialize access itself.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::database::Database;
use crate::parser::split_statements;
use crate::types::error::{Error, SessionError};
use crate::types::QueryResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Ready,
    Closed,
}

/// A schema statement that failed while loading, with everything loaded
/// before it left in place.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("schema statement {} failed: {source}\n  in: {statement}", .index + 1)]
pub struct LoadError {
    /// Zero-based position of the failing statement.
    pub index: usize,
    pub statement: String,
    #[source]
    pub source: Error,
}

#[derive(Debug)]
pub struct Session {
    state: SessionState,
    database: Option<Database>,
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

impl Session {
    pub fn new() -> Session {
        Session {
            state: SessionState::Uninitialized,
            database: None,
        }
    }

    /// A session that is already `Ready`.
    pub fn open() -> Session {
        let mut session = Session::new();
        session.state = SessionState::Ready;
        session.database = Some(Database::new());
        info!("session opened");
        session
    }

    /// Creates the engine. Initializing a ready session does nothing; a
    /// closed session stays closed.
    pub fn initialize(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Closed => Err(SessionError::Closed),
            SessionState::Ready => Ok(()),
            SessionState::Uninitialized => {
                self.database = Some(Database::new());
                self.state = SessionState::Ready;
                info!("session initialized");
                Ok(())
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn database(&self) -> Option<&Database> {
        self.database.as_ref()
    }

    fn ready(&mut self) -> Result<&mut Database, SessionError> {
        match (self.state, self.database.as_mut()) {
            (SessionState::Ready, Some(database)) => Ok(database),
            _ => Err(SessionError::NotReady),
        }
    }

    /// Runs a script and discards any rows it produces. Nothing runs unless
    /// the whole script parses; the first failing statement stops the rest.
    pub fn run(&mut self, sql: &str) -> Result<(), Error> {
        let database = self.ready()?;
        database.execute_script(sql)?;
        Ok(())
    }

    /// Runs exactly one statement. Blank text yields an empty result.
    pub fn exec(&mut self, sql: &str) -> QueryResult {
        let database = match self.ready() {
            Ok(database) => database,
            Err(e) => return QueryResult::from_error(Error::from(e).to_string()),
        };
        if split_statements(sql).is_empty() {
            return QueryResult::default();
        }

        match database.execute(sql) {
            Ok(result_set) => {
                debug!(rows = result_set.row_count(), "exec succeeded");
                QueryResult::from(result_set)
            }
            Err(e) => {
                warn!(error = %e, "exec failed");
                QueryResult::from_error(e.to_string())
            }
        }
    }

    /// Runs schema statements in order, stopping at the first failure.
    pub fn load_schema<S: AsRef<str>>(&mut self, statements: &[S]) -> Result<(), LoadError> {
        for (index, statement) in statements.iter().enumerate() {
            let statement = statement.as_ref();
            if let Err(source) = self.run(statement) {
                warn!(index, error = %source, "schema statement failed");
                return Err(LoadError {
                    index,
                    statement: statement.to_string(),
                    source,
                });
            }
        }
        info!(statements = statements.len(), "schema loaded");
        Ok(())
    }

    /// Releases the catalog and every table. Closing twice is harmless.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            info!("session closed");
        }
        self.database = None;
        self.state = SessionState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_moves_forward_only() {
        let mut session = Session::new();
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert_eq!(
            session.run("CREATE TABLE t (a INT)").unwrap_err(),
            Error::Session(SessionError::NotReady)
        );

        session.initialize().unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        session.run("CREATE TABLE t (a INT)").unwrap();

        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.database().is_none());
        assert_eq!(session.initialize().unwrap_err(), SessionError::Closed);
        assert!(session.exec("SELECT 1").is_error());
    }

    #[test]
    fn blank_exec_returns_empty_result() {
        let mut session = Session::open();
        assert_eq!(session.exec("   "), QueryResult::default());
        assert_eq!(session.exec("-- nothing here"), QueryResult::default());
    }

    #[test]
    fn exec_rejects_multiple_statements() {
        let mut session = Session::open();
        let result = session.exec("SELECT 1; SELECT 2");
        assert!(result.is_error());
        assert!(result.columns.is_empty() && result.values.is_empty());
    }
}
