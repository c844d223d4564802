//! An embeddable in-memory SQL engine for practice cases.
//!
//! A host opens a [`Session`], loads a case schema into it and then runs
//! learner queries one at a time with [`Session::exec`].

pub mod cases;
pub mod catalog;
pub mod config;
pub mod database;
pub mod executor;
pub mod optimizer;
pub mod parser;
pub mod planner;
pub mod session;
pub mod storage;
pub mod types;

pub use cases::{CaseError, CaseRegistry};
pub use config::{Config, ConfigError, OutputFormat};
pub use database::Database;
pub use session::{LoadError, Session, SessionState};
pub use types::error::Error;
pub use types::{QueryResult, ResultSet, Value};
