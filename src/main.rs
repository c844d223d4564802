//! Interactive shell over one casesql session.
//!
//! ```bash
//! # Empty session
//! casesql
//!
//! # Load a case from a directory of <case id>.sql files
//! casesql --cases-dir cases --case library
//!
//! # Load a single schema script and print results as JSON
//! casesql --schema schema.sql --format json
//! ```

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use casesql::parser::split_statements;
use casesql::{CaseRegistry, Config, OutputFormat, QueryResult, Session};

#[derive(Parser, Debug)]
#[command(name = "casesql", version, about = "In-memory SQL shell for practice cases")]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE", env = "CASESQL_CONFIG")]
    config: Option<PathBuf>,

    /// Directory of <case id>.sql schema files
    #[arg(long, value_name = "DIR", env = "CASESQL_CASES_DIR")]
    cases_dir: Option<PathBuf>,

    /// Case to load on start
    #[arg(long, value_name = "ID", env = "CASESQL_CASE")]
    case: Option<String>,

    /// Schema script to load instead of a case
    #[arg(long, value_name = "FILE", env = "CASESQL_SCHEMA", conflicts_with = "case")]
    schema: Option<PathBuf>,

    /// Result format
    #[arg(long, value_enum, env = "CASESQL_FORMAT")]
    format: Option<OutputFormat>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "CASESQL_LOG_LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_logging(&config.log_level);

    let registry = match &config.cases_dir {
        Some(dir) => CaseRegistry::from_dir(dir)?,
        None => CaseRegistry::new(),
    };
    let session = open_session(&args, &config, &registry)?;

    run_shell(session, &registry, &config)
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path).context("Failed to load config file")?,
        None => Config::default(),
    };

    if let Some(dir) = &args.cases_dir {
        config.cases_dir = Some(dir.clone());
    }
    if let Some(case) = &args.case {
        config.default_case = Some(case.clone());
    }
    if let Some(format) = args.format {
        config.format = format;
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    Ok(config)
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn open_session(args: &Args, config: &Config, registry: &CaseRegistry) -> Result<Session> {
    if let Some(path) = &args.schema {
        let script = fs::read_to_string(path)
            .with_context(|| format!("Failed to read schema {}", path.display()))?;
        let mut session = Session::open();
        session.load_schema(&split_statements(&script))?;
        return Ok(session);
    }

    match &config.default_case {
        Some(id) if config.cases_dir.is_none() => {
            bail!("case {id} requested but no cases directory is configured")
        }
        Some(id) => Ok(registry.open_session(id)?),
        None => Ok(Session::open()),
    }
}

fn run_shell(mut session: Session, registry: &CaseRegistry, config: &Config) -> Result<()> {
    let mut editor = DefaultEditor::new().context("Failed to start line editor")?;
    if let Some(path) = &config.history_file {
        // A missing history file is normal on first start.
        let _ = editor.load_history(path);
    }

    loop {
        match editor.readline("casesql> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);

                match line {
                    ".quit" | ".exit" => break,
                    ".tables" => {
                        if let Some(database) = session.database() {
                            for name in database.catalog().table_names() {
                                println!("{}", name);
                            }
                        }
                    }
                    ".cases" => {
                        for id in registry.ids() {
                            println!("{}", id);
                        }
                    }
                    sql => print_result(&session.exec(sql), config.format)?,
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("Failed to read input"),
        }
    }

    if let Some(path) = &config.history_file {
        if let Err(e) = editor.save_history(path) {
            debug!("Failed to save history: {}", e);
        }
    }
    session.close();
    info!("shell exited");
    Ok(())
}

fn print_result(result: &QueryResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            if result.is_error() {
                eprintln!("{}", result);
            } else if !result.columns.is_empty() {
                println!("{}", result);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(result).context("Failed to encode result")?);
        }
    }
    Ok(())
}
