//! Command-line entry point for the client store.
//!
//! # Responsibility
//! - Resolve connection and logging settings from flags/environment.
//! - Expose schema bootstrap, inspection and the demo walkthrough.
//! - Keep output machine-readable: one JSON record per line.

mod demo;

use clap::{Parser, Subcommand};
use clientdb_core::{
    default_log_level, init_logging, open_db, open_db_in_memory, ClientRecord, ClientSearch,
    ClientService, SqliteClientRepository,
};
use log::{error, info};
use rusqlite::Connection;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

const DEFAULT_DB_FILE_NAME: &str = "clientdb.sqlite3";
const IN_MEMORY_DB: &str = ":memory:";

#[derive(Debug, Parser)]
#[command(name = "clientdb", version, about = "Manage clients and their phone numbers")]
struct Cli {
    /// SQLite database file, or `:memory:` for a throwaway database.
    #[arg(long, env = "CLIENTDB_PATH", global = true)]
    db: Option<PathBuf>,
    /// trace|debug|info|warn|error
    #[arg(long, env = "CLIENTDB_LOG_LEVEL", global = true)]
    log_level: Option<String>,
    /// Absolute directory for rolling log files; stderr when unset.
    #[arg(long, env = "CLIENTDB_LOG_DIR", global = true)]
    log_dir: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the create/update/search/delete walkthrough.
    Demo {
        /// Drop existing clients before running.
        #[arg(long)]
        reset: bool,
    },
    /// Create the schema if it does not exist.
    Init,
    /// Drop all clients and phones and recreate the schema.
    Reset {
        /// Confirm data loss.
        #[arg(long)]
        yes: bool,
    },
    /// Print every client.
    List,
    /// Print clients matching all given criteria (exact, case-insensitive).
    Find {
        #[arg(long)]
        id: Option<i64>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        surname: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = cli.log_level.as_deref().unwrap_or(default_log_level());
    if let Err(err) = init_logging(level, cli.log_dir.as_deref()) {
        eprintln!("clientdb: logging disabled: {err}");
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_run module=cli status=error error={err}");
            eprintln!("clientdb: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut conn = open_connection(cli.db)?;

    match cli.command {
        Command::Demo { reset } => {
            if reset {
                clientdb_core::reset_schema(&mut conn)?;
            }
            demo::run(&mut conn)?;
        }
        Command::Init => {
            clientdb_core::initialize_schema(&mut conn)?;
            println!("schema ready");
        }
        Command::Reset { yes } => {
            if !yes {
                return Err("refusing to drop all clients without --yes".into());
            }
            clientdb_core::reset_schema(&mut conn)?;
            println!("schema reset");
        }
        Command::List => {
            let service = ClientService::new(SqliteClientRepository::try_new(&mut conn)?);
            print_records(&service.list_clients()?)?;
        }
        Command::Find {
            id,
            name,
            surname,
            email,
            phone,
        } => {
            let service = ClientService::new(SqliteClientRepository::try_new(&mut conn)?);
            let search = ClientSearch {
                id,
                name,
                surname,
                email,
                phone,
            };
            print_records(&service.find_clients(&search)?)?;
        }
    }

    info!("event=cli_run module=cli status=ok");
    Ok(())
}

fn open_connection(db: Option<PathBuf>) -> Result<Connection, Box<dyn Error>> {
    let path = db.unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME));
    let conn = if path.as_os_str() == IN_MEMORY_DB {
        open_db_in_memory()?
    } else {
        open_db(&path)?
    };
    Ok(conn)
}

fn print_records(records: &[ClientRecord]) -> Result<(), Box<dyn Error>> {
    for record in records {
        println!("{}", serde_json::to_string(record)?);
    }
    Ok(())
}
