//! Data-access layer for clients and their phone numbers.
//! This crate is the single source of truth for client storage invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{initialize_schema, open_db, open_db_in_memory, reset_schema, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget};
pub use model::client::{
    Client, ClientChanges, ClientId, ClientRecord, ClientSearch, ClientValidationError,
    NewClient, Phone, PhoneId,
};
pub use repo::client_repo::{
    ClientCreated, ClientRepository, RepoError, RepoResult, SkippedPhone,
    SqliteClientRepository,
};
pub use service::client_service::ClientService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
