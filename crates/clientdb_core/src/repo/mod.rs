//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes validate input before persistence.
//! - Repository APIs return semantic errors (`ClientNotFound`,
//!   `DuplicateEmail`, ...) in addition to DB transport errors.

pub mod client_repo;
