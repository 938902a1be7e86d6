//! Domain model for clients and their telephone numbers.
//!
//! # Responsibility
//! - Define the records read from and written to client storage.
//! - Own input validation shared by repository and service layers.
//!
//! # Invariants
//! - Every domain object is identified by a store-generated integer id.
//! - A phone always belongs to exactly one client.

pub mod client;
