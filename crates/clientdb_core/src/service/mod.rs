//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Emit operation-level diagnostic events.

pub mod client_service;
