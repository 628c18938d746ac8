//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository, cache and listener calls into term use-cases.
//! - Keep callers decoupled from storage details.

pub mod term_manager;
