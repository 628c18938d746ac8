//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the store contract the term manager depends on.
//! - Isolate SQLite query details from term orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`MissingRequiredTable`,
//!   `InvalidData`) in addition to DB transport errors.

pub mod term_repo;
