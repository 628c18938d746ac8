//! Domain model for taxonomy terms and their object relationships.
//!
//! # Responsibility
//! - Define the records shared by the store, the manager and callers.
//! - Keep id and name inputs explicitly typed at the API boundary.
//!
//! # Invariants
//! - Every term is identified by a store-assigned `TermId`.
//! - A term appears at most once per taxonomy (`TermTaxonomyId`).
//! - An object links to a taxonomy entry at most once.

pub mod term;
pub mod query;
