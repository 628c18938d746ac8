//! Core domain logic for taxonomy terms and their object relationships.
//! This crate is the single source of truth for term invariants.

pub mod cache;
pub mod db;
pub mod extension;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod slug;
pub mod taxonomy;

pub use cache::{CacheKey, MemoryTermCache, NoopTermCache, TermCache};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use extension::{SetObjectTermsEvent, TermHooks, TermLifecycleListener};
pub use logging::{
    default_log_level, init_logging, init_logging_from_env, logging_status, LoggingConfig,
};
pub use model::query::{
    ObjectTerms, SortOrder, TermFields, TermOrderBy, TermQueryOptions, TermQueryOverrides,
};
pub use model::term::{
    NewTerm, ObjectId, Term, TermId, TermIds, TermRef, TermRelationship, TermTaxonomyEntry,
    TermTaxonomyId,
};
pub use repo::term_repo::{
    RepoError, RepoResult, SqliteTermRepository, TermLookup, TermRepository,
};
pub use service::term_manager::{TermError, TermInsertArgs, TermRelationshipManager};
pub use slug::sanitize_title;
pub use taxonomy::{TaxonomyDefinition, TaxonomyError, TaxonomyRegistry};

/// Minimal health-check API for host integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
