//! Taxonomy registration.
//!
//! A taxonomy must be registered before any term can be created in it or
//! attached through it. Registration is plain data so hosts can load it from
//! configuration files.

pub mod registry;

pub use registry::{TaxonomyDefinition, TaxonomyError, TaxonomyRegistry};
