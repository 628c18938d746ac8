//! Term, taxonomy entry and relationship records.
//!
//! # Invariants
//! - `parent == 0` means a root-level term.
//! - `term_group == 0` means the term belongs to no alias group.
//! - `term_order` is only meaningful for sortable taxonomies.

use serde::{Deserialize, Serialize};

/// Store-assigned term identifier.
pub type TermId = i64;

/// Store-assigned identifier of one (term, taxonomy) binding.
pub type TermTaxonomyId = i64;

/// Identifier of a content object terms are attached to.
pub type ObjectId = i64;

/// Id pair returned by every operation that resolves or creates a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TermIds {
    pub term_id: TermId,
    pub term_taxonomy_id: TermTaxonomyId,
}

/// Term input accepted by the manager.
///
/// Ids and names are distinct variants, so callers state which one they mean
/// instead of relying on the value's runtime shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermRef {
    /// Existing term id. `0` is reserved and never resolves.
    Id(TermId),
    /// Display name, resolved by slug and then by name.
    Name(String),
}

impl TermRef {
    /// Returns whether this input should be skipped as blank.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Id(_) => false,
            Self::Name(name) => name.trim().is_empty(),
        }
    }

    /// Text form used when the input becomes a display name.
    pub fn display_name(&self) -> String {
        match self {
            Self::Id(id) => id.to_string(),
            Self::Name(name) => name.clone(),
        }
    }
}

impl From<TermId> for TermRef {
    fn from(value: TermId) -> Self {
        Self::Id(value)
    }
}

impl From<&str> for TermRef {
    fn from(value: &str) -> Self {
        Self::Name(value.to_string())
    }
}

impl From<String> for TermRef {
    fn from(value: String) -> Self {
        Self::Name(value)
    }
}

/// Term read model joined with its taxonomy entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub term_id: TermId,
    pub name: String,
    pub slug: String,
    pub term_group: i64,
    pub term_taxonomy_id: TermTaxonomyId,
    pub taxonomy: String,
    pub description: String,
    /// Parent term id within the same taxonomy, `0` for root terms.
    pub parent: TermId,
    /// Number of objects linked to this taxonomy entry.
    pub count: i64,
    /// Set when the record was produced by an object query.
    pub object_id: Option<ObjectId>,
}

impl Term {
    pub fn ids(&self) -> TermIds {
        TermIds {
            term_id: self.term_id,
            term_taxonomy_id: self.term_taxonomy_id,
        }
    }
}

/// Taxonomy-scoped binding of one term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermTaxonomyEntry {
    pub term_taxonomy_id: TermTaxonomyId,
    pub term_id: TermId,
    pub taxonomy: String,
    pub description: String,
    pub parent: TermId,
    pub count: i64,
}

/// Link between one content object and one taxonomy entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermRelationship {
    pub object_id: ObjectId,
    pub term_taxonomy_id: TermTaxonomyId,
    pub term_order: i64,
}

/// Row data written to the terms table on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTerm {
    pub name: String,
    pub slug: String,
    pub term_group: i64,
}
