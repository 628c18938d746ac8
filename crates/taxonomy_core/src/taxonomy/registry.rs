//! In-process taxonomy registry.
//!
//! # Invariants
//! - Taxonomy names are unique, non-empty and at most 32 chars.
//! - Lookup is exact (case-sensitive) on the registered name.

use crate::model::query::TermQueryOverrides;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

const TAXONOMY_NAME_MAX_CHARS: usize = 32;

/// Built-in hierarchical taxonomy.
pub const CATEGORY_TAXONOMY: &str = "category";
/// Built-in flat taxonomy.
pub const TAG_TAXONOMY: &str = "post_tag";

/// Declarative description of one taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyDefinition {
    pub name: String,
    /// Object kinds this taxonomy classifies. Informational only.
    #[serde(default)]
    pub object_types: Vec<String>,
    /// Terms may have parents; duplicate checks consider siblings.
    #[serde(default)]
    pub hierarchical: bool,
    /// Object links remember the order terms were assigned in.
    #[serde(default)]
    pub sort: bool,
    /// Query options pinned for this taxonomy.
    #[serde(default)]
    pub query_overrides: TermQueryOverrides,
}

impl TaxonomyDefinition {
    pub fn flat(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            object_types: Vec::new(),
            hierarchical: false,
            sort: false,
            query_overrides: TermQueryOverrides::default(),
        }
    }

    pub fn hierarchical(name: impl Into<String>) -> Self {
        Self {
            hierarchical: true,
            ..Self::flat(name)
        }
    }

    pub fn with_sort(mut self, sort: bool) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_object_type(mut self, object_type: impl Into<String>) -> Self {
        self.object_types.push(object_type.into());
        self
    }

    pub fn with_query_overrides(mut self, overrides: TermQueryOverrides) -> Self {
        self.query_overrides = overrides;
        self
    }

    fn validate(&self) -> Result<(), TaxonomyError> {
        let name = self.name.as_str();
        if name.trim().is_empty()
            || name.chars().count() > TAXONOMY_NAME_MAX_CHARS
            || name.chars().any(char::is_whitespace)
        {
            return Err(TaxonomyError::InvalidName(self.name.clone()));
        }
        Ok(())
    }
}

/// Registered taxonomies keyed by name.
#[derive(Debug, Clone, Default)]
pub struct TaxonomyRegistry {
    entries: BTreeMap<String, TaxonomyDefinition>,
}

impl TaxonomyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `category` and `post_tag`.
    pub fn with_builtin_taxonomies() -> Self {
        let mut registry = Self::new();
        for definition in [
            TaxonomyDefinition::hierarchical(CATEGORY_TAXONOMY).with_object_type("post"),
            TaxonomyDefinition::flat(TAG_TAXONOMY).with_object_type("post"),
        ] {
            registry.entries.insert(definition.name.clone(), definition);
        }
        registry
    }

    /// Registers one taxonomy after name validation.
    pub fn register(&mut self, definition: TaxonomyDefinition) -> Result<(), TaxonomyError> {
        definition.validate()?;
        if self.entries.contains_key(definition.name.as_str()) {
            return Err(TaxonomyError::DuplicateTaxonomy(definition.name));
        }

        info!(
            "event=taxonomy_register module=taxonomy status=ok taxonomy={} hierarchical={} sort={}",
            definition.name, definition.hierarchical, definition.sort
        );
        self.entries.insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Registers every definition from a JSON-compatible list, stopping at
    /// the first failure.
    pub fn register_all(
        &mut self,
        definitions: impl IntoIterator<Item = TaxonomyDefinition>,
    ) -> Result<(), TaxonomyError> {
        definitions
            .into_iter()
            .try_for_each(|definition| self.register(definition))
    }

    pub fn get(&self, name: &str) -> Option<&TaxonomyDefinition> {
        self.entries.get(name)
    }

    pub fn is_hierarchical(&self, name: &str) -> bool {
        self.get(name).is_some_and(|t| t.hierarchical)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaxonomyError {
    InvalidName(String),
    DuplicateTaxonomy(String),
}

impl Display for TaxonomyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(name) => write!(f, "invalid taxonomy name: `{name}`"),
            Self::DuplicateTaxonomy(name) => write!(f, "taxonomy already registered: {name}"),
        }
    }
}

impl Error for TaxonomyError {}
