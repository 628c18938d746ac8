//! Object-term query options.
//!
//! Taxonomies can pin some of these options through `TermQueryOverrides`;
//! pinned values always win over the caller's.

use crate::model::term::{Term, TermId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Shape of the values returned by an object-term query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermFields {
    /// Full `Term` records carrying `object_id`.
    #[default]
    All,
    Ids,
    TermTaxonomyIds,
    Names,
    Slugs,
    /// Map of term id to name.
    IdToName,
    /// Map of term id to slug.
    IdToSlug,
    /// Map of term id to parent term id.
    IdToParent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermOrderBy {
    #[default]
    Name,
    Slug,
    TermId,
    TermOrder,
    None,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Caller options for `get_for_object`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TermQueryOptions {
    pub fields: TermFields,
    pub orderby: TermOrderBy,
    pub order: SortOrder,
}

impl TermQueryOptions {
    pub fn fields(fields: TermFields) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    /// Applies taxonomy-level overrides on top of these options.
    pub fn merged_with(self, overrides: &TermQueryOverrides) -> Self {
        Self {
            fields: overrides.fields.unwrap_or(self.fields),
            orderby: overrides.orderby.unwrap_or(self.orderby),
            order: overrides.order.unwrap_or(self.order),
        }
    }
}

/// Taxonomy-pinned query options. Unset fields defer to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TermQueryOverrides {
    pub fields: Option<TermFields>,
    pub orderby: Option<TermOrderBy>,
    pub order: Option<SortOrder>,
}

impl TermQueryOverrides {
    pub fn is_empty(&self) -> bool {
        self.fields.is_none() && self.orderby.is_none() && self.order.is_none()
    }
}

/// Result of an object-term query, shaped by `TermFields`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectTerms {
    Terms(Vec<Term>),
    Ids(Vec<i64>),
    Strings(Vec<String>),
    NamesById(BTreeMap<TermId, String>),
    ParentsById(BTreeMap<TermId, TermId>),
}

impl ObjectTerms {
    /// Projects raw term rows into the requested shape.
    pub fn project(fields: TermFields, terms: Vec<Term>) -> Self {
        let mut out = Self::empty(fields);
        out.extend(terms, fields);
        out
    }

    /// Empty result of the requested shape.
    pub fn empty(fields: TermFields) -> Self {
        match fields {
            TermFields::All => Self::Terms(Vec::new()),
            TermFields::Ids | TermFields::TermTaxonomyIds => Self::Ids(Vec::new()),
            TermFields::Names | TermFields::Slugs => Self::Strings(Vec::new()),
            TermFields::IdToName | TermFields::IdToSlug => Self::NamesById(BTreeMap::new()),
            TermFields::IdToParent => Self::ParentsById(BTreeMap::new()),
        }
    }

    /// Appends more rows. Keyed shapes replace existing keys.
    ///
    /// `fields` must be the shape this result was created with.
    pub(crate) fn extend(&mut self, terms: Vec<Term>, fields: TermFields) {
        match (self, fields) {
            (Self::Terms(out), TermFields::All) => out.extend(terms),
            (Self::Ids(out), TermFields::Ids) => out.extend(terms.iter().map(|t| t.term_id)),
            (Self::Ids(out), TermFields::TermTaxonomyIds) => {
                out.extend(terms.iter().map(|t| t.term_taxonomy_id))
            }
            (Self::Strings(out), TermFields::Names) => out.extend(terms.into_iter().map(|t| t.name)),
            (Self::Strings(out), TermFields::Slugs) => out.extend(terms.into_iter().map(|t| t.slug)),
            (Self::NamesById(out), TermFields::IdToName) => {
                out.extend(terms.into_iter().map(|t| (t.term_id, t.name)))
            }
            (Self::NamesById(out), TermFields::IdToSlug) => {
                out.extend(terms.into_iter().map(|t| (t.term_id, t.slug)))
            }
            (Self::ParentsById(out), TermFields::IdToParent) => {
                out.extend(terms.into_iter().map(|t| (t.term_id, t.parent)))
            }
            // Crate callers always pass the shape the result was built with.
            _ => {}
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Terms(v) => v.len(),
            Self::Ids(v) => v.len(),
            Self::Strings(v) => v.len(),
            Self::NamesById(m) => m.len(),
            Self::ParentsById(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ObjectTerms, SortOrder, TermFields, TermOrderBy, TermQueryOptions, TermQueryOverrides,
    };
    use crate::model::term::Term;
    use std::collections::BTreeMap;

    fn term(term_id: i64, name: &str) -> Term {
        Term {
            term_id,
            name: name.to_string(),
            slug: name.to_lowercase(),
            term_group: 0,
            term_taxonomy_id: term_id + 100,
            taxonomy: "post_tag".to_string(),
            description: String::new(),
            parent: 0,
            count: 1,
            object_id: None,
        }
    }

    #[test]
    fn extend_appends_lists_and_overwrites_keyed_entries() {
        let mut names = ObjectTerms::project(TermFields::Names, vec![term(1, "Rust")]);
        names.extend(vec![term(2, "Go")], TermFields::Names);
        assert_eq!(
            names,
            ObjectTerms::Strings(vec!["Rust".to_string(), "Go".to_string()])
        );

        let mut by_id = ObjectTerms::project(TermFields::IdToName, vec![term(1, "Rust")]);
        by_id.extend(vec![term(1, "Rust Lang"), term(2, "Go")], TermFields::IdToName);
        assert_eq!(
            by_id,
            ObjectTerms::NamesById(BTreeMap::from([
                (1, "Rust Lang".to_string()),
                (2, "Go".to_string()),
            ]))
        );
    }

    #[test]
    fn overrides_win_over_caller_options() {
        let caller = TermQueryOptions {
            fields: TermFields::Names,
            orderby: TermOrderBy::Name,
            order: SortOrder::Desc,
        };
        let overrides = TermQueryOverrides {
            orderby: Some(TermOrderBy::TermOrder),
            ..TermQueryOverrides::default()
        };

        let merged = caller.merged_with(&overrides);
        assert_eq!(merged.fields, TermFields::Names);
        assert_eq!(merged.orderby, TermOrderBy::TermOrder);
        assert_eq!(merged.order, SortOrder::Desc);
    }

    #[test]
    fn empty_overrides_keep_caller_options() {
        let caller = TermQueryOptions::fields(TermFields::Slugs);
        assert!(TermQueryOverrides::default().is_empty());
        assert_eq!(caller.merged_with(&TermQueryOverrides::default()), caller);
    }
}
