//! Term relationship use-case service.
//!
//! # Responsibility
//! - Create taxonomy terms, resolving name/slug collisions and alias groups.
//! - Attach and detach terms on content objects and keep usage counts exact.
//! - Invalidate cached term lookups on every mutating path.
//!
//! # Invariants
//! - Unregistered taxonomies are rejected before any store access.
//! - One (term, taxonomy) pair maps to exactly one taxonomy entry.
//! - An object links to a taxonomy entry at most once.
//! - Counts are recomputed from relationship rows, never incremented.
//! - Two requests racing through `add` for the same slug converge on the
//!   lower term id; the later rows are deleted after insert.

use crate::cache::{CacheKey, TermCache};
use crate::extension::listener::{SetObjectTermsEvent, TermHooks, TermLifecycleListener};
use crate::model::query::{ObjectTerms, TermFields, TermQueryOptions};
use crate::model::term::{
    NewTerm, ObjectId, Term, TermId, TermIds, TermRef, TermRelationship, TermTaxonomyId,
};
use crate::repo::term_repo::{RepoError, TermLookup, TermRepository};
use crate::slug::sanitize_title;
use crate::taxonomy::registry::{TaxonomyDefinition, TaxonomyRegistry};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const TERM_EXISTS_IN_TAXONOMY: &str = "A term with the name provided already exists in this taxonomy.";
const TERM_EXISTS_WITH_PARENT: &str = "A term with the name provided already exists with this parent.";

/// Options accepted by `add`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TermInsertArgs {
    /// Slug of an existing term in the same taxonomy to share a group with.
    pub alias_of: Option<String>,
    pub description: String,
    /// Parent term id, `0` for a root term.
    pub parent: TermId,
    /// Explicit slug. Empty means derive one from the name.
    pub slug: String,
}

impl TermInsertArgs {
    pub fn with_parent(parent: TermId) -> Self {
        Self {
            parent,
            ..Self::default()
        }
    }

    pub fn with_slug(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            ..Self::default()
        }
    }
}

/// Error returned by term operations.
#[derive(Debug)]
pub enum TermError {
    /// Taxonomy name is not registered.
    InvalidTaxonomy(String),
    /// The reserved id `0` was passed as a term.
    InvalidTermId,
    /// Term name is empty after trimming.
    EmptyTermName,
    /// Declared parent term does not exist.
    MissingParent(TermId),
    /// A matching term already exists; `term_id` can be reused by the caller.
    TermExists {
        term_id: TermId,
        message: &'static str,
    },
    /// A store insert failed; carries the store diagnostic.
    DbInsertError(String),
    /// A store update failed; carries the store diagnostic.
    DbUpdateError(String),
    /// A store delete failed; carries the store diagnostic.
    DbDeleteError(String),
    /// A listener vetoed the operation.
    Rejected { code: String, message: String },
    /// A store read failed.
    Repo(RepoError),
}

impl TermError {
    /// Stable machine-readable code, used in logs.
    pub fn code(&self) -> &str {
        match self {
            Self::InvalidTaxonomy(_) => "invalid_taxonomy",
            Self::InvalidTermId => "invalid_term_id",
            Self::EmptyTermName => "empty_term_name",
            Self::MissingParent(_) => "missing_parent",
            Self::TermExists { .. } => "term_exists",
            Self::DbInsertError(_) => "db_insert_error",
            Self::DbUpdateError(_) => "db_update_error",
            Self::DbDeleteError(_) => "db_delete_error",
            Self::Rejected { code, .. } => code.as_str(),
            Self::Repo(_) => "db_read_error",
        }
    }

    /// Id of the conflicting term for `TermExists`.
    pub fn existing_term_id(&self) -> Option<TermId> {
        match self {
            Self::TermExists { term_id, .. } => Some(*term_id),
            _ => None,
        }
    }
}

impl Display for TermError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTaxonomy(name) => write!(f, "invalid taxonomy: {name}"),
            Self::InvalidTermId => write!(f, "invalid term id"),
            Self::EmptyTermName => write!(f, "a name is required for this term"),
            Self::MissingParent(id) => write!(f, "parent term does not exist: {id}"),
            Self::TermExists { term_id, message } => write!(f, "{message} (term_id={term_id})"),
            Self::DbInsertError(details) => {
                write!(f, "could not insert term into the database: {details}")
            }
            Self::DbUpdateError(details) => {
                write!(f, "could not update term in the database: {details}")
            }
            Self::DbDeleteError(details) => {
                write!(f, "could not delete term rows from the database: {details}")
            }
            Self::Rejected { code, message } => write!(f, "{code}: {message}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TermError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for TermError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Term relationship manager over an injected store, registry and cache.
pub struct TermRelationshipManager<R: TermRepository, C: TermCache> {
    repo: R,
    taxonomies: TaxonomyRegistry,
    cache: C,
    hooks: TermHooks,
}

impl<R: TermRepository, C: TermCache> TermRelationshipManager<R, C> {
    /// Creates a manager with no listeners.
    pub fn new(repo: R, taxonomies: TaxonomyRegistry, cache: C) -> Self {
        Self {
            repo,
            taxonomies,
            cache,
            hooks: TermHooks::new(),
        }
    }

    /// Appends a listener to the end of the pipeline.
    pub fn with_listener(mut self, listener: impl TermLifecycleListener + 'static) -> Self {
        self.hooks.register(Box::new(listener));
        self
    }

    pub fn taxonomies(&self) -> &TaxonomyRegistry {
        &self.taxonomies
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Creates a term in `taxonomy`.
    ///
    /// # Contract
    /// - Returns `TermExists` instead of creating a second term with the same
    ///   name under the same parent.
    /// - Explicit slugs are trimmed but not sanitized. A slug already used in
    ///   the taxonomy gets parent slugs appended and then `-2`, `-3`, ...
    /// - If a concurrent request inserted the same slug first, the rows
    ///   created here are deleted and the earlier term's ids are returned.
    ///
    /// # Side effects
    /// - Cleans the cache of the created term and of any aliased term.
    /// - Notifies `pre_insert_term`, `insert_term_data`, `create_term`,
    ///   `clean_term_cache` and `created_term` listeners.
    pub fn add(
        &self,
        term: impl Into<TermRef>,
        taxonomy: &str,
        args: &TermInsertArgs,
    ) -> Result<TermIds, TermError> {
        let started_at = Instant::now();
        let definition = self.require_taxonomy(taxonomy)?;
        let result = self.add_in(term.into(), definition, args);

        match &result {
            Ok(ids) => info!(
                "event=term_add module=term_manager status=ok taxonomy={taxonomy} term_id={} tt_id={} duration_ms={}",
                ids.term_id,
                ids.term_taxonomy_id,
                started_at.elapsed().as_millis()
            ),
            Err(TermError::TermExists { term_id, .. }) => debug!(
                "event=term_add module=term_manager status=exists taxonomy={taxonomy} error_code=term_exists existing_term_id={term_id}"
            ),
            Err(err) => warn!(
                "event=term_add module=term_manager status=error taxonomy={taxonomy} error_code={} duration_ms={}",
                err.code(),
                started_at.elapsed().as_millis()
            ),
        }
        result
    }

    fn add_in(
        &self,
        term: TermRef,
        definition: &TaxonomyDefinition,
        args: &TermInsertArgs,
    ) -> Result<TermIds, TermError> {
        let taxonomy = definition.name.as_str();
        let term = self.hooks.pre_insert_term(term, taxonomy, args)?;
        if term == TermRef::Id(0) {
            return Err(TermError::InvalidTermId);
        }

        let raw_name = term.display_name();
        let name = raw_name.trim();
        if name.is_empty() {
            return Err(TermError::EmptyTermName);
        }

        let parent = args.parent;
        if parent < 0 || (parent > 0 && !self.repo.term_id_exists(parent)?) {
            return Err(TermError::MissingParent(parent));
        }

        let supplied_slug = args.slug.trim();
        let slug_provided = !supplied_slug.is_empty();
        let slug = if slug_provided {
            supplied_slug.to_string()
        } else {
            sanitize_title(name)
        };

        let term_group = self.resolve_alias_group(args.alias_of.as_deref(), taxonomy)?;
        self.ensure_not_duplicate(name, &slug, slug_provided, parent, definition)?;
        let slug = self.unique_slug(&slug, parent, definition)?;

        let data = self.hooks.insert_term_data(
            NewTerm {
                name: name.to_string(),
                slug,
                term_group,
            },
            taxonomy,
            args,
        );
        let term_id = self
            .repo
            .insert_term(&data)
            .map_err(|err| store_failure("insert_term", err, TermError::DbInsertError))?;

        let mut slug = data.slug;
        if slug.is_empty() {
            slug = term_id.to_string();
            self.hooks.edit_terms(term_id, taxonomy);
            self.repo
                .update_term_slug(term_id, &slug)
                .map_err(|err| store_failure("update_term_slug", err, TermError::DbUpdateError))?;
            self.hooks.edited_terms(term_id, taxonomy);
        }

        if let Some(entry) = self.repo.find_term_taxonomy(term_id, taxonomy)? {
            return Ok(TermIds {
                term_id,
                term_taxonomy_id: entry.term_taxonomy_id,
            });
        }

        let tt_id = self
            .repo
            .insert_term_taxonomy(term_id, taxonomy, &args.description, parent)
            .map_err(|err| store_failure("insert_term_taxonomy", err, TermError::DbInsertError))?;

        if let Some(existing) =
            self.repo
                .find_older_duplicate(&slug, parent, taxonomy, term_id, tt_id)?
        {
            warn!(
                "event=term_duplicate_repair module=term_manager status=ok taxonomy={taxonomy} slug={slug} removed_term_id={term_id} kept_term_id={}",
                existing.term_id
            );
            self.repo
                .delete_term_taxonomy(tt_id)
                .map_err(|err| store_failure("delete_term_taxonomy", err, TermError::DbDeleteError))?;
            self.repo
                .delete_term(term_id)
                .map_err(|err| store_failure("delete_term", err, TermError::DbDeleteError))?;
            self.clean_term_cache(&[existing.term_id], taxonomy);
            return Ok(existing);
        }

        let ids = TermIds {
            term_id,
            term_taxonomy_id: tt_id,
        };
        self.hooks.create_term(ids, taxonomy);
        self.clean_term_cache(&[term_id], taxonomy);
        self.hooks.created_term(ids, taxonomy);
        Ok(ids)
    }

    /// Resolves a term reference within `taxonomy`.
    ///
    /// Ids match by id (`0` never matches). Names match by derived slug
    /// first, then case-insensitively by name. `parent` restricts name
    /// lookups to one parent.
    pub fn term_exists(
        &self,
        term: &TermRef,
        taxonomy: &str,
        parent: Option<TermId>,
    ) -> Result<Option<TermIds>, TermError> {
        let found = match term {
            TermRef::Id(0) => None,
            TermRef::Id(term_id) => self.repo.find_term(TermLookup::Id(*term_id), taxonomy, None)?,
            TermRef::Name(name) => {
                let name = name.trim();
                if name.is_empty() {
                    return Ok(None);
                }
                let slug = sanitize_title(name);
                let by_slug = if slug.is_empty() {
                    None
                } else {
                    self.repo
                        .find_term(TermLookup::Slug(&slug), taxonomy, parent)?
                };
                match by_slug {
                    Some(found) => Some(found),
                    None => self
                        .repo
                        .find_term(TermLookup::Name(name), taxonomy, parent)?,
                }
            }
        };
        Ok(found.map(|term| term.ids()))
    }

    pub fn get_term(&self, term_id: TermId, taxonomy: &str) -> Result<Option<Term>, TermError> {
        self.require_taxonomy(taxonomy)?;
        Ok(self.repo.find_term(TermLookup::Id(term_id), taxonomy, None)?)
    }

    pub fn get_term_by_slug(&self, slug: &str, taxonomy: &str) -> Result<Option<Term>, TermError> {
        self.require_taxonomy(taxonomy)?;
        Ok(self.repo.find_term(TermLookup::Slug(slug), taxonomy, None)?)
    }

    /// Lists the terms linked to `object_ids` in `taxonomies`.
    ///
    /// # Contract
    /// - Every taxonomy must be registered; otherwise nothing is queried.
    /// - Taxonomy query overrides win over `options`. With several
    ///   taxonomies, overridden ones are queried on their own first and the
    ///   result keeps the caller's `fields` shape, so a `fields` override
    ///   only applies when its taxonomy is queried alone.
    /// - `TermFields::All` yields one record per (object, term) link; other
    ///   shapes list each term once. Id-keyed shapes keep the last write.
    pub fn get_for_object(
        &self,
        object_ids: &[ObjectId],
        taxonomies: &[&str],
        options: &TermQueryOptions,
    ) -> Result<ObjectTerms, TermError> {
        let definitions = taxonomies
            .iter()
            .map(|taxonomy| self.require_taxonomy(taxonomy))
            .collect::<Result<Vec<_>, _>>()?;
        if object_ids.is_empty() || definitions.is_empty() {
            return Ok(ObjectTerms::empty(options.fields));
        }

        if let [definition] = definitions.as_slice() {
            let effective = options.merged_with(&definition.query_overrides);
            let rows = self.query_object_terms(object_ids, &[definition.name.clone()], &effective)?;
            return Ok(ObjectTerms::project(effective.fields, rows));
        }

        let mut out = ObjectTerms::empty(options.fields);
        let mut remaining = Vec::new();
        for definition in definitions {
            let mut effective = options.merged_with(&definition.query_overrides);
            if effective.fields != options.fields {
                debug!(
                    "event=object_terms_query module=term_manager status=override_ignored taxonomy={} override=fields",
                    definition.name
                );
                effective.fields = options.fields;
            }
            if effective == *options {
                remaining.push(definition.name.clone());
                continue;
            }
            let rows = self.query_object_terms(object_ids, &[definition.name.clone()], &effective)?;
            out.extend(rows, options.fields);
        }
        if !remaining.is_empty() {
            let rows = self.query_object_terms(object_ids, &remaining, options)?;
            out.extend(rows, options.fields);
        }
        Ok(out)
    }

    fn query_object_terms(
        &self,
        object_ids: &[ObjectId],
        taxonomies: &[String],
        options: &TermQueryOptions,
    ) -> Result<Vec<Term>, TermError> {
        let mut rows =
            self.repo
                .query_object_terms(object_ids, taxonomies, options.orderby, options.order)?;
        if options.fields != TermFields::All {
            let mut seen = HashSet::new();
            rows.retain(|term| seen.insert(term.term_taxonomy_id));
        }
        debug!(
            "event=object_terms_query module=term_manager status=ok objects={} taxonomies={} rows={}",
            object_ids.len(),
            taxonomies.join(","),
            rows.len()
        );
        Ok(rows)
    }

    /// Sets the terms of `object_id` in `taxonomy`.
    ///
    /// # Contract
    /// - Blank names are skipped; unknown names are created; unknown ids are
    ///   skipped. Errors from term creation abort the call.
    /// - Without `append`, links absent from `terms` are removed.
    /// - Sortable taxonomies store the 1-based input position of each link
    ///   when not appending.
    /// - Returns every resolved taxonomy entry id in input order.
    ///
    /// Writes before a failure are not rolled back.
    pub fn set_for_object(
        &self,
        object_id: ObjectId,
        terms: &[TermRef],
        taxonomy: &str,
        append: bool,
    ) -> Result<Vec<TermTaxonomyId>, TermError> {
        let definition = self.require_taxonomy(taxonomy)?;

        let old_tt_ids = if append {
            Vec::new()
        } else {
            self.object_tt_ids(object_id, taxonomy)?
        };

        let mut tt_ids = Vec::with_capacity(terms.len());
        let mut new_tt_ids = Vec::new();
        for term in terms {
            if term.is_blank() {
                continue;
            }

            let ids = match self.term_exists(term, taxonomy, None)? {
                Some(ids) => ids,
                None if matches!(term, TermRef::Id(_)) => continue,
                None => self.add(term.clone(), taxonomy, &TermInsertArgs::default())?,
            };

            let tt_id = ids.term_taxonomy_id;
            tt_ids.push(tt_id);
            let inserted = self
                .repo
                .insert_relationship(object_id, tt_id)
                .map_err(|err| store_failure("insert_relationship", err, TermError::DbInsertError))?;
            if inserted {
                self.hooks.added_term_relationship(object_id, tt_id, taxonomy);
                new_tt_ids.push(tt_id);
            }
        }

        if !new_tt_ids.is_empty() {
            self.update_term_count(&new_tt_ids, taxonomy)?;
        }

        if !append {
            let delete_tt_ids: Vec<TermTaxonomyId> = old_tt_ids
                .iter()
                .copied()
                .filter(|tt_id| !tt_ids.contains(tt_id))
                .collect();
            if !delete_tt_ids.is_empty() {
                let stale: Vec<TermRef> = self
                    .repo
                    .term_ids_for(taxonomy, &delete_tt_ids)?
                    .into_iter()
                    .map(TermRef::Id)
                    .collect();
                self.remove_object_terms(object_id, &stale, taxonomy)?;
            }
        }

        if !append && definition.sort {
            self.store_term_order(object_id, taxonomy, &tt_ids)?;
        }

        self.invalidate_object(object_id, taxonomy);
        self.hooks.set_object_terms(&SetObjectTermsEvent {
            object_id,
            terms,
            tt_ids: &tt_ids,
            taxonomy,
            append,
            old_tt_ids: &old_tt_ids,
        });
        debug!(
            "event=object_terms_set module=term_manager status=ok object_id={object_id} taxonomy={taxonomy} append={append} linked={} added={}",
            tt_ids.len(),
            new_tt_ids.len()
        );
        Ok(tt_ids)
    }

    fn store_term_order(
        &self,
        object_id: ObjectId,
        taxonomy: &str,
        tt_ids: &[TermTaxonomyId],
    ) -> Result<(), TermError> {
        let linked: BTreeSet<TermTaxonomyId> =
            self.object_tt_ids(object_id, taxonomy)?.into_iter().collect();
        let mut term_order = 0;
        let mut ordered = Vec::with_capacity(tt_ids.len());
        for tt_id in tt_ids.iter().filter(|tt_id| linked.contains(*tt_id)) {
            term_order += 1;
            ordered.push((*tt_id, term_order));
        }

        if ordered.is_empty() {
            return Ok(());
        }
        self.repo
            .upsert_term_order(object_id, &ordered)
            .map_err(|err| store_failure("upsert_term_order", err, TermError::DbInsertError))
    }

    /// Links terms to an object without removing existing links.
    pub fn add_object_terms(
        &self,
        object_id: ObjectId,
        terms: &[TermRef],
        taxonomy: &str,
    ) -> Result<Vec<TermTaxonomyId>, TermError> {
        self.set_for_object(object_id, terms, taxonomy, true)
    }

    /// Unlinks terms from an object.
    ///
    /// Unknown and blank terms are skipped. Returns whether any link was
    /// removed; counts of every resolved entry are recomputed either way.
    pub fn remove_object_terms(
        &self,
        object_id: ObjectId,
        terms: &[TermRef],
        taxonomy: &str,
    ) -> Result<bool, TermError> {
        self.require_taxonomy(taxonomy)?;

        let mut tt_ids = Vec::new();
        for term in terms.iter().filter(|term| !term.is_blank()) {
            if let Some(ids) = self.term_exists(term, taxonomy, None)? {
                tt_ids.push(ids.term_taxonomy_id);
            }
        }
        if tt_ids.is_empty() {
            return Ok(false);
        }

        let deleted = self
            .repo
            .delete_relationships(object_id, &tt_ids)
            .map_err(|err| store_failure("delete_relationships", err, TermError::DbDeleteError))?;
        self.invalidate_object(object_id, taxonomy);
        self.hooks
            .deleted_term_relationships(object_id, &tt_ids, taxonomy);
        self.update_term_count(&tt_ids, taxonomy)?;

        debug!(
            "event=object_terms_remove module=term_manager status=ok object_id={object_id} taxonomy={taxonomy} removed={deleted}"
        );
        Ok(deleted > 0)
    }

    /// Unlinks every term of `object_id` in each of `taxonomies`.
    ///
    /// All taxonomies are validated before the first unlink.
    pub fn delete_object_term_relationships(
        &self,
        object_id: ObjectId,
        taxonomies: &[&str],
    ) -> Result<(), TermError> {
        for taxonomy in taxonomies {
            self.require_taxonomy(taxonomy)?;
        }

        for taxonomy in taxonomies {
            let tt_ids = self.object_tt_ids(object_id, taxonomy)?;
            let linked: Vec<TermRef> = self
                .repo
                .term_ids_for(taxonomy, &tt_ids)?
                .into_iter()
                .map(TermRef::Id)
                .collect();
            self.remove_object_terms(object_id, &linked, taxonomy)?;
        }
        Ok(())
    }

    /// Recomputes usage counts of the given entries.
    pub fn update_term_count(
        &self,
        tt_ids: &[TermTaxonomyId],
        taxonomy: &str,
    ) -> Result<(), TermError> {
        let unique: Vec<TermTaxonomyId> = tt_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if unique.is_empty() {
            return Ok(());
        }

        self.repo
            .recount(&unique)
            .map_err(|err| store_failure("recount", err, TermError::DbUpdateError))?;
        for term_id in self.repo.term_ids_for(taxonomy, &unique)? {
            self.cache.delete(&CacheKey::Term(term_id));
        }
        self.cache.set_last_changed();
        Ok(())
    }

    /// Invalidates cached lookups of `term_ids` and the taxonomy hierarchy,
    /// then notifies `clean_term_cache` listeners.
    pub fn clean_term_cache(&self, term_ids: &[TermId], taxonomy: &str) {
        for term_id in term_ids {
            self.cache.delete(&CacheKey::Term(*term_id));
        }
        self.cache
            .delete(&CacheKey::TaxonomyHierarchy(taxonomy.to_string()));
        self.cache.set_last_changed();
        self.hooks.clean_term_cache(term_ids, taxonomy);
    }

    /// Current links of one object in one taxonomy.
    pub fn object_relationships(
        &self,
        object_id: ObjectId,
        taxonomy: &str,
    ) -> Result<Vec<TermRelationship>, TermError> {
        self.require_taxonomy(taxonomy)?;
        Ok(self.repo.list_object_relationships(object_id, taxonomy)?)
    }

    fn object_tt_ids(
        &self,
        object_id: ObjectId,
        taxonomy: &str,
    ) -> Result<Vec<TermTaxonomyId>, TermError> {
        Ok(self
            .repo
            .list_object_relationships(object_id, taxonomy)?
            .into_iter()
            .map(|relationship| relationship.term_taxonomy_id)
            .collect())
    }

    fn invalidate_object(&self, object_id: ObjectId, taxonomy: &str) {
        self.cache.delete(&CacheKey::ObjectRelationships {
            object_id,
            taxonomy: taxonomy.to_string(),
        });
        self.cache.set_last_changed();
    }

    fn require_taxonomy(&self, taxonomy: &str) -> Result<&TaxonomyDefinition, TermError> {
        self.taxonomies.get(taxonomy).ok_or_else(|| {
            warn!(
                "event=taxonomy_lookup module=term_manager status=error error_code=invalid_taxonomy taxonomy={taxonomy}"
            );
            TermError::InvalidTaxonomy(taxonomy.to_string())
        })
    }

    /// Adopts the alias term's group, allocating a new group for both terms
    /// when the alias has none. Unknown aliases are ignored.
    fn resolve_alias_group(
        &self,
        alias_of: Option<&str>,
        taxonomy: &str,
    ) -> Result<i64, TermError> {
        let Some(alias_slug) = alias_of.map(str::trim).filter(|slug| !slug.is_empty()) else {
            return Ok(0);
        };
        let Some(alias) = self
            .repo
            .find_term(TermLookup::Slug(alias_slug), taxonomy, None)?
        else {
            return Ok(0);
        };
        if alias.term_group != 0 {
            return Ok(alias.term_group);
        }

        let term_group = self.repo.max_term_group()? + 1;
        self.hooks.edit_terms(alias.term_id, taxonomy);
        self.repo
            .update_term_group(alias.term_id, term_group)
            .map_err(|err| store_failure("update_term_group", err, TermError::DbUpdateError))?;
        self.hooks.edited_terms(alias.term_id, taxonomy);
        self.clean_term_cache(&[alias.term_id], taxonomy);
        Ok(term_group)
    }

    fn ensure_not_duplicate(
        &self,
        name: &str,
        slug: &str,
        slug_provided: bool,
        parent: TermId,
        definition: &TaxonomyDefinition,
    ) -> Result<(), TermError> {
        let taxonomy = definition.name.as_str();
        let siblings = self.repo.list_children(taxonomy, parent)?;
        let lowered = name.to_lowercase();
        let Some(name_match) = siblings
            .iter()
            .find(|sibling| sibling.name.to_lowercase() == lowered)
        else {
            return Ok(());
        };

        let slug_match = self.repo.find_term(TermLookup::Slug(slug), taxonomy, None)?;
        let same_slug = !slug_provided || name_match.slug == slug;
        if !same_slug && slug_match.is_none() {
            return Ok(());
        }

        if !definition.hierarchical {
            return Err(TermError::TermExists {
                term_id: name_match.term_id,
                message: TERM_EXISTS_IN_TAXONOMY,
            });
        }

        if same_slug && siblings.iter().any(|sibling| sibling.name == name) {
            return Err(TermError::TermExists {
                term_id: name_match.term_id,
                message: TERM_EXISTS_WITH_PARENT,
            });
        }
        if let Some(slug_match) = slug_match {
            if siblings.iter().any(|sibling| sibling.slug == slug) {
                return Err(TermError::TermExists {
                    term_id: slug_match.term_id,
                    message: TERM_EXISTS_WITH_PARENT,
                });
            }
        }
        Ok(())
    }

    fn unique_slug(
        &self,
        slug: &str,
        parent: TermId,
        definition: &TaxonomyDefinition,
    ) -> Result<String, TermError> {
        let taxonomy = definition.name.as_str();
        if self
            .repo
            .find_term(TermLookup::Slug(slug), taxonomy, None)?
            .is_none()
        {
            return Ok(slug.to_string());
        }

        let mut candidate = slug.to_string();
        if definition.hierarchical && parent > 0 {
            let mut parent_suffix = String::new();
            let mut visited = BTreeSet::new();
            let mut current = parent;
            while current > 0 && visited.insert(current) {
                let Some(ancestor) =
                    self.repo
                        .find_term(TermLookup::Id(current), taxonomy, None)?
                else {
                    break;
                };
                parent_suffix.push('-');
                parent_suffix.push_str(&ancestor.slug);
                if !self.repo.slug_in_use(&format!("{slug}{parent_suffix}"))? {
                    break;
                }
                current = ancestor.parent;
            }
            candidate.push_str(&parent_suffix);
        }

        if self.repo.slug_in_use(&candidate)? {
            let mut num = 2;
            loop {
                let alt_slug = format!("{candidate}-{num}");
                if !self.repo.slug_in_use(&alt_slug)? {
                    candidate = alt_slug;
                    break;
                }
                num += 1;
            }
        }
        Ok(candidate)
    }
}

fn store_failure(
    operation: &str,
    err: RepoError,
    wrap: impl FnOnce(String) -> TermError,
) -> TermError {
    let wrapped = wrap(err.to_string());
    error!(
        "event=term_store_write module=term_manager status=error operation={operation} error_code={} error={err}",
        wrapped.code()
    );
    wrapped
}

#[cfg(test)]
mod tests {
    use super::{TermError, TermInsertArgs};

    #[test]
    fn term_exists_error_exposes_existing_id() {
        let err = TermError::TermExists {
            term_id: 7,
            message: super::TERM_EXISTS_IN_TAXONOMY,
        };
        assert_eq!(err.existing_term_id(), Some(7));
        assert_eq!(err.code(), "term_exists");
        assert!(err.to_string().contains("term_id=7"));
    }

    #[test]
    fn rejected_error_uses_listener_code() {
        let err = TermError::Rejected {
            code: "spam_term".to_string(),
            message: "blocked".to_string(),
        };
        assert_eq!(err.code(), "spam_term");
        assert_eq!(err.existing_term_id(), None);
    }

    #[test]
    fn insert_args_deserialize_with_defaults() {
        let args: TermInsertArgs = serde_json::from_str(r#"{"parent": 3}"#).unwrap();
        assert_eq!(args, TermInsertArgs::with_parent(3));
        assert!(args.slug.is_empty());
        assert!(args.alias_of.is_none());
    }
}
