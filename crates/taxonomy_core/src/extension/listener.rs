//! Term lifecycle extension points.
//!
//! # Responsibility
//! - Let host code observe term and relationship mutations.
//! - Let host code transform term input before insertion, or veto it.
//!
//! # Invariants
//! - Listeners run in registration order.
//! - Filters receive the previous listener's output.
//! - Only `pre_insert_term` can abort an operation.

use crate::model::term::{NewTerm, ObjectId, TermId, TermIds, TermRef, TermTaxonomyId};
use crate::service::term_manager::{TermError, TermInsertArgs};
use std::fmt::{Debug, Formatter};

/// Payload of the `set_object_terms` notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetObjectTermsEvent<'a> {
    pub object_id: ObjectId,
    /// Terms exactly as the caller passed them.
    pub terms: &'a [TermRef],
    /// Resolved entries, in input order.
    pub tt_ids: &'a [TermTaxonomyId],
    pub taxonomy: &'a str,
    pub append: bool,
    /// Entries linked before the call; empty when appending.
    pub old_tt_ids: &'a [TermTaxonomyId],
}

/// Observer/transformer hooked into term operations. Every method defaults to
/// a pass-through so implementors only override what they need.
#[allow(unused_variables)]
pub trait TermLifecycleListener {
    /// Filter on the raw term input before any validation. Returning an error
    /// aborts `add` with that error.
    fn pre_insert_term(
        &self,
        term: TermRef,
        taxonomy: &str,
        args: &TermInsertArgs,
    ) -> Result<TermRef, TermError> {
        Ok(term)
    }

    /// Filter on the row about to be inserted, after duplicate checks and
    /// slug resolution.
    fn insert_term_data(&self, data: NewTerm, taxonomy: &str, args: &TermInsertArgs) -> NewTerm {
        data
    }

    fn edit_terms(&self, term_id: TermId, taxonomy: &str) {}

    fn edited_terms(&self, term_id: TermId, taxonomy: &str) {}

    /// Term and taxonomy entry exist; caches not yet cleaned.
    fn create_term(&self, ids: TermIds, taxonomy: &str) {}

    /// Term creation fully finished.
    fn created_term(&self, ids: TermIds, taxonomy: &str) {}

    /// Cache keys of `term_ids` were invalidated.
    fn clean_term_cache(&self, term_ids: &[TermId], taxonomy: &str) {}

    fn added_term_relationship(&self, object_id: ObjectId, tt_id: TermTaxonomyId, taxonomy: &str) {
    }

    fn deleted_term_relationships(
        &self,
        object_id: ObjectId,
        tt_ids: &[TermTaxonomyId],
        taxonomy: &str,
    ) {
    }

    fn set_object_terms(&self, event: &SetObjectTermsEvent<'_>) {}
}

/// Ordered listener pipeline owned by one manager.
#[derive(Default)]
pub struct TermHooks {
    listeners: Vec<Box<dyn TermLifecycleListener>>,
}

impl Debug for TermHooks {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermHooks")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl TermHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: Box<dyn TermLifecycleListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub(crate) fn pre_insert_term(
        &self,
        term: TermRef,
        taxonomy: &str,
        args: &TermInsertArgs,
    ) -> Result<TermRef, TermError> {
        self.listeners
            .iter()
            .try_fold(term, |term, listener| {
                listener.pre_insert_term(term, taxonomy, args)
            })
    }

    pub(crate) fn insert_term_data(
        &self,
        data: NewTerm,
        taxonomy: &str,
        args: &TermInsertArgs,
    ) -> NewTerm {
        self.listeners.iter().fold(data, |data, listener| {
            listener.insert_term_data(data, taxonomy, args)
        })
    }

    pub(crate) fn edit_terms(&self, term_id: TermId, taxonomy: &str) {
        self.each(|l| l.edit_terms(term_id, taxonomy));
    }

    pub(crate) fn edited_terms(&self, term_id: TermId, taxonomy: &str) {
        self.each(|l| l.edited_terms(term_id, taxonomy));
    }

    pub(crate) fn create_term(&self, ids: TermIds, taxonomy: &str) {
        self.each(|l| l.create_term(ids, taxonomy));
    }

    pub(crate) fn created_term(&self, ids: TermIds, taxonomy: &str) {
        self.each(|l| l.created_term(ids, taxonomy));
    }

    pub(crate) fn clean_term_cache(&self, term_ids: &[TermId], taxonomy: &str) {
        self.each(|l| l.clean_term_cache(term_ids, taxonomy));
    }

    pub(crate) fn added_term_relationship(
        &self,
        object_id: ObjectId,
        tt_id: TermTaxonomyId,
        taxonomy: &str,
    ) {
        self.each(|l| l.added_term_relationship(object_id, tt_id, taxonomy));
    }

    pub(crate) fn deleted_term_relationships(
        &self,
        object_id: ObjectId,
        tt_ids: &[TermTaxonomyId],
        taxonomy: &str,
    ) {
        self.each(|l| l.deleted_term_relationships(object_id, tt_ids, taxonomy));
    }

    pub(crate) fn set_object_terms(&self, event: &SetObjectTermsEvent<'_>) {
        self.each(|l| l.set_object_terms(event));
    }

    fn each(&self, mut notify: impl FnMut(&dyn TermLifecycleListener)) {
        for listener in &self.listeners {
            notify(listener.as_ref());
        }
    }
}
