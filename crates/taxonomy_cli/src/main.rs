//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `taxonomy_core` linkage.
//! - Run one scripted add/set round against a database and print the result.
//!
//! Usage: `taxonomy_cli [DB_PATH]`. Without a path an in-memory database is
//! used. Logging is enabled when `TAXONOMY_LOG_DIR` is set.

use std::error::Error;

use log::info;
use taxonomy_core::{
    init_logging_from_env, open_db, open_db_in_memory, NoopTermCache, SqliteTermRepository,
    TaxonomyRegistry, TermError, TermFields, TermInsertArgs, TermQueryOptions, TermRef,
    TermRelationshipManager,
};

const SMOKE_OBJECT_ID: i64 = 1;

fn main() -> Result<(), Box<dyn Error>> {
    println!("taxonomy_core ping={}", taxonomy_core::ping());
    println!("taxonomy_core version={}", taxonomy_core::core_version());

    if std::env::var_os(taxonomy_core::logging::LOG_DIR_ENV).is_some() {
        init_logging_from_env()?;
    }

    let conn = match std::env::args().nth(1) {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    let repo = SqliteTermRepository::try_new(&conn)?;
    let manager =
        TermRelationshipManager::new(repo, TaxonomyRegistry::with_builtin_taxonomies(), NoopTermCache);

    let category = match manager.add("Uncategorized", "category", &TermInsertArgs::default()) {
        Ok(ids) => ids,
        Err(TermError::TermExists { term_id, .. }) => {
            println!("category exists term_id={term_id}");
            manager
                .term_exists(&TermRef::Id(term_id), "category", None)?
                .ok_or(TermError::InvalidTermId)?
        }
        Err(err) => return Err(err.into()),
    };
    println!(
        "category term_id={} tt_id={}",
        category.term_id, category.term_taxonomy_id
    );

    let tags = [TermRef::from("rust"), TermRef::from("sqlite")];
    let tt_ids = manager.set_for_object(SMOKE_OBJECT_ID, &tags, "post_tag", false)?;
    manager.set_for_object(
        SMOKE_OBJECT_ID,
        &[TermRef::Id(category.term_id)],
        "category",
        false,
    )?;
    println!("object {SMOKE_OBJECT_ID} post_tag tt_ids={tt_ids:?}");

    let names = manager.get_for_object(
        &[SMOKE_OBJECT_ID],
        &["category", "post_tag"],
        &TermQueryOptions::fields(TermFields::Names),
    )?;
    println!("object {SMOKE_OBJECT_ID} terms={names:?}");
    info!(
        "event=cli_smoke module=cli status=ok object_id={SMOKE_OBJECT_ID} terms={}",
        names.len()
    );
    Ok(())
}
