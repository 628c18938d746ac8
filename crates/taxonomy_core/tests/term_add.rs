use std::cell::RefCell;
use std::rc::Rc;

use rusqlite::Connection;
use taxonomy_core::db::open_db_in_memory;
use taxonomy_core::{
    CacheKey, MemoryTermCache, NewTerm, SqliteTermRepository, TaxonomyRegistry, TermError, TermId,
    TermIds, TermInsertArgs, TermLifecycleListener, TermRef, TermRelationshipManager,
};

type Manager<'conn> = TermRelationshipManager<SqliteTermRepository<'conn>, MemoryTermCache>;

fn manager(conn: &Connection) -> Manager<'_> {
    let repo = SqliteTermRepository::try_new(conn).unwrap();
    TermRelationshipManager::new(
        repo,
        TaxonomyRegistry::with_builtin_taxonomies(),
        MemoryTermCache::new(),
    )
}

fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

fn slug_of(manager: &Manager<'_>, ids: TermIds, taxonomy: &str) -> String {
    manager
        .get_term(ids.term_id, taxonomy)
        .unwrap()
        .expect("term should exist")
        .slug
}

#[derive(Clone, Default)]
struct Recorder {
    events: Rc<RefCell<Vec<String>>>,
}

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    fn push(&self, event: String) {
        self.events.borrow_mut().push(event);
    }
}

impl TermLifecycleListener for Recorder {
    fn edit_terms(&self, term_id: TermId, _taxonomy: &str) {
        self.push(format!("edit_terms:{term_id}"));
    }

    fn edited_terms(&self, term_id: TermId, _taxonomy: &str) {
        self.push(format!("edited_terms:{term_id}"));
    }

    fn create_term(&self, ids: TermIds, taxonomy: &str) {
        self.push(format!("create_term:{}:{taxonomy}", ids.term_id));
    }

    fn clean_term_cache(&self, term_ids: &[TermId], _taxonomy: &str) {
        self.push(format!("clean_term_cache:{term_ids:?}"));
    }

    fn created_term(&self, ids: TermIds, taxonomy: &str) {
        self.push(format!("created_term:{}:{taxonomy}", ids.term_id));
    }
}

#[test]
fn add_creates_term_with_derived_slug_and_empty_count() {
    let conn = open_db_in_memory().unwrap();
    let manager = manager(&conn);

    let ids = manager
        .add("Fresh Fruit", "category", &TermInsertArgs::default())
        .unwrap();

    let term = manager.get_term(ids.term_id, "category").unwrap().unwrap();
    assert_eq!(term.name, "Fresh Fruit");
    assert_eq!(term.slug, "fresh-fruit");
    assert_eq!(term.term_taxonomy_id, ids.term_taxonomy_id);
    assert_eq!(term.parent, 0);
    assert_eq!(term.count, 0);
    assert_eq!(term.term_group, 0);
    assert_eq!(count_rows(&conn, "terms"), 1);
    assert_eq!(count_rows(&conn, "term_taxonomy"), 1);
}

#[test]
fn add_trims_name_and_stores_description() {
    let conn = open_db_in_memory().unwrap();
    let manager = manager(&conn);

    let args = TermInsertArgs {
        description: "Edible things".to_string(),
        ..TermInsertArgs::default()
    };
    let ids = manager.add("  Fruit  ", "category", &args).unwrap();

    let term = manager.get_term(ids.term_id, "category").unwrap().unwrap();
    assert_eq!(term.name, "Fruit");
    assert_eq!(term.description, "Edible things");
}

#[test]
fn flat_taxonomy_rejects_same_name_case_insensitively() {
    let conn = open_db_in_memory().unwrap();
    let manager = manager(&conn);

    let first = manager
        .add("Rust", "post_tag", &TermInsertArgs::default())
        .unwrap();
    let err = manager
        .add("rust", "post_tag", &TermInsertArgs::default())
        .unwrap_err();

    assert!(matches!(err, TermError::TermExists { .. }));
    assert_eq!(err.existing_term_id(), Some(first.term_id));
    assert_eq!(count_rows(&conn, "terms"), 1);
}

#[test]
fn flat_taxonomy_allows_same_name_with_new_explicit_slug() {
    let conn = open_db_in_memory().unwrap();
    let manager = manager(&conn);

    manager
        .add("Rust", "post_tag", &TermInsertArgs::default())
        .unwrap();
    let second = manager
        .add("Rust", "post_tag", &TermInsertArgs::with_slug("rust-lang"))
        .unwrap();

    assert_eq!(slug_of(&manager, second, "post_tag"), "rust-lang");
    assert_eq!(count_rows(&conn, "terms"), 2);
}

#[test]
fn flat_taxonomy_rejects_same_name_with_existing_explicit_slug() {
    let conn = open_db_in_memory().unwrap();
    let manager = manager(&conn);

    let first = manager
        .add("Rust", "post_tag", &TermInsertArgs::default())
        .unwrap();
    manager
        .add("Oxide", "post_tag", &TermInsertArgs::default())
        .unwrap();

    let err = manager
        .add("Rust", "post_tag", &TermInsertArgs::with_slug("oxide"))
        .unwrap_err();
    assert_eq!(err.existing_term_id(), Some(first.term_id));
}

#[test]
fn explicit_slug_collision_without_name_match_gets_numeric_suffix() {
    let conn = open_db_in_memory().unwrap();
    let manager = manager(&conn);

    manager
        .add("Rust", "post_tag", &TermInsertArgs::default())
        .unwrap();
    let second = manager
        .add("Rust Language", "post_tag", &TermInsertArgs::with_slug("rust"))
        .unwrap();
    let third = manager
        .add("Rust Lang", "post_tag", &TermInsertArgs::with_slug("rust"))
        .unwrap();

    assert_eq!(slug_of(&manager, second, "post_tag"), "rust-2");
    assert_eq!(slug_of(&manager, third, "post_tag"), "rust-3");
}

#[test]
fn same_slug_is_allowed_in_different_taxonomies() {
    let conn = open_db_in_memory().unwrap();
    let manager = manager(&conn);

    let tag = manager
        .add("Rust", "post_tag", &TermInsertArgs::default())
        .unwrap();
    let category = manager
        .add("Rust", "category", &TermInsertArgs::default())
        .unwrap();

    assert_ne!(tag.term_id, category.term_id);
    assert_eq!(slug_of(&manager, tag, "post_tag"), "rust");
    assert_eq!(slug_of(&manager, category, "category"), "rust");
}

#[test]
fn hierarchical_taxonomy_rejects_same_name_under_same_parent() {
    let conn = open_db_in_memory().unwrap();
    let manager = manager(&conn);

    let fruit = manager
        .add("Fruit", "category", &TermInsertArgs::default())
        .unwrap();
    let apple = manager
        .add("Apple", "category", &TermInsertArgs::with_parent(fruit.term_id))
        .unwrap();

    let err = manager
        .add("Apple", "category", &TermInsertArgs::with_parent(fruit.term_id))
        .unwrap_err();
    assert_eq!(err.existing_term_id(), Some(apple.term_id));
    assert!(err.to_string().contains("with this parent"));
}

#[test]
fn hierarchical_case_variant_with_matching_slug_reports_slug_owner() {
    let conn = open_db_in_memory().unwrap();
    let manager = manager(&conn);

    let apple = manager
        .add("Apple", "category", &TermInsertArgs::default())
        .unwrap();

    let derived = manager
        .add("APPLE", "category", &TermInsertArgs::default())
        .unwrap_err();
    assert_eq!(derived.existing_term_id(), Some(apple.term_id));

    let explicit = manager
        .add("APPLE", "category", &TermInsertArgs::with_slug("apple"))
        .unwrap_err();
    assert_eq!(explicit.existing_term_id(), Some(apple.term_id));
}

#[test]
fn hierarchical_same_name_with_new_explicit_slug_creates_sibling() {
    let conn = open_db_in_memory().unwrap();
    let manager = manager(&conn);

    let fruit = manager
        .add("Fruit", "category", &TermInsertArgs::default())
        .unwrap();
    let apple = manager
        .add("Apple", "category", &TermInsertArgs::with_parent(fruit.term_id))
        .unwrap();

    let args = TermInsertArgs {
        parent: fruit.term_id,
        slug: "green-apple".to_string(),
        ..TermInsertArgs::default()
    };
    let twin = manager.add("Apple", "category", &args).unwrap();
    assert_ne!(twin.term_id, apple.term_id);
    assert_eq!(slug_of(&manager, twin, "category"), "green-apple");

    let term = manager.get_term(twin.term_id, "category").unwrap().unwrap();
    assert_eq!(term.name, "Apple");
    assert_eq!(term.parent, fruit.term_id);
}

#[test]
fn hierarchical_explicit_slug_owned_by_non_sibling_gets_numeric_suffix() {
    let conn = open_db_in_memory().unwrap();
    let manager = manager(&conn);

    let apple = manager
        .add("Apple", "category", &TermInsertArgs::default())
        .unwrap();
    let food = manager
        .add("Food", "category", &TermInsertArgs::default())
        .unwrap();
    let produce = manager
        .add(
            "Produce",
            "category",
            &TermInsertArgs {
                parent: food.term_id,
                slug: "fruit".to_string(),
                ..TermInsertArgs::default()
            },
        )
        .unwrap();

    let twin = manager
        .add("Apple", "category", &TermInsertArgs::with_slug("fruit"))
        .unwrap();
    assert_ne!(twin.term_id, apple.term_id);
    assert_ne!(twin.term_id, produce.term_id);
    assert_eq!(slug_of(&manager, twin, "category"), "fruit-2");
}

#[test]
fn hierarchical_explicit_slug_owned_by_sibling_reports_slug_owner() {
    let conn = open_db_in_memory().unwrap();
    let manager = manager(&conn);

    manager
        .add("Apple", "category", &TermInsertArgs::default())
        .unwrap();
    let pear = manager
        .add("Pear", "category", &TermInsertArgs::default())
        .unwrap();

    let err = manager
        .add("Apple", "category", &TermInsertArgs::with_slug("pear"))
        .unwrap_err();
    assert_eq!(err.existing_term_id(), Some(pear.term_id));
    assert!(err.to_string().contains("with this parent"));
    assert_eq!(count_rows(&conn, "terms"), 2);
}

#[test]
fn hierarchical_same_name_under_other_parent_gets_parent_slug_suffix() {
    let conn = open_db_in_memory().unwrap();
    let manager = manager(&conn);

    manager
        .add("Apple", "category", &TermInsertArgs::default())
        .unwrap();
    let fruit = manager
        .add("Fruit", "category", &TermInsertArgs::default())
        .unwrap();
    let brands = manager
        .add("Brands", "category", &TermInsertArgs::default())
        .unwrap();

    let fruit_apple = manager
        .add("Apple", "category", &TermInsertArgs::with_parent(fruit.term_id))
        .unwrap();
    let brand_apple = manager
        .add("Apple", "category", &TermInsertArgs::with_parent(brands.term_id))
        .unwrap();

    assert_eq!(slug_of(&manager, fruit_apple, "category"), "apple-fruit");
    assert_eq!(slug_of(&manager, brand_apple, "category"), "apple-brands");
    let stored = manager
        .get_term(fruit_apple.term_id, "category")
        .unwrap()
        .unwrap();
    assert_eq!(stored.parent, fruit.term_id);
}

#[test]
fn parent_suffix_walks_ancestors_then_falls_back_to_number() {
    let conn = open_db_in_memory().unwrap();
    let manager = manager(&conn);

    let food = manager
        .add("Food", "category", &TermInsertArgs::default())
        .unwrap();
    let fruit = manager
        .add("Fruit", "category", &TermInsertArgs::with_parent(food.term_id))
        .unwrap();
    manager
        .add("Apple", "category", &TermInsertArgs::default())
        .unwrap();
    manager
        .add("Apple Fruit", "category", &TermInsertArgs::default())
        .unwrap();

    let nested = manager
        .add("Apple", "category", &TermInsertArgs::with_parent(fruit.term_id))
        .unwrap();
    assert_eq!(slug_of(&manager, nested, "category"), "apple-fruit-food");

    let vegetable = manager
        .add("Vegetable", "category", &TermInsertArgs::default())
        .unwrap();
    manager
        .add("Tomato Vegetable", "category", &TermInsertArgs::default())
        .unwrap();
    manager
        .add("Tomato", "category", &TermInsertArgs::default())
        .unwrap();
    let tomato = manager
        .add(
            "Tomato",
            "category",
            &TermInsertArgs::with_parent(vegetable.term_id),
        )
        .unwrap();
    assert_eq!(slug_of(&manager, tomato, "category"), "tomato-vegetable-2");
}

#[test]
fn alias_without_group_allocates_a_new_group_for_both_terms() {
    let conn = open_db_in_memory().unwrap();
    let manager = manager(&conn);

    let colour = manager
        .add("Colour", "post_tag", &TermInsertArgs::default())
        .unwrap();
    manager.cache().set(CacheKey::Term(colour.term_id), "cached");

    let alias_args = TermInsertArgs {
        alias_of: Some("colour".to_string()),
        ..TermInsertArgs::default()
    };
    let color = manager.add("Color", "post_tag", &alias_args).unwrap();
    let kolor = manager.add("Kolor", "post_tag", &alias_args).unwrap();

    let group_of = |ids: TermIds| {
        manager
            .get_term(ids.term_id, "post_tag")
            .unwrap()
            .unwrap()
            .term_group
    };
    assert_eq!(group_of(colour), 1);
    assert_eq!(group_of(color), 1);
    assert_eq!(group_of(kolor), 1);
    assert!(!manager.cache().contains(&CacheKey::Term(colour.term_id)));

    let other = manager
        .add("Shade", "post_tag", &TermInsertArgs::default())
        .unwrap();
    let shadow = manager
        .add(
            "Shadow",
            "post_tag",
            &TermInsertArgs {
                alias_of: Some("shade".to_string()),
                ..TermInsertArgs::default()
            },
        )
        .unwrap();
    assert_eq!(group_of(other), 2);
    assert_eq!(group_of(shadow), 2);
}

#[test]
fn unknown_alias_is_ignored() {
    let conn = open_db_in_memory().unwrap();
    let manager = manager(&conn);

    let ids = manager
        .add(
            "Orphan",
            "post_tag",
            &TermInsertArgs {
                alias_of: Some("missing".to_string()),
                ..TermInsertArgs::default()
            },
        )
        .unwrap();

    let term = manager.get_term(ids.term_id, "post_tag").unwrap().unwrap();
    assert_eq!(term.term_group, 0);
}

#[test]
fn degenerate_name_uses_term_id_as_slug() {
    let conn = open_db_in_memory().unwrap();
    let recorder = Recorder::default();
    let manager = manager(&conn).with_listener(recorder.clone());

    let first = manager
        .add("!!!", "post_tag", &TermInsertArgs::default())
        .unwrap();
    let second = manager
        .add("???", "post_tag", &TermInsertArgs::default())
        .unwrap();

    assert_eq!(
        slug_of(&manager, first, "post_tag"),
        first.term_id.to_string()
    );
    assert_eq!(
        slug_of(&manager, second, "post_tag"),
        second.term_id.to_string()
    );
    let events = recorder.events();
    assert!(events.contains(&format!("edit_terms:{}", first.term_id)));
    assert!(events.contains(&format!("edited_terms:{}", first.term_id)));
}

#[test]
fn numeric_id_input_is_used_as_name_and_zero_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let manager = manager(&conn);

    let err = manager
        .add(TermRef::Id(0), "post_tag", &TermInsertArgs::default())
        .unwrap_err();
    assert!(matches!(err, TermError::InvalidTermId));

    let ids = manager
        .add(2024_i64, "post_tag", &TermInsertArgs::default())
        .unwrap();
    let term = manager.get_term(ids.term_id, "post_tag").unwrap().unwrap();
    assert_eq!(term.name, "2024");
    assert_eq!(term.slug, "2024");
}

#[test]
fn invalid_inputs_are_rejected_without_writing() {
    let conn = open_db_in_memory().unwrap();
    let manager = manager(&conn);
    let last_changed = manager.cache().last_changed();

    let err = manager
        .add("Fruit", "genre", &TermInsertArgs::default())
        .unwrap_err();
    assert!(matches!(err, TermError::InvalidTaxonomy(ref name) if name == "genre"));

    let err = manager
        .add("   ", "category", &TermInsertArgs::default())
        .unwrap_err();
    assert!(matches!(err, TermError::EmptyTermName));

    let err = manager
        .add("Apple", "category", &TermInsertArgs::with_parent(999))
        .unwrap_err();
    assert!(matches!(err, TermError::MissingParent(999)));
    assert_eq!(err.code(), "missing_parent");

    let err = manager
        .add("Apple", "category", &TermInsertArgs::with_parent(-1))
        .unwrap_err();
    assert!(matches!(err, TermError::MissingParent(-1)));

    assert_eq!(count_rows(&conn, "terms"), 0);
    assert_eq!(count_rows(&conn, "term_taxonomy"), 0);
    assert_eq!(manager.cache().last_changed(), last_changed);
}

#[test]
fn parent_from_another_taxonomy_is_accepted() {
    let conn = open_db_in_memory().unwrap();
    let manager = manager(&conn);

    let tag = manager
        .add("Seasonal", "post_tag", &TermInsertArgs::default())
        .unwrap();
    let ids = manager
        .add("Summer", "category", &TermInsertArgs::with_parent(tag.term_id))
        .unwrap();

    let term = manager.get_term(ids.term_id, "category").unwrap().unwrap();
    assert_eq!(term.parent, tag.term_id);
}

#[test]
fn listeners_are_notified_in_creation_order() {
    let conn = open_db_in_memory().unwrap();
    let recorder = Recorder::default();
    let manager = manager(&conn).with_listener(recorder.clone());

    let ids = manager
        .add("Fruit", "category", &TermInsertArgs::default())
        .unwrap();

    assert_eq!(
        recorder.events(),
        vec![
            format!("create_term:{}:category", ids.term_id),
            format!("clean_term_cache:[{}]", ids.term_id),
            format!("created_term:{}:category", ids.term_id),
        ]
    );
}

struct RejectSpam;

impl TermLifecycleListener for RejectSpam {
    fn pre_insert_term(
        &self,
        term: TermRef,
        _taxonomy: &str,
        _args: &TermInsertArgs,
    ) -> Result<TermRef, TermError> {
        if term.display_name().contains("spam") {
            return Err(TermError::Rejected {
                code: "spam_term".to_string(),
                message: "spam terms are not allowed".to_string(),
            });
        }
        Ok(term)
    }
}

#[test]
fn pre_insert_veto_aborts_before_any_write() {
    let conn = open_db_in_memory().unwrap();
    let recorder = Recorder::default();
    let manager = manager(&conn)
        .with_listener(RejectSpam)
        .with_listener(recorder.clone());

    let err = manager
        .add("cheap spam", "post_tag", &TermInsertArgs::default())
        .unwrap_err();

    assert_eq!(err.code(), "spam_term");
    assert_eq!(count_rows(&conn, "terms"), 0);
    assert!(recorder.events().is_empty());

    manager
        .add("ham", "post_tag", &TermInsertArgs::default())
        .unwrap();
    assert_eq!(count_rows(&conn, "terms"), 1);
}

struct TitleCase;

impl TermLifecycleListener for TitleCase {
    fn insert_term_data(&self, mut data: NewTerm, _taxonomy: &str, _args: &TermInsertArgs) -> NewTerm {
        data.name = data.name.to_uppercase();
        data.slug = format!("{}-x", data.slug);
        data
    }
}

#[test]
fn insert_term_data_filter_rewrites_stored_row() {
    let conn = open_db_in_memory().unwrap();
    let manager = manager(&conn).with_listener(TitleCase);

    let ids = manager
        .add("Fruit", "category", &TermInsertArgs::default())
        .unwrap();

    let term = manager.get_term(ids.term_id, "category").unwrap().unwrap();
    assert_eq!(term.name, "FRUIT");
    assert_eq!(term.slug, "fruit-x");
}

#[test]
fn term_exists_resolves_ids_slugs_and_names() {
    let conn = open_db_in_memory().unwrap();
    let manager = manager(&conn);

    let fruit = manager
        .add("Fresh Fruit", "category", &TermInsertArgs::with_slug("produce"))
        .unwrap();

    let by_id = manager
        .term_exists(&TermRef::Id(fruit.term_id), "category", None)
        .unwrap();
    let by_name = manager
        .term_exists(&TermRef::from("fresh fruit"), "category", None)
        .unwrap();
    let by_slug = manager
        .term_exists(&TermRef::from("Produce"), "category", None)
        .unwrap();
    assert_eq!(by_id, Some(fruit));
    assert_eq!(by_name, Some(fruit));
    assert_eq!(by_slug, Some(fruit));

    assert_eq!(
        manager
            .term_exists(&TermRef::Id(0), "category", None)
            .unwrap(),
        None
    );
    assert_eq!(
        manager
            .term_exists(&TermRef::Id(fruit.term_id), "post_tag", None)
            .unwrap(),
        None
    );
    assert_eq!(
        manager
            .term_exists(&TermRef::from("Fresh Fruit"), "category", Some(42))
            .unwrap(),
        None
    );

    let by_slug_lookup = manager.get_term_by_slug("produce", "category").unwrap();
    assert_eq!(by_slug_lookup.map(|term| term.ids()), Some(fruit));
}
