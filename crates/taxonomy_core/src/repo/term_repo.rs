//! Term store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide row-level operations over `terms`, `term_taxonomy` and
//!   `term_relationships`.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Lookups that may match several rows return the lowest `term_id` first.
//! - Relationship inserts are idempotent; deleting a missing link is a no-op.
//! - Read paths reject persisted rows that cannot form a valid read model.

use crate::db::DbError;
use crate::model::query::{SortOrder, TermOrderBy};
use crate::model::term::{
    NewTerm, ObjectId, Term, TermId, TermIds, TermRelationship, TermTaxonomyEntry, TermTaxonomyId,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const TERM_COLUMNS_SQL: &str = "SELECT
    t.term_id,
    t.name,
    t.slug,
    t.term_group,
    tt.term_taxonomy_id,
    tt.taxonomy,
    tt.description,
    tt.parent,
    tt.count";

const TERM_FROM_SQL: &str = "FROM terms t
INNER JOIN term_taxonomy tt ON tt.term_id = t.term_id";

const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    ("terms", &["term_id", "name", "slug", "term_group"]),
    (
        "term_taxonomy",
        &[
            "term_taxonomy_id",
            "term_id",
            "taxonomy",
            "description",
            "parent",
            "count",
        ],
    ),
    (
        "term_relationships",
        &["object_id", "term_taxonomy_id", "term_order"],
    ),
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from term store operations.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Connection schema lacks a required table.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "term repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "term repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted term data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::MissingRequiredTable(_) => None,
            Self::MissingRequiredColumn { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Key used to find a single term within one taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermLookup<'a> {
    Id(TermId),
    Slug(&'a str),
    /// Name match under Unicode lowercase folding, the same folding `add`
    /// uses for duplicate detection.
    Name(&'a str),
}

/// Relational store the term manager runs against.
pub trait TermRepository {
    /// Returns whether a term row with this id exists in any taxonomy.
    fn term_id_exists(&self, term_id: TermId) -> RepoResult<bool>;
    /// Finds the lowest-id term matching `lookup` in `taxonomy`, optionally
    /// restricted to one parent.
    fn find_term(
        &self,
        lookup: TermLookup<'_>,
        taxonomy: &str,
        parent: Option<TermId>,
    ) -> RepoResult<Option<Term>>;
    /// Lists direct children of `parent` (`0` = roots) in `taxonomy`.
    fn list_children(&self, taxonomy: &str, parent: TermId) -> RepoResult<Vec<Term>>;
    /// Returns whether any term, in any taxonomy, uses `slug`.
    fn slug_in_use(&self, slug: &str) -> RepoResult<bool>;
    /// Highest alias group id in use, `0` when none.
    fn max_term_group(&self) -> RepoResult<i64>;
    fn update_term_group(&self, term_id: TermId, term_group: i64) -> RepoResult<()>;
    fn insert_term(&self, term: &NewTerm) -> RepoResult<TermId>;
    fn update_term_slug(&self, term_id: TermId, slug: &str) -> RepoResult<()>;
    fn delete_term(&self, term_id: TermId) -> RepoResult<()>;
    fn find_term_taxonomy(
        &self,
        term_id: TermId,
        taxonomy: &str,
    ) -> RepoResult<Option<TermTaxonomyEntry>>;
    fn insert_term_taxonomy(
        &self,
        term_id: TermId,
        taxonomy: &str,
        description: &str,
        parent: TermId,
    ) -> RepoResult<TermTaxonomyId>;
    fn delete_term_taxonomy(&self, tt_id: TermTaxonomyId) -> RepoResult<()>;
    /// Finds a term sharing slug, parent and taxonomy with a lower id than
    /// `term_id`, ignoring the entry `tt_id`.
    fn find_older_duplicate(
        &self,
        slug: &str,
        parent: TermId,
        taxonomy: &str,
        term_id: TermId,
        tt_id: TermTaxonomyId,
    ) -> RepoResult<Option<TermIds>>;
    /// Links an object to an entry. Returns `false` when already linked.
    fn insert_relationship(&self, object_id: ObjectId, tt_id: TermTaxonomyId) -> RepoResult<bool>;
    /// Unlinks entries from an object, returning removed row count.
    fn delete_relationships(
        &self,
        object_id: ObjectId,
        tt_ids: &[TermTaxonomyId],
    ) -> RepoResult<usize>;
    /// Writes `term_order` for each `(tt_id, order)`, inserting missing links.
    fn upsert_term_order(
        &self,
        object_id: ObjectId,
        ordered: &[(TermTaxonomyId, i64)],
    ) -> RepoResult<()>;
    fn list_object_relationships(
        &self,
        object_id: ObjectId,
        taxonomy: &str,
    ) -> RepoResult<Vec<TermRelationship>>;
    /// Maps entries of `taxonomy` back to their term ids.
    fn term_ids_for(&self, taxonomy: &str, tt_ids: &[TermTaxonomyId]) -> RepoResult<Vec<TermId>>;
    /// Sets each entry's count to its number of relationship rows.
    fn recount(&self, tt_ids: &[TermTaxonomyId]) -> RepoResult<()>;
    /// Returns one row per (object, entry) link, sorted as requested.
    fn query_object_terms(
        &self,
        object_ids: &[ObjectId],
        taxonomies: &[String],
        orderby: TermOrderBy,
        order: SortOrder,
    ) -> RepoResult<Vec<Term>>;
}

/// SQLite-backed term repository.
pub struct SqliteTermRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTermRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_term_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl TermRepository for SqliteTermRepository<'_> {
    fn term_id_exists(&self, term_id: TermId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM terms WHERE term_id = ?1);",
            [term_id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn find_term(
        &self,
        lookup: TermLookup<'_>,
        taxonomy: &str,
        parent: Option<TermId>,
    ) -> RepoResult<Option<Term>> {
        let mut sql = format!("{TERM_COLUMNS_SQL} {TERM_FROM_SQL} WHERE tt.taxonomy = ?");
        let mut bind_values = vec![Value::Text(taxonomy.to_string())];

        match lookup {
            TermLookup::Id(term_id) => {
                sql.push_str(" AND t.term_id = ?");
                bind_values.push(Value::Integer(term_id));
            }
            TermLookup::Slug(slug) => {
                sql.push_str(" AND t.slug = ?");
                bind_values.push(Value::Text(slug.to_string()));
            }
            // Folded in Rust below; NOCASE only folds ASCII.
            TermLookup::Name(_) => {}
        }

        if let Some(parent) = parent {
            sql.push_str(" AND tt.parent = ?");
            bind_values.push(Value::Integer(parent));
        }
        sql.push_str(" ORDER BY t.term_id ASC");
        if !matches!(lookup, TermLookup::Name(_)) {
            sql.push_str(" LIMIT 1");
        }

        let wanted = match lookup {
            TermLookup::Name(name) => Some(name.to_lowercase()),
            _ => None,
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        while let Some(row) = rows.next()? {
            let term = parse_term_row(row, false)?;
            match &wanted {
                Some(wanted) if term.name.to_lowercase() != *wanted => continue,
                _ => return Ok(Some(term)),
            }
        }
        Ok(None)
    }

    fn list_children(&self, taxonomy: &str, parent: TermId) -> RepoResult<Vec<Term>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TERM_COLUMNS_SQL} {TERM_FROM_SQL}
             WHERE tt.taxonomy = ?1
               AND tt.parent = ?2
             ORDER BY t.term_id ASC;"
        ))?;
        let mut rows = stmt.query(params![taxonomy, parent])?;
        let mut terms = Vec::new();
        while let Some(row) = rows.next()? {
            terms.push(parse_term_row(row, false)?);
        }
        Ok(terms)
    }

    fn slug_in_use(&self, slug: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM terms WHERE slug = ?1);",
            [slug],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn max_term_group(&self) -> RepoResult<i64> {
        let max: Option<i64> =
            self.conn
                .query_row("SELECT MAX(term_group) FROM terms;", [], |row| row.get(0))?;
        Ok(max.unwrap_or(0))
    }

    fn update_term_group(&self, term_id: TermId, term_group: i64) -> RepoResult<()> {
        self.conn.execute(
            "UPDATE terms SET term_group = ?2 WHERE term_id = ?1;",
            params![term_id, term_group],
        )?;
        Ok(())
    }

    fn insert_term(&self, term: &NewTerm) -> RepoResult<TermId> {
        self.conn.execute(
            "INSERT INTO terms (name, slug, term_group) VALUES (?1, ?2, ?3);",
            params![term.name.as_str(), term.slug.as_str(), term.term_group],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_term_slug(&self, term_id: TermId, slug: &str) -> RepoResult<()> {
        self.conn.execute(
            "UPDATE terms SET slug = ?2 WHERE term_id = ?1;",
            params![term_id, slug],
        )?;
        Ok(())
    }

    fn delete_term(&self, term_id: TermId) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM terms WHERE term_id = ?1;", [term_id])?;
        Ok(())
    }

    fn find_term_taxonomy(
        &self,
        term_id: TermId,
        taxonomy: &str,
    ) -> RepoResult<Option<TermTaxonomyEntry>> {
        let entry = self
            .conn
            .query_row(
                "SELECT term_taxonomy_id, term_id, taxonomy, description, parent, count
                 FROM term_taxonomy
                 WHERE term_id = ?1 AND taxonomy = ?2;",
                params![term_id, taxonomy],
                |row| {
                    Ok(TermTaxonomyEntry {
                        term_taxonomy_id: row.get("term_taxonomy_id")?,
                        term_id: row.get("term_id")?,
                        taxonomy: row.get("taxonomy")?,
                        description: row.get("description")?,
                        parent: row.get("parent")?,
                        count: row.get("count")?,
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    fn insert_term_taxonomy(
        &self,
        term_id: TermId,
        taxonomy: &str,
        description: &str,
        parent: TermId,
    ) -> RepoResult<TermTaxonomyId> {
        self.conn.execute(
            "INSERT INTO term_taxonomy (term_id, taxonomy, description, parent, count)
             VALUES (?1, ?2, ?3, ?4, 0);",
            params![term_id, taxonomy, description, parent],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn delete_term_taxonomy(&self, tt_id: TermTaxonomyId) -> RepoResult<()> {
        self.conn.execute(
            "DELETE FROM term_taxonomy WHERE term_taxonomy_id = ?1;",
            [tt_id],
        )?;
        Ok(())
    }

    fn find_older_duplicate(
        &self,
        slug: &str,
        parent: TermId,
        taxonomy: &str,
        term_id: TermId,
        tt_id: TermTaxonomyId,
    ) -> RepoResult<Option<TermIds>> {
        let ids = self
            .conn
            .query_row(
                "SELECT t.term_id, tt.term_taxonomy_id
                 FROM terms t
                 INNER JOIN term_taxonomy tt ON tt.term_id = t.term_id
                 WHERE t.slug = ?1
                   AND tt.parent = ?2
                   AND tt.taxonomy = ?3
                   AND t.term_id < ?4
                   AND tt.term_taxonomy_id != ?5
                 ORDER BY t.term_id ASC
                 LIMIT 1;",
                params![slug, parent, taxonomy, term_id, tt_id],
                |row| {
                    Ok(TermIds {
                        term_id: row.get(0)?,
                        term_taxonomy_id: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(ids)
    }

    fn insert_relationship(&self, object_id: ObjectId, tt_id: TermTaxonomyId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO term_relationships (object_id, term_taxonomy_id)
             VALUES (?1, ?2);",
            params![object_id, tt_id],
        )?;
        Ok(changed == 1)
    }

    fn delete_relationships(
        &self,
        object_id: ObjectId,
        tt_ids: &[TermTaxonomyId],
    ) -> RepoResult<usize> {
        if tt_ids.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "DELETE FROM term_relationships
             WHERE object_id = ?
               AND term_taxonomy_id IN ({});",
            placeholders(tt_ids.len())
        );
        let bind_values = std::iter::once(Value::Integer(object_id))
            .chain(tt_ids.iter().map(|id| Value::Integer(*id)));
        let deleted = self.conn.execute(&sql, params_from_iter(bind_values))?;
        Ok(deleted)
    }

    fn upsert_term_order(
        &self,
        object_id: ObjectId,
        ordered: &[(TermTaxonomyId, i64)],
    ) -> RepoResult<()> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO term_relationships (object_id, term_taxonomy_id, term_order)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(object_id, term_taxonomy_id)
             DO UPDATE SET term_order = excluded.term_order;",
        )?;
        for (tt_id, order) in ordered {
            stmt.execute(params![object_id, tt_id, order])?;
        }
        Ok(())
    }

    fn list_object_relationships(
        &self,
        object_id: ObjectId,
        taxonomy: &str,
    ) -> RepoResult<Vec<TermRelationship>> {
        let mut stmt = self.conn.prepare(
            "SELECT tr.object_id, tr.term_taxonomy_id, tr.term_order
             FROM term_relationships tr
             INNER JOIN term_taxonomy tt ON tt.term_taxonomy_id = tr.term_taxonomy_id
             WHERE tr.object_id = ?1
               AND tt.taxonomy = ?2
             ORDER BY tr.term_taxonomy_id ASC;",
        )?;
        let mut rows = stmt.query(params![object_id, taxonomy])?;
        let mut relationships = Vec::new();
        while let Some(row) = rows.next()? {
            relationships.push(TermRelationship {
                object_id: row.get(0)?,
                term_taxonomy_id: row.get(1)?,
                term_order: row.get(2)?,
            });
        }
        Ok(relationships)
    }

    fn term_ids_for(&self, taxonomy: &str, tt_ids: &[TermTaxonomyId]) -> RepoResult<Vec<TermId>> {
        if tt_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT term_id
             FROM term_taxonomy
             WHERE taxonomy = ?
               AND term_taxonomy_id IN ({})
             ORDER BY term_taxonomy_id ASC;",
            placeholders(tt_ids.len())
        );
        let bind_values = std::iter::once(Value::Text(taxonomy.to_string()))
            .chain(tt_ids.iter().map(|id| Value::Integer(*id)));
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut term_ids = Vec::new();
        while let Some(row) = rows.next()? {
            term_ids.push(row.get(0)?);
        }
        Ok(term_ids)
    }

    fn recount(&self, tt_ids: &[TermTaxonomyId]) -> RepoResult<()> {
        let mut stmt = self.conn.prepare(
            "UPDATE term_taxonomy
             SET count = (
                SELECT COUNT(*)
                FROM term_relationships tr
                WHERE tr.term_taxonomy_id = term_taxonomy.term_taxonomy_id
             )
             WHERE term_taxonomy_id = ?1;",
        )?;
        for tt_id in tt_ids {
            stmt.execute([tt_id])?;
        }
        Ok(())
    }

    fn query_object_terms(
        &self,
        object_ids: &[ObjectId],
        taxonomies: &[String],
        orderby: TermOrderBy,
        order: SortOrder,
    ) -> RepoResult<Vec<Term>> {
        if object_ids.is_empty() || taxonomies.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = format!(
            "{TERM_COLUMNS_SQL}, tr.object_id
             {TERM_FROM_SQL}
             INNER JOIN term_relationships tr ON tr.term_taxonomy_id = tt.term_taxonomy_id
             WHERE tt.taxonomy IN ({taxonomies})
               AND tr.object_id IN ({objects})",
            taxonomies = placeholders(taxonomies.len()),
            objects = placeholders(object_ids.len()),
        );

        let direction = match order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        let order_column = match orderby {
            TermOrderBy::Name => Some("t.name COLLATE NOCASE"),
            TermOrderBy::Slug => Some("t.slug"),
            TermOrderBy::TermId => Some("t.term_id"),
            TermOrderBy::TermOrder => Some("tr.term_order"),
            TermOrderBy::None => None,
        };
        match order_column {
            Some(column) => sql.push_str(&format!(
                " ORDER BY {column} {direction}, tr.object_id ASC, t.term_id ASC;"
            )),
            None => sql.push_str(" ORDER BY tr.object_id ASC, tr.term_taxonomy_id ASC;"),
        }

        let bind_values = taxonomies
            .iter()
            .map(|taxonomy| Value::Text(taxonomy.clone()))
            .chain(object_ids.iter().map(|id| Value::Integer(*id)));
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut terms = Vec::new();
        while let Some(row) = rows.next()? {
            terms.push(parse_term_row(row, true)?);
        }
        Ok(terms)
    }
}

fn parse_term_row(row: &Row<'_>, with_object: bool) -> RepoResult<Term> {
    let term = Term {
        term_id: row.get("term_id")?,
        name: row.get("name")?,
        slug: row.get("slug")?,
        term_group: row.get("term_group")?,
        term_taxonomy_id: row.get("term_taxonomy_id")?,
        taxonomy: row.get("taxonomy")?,
        description: row.get("description")?,
        parent: row.get("parent")?,
        count: row.get("count")?,
        object_id: if with_object {
            Some(row.get("object_id")?)
        } else {
            None
        },
    };

    if term.parent < 0 || term.count < 0 {
        return Err(RepoError::InvalidData(format!(
            "term_taxonomy {} has parent={} count={}",
            term.term_taxonomy_id, term.parent, term.count
        )));
    }
    Ok(term)
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn ensure_term_connection_ready(conn: &Connection) -> RepoResult<()> {
    for &(table, columns) in REQUIRED_COLUMNS {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
