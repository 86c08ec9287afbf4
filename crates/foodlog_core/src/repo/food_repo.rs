//! Food cache contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide stable lookup/mutation APIs over the `food_items` table.
//! - Keep SQL details inside the cache persistence boundary.
//!
//! # Invariants
//! - `insert` reports `(name, unit)` collisions as `Ok(false)`; callers
//!   decide whether that is an error.
//! - `deduplicate` keeps the lowest-sequence row per `remote_id` and never
//!   touches rows without one.

use crate::db::DbError;
use crate::model::food::FoodRecord;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const FOOD_SELECT_SQL: &str = "SELECT
    name,
    calories,
    unit,
    protein,
    fat,
    carbs,
    grams,
    remote_id
FROM food_items";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for food cache persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted food data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
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

/// Repository interface for the local food cache.
pub trait FoodRepository {
    /// Inserts a record. Returns `Ok(false)` on a `(name, unit)` collision.
    fn insert(&self, record: &FoodRecord) -> RepoResult<bool>;

    /// Replaces the row matching `(name, unit)`. Returns rows touched;
    /// zero is a silent no-op.
    fn update(&self, record: &FoodRecord) -> RepoResult<usize>;

    /// Deletes the row with the given `(name, remote_id)` pair, or at most
    /// one row matching `name` when no remote id is given.
    fn delete(&self, name: &str, remote_id: Option<&str>) -> RepoResult<bool>;

    /// Exact match on `(name, unit)` when `unit` is given; first match on
    /// `name` alone otherwise (order unspecified).
    fn lookup(&self, name: &str, unit: Option<&str>) -> RepoResult<Option<FoodRecord>>;

    fn lookup_by_remote_id(&self, remote_id: &str) -> RepoResult<Option<FoodRecord>>;

    fn list_all(&self) -> RepoResult<Vec<FoodRecord>>;

    /// Keeps only the earliest-inserted row per `remote_id`. Idempotent.
    /// Returns the number of rows removed.
    fn deduplicate(&self) -> RepoResult<usize>;

    /// Removes every row. Operator reset, not part of normal resolution.
    fn clear(&self) -> RepoResult<usize>;
}

/// SQLite-backed food cache repository.
pub struct SqliteFoodRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteFoodRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl FoodRepository for SqliteFoodRepository<'_> {
    fn insert(&self, record: &FoodRecord) -> RepoResult<bool> {
        let inserted = self.conn.execute(
            "INSERT INTO food_items (
                name,
                calories,
                unit,
                protein,
                fat,
                carbs,
                grams,
                remote_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                record.name.as_str(),
                record.calories,
                record.unit.as_str(),
                record.protein,
                record.fat,
                record.carbs,
                record.grams,
                record.remote_id.as_deref(),
            ],
        );

        match inserted {
            Ok(_) => Ok(true),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn update(&self, record: &FoodRecord) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE food_items
             SET
                calories = ?1,
                protein = ?2,
                fat = ?3,
                carbs = ?4,
                grams = ?5,
                remote_id = ?6
             WHERE name = ?7 AND unit = ?8;",
            params![
                record.calories,
                record.protein,
                record.fat,
                record.carbs,
                record.grams,
                record.remote_id.as_deref(),
                record.name.as_str(),
                record.unit.as_str(),
            ],
        )?;

        Ok(changed)
    }

    fn delete(&self, name: &str, remote_id: Option<&str>) -> RepoResult<bool> {
        let changed = match remote_id {
            Some(remote_id) => self.conn.execute(
                "DELETE FROM food_items WHERE name = ?1 AND remote_id = ?2;",
                params![name, remote_id],
            )?,
            None => self.conn.execute(
                "DELETE FROM food_items
                 WHERE id IN (SELECT id FROM food_items WHERE name = ?1 LIMIT 1);",
                params![name],
            )?,
        };

        Ok(changed > 0)
    }

    fn lookup(&self, name: &str, unit: Option<&str>) -> RepoResult<Option<FoodRecord>> {
        let row = match unit {
            Some(unit) => self
                .conn
                .query_row(
                    &format!("{FOOD_SELECT_SQL} WHERE name = ?1 AND unit = ?2;"),
                    params![name, unit],
                    parse_food_row,
                )
                .optional()?,
            None => self
                .conn
                .query_row(
                    &format!("{FOOD_SELECT_SQL} WHERE name = ?1;"),
                    params![name],
                    parse_food_row,
                )
                .optional()?,
        };

        row.transpose()
    }

    fn lookup_by_remote_id(&self, remote_id: &str) -> RepoResult<Option<FoodRecord>> {
        let row = self
            .conn
            .query_row(
                &format!("{FOOD_SELECT_SQL} WHERE remote_id = ?1;"),
                params![remote_id],
                parse_food_row,
            )
            .optional()?;

        row.transpose()
    }

    fn list_all(&self) -> RepoResult<Vec<FoodRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{FOOD_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            records.push(parse_food_row(row)??);
        }

        Ok(records)
    }

    fn deduplicate(&self) -> RepoResult<usize> {
        // Rows without a remote id are distinct records by definition and
        // must not be collapsed into one NULL group.
        let removed = self.conn.execute(
            "DELETE FROM food_items
             WHERE remote_id IS NOT NULL
               AND id NOT IN (
                   SELECT MIN(id)
                   FROM food_items
                   WHERE remote_id IS NOT NULL
                   GROUP BY remote_id
               );",
            [],
        )?;

        Ok(removed)
    }

    fn clear(&self) -> RepoResult<usize> {
        let removed = self.conn.execute("DELETE FROM food_items;", [])?;
        Ok(removed)
    }
}

fn parse_food_row(row: &Row<'_>) -> rusqlite::Result<RepoResult<FoodRecord>> {
    let calories: f64 = row.get("calories")?;
    let record = FoodRecord {
        name: row.get("name")?,
        calories,
        unit: row.get("unit")?,
        protein: row.get("protein")?,
        fat: row.get("fat")?,
        carbs: row.get("carbs")?,
        grams: row.get("grams")?,
        remote_id: row.get("remote_id")?,
    };

    if record.name.is_empty() {
        return Ok(Err(RepoError::InvalidData(
            "empty name in food_items.name".to_string(),
        )));
    }
    Ok(Ok(record))
}
