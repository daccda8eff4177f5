use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row, types::Type};
use std::path::Path;
use std::sync::{Arc, Mutex};

use tableside_api::db::Built;
use tableside_api::db::migrations::MIGRATIONS;
use tableside_api::{RestaurantResponse, SessionView, TableResponse};

/// Shared database state
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    pub fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }
}

/// Initialize the database: open connection, enable WAL, run migrations
pub fn init_db(data_dir: &Path) -> Result<Db> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("tableside.db");
    let conn = Connection::open(&db_path).context("opening SQLite database")?;

    // Enable WAL mode for better concurrent read performance
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;

    run_migrations(&conn)?;

    Ok(Db {
        conn: Arc::new(Mutex::new(conn)),
    })
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .unwrap_or(false);

        if !already_applied {
            conn.execute_batch(sql)
                .with_context(|| format!("running migration {name}"))?;
            conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])?;
            tracing::info!("Applied migration: {name}");
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// sea-query → rusqlite glue
// ---------------------------------------------------------------------------

/// Convert `sea_query::Values` into rusqlite bind params.
fn to_sql_values(values: &sea_query::Values) -> Vec<rusqlite::types::Value> {
    use rusqlite::types::Value as Sql;

    values
        .0
        .iter()
        .map(|v| match v {
            sea_query::Value::String(Some(s)) => Sql::Text(s.to_string()),
            sea_query::Value::Int(Some(i)) => Sql::Integer(i64::from(*i)),
            sea_query::Value::BigInt(Some(i)) => Sql::Integer(*i),
            sea_query::Value::BigUnsigned(Some(u)) => {
                Sql::Integer(tableside_api::saturating_i64(*u))
            }
            sea_query::Value::Bool(Some(b)) => Sql::Integer(i64::from(*b)),
            sea_query::Value::Bytes(Some(b)) => Sql::Blob(b.to_vec()),
            _ => Sql::Null,
        })
        .collect()
}

/// Execute a built statement, returning the number of changed rows.
pub fn sq_execute(conn: &Connection, built: Built) -> rusqlite::Result<usize> {
    let (sql, values) = built;
    conn.execute(&sql, rusqlite::params_from_iter(to_sql_values(&values)))
}

/// Query exactly one row.
pub fn sq_query_row<T, F>(conn: &Connection, built: Built, f: F) -> rusqlite::Result<T>
where
    F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
{
    let (sql, values) = built;
    conn.query_row(&sql, rusqlite::params_from_iter(to_sql_values(&values)), f)
}

/// Query at most one row.
pub fn sq_query_opt<T, F>(conn: &Connection, built: Built, f: F) -> rusqlite::Result<Option<T>>
where
    F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
{
    sq_query_row(conn, built, f).optional()
}

/// Query all rows.
pub fn sq_query_map<T, F>(conn: &Connection, built: Built, f: F) -> rusqlite::Result<Vec<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let (sql, values) = built;
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(to_sql_values(&values)), f)?;
    rows.collect()
}

// ---------------------------------------------------------------------------
// Row mappers (column order set by the query builders in tableside_api::db)
// ---------------------------------------------------------------------------

fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn session_from_row(row: &Row<'_>) -> rusqlite::Result<SessionView> {
    Ok(SessionView {
        id: row.get(0)?,
        table_id: row.get(1)?,
        restaurant_id: row.get(2)?,
        status: parse_col(row, 3)?,
        started_at: row.get(4)?,
        last_activity_at: row.get(5)?,
        ended_at: row.get(6)?,
    })
}

pub fn table_from_row(row: &Row<'_>) -> rusqlite::Result<TableResponse> {
    Ok(TableResponse {
        id: row.get(0)?,
        restaurant_id: row.get(1)?,
        label: row.get(2)?,
        status: parse_col(row, 3)?,
        active_session_id: row.get(4)?,
    })
}

pub fn restaurant_from_row(row: &Row<'_>) -> rusqlite::Result<RestaurantResponse> {
    Ok(RestaurantResponse {
        id: row.get(0)?,
        name: row.get(1)?,
        subscription_status: parse_col(row, 2)?,
        subscription_expires_at: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Fresh database under a temporary directory that lives as long as the guard.
#[cfg(test)]
pub(crate) fn temp_db() -> (tempfile::TempDir, Db) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let db = init_db(dir.path()).expect("init temp db");
    (dir, db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tableside_api::db;
    use tableside_api::{SubscriptionStatus, TableStatus};

    #[test]
    fn migrations_are_applied_once() {
        let dir = tempfile::tempdir().unwrap();
        init_db(dir.path()).unwrap();
        let db = init_db(dir.path()).unwrap();
        let applied: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }

    #[test]
    fn built_queries_round_trip_through_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let db = init_db(dir.path()).unwrap();
        let conn = db.conn();

        sq_execute(
            &conn,
            db::restaurants::insert("r1", "Cafe", SubscriptionStatus::Trial, Some(99), 1),
        )
        .unwrap();
        sq_execute(&conn, db::dining_tables::insert("t1", "r1", "A1", 1)).unwrap();

        let restaurant =
            sq_query_row(&conn, db::restaurants::get_by_id("r1"), restaurant_from_row).unwrap();
        assert_eq!(restaurant.subscription_status, SubscriptionStatus::Trial);
        assert_eq!(restaurant.subscription_expires_at, Some(99));

        let table = sq_query_row(&conn, db::dining_tables::get_by_id("t1"), table_from_row).unwrap();
        assert_eq!(table.status, TableStatus::Available);
        assert_eq!(table.active_session_id, None);

        let missing = sq_query_opt(&conn, db::sessions::get_by_id("nope"), session_from_row).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn unknown_status_text_is_a_conversion_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = init_db(dir.path()).unwrap();
        let conn = db.conn();
        conn.execute(
            "INSERT INTO restaurants (id, name, subscription_status, created_at) VALUES ('r1', 'x', 'paused', 0)",
            [],
        )
        .unwrap();
        let err = sq_query_row(&conn, db::restaurants::get_by_id("r1"), restaurant_from_row)
            .unwrap_err();
        assert!(matches!(
            err,
            rusqlite::Error::FromSqlConversionFailure(2, Type::Text, _)
        ));
    }

    #[test]
    fn payment_redelivery_is_recorded_once() {
        let dir = tempfile::tempdir().unwrap();
        let db = init_db(dir.path()).unwrap();
        let conn = db.conn();

        let event = |id| db::payments::InsertParams {
            id,
            provider_payment_id: "pay_1",
            order_id: Some("o1"),
            session_id: None,
            event: "payment.succeeded",
            amount_minor: 12_000,
            currency: "KRW",
            received_at: 5,
        };
        assert_eq!(sq_execute(&conn, db::payments::insert_ignore(&event("e1"))).unwrap(), 1);
        assert_eq!(sq_execute(&conn, db::payments::insert_ignore(&event("e2"))).unwrap(), 0);

        let (rows, id, session_id): (i64, String, Option<String>) = conn
            .query_row(
                "SELECT COUNT(*), MIN(id), MIN(session_id) FROM payment_events",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(id, "e1");
        assert_eq!(session_id, None);
    }

    #[test]
    fn session_table_columns_match_the_row_mapper() {
        let dir = tempfile::tempdir().unwrap();
        let db = init_db(dir.path()).unwrap();
        let conn = db.conn();
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('table_sessions')").unwrap();
        let columns: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(
            columns,
            [
                "id",
                "table_id",
                "restaurant_id",
                "status",
                "started_at",
                "last_activity_at",
                "ended_at"
            ]
        );
    }
}
