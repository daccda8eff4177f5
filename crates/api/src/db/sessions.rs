//! Table session query builders.

use sea_query::{Expr, Order, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::TableSessions;
use crate::SessionStatus;

// ── Helpers ────────────────────────────────────────────────────────────────

/// Base SELECT for a session row.
/// Column order must match `session_from_row()`.
fn session_select() -> sea_query::SelectStatement {
    Query::select()
        .column(TableSessions::Id)
        .column(TableSessions::TableId)
        .column(TableSessions::RestaurantId)
        .column(TableSessions::Status)
        .column(TableSessions::StartedAt)
        .column(TableSessions::LastActivityAt)
        .column(TableSessions::EndedAt)
        .from(TableSessions::Table)
        .to_owned()
}

fn is_active() -> sea_query::SimpleExpr {
    Expr::col(TableSessions::Status).eq(SessionStatus::Active.as_str())
}

// ── Queries ────────────────────────────────────────────────────────────────

/// INSERT a new active session.
pub fn insert(id: &str, table_id: &str, restaurant_id: &str, now: i64) -> Built {
    Query::insert()
        .into_table(TableSessions::Table)
        .columns([
            TableSessions::Id,
            TableSessions::TableId,
            TableSessions::RestaurantId,
            TableSessions::Status,
            TableSessions::StartedAt,
            TableSessions::LastActivityAt,
        ])
        .values_panic([
            id.into(),
            table_id.into(),
            restaurant_id.into(),
            SessionStatus::Active.as_str().into(),
            now.into(),
            now.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// SELECT a session by id.
pub fn get_by_id(id: &str) -> Built {
    session_select()
        .and_where(Expr::col(TableSessions::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// SELECT the active session of a table, if any.
pub fn active_for_table(table_id: &str) -> Built {
    session_select()
        .and_where(Expr::col(TableSessions::TableId).eq(table_id))
        .and_where(is_active())
        .build(SqliteQueryBuilder)
}

/// Record activity on an active session. Affects zero rows once the session
/// is terminal. `last_activity_at` never moves backwards.
pub fn touch(id: &str, now: i64) -> Built {
    Query::update()
        .table(TableSessions::Table)
        .value(
            TableSessions::LastActivityAt,
            Expr::cust_with_values("MAX(\"last_activity_at\", ?)", [now]),
        )
        .and_where(Expr::col(TableSessions::Id).eq(id))
        .and_where(is_active())
        .build(SqliteQueryBuilder)
}

/// Move an active session to a terminal status.
pub fn end(id: &str, status: SessionStatus, now: i64) -> Built {
    Query::update()
        .table(TableSessions::Table)
        .values([
            (TableSessions::Status, status.as_str().into()),
            (TableSessions::EndedAt, now.into()),
        ])
        .and_where(Expr::col(TableSessions::Id).eq(id))
        .and_where(is_active())
        .build(SqliteQueryBuilder)
}

/// SELECT active sessions last seen before `cutoff`, oldest first.
/// Terminal sessions are never returned.
pub fn idle_before(cutoff: i64) -> Built {
    session_select()
        .and_where(is_active())
        .and_where(Expr::col(TableSessions::LastActivityAt).lt(cutoff))
        .order_by(TableSessions::LastActivityAt, Order::Asc)
        .build(SqliteQueryBuilder)
}

/// Expire one session, re-checking that it is still active and still idle.
pub fn expire_if_idle(id: &str, cutoff: i64, now: i64) -> Built {
    Query::update()
        .table(TableSessions::Table)
        .values([
            (TableSessions::Status, SessionStatus::Expired.as_str().into()),
            (TableSessions::EndedAt, now.into()),
        ])
        .and_where(Expr::col(TableSessions::Id).eq(id))
        .and_where(is_active())
        .and_where(Expr::col(TableSessions::LastActivityAt).lt(cutoff))
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_only_updates_active_sessions() {
        let (sql, values) = touch("s1", 42);
        assert!(sql.contains("MAX(\"last_activity_at\", ?)"));
        assert!(sql.contains("\"status\" = ?"));
        assert_eq!(values.0[0], sea_query::Value::from(42i64));
        assert!(values.0.contains(&sea_query::Value::from("active")));
    }

    #[test]
    fn idle_scan_excludes_terminal_sessions() {
        let (sql, values) = idle_before(100);
        assert!(sql.contains("\"last_activity_at\" < ?"));
        assert!(sql.contains("ORDER BY \"last_activity_at\" ASC"));
        assert!(values.0.contains(&sea_query::Value::from("active")));
        assert!(values.0.contains(&sea_query::Value::from(100i64)));
    }

    #[test]
    fn end_binds_terminal_status() {
        let (_, values) = end("s1", SessionStatus::Cancelled, 7);
        assert_eq!(values.0[0], sea_query::Value::from("cancelled"));
        assert_eq!(values.0[1], sea_query::Value::from(7i64));
    }
}
