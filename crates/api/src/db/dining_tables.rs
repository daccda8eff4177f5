//! Dining table query builders.

use sea_query::{Expr, Order, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::{DiningTables, TableSessions};
use crate::{SessionStatus, TableStatus};

/// INSERT a new table (starts `available`).
pub fn insert(id: &str, restaurant_id: &str, label: &str, created_at: i64) -> Built {
    Query::insert()
        .into_table(DiningTables::Table)
        .columns([
            DiningTables::Id,
            DiningTables::RestaurantId,
            DiningTables::Label,
            DiningTables::Status,
            DiningTables::CreatedAt,
        ])
        .values_panic([
            id.into(),
            restaurant_id.into(),
            label.into(),
            TableStatus::Available.as_str().into(),
            created_at.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// Base SELECT with the active session (if any) LEFT JOINed in.
/// Column order must match `table_from_row()`.
fn table_select() -> sea_query::SelectStatement {
    Query::select()
        .column((DiningTables::Table, DiningTables::Id))
        .column((DiningTables::Table, DiningTables::RestaurantId))
        .column((DiningTables::Table, DiningTables::Label))
        .column((DiningTables::Table, DiningTables::Status))
        .column((TableSessions::Table, TableSessions::Id))
        .from(DiningTables::Table)
        .left_join(
            TableSessions::Table,
            Expr::col((TableSessions::Table, TableSessions::TableId))
                .equals((DiningTables::Table, DiningTables::Id))
                .and(
                    Expr::col((TableSessions::Table, TableSessions::Status))
                        .eq(SessionStatus::Active.as_str()),
                ),
        )
        .to_owned()
}

/// SELECT a table by id.
pub fn get_by_id(id: &str) -> Built {
    table_select()
        .and_where(Expr::col((DiningTables::Table, DiningTables::Id)).eq(id))
        .build(SqliteQueryBuilder)
}

/// SELECT all tables of a restaurant, ordered by label.
pub fn list_by_restaurant(restaurant_id: &str) -> Built {
    table_select()
        .and_where(Expr::col((DiningTables::Table, DiningTables::RestaurantId)).eq(restaurant_id))
        .order_by((DiningTables::Table, DiningTables::Label), Order::Asc)
        .build(SqliteQueryBuilder)
}

/// UPDATE a single table's status.
pub fn set_status(id: &str, status: TableStatus) -> Built {
    Query::update()
        .table(DiningTables::Table)
        .value(DiningTables::Status, status.as_str())
        .and_where(Expr::col(DiningTables::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Set `available` on a table unless it still has an active session.
pub fn release_if_unoccupied(id: &str) -> Built {
    Query::update()
        .table(DiningTables::Table)
        .value(DiningTables::Status, TableStatus::Available.as_str())
        .and_where(Expr::col(DiningTables::Id).eq(id))
        .and_where(
            Expr::col(DiningTables::Id).not_in_subquery(
                Query::select()
                    .column(TableSessions::TableId)
                    .from(TableSessions::Table)
                    .and_where(
                        Expr::col(TableSessions::Status).eq(SessionStatus::Active.as_str()),
                    )
                    .to_owned(),
            ),
        )
        .build(SqliteQueryBuilder)
}
