//! Restaurant query builders.

use sea_query::{Expr, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::Restaurants;
use crate::SubscriptionStatus;

/// INSERT a new restaurant.
pub fn insert(
    id: &str,
    name: &str,
    status: SubscriptionStatus,
    expires_at: Option<i64>,
    created_at: i64,
) -> Built {
    Query::insert()
        .into_table(Restaurants::Table)
        .columns([
            Restaurants::Id,
            Restaurants::Name,
            Restaurants::SubscriptionStatus,
            Restaurants::SubscriptionExpiresAt,
            Restaurants::CreatedAt,
        ])
        .values_panic([
            id.into(),
            name.into(),
            status.as_str().into(),
            expires_at.into(),
            created_at.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// SELECT a restaurant by id.
/// Column order must match `restaurant_from_row()`.
pub fn get_by_id(id: &str) -> Built {
    Query::select()
        .column(Restaurants::Id)
        .column(Restaurants::Name)
        .column(Restaurants::SubscriptionStatus)
        .column(Restaurants::SubscriptionExpiresAt)
        .column(Restaurants::CreatedAt)
        .from(Restaurants::Table)
        .and_where(Expr::col(Restaurants::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// UPDATE the subscription state of a restaurant.
pub fn set_subscription(id: &str, status: SubscriptionStatus, expires_at: Option<i64>) -> Built {
    Query::update()
        .table(Restaurants::Table)
        .values([
            (Restaurants::SubscriptionStatus, status.as_str().into()),
            (Restaurants::SubscriptionExpiresAt, expires_at.into()),
        ])
        .and_where(Expr::col(Restaurants::Id).eq(id))
        .build(SqliteQueryBuilder)
}
