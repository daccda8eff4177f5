//! Compile-time–checked column identifiers for all tables.

use sea_query::Iden;

#[derive(Iden)]
pub enum Restaurants {
    Table,
    Id,
    Name,
    SubscriptionStatus,
    SubscriptionExpiresAt,
    CreatedAt,
}

#[derive(Iden)]
pub enum DiningTables {
    Table,
    Id,
    RestaurantId,
    Label,
    Status,
    CreatedAt,
}

#[derive(Iden)]
pub enum TableSessions {
    Table,
    Id,
    TableId,
    RestaurantId,
    Status,
    StartedAt,
    LastActivityAt,
    EndedAt,
}

#[derive(Iden)]
pub enum PaymentEvents {
    Table,
    Id,
    ProviderPaymentId,
    OrderId,
    SessionId,
    Event,
    AmountMinor,
    Currency,
    ReceivedAt,
}
