//! Payment event query builders.

use sea_query::{OnConflict, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::PaymentEvents;

/// Parameters for recording a verified payment webhook.
pub struct InsertParams<'a> {
    pub id: &'a str,
    pub provider_payment_id: &'a str,
    pub order_id: Option<&'a str>,
    pub session_id: Option<&'a str>,
    pub event: &'a str,
    pub amount_minor: i64,
    pub currency: &'a str,
    pub received_at: i64,
}

/// INSERT a payment event; a repeated `provider_payment_id` is ignored
/// (zero rows changed).
pub fn insert_ignore(p: &InsertParams<'_>) -> Built {
    Query::insert()
        .into_table(PaymentEvents::Table)
        .columns([
            PaymentEvents::Id,
            PaymentEvents::ProviderPaymentId,
            PaymentEvents::OrderId,
            PaymentEvents::SessionId,
            PaymentEvents::Event,
            PaymentEvents::AmountMinor,
            PaymentEvents::Currency,
            PaymentEvents::ReceivedAt,
        ])
        .values_panic([
            p.id.into(),
            p.provider_payment_id.into(),
            p.order_id.map(str::to_string).into(),
            p.session_id.map(str::to_string).into(),
            p.event.into(),
            p.amount_minor.into(),
            p.currency.into(),
            p.received_at.into(),
        ])
        .on_conflict(
            OnConflict::column(PaymentEvents::ProviderPaymentId)
                .do_nothing()
                .to_owned(),
        )
        .build(SqliteQueryBuilder)
}
