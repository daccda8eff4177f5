use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};

use tableside_api::{
    CreateRestaurantRequest, CreateTableRequest, ListTablesResponse, RestaurantResponse,
    SubscriptionResponse, SubscriptionStatus, TableResponse, db, new_id, now_unix, service,
};

use crate::AppConfig;
use crate::error::ApiErr;
use crate::routes::admin::require_admin;
use crate::storage::{Db, restaurant_from_row, sq_execute, sq_query_map, sq_query_opt, sq_query_row, table_from_row};

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn load_restaurant(conn: &rusqlite::Connection, id: &str) -> Result<RestaurantResponse, ApiErr> {
    sq_query_opt(conn, db::restaurants::get_by_id(id), restaurant_from_row)
        .map_err(ApiErr::from_db("load restaurant"))?
        .ok_or_else(|| ApiErr::not_found("restaurant not found"))
}

/// POST /api/restaurants: provision a restaurant (admin key required).
pub async fn create_restaurant(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    headers: HeaderMap,
    Json(req): Json<CreateRestaurantRequest>,
) -> Result<(StatusCode, Json<RestaurantResponse>), ApiErr> {
    require_admin(&config, &headers)?;
    let name = service::validate_restaurant_name(&req.name)?;
    let status = req.subscription_status.unwrap_or(SubscriptionStatus::Trial);

    let id = new_id();
    let conn = db.conn();
    sq_execute(
        &conn,
        db::restaurants::insert(&id, &name, status, req.subscription_expires_at, now_unix()),
    )
    .map_err(ApiErr::from_db("insert restaurant"))?;

    let restaurant = sq_query_row(&conn, db::restaurants::get_by_id(&id), restaurant_from_row)
        .map_err(ApiErr::from_db("reload restaurant"))?;
    tracing::info!("Created restaurant {id} ({status})");
    Ok((StatusCode::CREATED, Json(restaurant)))
}

/// GET /api/restaurants/:id/subscription: whether the restaurant may take orders.
pub async fn get_subscription(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<Json<SubscriptionResponse>, ApiErr> {
    let restaurant = load_restaurant(&db.conn(), &id)?;
    let service_allowed = restaurant
        .subscription_status
        .allows_service(restaurant.subscription_expires_at, now_unix());
    Ok(Json(SubscriptionResponse {
        restaurant_id: restaurant.id,
        status: restaurant.subscription_status,
        expires_at: restaurant.subscription_expires_at,
        service_allowed,
    }))
}

/// POST /api/restaurants/:id/tables: add a dining table (admin key required).
pub async fn create_table(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    Path(restaurant_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<CreateTableRequest>,
) -> Result<(StatusCode, Json<TableResponse>), ApiErr> {
    require_admin(&config, &headers)?;
    let label = service::validate_table_label(&req.label)?;

    let conn = db.conn();
    load_restaurant(&conn, &restaurant_id)?;

    let id = new_id();
    if let Err(e) = sq_execute(
        &conn,
        db::dining_tables::insert(&id, &restaurant_id, &label, now_unix()),
    ) {
        if is_unique_violation(&e) {
            return Err(ApiErr::conflict(format!("table label '{label}' already exists")));
        }
        return Err(ApiErr::from_db("insert table")(e));
    }

    let table = sq_query_row(&conn, db::dining_tables::get_by_id(&id), table_from_row)
        .map_err(ApiErr::from_db("reload table"))?;
    Ok((StatusCode::CREATED, Json(table)))
}

/// GET /api/restaurants/:id/tables: tables with their live status.
pub async fn list_tables(
    State(db): State<Db>,
    Path(restaurant_id): Path<String>,
) -> Result<Json<ListTablesResponse>, ApiErr> {
    let conn = db.conn();
    load_restaurant(&conn, &restaurant_id)?;
    let tables = sq_query_map(
        &conn,
        db::dining_tables::list_by_restaurant(&restaurant_id),
        table_from_row,
    )
    .map_err(ApiErr::from_db("list tables"))?;
    Ok(Json(ListTablesResponse { tables }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use tableside_api::deploy::ADMIN_KEY_HEADER;

    use crate::storage::temp_db;

    const ADMIN_KEY: &str = "s3cret";

    fn admin() -> (AppConfig, HeaderMap) {
        let config = AppConfig {
            admin_key: ADMIN_KEY.into(),
            ..AppConfig::default()
        };
        let mut headers = HeaderMap::new();
        headers.insert(ADMIN_KEY_HEADER, HeaderValue::from_static(ADMIN_KEY));
        (config, headers)
    }

    async fn add_table(db: &Db, restaurant_id: &str, label: &str) -> Result<TableResponse, ApiErr> {
        let (config, headers) = admin();
        let (status, Json(table)) = create_table(
            State(db.clone()),
            State(config),
            Path(restaurant_id.to_string()),
            headers,
            Json(CreateTableRequest {
                label: label.into(),
            }),
        )
        .await?;
        assert_eq!(status, StatusCode::CREATED);
        Ok(table)
    }

    fn seed_restaurant(db: &Db) {
        sq_execute(
            &db.conn(),
            db::restaurants::insert("r1", "Cafe", SubscriptionStatus::Active, None, 0),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn duplicate_table_label_is_a_conflict() {
        let (_dir, db) = temp_db();
        seed_restaurant(&db);

        let first = add_table(&db, "r1", "A1").await.unwrap();
        assert_eq!(first.label, "A1");

        let err = add_table(&db, "r1", " A1 ").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let Json(listed) = list_tables(State(db.clone()), Path("r1".into())).await.unwrap();
        assert_eq!(listed.tables.len(), 1);
    }

    #[tokio::test]
    async fn table_for_unknown_restaurant_is_not_found() {
        let (_dir, db) = temp_db();
        let err = add_table(&db, "nope", "A1").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn provisioning_without_admin_key_is_unauthorized() {
        let (_dir, db) = temp_db();
        seed_restaurant(&db);
        let (config, _) = admin();
        let err = create_table(
            State(db.clone()),
            State(config),
            Path("r1".into()),
            HeaderMap::new(),
            Json(CreateTableRequest { label: "A1".into() }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
