use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};

use tableside_api::{
    ActivityRequest, ActivityResponse, ReleaseResponse, SessionView, StartSessionResponse, db,
    now_unix,
};

use crate::AppConfig;
use crate::error::ApiErr;
use crate::lifecycle;
use crate::storage::{Db, session_from_row, sq_query_opt};

// ---------------------------------------------------------------------------
// Start / inspect
// ---------------------------------------------------------------------------

/// POST /api/tables/:id/sessions: open a session, or resume the live one.
///
/// `201 Created` for a new session, `200 OK` when the active one is handed back.
pub async fn start_session(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    Path(table_id): Path<String>,
) -> Result<(StatusCode, Json<StartSessionResponse>), ApiErr> {
    let started = lifecycle::start_session(
        &mut db.conn(),
        &table_id,
        now_unix(),
        config.session_timeout_secs,
    )?;
    let status = if started.resumed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(started)))
}

/// GET /api/sessions/:id
pub async fn get_session(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiErr> {
    let session = sq_query_opt(&db.conn(), db::sessions::get_by_id(&id), session_from_row)
        .map_err(ApiErr::from_db("load session"))?
        .ok_or_else(|| ApiErr::not_found("session not found"))?;
    Ok(Json(session))
}

// ---------------------------------------------------------------------------
// Activity
// ---------------------------------------------------------------------------

fn parse_activity(body: &[u8]) -> Result<ActivityRequest, ApiErr> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ActivityRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiErr::bad_request(format!("invalid activity body: {e}")))
}

/// POST /api/sessions/:id/activity: heartbeat. An empty body counts as one.
pub async fn record_activity(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ActivityResponse>, ApiErr> {
    let req = parse_activity(&body)?;
    let ack = lifecycle::record_activity(
        &mut db.conn(),
        &id,
        now_unix(),
        config.session_timeout_secs,
    )?;
    tracing::debug!(
        "Activity on session {id} ({:?}), active={}",
        req.source,
        ack.active
    );
    Ok(Json(ack))
}

// ---------------------------------------------------------------------------
// Release
// ---------------------------------------------------------------------------

/// POST /api/sessions/:id/release: end a visit from the customer side.
pub async fn release_session(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<Json<ReleaseResponse>, ApiErr> {
    let released = lifecycle::release_session(&mut db.conn(), &id, now_unix())?;
    Ok(Json(released))
}

/// POST /api/tables/:id/release: staff frees a table.
pub async fn release_table(
    State(db): State<Db>,
    Path(table_id): Path<String>,
) -> Result<Json<ReleaseResponse>, ApiErr> {
    let released = lifecycle::release_table(&mut db.conn(), &table_id, now_unix())?;
    Ok(Json(released))
}
