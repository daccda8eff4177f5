//! Table session lifecycle against the server database.
//!
//! Every multi-statement operation runs in one transaction, so the
//! one-active-session-per-table and occupied-while-active invariants hold
//! between requests.

use rusqlite::Connection;
use tracing::{debug, info};

use tableside_api::service::{self, StartDecision};
use tableside_api::{
    ActivityResponse, CleanupResponse, ReleaseResponse, ServiceError, SessionStatus, SessionView,
    StartSessionResponse, TableStatus, db, new_id,
};
use tableside_core::session::{SessionEvent, idle_cutoff, is_idle};

use crate::storage::{
    restaurant_from_row, session_from_row, sq_execute, sq_query_map, sq_query_opt, table_from_row,
};

type Result<T> = std::result::Result<T, ServiceError>;

/// Drive `session` through `event` and persist the terminal state it lands in.
/// Returns `false` when the session had already ended.
fn end_session(
    conn: &Connection,
    session: &SessionView,
    event: SessionEvent,
    now: i64,
) -> Result<bool> {
    let next = match session.status.apply(event) {
        Ok(next) if next.is_terminal() => next,
        Ok(_) => {
            return Err(ServiceError::Internal(format!(
                "{event} does not end a session"
            )));
        }
        Err(e) => {
            debug!("Session {}: {e}", session.id);
            return Ok(false);
        }
    };
    let changed = sq_execute(conn, db::sessions::end(&session.id, next, now))
        .map_err(ServiceError::from_db("end session"))?;
    Ok(changed > 0)
}

/// Open (or resume) the active session of a table.
pub fn start_session(
    conn: &mut Connection,
    table_id: &str,
    now: i64,
    timeout_secs: u64,
) -> Result<StartSessionResponse> {
    let tx = conn
        .transaction()
        .map_err(ServiceError::from_db("begin start session"))?;

    let table = sq_query_opt(&tx, db::dining_tables::get_by_id(table_id), table_from_row)
        .map_err(ServiceError::from_db("load table"))?
        .ok_or_else(|| ServiceError::NotFound("table not found".into()))?;

    let restaurant = sq_query_opt(
        &tx,
        db::restaurants::get_by_id(&table.restaurant_id),
        restaurant_from_row,
    )
    .map_err(ServiceError::from_db("load restaurant"))?
    .ok_or_else(|| ServiceError::NotFound("restaurant not found".into()))?;

    service::ensure_service_allowed(
        restaurant.subscription_status,
        restaurant.subscription_expires_at,
        now,
    )?;

    let existing = sq_query_opt(&tx, db::sessions::active_for_table(table_id), session_from_row)
        .map_err(ServiceError::from_db("load active session"))?;

    if existing.is_none() && table.status == TableStatus::Reserved {
        return Err(ServiceError::Conflict("table is reserved".into()));
    }

    match service::decide_start(existing, now, timeout_secs) {
        StartDecision::Resume(session) => {
            sq_execute(&tx, db::sessions::touch(&session.id, now))
                .map_err(ServiceError::from_db("touch session"))?;
            let session = sq_query_opt(&tx, db::sessions::get_by_id(&session.id), session_from_row)
                .map_err(ServiceError::from_db("reload session"))?
                .ok_or_else(|| ServiceError::Internal("resumed session vanished".into()))?;
            tx.commit()
                .map_err(ServiceError::from_db("commit start session"))?;
            debug!("Resumed session {} on table {}", session.id, table_id);
            return Ok(StartSessionResponse {
                session,
                resumed: true,
            });
        }
        StartDecision::ReplaceIdle { idle } => {
            if end_session(&tx, &idle, SessionEvent::Expire, now)? {
                info!("Expired idle session {} on table {table_id} before reopening", idle.id);
            }
        }
        StartDecision::Create => {}
    }

    let session_id = new_id();
    sq_execute(
        &tx,
        db::sessions::insert(&session_id, table_id, &table.restaurant_id, now),
    )
    .map_err(ServiceError::from_db("insert session"))?;
    sq_execute(
        &tx,
        db::dining_tables::set_status(table_id, TableStatus::Occupied),
    )
    .map_err(ServiceError::from_db("occupy table"))?;

    let session = sq_query_opt(&tx, db::sessions::get_by_id(&session_id), session_from_row)
        .map_err(ServiceError::from_db("reload session"))?
        .ok_or_else(|| ServiceError::Internal("inserted session vanished".into()))?;
    tx.commit()
        .map_err(ServiceError::from_db("commit start session"))?;

    info!("Opened session {session_id} on table {table_id}");
    Ok(StartSessionResponse {
        session,
        resumed: false,
    })
}

/// Heartbeat: refresh `last_activity_at` of an active session.
///
/// A session already silent for longer than `timeout_secs` is not revived:
/// it is expired here and its table freed, as a start or the next cleanup
/// would do at the same instant.
pub fn record_activity(
    conn: &mut Connection,
    session_id: &str,
    now: i64,
    timeout_secs: u64,
) -> Result<ActivityResponse> {
    let tx = conn
        .transaction()
        .map_err(ServiceError::from_db("begin activity"))?;

    let session = sq_query_opt(&tx, db::sessions::get_by_id(session_id), session_from_row)
        .map_err(ServiceError::from_db("load session"))?
        .ok_or_else(|| ServiceError::NotFound("session not found".into()))?;

    let event = if is_idle(session.last_activity_at, now, timeout_secs) {
        SessionEvent::Expire
    } else {
        SessionEvent::Touch
    };

    match session.status.apply(event) {
        Ok(SessionStatus::Active) => {
            sq_execute(&tx, db::sessions::touch(session_id, now))
                .map_err(ServiceError::from_db("touch session"))?;
        }
        Ok(_) => {
            if end_session(&tx, &session, event, now)? {
                sq_execute(&tx, db::dining_tables::release_if_unoccupied(&session.table_id))
                    .map_err(ServiceError::from_db("release table"))?;
                info!(
                    "Expired session {session_id} on late heartbeat ({}s silent)",
                    now - session.last_activity_at
                );
            }
        }
        Err(e) => debug!("Heartbeat ignored: {e}"),
    }

    let session = sq_query_opt(&tx, db::sessions::get_by_id(session_id), session_from_row)
        .map_err(ServiceError::from_db("reload session"))?
        .ok_or_else(|| ServiceError::Internal("session vanished".into()))?;
    tx.commit()
        .map_err(ServiceError::from_db("commit activity"))?;

    Ok(ActivityResponse {
        session_id: session.id,
        active: session.status == SessionStatus::Active,
        last_activity_at: Some(session.last_activity_at),
    })
}

/// Release a table: cancel its active session (if any) and mark it available.
pub fn release_table(conn: &mut Connection, table_id: &str, now: i64) -> Result<ReleaseResponse> {
    let tx = conn
        .transaction()
        .map_err(ServiceError::from_db("begin release"))?;

    sq_query_opt(&tx, db::dining_tables::get_by_id(table_id), table_from_row)
        .map_err(ServiceError::from_db("load table"))?
        .ok_or_else(|| ServiceError::NotFound("table not found".into()))?;

    let active = sq_query_opt(&tx, db::sessions::active_for_table(table_id), session_from_row)
        .map_err(ServiceError::from_db("load active session"))?;

    let cancelled_session_id = match active {
        Some(session) if end_session(&tx, &session, SessionEvent::Release, now)? => {
            Some(session.id)
        }
        _ => None,
    };

    sq_execute(
        &tx,
        db::dining_tables::set_status(table_id, TableStatus::Available),
    )
    .map_err(ServiceError::from_db("release table"))?;
    tx.commit().map_err(ServiceError::from_db("commit release"))?;

    info!(
        "Released table {table_id} (cancelled session: {})",
        cancelled_session_id.as_deref().unwrap_or("none")
    );
    Ok(ReleaseResponse {
        table_id: table_id.to_string(),
        table_status: TableStatus::Available,
        cancelled_session_id,
    })
}

/// Release through a session id. Releasing an already-ended session leaves the
/// table untouched, since it may belong to a newer visit by now.
pub fn release_session(
    conn: &mut Connection,
    session_id: &str,
    now: i64,
) -> Result<ReleaseResponse> {
    let session = sq_query_opt(conn, db::sessions::get_by_id(session_id), session_from_row)
        .map_err(ServiceError::from_db("load session"))?
        .ok_or_else(|| ServiceError::NotFound("session not found".into()))?;

    if let Err(e) = session.status.apply(SessionEvent::Release) {
        let table =
            sq_query_opt(conn, db::dining_tables::get_by_id(&session.table_id), table_from_row)
                .map_err(ServiceError::from_db("load table"))?
                .ok_or_else(|| ServiceError::NotFound("table not found".into()))?;
        debug!("Session {session_id}: {e}; release is a no-op");
        return Ok(ReleaseResponse {
            table_id: table.id,
            table_status: table.status,
            cancelled_session_id: None,
        });
    }

    release_table(conn, &session.table_id, now)
}

/// Expire every active session idle for longer than `timeout_secs` and free
/// its table. Re-running with the same `now` changes nothing.
pub fn cleanup_idle(conn: &mut Connection, now: i64, timeout_secs: u64) -> Result<CleanupResponse> {
    let cutoff = idle_cutoff(now, timeout_secs);
    let tx = conn
        .transaction()
        .map_err(ServiceError::from_db("begin cleanup"))?;

    let idle = sq_query_map(&tx, db::sessions::idle_before(cutoff), session_from_row)
        .map_err(ServiceError::from_db("scan idle sessions"))?;

    let mut report = CleanupResponse {
        cutoff,
        ..CleanupResponse::default()
    };

    for session in idle {
        if session.status.apply(SessionEvent::Expire).is_err() {
            continue;
        }
        let SessionView { id: session_id, table_id, .. } = session;
        let expired = sq_execute(&tx, db::sessions::expire_if_idle(&session_id, cutoff, now))
            .map_err(ServiceError::from_db("expire session"))?;
        if expired == 0 {
            continue;
        }
        report.expired_sessions.push(session_id);

        let released = sq_execute(&tx, db::dining_tables::release_if_unoccupied(&table_id))
            .map_err(ServiceError::from_db("release table"))?;
        if released > 0 && !report.released_tables.contains(&table_id) {
            report.released_tables.push(table_id);
        }
    }

    tx.commit().map_err(ServiceError::from_db("commit cleanup"))?;

    if !report.expired_sessions.is_empty() {
        info!(
            "Expired {} idle session(s), released {} table(s)",
            report.expired_sessions.len(),
            report.released_tables.len()
        );
    }
    Ok(report)
}
