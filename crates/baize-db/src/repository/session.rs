//! # Session Repository
//!
//! Database operations for rental sessions.
//!
//! ## Storage model
//! A session persists as one row with its snapshots and line items embedded
//! as JSON documents, mirroring the aggregate. Item mutations rewrite the
//! items column in a single guarded `UPDATE ... WHERE status = 'open'`
//! (last-write-wins per session); the guard keeps settled sessions
//! immutable even under racing writers.
//!
//! ## Uniqueness
//! The partial unique index `sessions(station_id) WHERE status = 'open'`
//! makes a second concurrent check-in fail with a unique violation - that
//! violation, not any pre-check, is the authoritative conflict signal.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use baize_core::{BillingRule, RateSnapshot, Session, SessionItem, SessionStatus};

// =============================================================================
// Row mapping
// =============================================================================

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    station_id: String,
    station_type_id: Option<String>,
    branch_id: Option<String>,
    pricing: String,
    billing_rule: String,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    duration_minutes: Option<i64>,
    items: String,
    staff_start: Option<String>,
    staff_end: Option<String>,
    note: String,
    status: SessionStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for Session {
    type Error = DbError;

    fn try_from(r: SessionRow) -> DbResult<Session> {
        let pricing: RateSnapshot = serde_json::from_str(&r.pricing)?;
        let billing_rule: BillingRule = serde_json::from_str(&r.billing_rule)?;
        let items: Vec<SessionItem> = serde_json::from_str(&r.items)?;
        Ok(Session {
            id: r.id,
            station_id: r.station_id,
            station_type_id: r.station_type_id,
            branch_id: r.branch_id,
            pricing,
            billing_rule,
            start_time: r.start_time,
            end_time: r.end_time,
            duration_minutes: r.duration_minutes,
            items,
            staff_start: r.staff_start,
            staff_end: r.staff_end,
            note: r.note,
            status: r.status,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

const SESSION_COLUMNS: &str = "id, station_id, station_type_id, branch_id, pricing, \
     billing_rule, start_time, end_time, duration_minutes, items, staff_start, staff_end, \
     note, status, created_at, updated_at";

async fn fetch_session(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Session>> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
    let row: Option<SessionRow> = sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    row.map(Session::try_from).transpose()
}

// =============================================================================
// SessionRepository
// =============================================================================

/// Repository for session database operations.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    /// Creates a new SessionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SessionRepository { pool }
    }

    /// Gets a session by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Session>> {
        let mut conn = self.pool.acquire().await?;
        fetch_session(&mut conn, id).await
    }

    /// Gets a session by ID on an existing connection (transactional
    /// re-fetch at checkout).
    pub async fn get_by_id_conn(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<Session>> {
        fetch_session(conn, id).await
    }

    /// Gets the open session for a station, if any.
    pub async fn get_open_by_station(&self, station_id: &str) -> DbResult<Option<Session>> {
        let sql =
            format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE station_id = ?1 AND status = 'open'");
        let row: Option<SessionRow> = sqlx::query_as(&sql)
            .bind(station_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Session::try_from).transpose()
    }

    /// Inserts a new session inside a transaction.
    ///
    /// A [`DbError::UniqueViolation`] here means the station already has an
    /// open session (the partial unique index fired).
    pub async fn insert_conn(&self, conn: &mut SqliteConnection, session: &Session) -> DbResult<()> {
        debug!(id = %session.id, station_id = %session.station_id, "Inserting session");

        let pricing = serde_json::to_string(&session.pricing)?;
        let billing_rule = serde_json::to_string(&session.billing_rule)?;
        let items = serde_json::to_string(&session.items)?;

        sqlx::query(
            r#"
            INSERT INTO sessions (
                id, station_id, station_type_id, branch_id, pricing, billing_rule,
                start_time, end_time, duration_minutes, items, staff_start, staff_end,
                note, status, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10, ?11, ?12,
                ?13, ?14, ?15, ?16
            )
            "#,
        )
        .bind(&session.id)
        .bind(&session.station_id)
        .bind(&session.station_type_id)
        .bind(&session.branch_id)
        .bind(pricing)
        .bind(billing_rule)
        .bind(session.start_time)
        .bind(session.end_time)
        .bind(session.duration_minutes)
        .bind(items)
        .bind(&session.staff_start)
        .bind(&session.staff_end)
        .bind(&session.note)
        .bind(session.status)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Rewrites a session's embedded items (last-write-wins).
    ///
    /// Guarded by `status = 'open'`: once settled, a session's items are
    /// frozen, so a racing mutation surfaces as NotFound.
    pub async fn update_items(&self, session: &Session) -> DbResult<()> {
        let items = serde_json::to_string(&session.items)?;
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE sessions SET items = ?2, updated_at = ?3 WHERE id = ?1 AND status = 'open'",
        )
        .bind(&session.id)
        .bind(items)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Session (open)", &session.id));
        }
        Ok(())
    }

    /// Persists a terminal transition (`closed` or `void`) inside a
    /// transaction.
    ///
    /// Guarded by `status = 'open'`; zero affected rows means the session
    /// was settled concurrently, aborting the surrounding transaction.
    pub async fn finalize_conn(&self, conn: &mut SqliteConnection, session: &Session) -> DbResult<()> {
        debug!(id = %session.id, status = %session.status, "Finalizing session");

        let result = sqlx::query(
            r#"
            UPDATE sessions SET
                status = ?2,
                end_time = ?3,
                duration_minutes = ?4,
                staff_end = ?5,
                updated_at = ?6
            WHERE id = ?1 AND status = 'open'
            "#,
        )
        .bind(&session.id)
        .bind(session.status)
        .bind(session.end_time)
        .bind(session.duration_minutes)
        .bind(&session.staff_end)
        .bind(session.updated_at)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Session (open)", &session.id));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
