//! # Station Repositories
//!
//! Database operations for stations and their rate-schedule profiles.
//!
//! The engine only drives `available ↔ occupied` transitions; everything
//! else on these tables is administrative catalog data owned by excluded
//! layers, so the surface here is deliberately small: lookups, inserts for
//! seeding, and the status flip used inside check-in/checkout transactions.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use baize_core::{DayRate, Station, StationStatus, StationType};

// =============================================================================
// Row mapping
// =============================================================================

#[derive(sqlx::FromRow)]
struct StationRow {
    id: String,
    branch_id: Option<String>,
    name: String,
    station_type_id: String,
    rate_per_hour: Option<i64>,
    status: StationStatus,
    order_index: i64,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StationRow> for Station {
    fn from(r: StationRow) -> Self {
        Station {
            id: r.id,
            branch_id: r.branch_id,
            name: r.name,
            station_type_id: r.station_type_id,
            rate_per_hour: r.rate_per_hour,
            status: r.status,
            order_index: r.order_index,
            active: r.active,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

const STATION_COLUMNS: &str = "id, branch_id, name, station_type_id, rate_per_hour, \
     status, order_index, active, created_at, updated_at";

async fn fetch_station(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Station>> {
    let sql = format!("SELECT {STATION_COLUMNS} FROM stations WHERE id = ?1");
    let row: Option<StationRow> = sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(Station::from))
}

// =============================================================================
// StationRepository
// =============================================================================

/// Repository for station database operations.
#[derive(Debug, Clone)]
pub struct StationRepository {
    pool: SqlitePool,
}

impl StationRepository {
    /// Creates a new StationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StationRepository { pool }
    }

    /// Gets a station by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Station>> {
        let mut conn = self.pool.acquire().await?;
        fetch_station(&mut conn, id).await
    }

    /// Gets a station by ID on an existing connection (transactional reads).
    pub async fn get_by_id_conn(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<Station>> {
        fetch_station(conn, id).await
    }

    /// Lists stations ordered for the station grid.
    pub async fn list(&self) -> DbResult<Vec<Station>> {
        let sql = format!("SELECT {STATION_COLUMNS} FROM stations ORDER BY order_index, name");
        let rows: Vec<StationRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Station::from).collect())
    }

    /// Inserts a station.
    pub async fn insert(&self, station: &Station) -> DbResult<()> {
        debug!(id = %station.id, name = %station.name, "Inserting station");

        sqlx::query(
            r#"
            INSERT INTO stations (
                id, branch_id, name, station_type_id, rate_per_hour,
                status, order_index, active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&station.id)
        .bind(&station.branch_id)
        .bind(&station.name)
        .bind(&station.station_type_id)
        .bind(station.rate_per_hour)
        .bind(station.status)
        .bind(station.order_index)
        .bind(station.active)
        .bind(station.created_at)
        .bind(station.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Flips a station's operational status inside a transaction.
    ///
    /// Fails with NotFound when the station row is gone, which aborts the
    /// surrounding check-in/checkout transaction.
    pub async fn set_status_conn(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        status: StationStatus,
    ) -> DbResult<()> {
        let now = Utc::now();
        let result = sqlx::query("UPDATE stations SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .bind(now)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Station", id));
        }
        Ok(())
    }
}

// =============================================================================
// StationTypeRepository
// =============================================================================

#[derive(sqlx::FromRow)]
struct StationTypeRow {
    id: String,
    name: String,
    base_rate_per_hour: i64,
    day_rates: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StationTypeRow> for StationType {
    type Error = DbError;

    fn try_from(r: StationTypeRow) -> DbResult<StationType> {
        let day_rates: Vec<DayRate> = serde_json::from_str(&r.day_rates)?;
        Ok(StationType {
            id: r.id,
            name: r.name,
            base_rate_per_hour: r.base_rate_per_hour,
            day_rates,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Repository for station type (rate-schedule profile) operations.
#[derive(Debug, Clone)]
pub struct StationTypeRepository {
    pool: SqlitePool,
}

impl StationTypeRepository {
    /// Creates a new StationTypeRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StationTypeRepository { pool }
    }

    /// Gets a station type by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<StationType>> {
        let mut conn = self.pool.acquire().await?;
        self.get_by_id_conn(&mut conn, id).await
    }

    /// Gets a station type by ID on an existing connection.
    pub async fn get_by_id_conn(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<StationType>> {
        let row: Option<StationTypeRow> = sqlx::query_as(
            "SELECT id, name, base_rate_per_hour, day_rates, created_at, updated_at \
             FROM station_types WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;

        row.map(StationType::try_from).transpose()
    }

    /// Inserts a station type; `day_rates` order is preserved as stored.
    pub async fn insert(&self, ty: &StationType) -> DbResult<()> {
        debug!(id = %ty.id, name = %ty.name, "Inserting station type");
        let day_rates = serde_json::to_string(&ty.day_rates)?;

        sqlx::query(
            r#"
            INSERT INTO station_types (
                id, name, base_rate_per_hour, day_rates, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&ty.id)
        .bind(&ty.name)
        .bind(ty.base_rate_per_hour)
        .bind(day_rates)
        .bind(ty.created_at)
        .bind(ty.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
