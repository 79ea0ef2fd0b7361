//! # Session Service
//!
//! Orchestrates the session lifecycle: check-in, item mutations, preview,
//! and administrative void.
//!
//! ## Check-in
//! Runs in one transaction: fetch station + type, resolve the rate, resolve
//! the billing rule (branch → global → default), insert the session, flip
//! the station to occupied. The partial unique index on open sessions is
//! the authoritative race guard - a violation is surfaced as a conflict,
//! not a generic database error.
//!
//! ## Item mutations
//! Load the aggregate, mutate through its methods (which enforce the
//! open-only invariant), write the items document back last-write-wins.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use baize_core::{
    resolve_rate, ClosePreview, CoreError, Money, PreviewDiscount, Session, StationStatus,
};
use baize_db::{Database, DbError};

use crate::error::{ServiceError, ServiceResult};

/// Session lifecycle operations.
#[derive(Debug, Clone)]
pub struct SessionService {
    db: Database,
}

impl SessionService {
    /// Creates a new SessionService.
    pub fn new(db: Database) -> Self {
        SessionService { db }
    }

    /// Opens a session on a station, capturing the pricing and billing-rule
    /// snapshots, and marks the station occupied. Atomic.
    ///
    /// Fails with `NotFound` for an unknown station, `Inactive` for a
    /// disabled one, and `OpenSessionExists` when the station already has
    /// an open session - including the case where a concurrent check-in won
    /// the race and this one lost at the uniqueness constraint.
    pub async fn check_in(
        &self,
        station_id: &str,
        staff_id: Option<String>,
        at: Option<DateTime<Utc>>,
    ) -> ServiceResult<Session> {
        let at = at.unwrap_or_else(Utc::now);
        debug!(station_id, "check_in");

        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;

        let station = self
            .db
            .stations()
            .get_by_id_conn(&mut tx, station_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Station", station_id))?;

        let station_type = self
            .db
            .station_types()
            .get_by_id_conn(&mut tx, &station.station_type_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("StationType", &station.station_type_id))?;

        let billing_rule = self
            .db
            .settings()
            .get_active_billing_rule_conn(&mut tx, station.branch_id.as_deref())
            .await?;

        let pricing = resolve_rate(&station, &station_type, at);
        let session = Session::open(&station, pricing, billing_rule, at, staff_id)?;

        if let Err(e) = self.db.sessions().insert_conn(&mut tx, &session).await {
            // The partial unique index fired: the station already has an
            // open session (possibly created by a racing check-in).
            return if e.is_unique_violation() {
                Err(CoreError::OpenSessionExists {
                    id: station.id.clone(),
                }
                .into())
            } else {
                Err(e.into())
            };
        }

        self.db
            .stations()
            .set_status_conn(&mut tx, &station.id, StationStatus::Occupied)
            .await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(
            session_id = %session.id,
            station_id = %station.id,
            rate = %session.pricing.rate_per_hour,
            "Session opened"
        );
        Ok(session)
    }

    /// Adds a product to an open session (merging onto an existing line of
    /// the same product), snapshotting name and price.
    pub async fn add_item(
        &self,
        session_id: &str,
        product_id: &str,
        qty: i64,
        note: Option<String>,
    ) -> ServiceResult<Session> {
        let mut session = self.load_session(session_id).await?;

        let product = self
            .db
            .products()
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", product_id))?;

        session.add_item(&product, qty, note.as_deref())?;
        self.db.sessions().update_items(&session).await?;

        debug!(session_id, product_id, qty, "Item added");
        Ok(session)
    }

    /// Sets a line's quantity; `qty <= 0` removes the line.
    pub async fn update_item_qty(
        &self,
        session_id: &str,
        item_id: &str,
        qty: i64,
    ) -> ServiceResult<Session> {
        let mut session = self.load_session(session_id).await?;
        session.update_item_qty(item_id, qty)?;
        self.db.sessions().update_items(&session).await?;

        debug!(session_id, item_id, qty, "Item quantity updated");
        Ok(session)
    }

    /// Removes a line from an open session.
    pub async fn remove_item(&self, session_id: &str, item_id: &str) -> ServiceResult<Session> {
        let mut session = self.load_session(session_id).await?;
        session.remove_item(item_id)?;
        self.db.sessions().update_items(&session).await?;

        debug!(session_id, item_id, "Item removed");
        Ok(session)
    }

    /// Read-only quote of minutes and totals as of `end_at` (default now).
    /// Never mutates session state; callable any number of times.
    pub async fn preview_close(
        &self,
        session_id: &str,
        end_at: Option<DateTime<Utc>>,
        discounts: &[PreviewDiscount],
        surcharge: Money,
    ) -> ServiceResult<ClosePreview> {
        let session = self.load_session(session_id).await?;
        let end_at = end_at.unwrap_or_else(Utc::now);
        Ok(session.preview_close(end_at, discounts, surcharge))
    }

    /// Administratively voids an open session: no bill is produced, the
    /// station returns to available. Atomic, same contract as checkout.
    pub async fn void_session(
        &self,
        session_id: &str,
        staff_id: Option<String>,
        at: Option<DateTime<Utc>>,
    ) -> ServiceResult<Session> {
        let at = at.unwrap_or_else(Utc::now);

        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;

        let mut session = self
            .db
            .sessions()
            .get_by_id_conn(&mut tx, session_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Session", session_id))?;

        session.void(at, staff_id)?;
        self.db.sessions().finalize_conn(&mut tx, &session).await?;
        self.db
            .stations()
            .set_status_conn(&mut tx, &session.station_id, StationStatus::Available)
            .await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(session_id = %session.id, station_id = %session.station_id, "Session voided");
        Ok(session)
    }

    async fn load_session(&self, session_id: &str) -> ServiceResult<Session> {
        self.db
            .sessions()
            .get_by_id(session_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Session", session_id))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::fixture;
    use baize_core::{RateSource, SessionStatus};
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_check_in_snapshots_and_station_flip() {
        let fx = fixture().await;
        let svc = SessionService::new(fx.db.clone());

        let at = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let session = svc
            .check_in(&fx.station.id, Some("staff-1".into()), Some(at))
            .await
            .unwrap();

        assert_eq!(session.status, SessionStatus::Open);
        assert_eq!(session.pricing.rate_per_hour.units(), 60_000);
        assert_eq!(session.pricing.rate_source, RateSource::Station);
        assert_eq!(session.billing_rule.rounding_step, 15);
        assert_eq!(session.staff_start.as_deref(), Some("staff-1"));

        let station = fx.db.stations().get_by_id(&fx.station.id).await.unwrap().unwrap();
        assert_eq!(station.status, StationStatus::Occupied);
    }

    #[tokio::test]
    async fn test_check_in_unknown_and_inactive() {
        let fx = fixture().await;
        let svc = SessionService::new(fx.db.clone());

        let err = svc.check_in("nope", None, None).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::NotFound { entity: "Station", .. })
        ));

        let err = svc
            .check_in(&fx.inactive_station.id, None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::Inactive { entity: "Station", .. })
        ));
    }

    #[tokio::test]
    async fn test_second_check_in_conflicts() {
        let fx = fixture().await;
        let svc = SessionService::new(fx.db.clone());

        svc.check_in(&fx.station.id, None, None).await.unwrap();
        let err = svc.check_in(&fx.station.id, None, None).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::OpenSessionExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_check_ins_exactly_one_wins() {
        let fx = fixture().await;
        let svc = SessionService::new(fx.db.clone());

        let (a, b) = tokio::join!(
            svc.check_in(&fx.station.id, None, None),
            svc.check_in(&fx.station.id, None, None),
        );

        let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "exactly one concurrent check-in must win");

        let loser = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
        assert!(matches!(
            loser,
            ServiceError::Domain(CoreError::OpenSessionExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_item_flow() {
        let fx = fixture().await;
        let svc = SessionService::new(fx.db.clone());

        let session = svc.check_in(&fx.station.id, None, None).await.unwrap();

        // add twice: same product merges
        svc.add_item(&session.id, &fx.cola.id, 1, None).await.unwrap();
        let s = svc
            .add_item(&session.id, &fx.cola.id, 1, Some("less ice".into()))
            .await
            .unwrap();
        assert_eq!(s.items.len(), 1);
        assert_eq!(s.items[0].qty, 2);
        assert_eq!(s.items[0].note, "less ice");

        // different product appends
        let s = svc.add_item(&session.id, &fx.noodles.id, 1, None).await.unwrap();
        assert_eq!(s.items.len(), 2);
        assert_eq!(s.service_amount().units(), 2 * 25_000 + 35_000);

        // update down to zero deletes
        let noodle_line = s.items[1].id.clone();
        let s = svc.update_item_qty(&session.id, &noodle_line, 0).await.unwrap();
        assert_eq!(s.items.len(), 1);

        // remove the remaining line
        let cola_line = s.items[0].id.clone();
        let s = svc.remove_item(&session.id, &cola_line).await.unwrap();
        assert!(s.items.is_empty());

        // persisted state matches
        let stored = fx.db.sessions().get_by_id(&session.id).await.unwrap().unwrap();
        assert!(stored.items.is_empty());
    }

    #[tokio::test]
    async fn test_item_errors() {
        let fx = fixture().await;
        let svc = SessionService::new(fx.db.clone());
        let session = svc.check_in(&fx.station.id, None, None).await.unwrap();

        assert!(matches!(
            svc.add_item(&session.id, "nope", 1, None).await.unwrap_err(),
            ServiceError::Domain(CoreError::NotFound { entity: "Product", .. })
        ));
        assert!(matches!(
            svc.add_item(&session.id, &fx.inactive_product.id, 1, None)
                .await
                .unwrap_err(),
            ServiceError::Domain(CoreError::Inactive { entity: "Product", .. })
        ));
        assert!(matches!(
            svc.add_item(&session.id, &fx.cola.id, 0, None).await.unwrap_err(),
            ServiceError::Domain(CoreError::Validation(_))
        ));
        assert!(matches!(
            svc.update_item_qty(&session.id, "nope", 2).await.unwrap_err(),
            ServiceError::Domain(CoreError::NotFound { entity: "Item", .. })
        ));
        assert!(matches!(
            svc.add_item("nope", &fx.cola.id, 1, None).await.unwrap_err(),
            ServiceError::Domain(CoreError::NotFound { entity: "Session", .. })
        ));
    }

    #[tokio::test]
    async fn test_update_qty_idempotent_for_subtotal() {
        let fx = fixture().await;
        let svc = SessionService::new(fx.db.clone());

        let at = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 3, 2, 10, 47, 0).unwrap();
        let session = svc.check_in(&fx.station.id, None, Some(at)).await.unwrap();
        let s = svc.add_item(&session.id, &fx.cola.id, 2, None).await.unwrap();

        let before = svc
            .preview_close(&session.id, Some(end), &[], Money::zero())
            .await
            .unwrap();

        let line = s.items[0].id.clone();
        svc.update_item_qty(&session.id, &line, 2).await.unwrap();

        let after = svc
            .preview_close(&session.id, Some(end), &[], Money::zero())
            .await
            .unwrap();
        assert_eq!(before.subtotal, after.subtotal);
    }

    #[tokio::test]
    async fn test_preview_is_read_only() {
        let fx = fixture().await;
        let svc = SessionService::new(fx.db.clone());

        let at = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 3, 2, 10, 47, 0).unwrap();
        let session = svc.check_in(&fx.station.id, None, Some(at)).await.unwrap();
        svc.add_item(&session.id, &fx.cola.id, 2, None).await.unwrap();

        let p1 = svc
            .preview_close(&session.id, Some(end), &[], Money::zero())
            .await
            .unwrap();
        let p2 = svc
            .preview_close(&session.id, Some(end), &[], Money::zero())
            .await
            .unwrap();
        assert_eq!(p1, p2);
        assert_eq!(p1.raw_minutes, 47);
        assert_eq!(p1.bill_minutes, 60);
        assert_eq!(p1.subtotal.units(), 110_000);

        let stored = fx.db.sessions().get_by_id(&session.id).await.unwrap().unwrap();
        assert!(stored.is_open());
        assert!(stored.end_time.is_none());
    }

    #[tokio::test]
    async fn test_void_frees_station_without_bill() {
        let fx = fixture().await;
        let svc = SessionService::new(fx.db.clone());

        let session = svc.check_in(&fx.station.id, Some("staff-1".into()), None).await.unwrap();
        svc.add_item(&session.id, &fx.cola.id, 1, None).await.unwrap();

        let voided = svc
            .void_session(&session.id, Some("manager".into()), None)
            .await
            .unwrap();
        assert_eq!(voided.status, SessionStatus::Void);
        assert_eq!(voided.staff_end.as_deref(), Some("manager"));
        // items retained for audit
        assert_eq!(voided.items.len(), 1);

        let station = fx.db.stations().get_by_id(&fx.station.id).await.unwrap().unwrap();
        assert_eq!(station.status, StationStatus::Available);
        assert_eq!(fx.db.bills().count().await.unwrap(), 0);

        // further mutations rejected
        let err = svc.add_item(&session.id, &fx.cola.id, 1, None).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::SessionNotOpen { .. })
        ));
    }
}
