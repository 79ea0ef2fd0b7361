//! # Checkout Coordinator
//!
//! Orchestrates billing + promotions + session lifecycle into the atomic
//! checkout: re-verify the session is open, compute minutes and the play
//! charge from the session's immutable snapshots (never the station's live
//! rate), materialize the bill lines from the item snapshots, settle the
//! bill, close the session, and free the station - all in one transaction.
//! Any failure rolls the whole operation back with no partial effect.
//!
//! Promotion quoting is separate and read-only: [`CheckoutCoordinator::quote`]
//! builds the billing context from the session, runs the promotion engine
//! against the branch's active rules, and returns the discount lines the
//! caller may then pass into [`CheckoutCoordinator::checkout`].

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use baize_core::{
    apply_promotions, compute_play_amount, Bill, BillItem, BillParts, ClosePreview, CoreError,
    DiscountLine, Money, PaymentMethod, PromotionContext, PromotionOutcome, ServiceLine, Session,
    StationStatus,
};
use baize_db::{Database, DbError};

use crate::error::{ServiceError, ServiceResult};

// =============================================================================
// Requests / outcomes
// =============================================================================

/// Inputs to the checkout transaction.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub session_id: String,
    pub staff_id: Option<String>,
    /// Staff display name, resolved by the caller's user directory and
    /// frozen onto the bill.
    pub staff_name: Option<String>,
    /// Settlement instant; defaults to now.
    pub end_at: Option<DateTime<Utc>>,
    /// Discount lines to record, typically from [`CheckoutCoordinator::quote`].
    pub discount_lines: Vec<DiscountLine>,
    pub surcharge: Money,
    pub payment_method: PaymentMethod,
    pub paid: bool,
}

impl CheckoutRequest {
    /// A plain cash checkout with no discounts.
    pub fn new(session_id: impl Into<String>) -> Self {
        CheckoutRequest {
            session_id: session_id.into(),
            staff_id: None,
            staff_name: None,
            end_at: None,
            discount_lines: Vec::new(),
            surcharge: Money::zero(),
            payment_method: PaymentMethod::Cash,
            paid: false,
        }
    }
}

/// The settled bill and the closed session.
#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub bill: Bill,
    pub session: Session,
}

/// A read-only pre-checkout quote: totals plus engine-applied discounts.
#[derive(Debug, Clone)]
pub struct Quote {
    pub preview: ClosePreview,
    pub promotions: PromotionOutcome,
}

// =============================================================================
// Coordinator
// =============================================================================

/// Coordinates the atomic checkout and promotion quoting.
#[derive(Debug, Clone)]
pub struct CheckoutCoordinator {
    db: Database,
}

impl CheckoutCoordinator {
    /// Creates a new CheckoutCoordinator.
    pub fn new(db: Database) -> Self {
        CheckoutCoordinator { db }
    }

    /// Atomically closes a session into a bill and frees its station.
    ///
    /// Fails with `SessionNotOpen` when the session was already settled
    /// (the transactional re-fetch is the authoritative check), and with
    /// `NotFound` when the session or its station is gone - in every
    /// failure case the session stays open and no bill exists.
    pub async fn checkout(&self, req: CheckoutRequest) -> ServiceResult<CheckoutOutcome> {
        let end_at = req.end_at.unwrap_or_else(Utc::now);
        debug!(session_id = %req.session_id, "checkout");

        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;

        // Re-fetch inside the transaction and verify it is still open.
        let mut session = self
            .db
            .sessions()
            .get_by_id_conn(&mut tx, &req.session_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Session", &req.session_id))?;
        if !session.is_open() {
            return Err(CoreError::SessionNotOpen {
                id: session.id.clone(),
                status: session.status,
            }
            .into());
        }

        // Charge computation uses the session's snapshots exclusively.
        let minutes = session.compute_minutes(end_at);
        let rate = session.pricing.rate_per_hour;
        let play_amount = compute_play_amount(rate, minutes.bill_minutes);

        let service_items: Vec<BillItem> = session
            .items
            .iter()
            .map(|it| BillItem::Product {
                product_id: it.product_id.clone(),
                name: it.name_snapshot.clone(),
                unit_price: it.price_snapshot,
                qty: it.qty,
                amount: it.amount().clamp_non_negative(),
                note: it.note.clone(),
            })
            .collect();

        // Station lookup must succeed before any write; its name is frozen
        // onto the bill.
        let station = self
            .db
            .stations()
            .get_by_id_conn(&mut tx, &session.station_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Station", &session.station_id))?;

        let bill = Bill::settle(BillParts {
            session_id: session.id.clone(),
            station_id: station.id.clone(),
            station_name: station.name.clone(),
            branch_id: session.branch_id.clone(),
            play_minutes: minutes.bill_minutes,
            play_rate_per_hour: rate,
            play_amount,
            service_items,
            discount_lines: req.discount_lines,
            surcharge: req.surcharge,
            payment_method: req.payment_method,
            paid: req.paid,
            staff_id: req.staff_id.clone().or_else(|| session.staff_start.clone()),
            staff_name: req.staff_name,
            created_at: end_at,
        });

        session.close(end_at, minutes.bill_minutes, req.staff_id)?;

        self.db.bills().insert_conn(&mut tx, &bill).await?;
        self.db.sessions().finalize_conn(&mut tx, &session).await?;
        self.db
            .stations()
            .set_status_conn(&mut tx, &station.id, StationStatus::Available)
            .await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(
            session_id = %session.id,
            bill_id = %bill.id,
            bill_minutes = minutes.bill_minutes,
            total = %bill.total,
            "Session checked out"
        );
        Ok(CheckoutOutcome { bill, session })
    }

    /// Read-only quote: previews totals as of `at` and runs the promotion
    /// engine against the branch's active rules. Persists nothing.
    pub async fn quote(&self, session_id: &str, at: Option<DateTime<Utc>>) -> ServiceResult<Quote> {
        let at = at.unwrap_or_else(Utc::now);

        let session = self
            .db
            .sessions()
            .get_by_id(session_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Session", session_id))?;

        let preview = session.preview_close(at, &[], Money::zero());

        // Normalize items into service lines, back-filling category ids
        // from the catalog for product-scope matching.
        let product_ids: Vec<String> = session
            .items
            .iter()
            .filter_map(|it| it.product_id.clone())
            .collect();
        let categories = self.db.products().categories_for(&product_ids).await?;

        let service_items: Vec<ServiceLine> = session
            .items
            .iter()
            .map(|it| ServiceLine {
                product_id: it.product_id.clone(),
                category_id: it
                    .product_id
                    .as_ref()
                    .and_then(|p| categories.get(p).cloned().flatten()),
                qty: it.qty,
                amount: it.amount().clamp_non_negative(),
            })
            .collect();

        let ctx = PromotionContext {
            at,
            station_type_id: session.station_type_id.clone(),
            play_minutes: preview.bill_minutes,
            play_amount: preview.play_amount,
            service_items,
            service_amount: preview.service_amount,
            subtotal: preview.subtotal,
        };

        let rules = self
            .db
            .promotions()
            .list_active(session.branch_id.as_deref(), at)
            .await?;
        let promotions = apply_promotions(&ctx, &rules);

        debug!(
            session_id,
            rules = rules.len(),
            applied = promotions.lines.len(),
            discount_total = %promotions.discount_total,
            "Quote computed"
        );
        Ok(Quote { preview, promotions })
    }

    /// Marks a settled bill as paid. Only payment-status fields change.
    pub async fn mark_bill_paid(
        &self,
        bill_id: &str,
        method: PaymentMethod,
        at: Option<DateTime<Utc>>,
    ) -> ServiceResult<()> {
        let at = at.unwrap_or_else(Utc::now);
        self.db.bills().mark_paid(bill_id, method, at).await?;
        info!(bill_id, "Bill marked paid");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
