//! # Bill Repository
//!
//! Database operations for settled bills.
//!
//! A bill row is written exactly once, inside the checkout transaction, and
//! never updated afterwards except for its payment-status fields. The
//! `session_id` column is UNIQUE: one bill per session, ever.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use baize_core::{Bill, BillItem, DiscountLine, Money, PaymentMethod};

// =============================================================================
// Row mapping
// =============================================================================

#[derive(sqlx::FromRow)]
struct BillRow {
    id: String,
    session_id: String,
    station_id: String,
    station_name: String,
    branch_id: Option<String>,
    items: String,
    play_minutes: i64,
    play_amount: i64,
    service_amount: i64,
    subtotal: i64,
    discount_lines: String,
    discount_total: i64,
    surcharge: i64,
    total: i64,
    paid: bool,
    paid_at: Option<DateTime<Utc>>,
    payment_method: PaymentMethod,
    staff_id: Option<String>,
    staff_name: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<BillRow> for Bill {
    type Error = DbError;

    fn try_from(r: BillRow) -> DbResult<Bill> {
        let items: Vec<BillItem> = serde_json::from_str(&r.items)?;
        let discount_lines: Vec<DiscountLine> = serde_json::from_str(&r.discount_lines)?;
        Ok(Bill {
            id: r.id,
            session_id: r.session_id,
            station_id: r.station_id,
            station_name: r.station_name,
            branch_id: r.branch_id,
            items,
            play_minutes: r.play_minutes,
            play_amount: Money::from_units(r.play_amount),
            service_amount: Money::from_units(r.service_amount),
            subtotal: Money::from_units(r.subtotal),
            discount_lines,
            discount_total: Money::from_units(r.discount_total),
            surcharge: Money::from_units(r.surcharge),
            total: Money::from_units(r.total),
            paid: r.paid,
            paid_at: r.paid_at,
            payment_method: r.payment_method,
            staff_id: r.staff_id,
            staff_name: r.staff_name,
            created_at: r.created_at,
        })
    }
}

const BILL_COLUMNS: &str = "id, session_id, station_id, station_name, branch_id, items, \
     play_minutes, play_amount, service_amount, subtotal, discount_lines, discount_total, \
     surcharge, total, paid, paid_at, payment_method, staff_id, staff_name, created_at";

// =============================================================================
// BillRepository
// =============================================================================

/// Repository for bill database operations.
#[derive(Debug, Clone)]
pub struct BillRepository {
    pool: SqlitePool,
}

impl BillRepository {
    /// Creates a new BillRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BillRepository { pool }
    }

    /// Gets a bill by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Bill>> {
        let sql = format!("SELECT {BILL_COLUMNS} FROM bills WHERE id = ?1");
        let row: Option<BillRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Bill::try_from).transpose()
    }

    /// Gets the bill settled for a session, if any.
    pub async fn get_by_session(&self, session_id: &str) -> DbResult<Option<Bill>> {
        let sql = format!("SELECT {BILL_COLUMNS} FROM bills WHERE session_id = ?1");
        let row: Option<BillRow> = sqlx::query_as(&sql)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Bill::try_from).transpose()
    }

    /// Counts bills (diagnostics and atomicity tests).
    pub async fn count(&self) -> DbResult<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bills")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    /// Inserts a bill inside the checkout transaction.
    pub async fn insert_conn(&self, conn: &mut SqliteConnection, bill: &Bill) -> DbResult<()> {
        debug!(id = %bill.id, session_id = %bill.session_id, total = %bill.total, "Inserting bill");

        let items = serde_json::to_string(&bill.items)?;
        let discount_lines = serde_json::to_string(&bill.discount_lines)?;

        sqlx::query(
            r#"
            INSERT INTO bills (
                id, session_id, station_id, station_name, branch_id, items,
                play_minutes, play_amount, service_amount, subtotal,
                discount_lines, discount_total, surcharge, total,
                paid, paid_at, payment_method, staff_id, staff_name, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14,
                ?15, ?16, ?17, ?18, ?19, ?20
            )
            "#,
        )
        .bind(&bill.id)
        .bind(&bill.session_id)
        .bind(&bill.station_id)
        .bind(&bill.station_name)
        .bind(&bill.branch_id)
        .bind(items)
        .bind(bill.play_minutes)
        .bind(bill.play_amount.units())
        .bind(bill.service_amount.units())
        .bind(bill.subtotal.units())
        .bind(discount_lines)
        .bind(bill.discount_total.units())
        .bind(bill.surcharge.units())
        .bind(bill.total.units())
        .bind(bill.paid)
        .bind(bill.paid_at)
        .bind(bill.payment_method)
        .bind(&bill.staff_id)
        .bind(&bill.staff_name)
        .bind(bill.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Marks a bill paid. Only the payment-status fields ever change after
    /// settlement.
    pub async fn mark_paid(
        &self,
        id: &str,
        method: PaymentMethod,
        paid_at: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE bills SET paid = 1, paid_at = ?2, payment_method = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(paid_at)
        .bind(method)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Bill", id));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use baize_core::{BillParts, Money};

    fn bill() -> Bill {
        Bill::settle(BillParts {
            session_id: "se-1".into(),
            station_id: "st-1".into(),
            station_name: "Table 1".into(),
            branch_id: None,
            play_minutes: 60,
            play_rate_per_hour: Money::from_units(60_000),
            play_amount: Money::from_units(60_000),
            service_items: vec![BillItem::Product {
                product_id: Some("p-1".into()),
                name: "Cola".into(),
                unit_price: Money::from_units(25_000),
                qty: 2,
                amount: Money::from_units(50_000),
                note: String::new(),
            }],
            discount_lines: vec![],
            surcharge: Money::zero(),
            payment_method: PaymentMethod::Cash,
            paid: false,
            staff_id: Some("staff-1".into()),
            staff_name: None,
            created_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn test_bill_roundtrip_and_mark_paid() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let b = bill();

        let mut conn = db.pool().acquire().await.unwrap();
        db.bills().insert_conn(&mut conn, &b).await.unwrap();
        drop(conn);

        let loaded = db.bills().get_by_id(&b.id).await.unwrap().unwrap();
        assert_eq!(loaded.subtotal.units(), 110_000);
        assert_eq!(loaded.total.units(), 110_000);
        assert_eq!(loaded.items.len(), 2);
        assert!(!loaded.paid);

        db.bills()
            .mark_paid(&b.id, PaymentMethod::Card, Utc::now())
            .await
            .unwrap();
        let loaded = db.bills().get_by_session("se-1").await.unwrap().unwrap();
        assert!(loaded.paid);
        assert_eq!(loaded.payment_method, PaymentMethod::Card);
        assert!(loaded.paid_at.is_some());
    }

    #[tokio::test]
    async fn test_one_bill_per_session() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        db.bills().insert_conn(&mut conn, &bill()).await.unwrap();
        let err = db.bills().insert_conn(&mut conn, &bill()).await.unwrap_err();
        assert!(err.is_unique_violation());
    }
}
