//! # Promotion Repository
//!
//! Loads discount rules for the promotion engine.
//!
//! The SQL does the coarse work: active flag, calendar validity with
//! end-of-day semantics on `valid_to`, branch scoping (branch-specific plus
//! global rules), and the `(apply_order, created_at)` ordering the engine
//! applies rules in. Fine-grained gates (weekday, intraday windows,
//! minimums, combos) are evaluated in baize-core.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use baize_core::promotion::{BillRule, DiscountSpec, ProductRule, TimeRule};
use baize_core::{PromoScope, PromotionRule};

// =============================================================================
// Row mapping
// =============================================================================

#[derive(sqlx::FromRow)]
struct PromotionRow {
    id: String,
    branch_id: Option<String>,
    code: Option<String>,
    name: String,
    active: bool,
    apply_order: i64,
    stackable: bool,
    scope: PromoScope,
    discount: String,
    time_rule: String,
    product_rule: String,
    bill_rule: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PromotionRow> for PromotionRule {
    type Error = crate::error::DbError;

    fn try_from(r: PromotionRow) -> DbResult<PromotionRule> {
        let discount: DiscountSpec = serde_json::from_str(&r.discount)?;
        let time_rule: TimeRule = serde_json::from_str(&r.time_rule)?;
        let product_rule: ProductRule = serde_json::from_str(&r.product_rule)?;
        let bill_rule: BillRule = serde_json::from_str(&r.bill_rule)?;
        Ok(PromotionRule {
            id: r.id,
            branch_id: r.branch_id,
            code: r.code,
            name: r.name,
            active: r.active,
            apply_order: r.apply_order,
            stackable: r.stackable,
            scope: r.scope,
            discount,
            time_rule,
            product_rule,
            bill_rule,
            created_at: r.created_at,
        })
    }
}

const PROMOTION_COLUMNS: &str = "id, branch_id, code, name, active, apply_order, stackable, \
     scope, discount, time_rule, product_rule, bill_rule, created_at";

// =============================================================================
// PromotionRepository
// =============================================================================

/// Repository for promotion rule operations.
#[derive(Debug, Clone)]
pub struct PromotionRepository {
    pool: SqlitePool,
}

impl PromotionRepository {
    /// Creates a new PromotionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PromotionRepository { pool }
    }

    /// Loads the rules eligible for evaluation at `at`, ordered by
    /// `(apply_order, created_at)` ascending - the application order.
    ///
    /// With a branch id, branch-specific AND global rules are returned;
    /// without one, only global rules. `valid_to` is compared by calendar
    /// date, keeping a rule live through the end of its last day.
    pub async fn list_active(
        &self,
        branch_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> DbResult<Vec<PromotionRule>> {
        let rows: Vec<PromotionRow> = match branch_id {
            Some(branch) => {
                let sql = format!(
                    "SELECT {PROMOTION_COLUMNS} FROM promotions \
                     WHERE active = 1 \
                       AND (valid_from IS NULL OR datetime(valid_from) <= datetime(?1)) \
                       AND (valid_to IS NULL OR date(valid_to) >= date(?1)) \
                       AND (branch_id IS NULL OR branch_id = ?2) \
                     ORDER BY apply_order ASC, created_at ASC"
                );
                sqlx::query_as(&sql)
                    .bind(at)
                    .bind(branch)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {PROMOTION_COLUMNS} FROM promotions \
                     WHERE active = 1 \
                       AND (valid_from IS NULL OR datetime(valid_from) <= datetime(?1)) \
                       AND (valid_to IS NULL OR date(valid_to) >= date(?1)) \
                       AND branch_id IS NULL \
                     ORDER BY apply_order ASC, created_at ASC"
                );
                sqlx::query_as(&sql).bind(at).fetch_all(&self.pool).await?
            }
        };

        debug!(count = rows.len(), "Loaded active promotions");
        rows.into_iter().map(PromotionRule::try_from).collect()
    }

    /// Inserts a promotion rule. The calendar bounds are denormalized out of
    /// the time rule into their own columns for the coarse SQL filter.
    pub async fn insert(&self, rule: &PromotionRule) -> DbResult<()> {
        debug!(id = %rule.id, name = %rule.name, "Inserting promotion");

        let discount = serde_json::to_string(&rule.discount)?;
        let time_rule = serde_json::to_string(&rule.time_rule)?;
        let product_rule = serde_json::to_string(&rule.product_rule)?;
        let bill_rule = serde_json::to_string(&rule.bill_rule)?;

        sqlx::query(
            r#"
            INSERT INTO promotions (
                id, branch_id, code, name, active, apply_order, stackable,
                scope, discount, time_rule, product_rule, bill_rule,
                valid_from, valid_to, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                ?8, ?9, ?10, ?11, ?12,
                ?13, ?14, ?15
            )
            "#,
        )
        .bind(&rule.id)
        .bind(&rule.branch_id)
        .bind(&rule.code)
        .bind(&rule.name)
        .bind(rule.active)
        .bind(rule.apply_order)
        .bind(rule.stackable)
        .bind(rule.scope)
        .bind(discount)
        .bind(time_rule)
        .bind(product_rule)
        .bind(bill_rule)
        .bind(rule.time_rule.valid_from)
        .bind(rule.time_rule.valid_to)
        .bind(rule.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
