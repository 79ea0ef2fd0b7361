//! # Settings Repository
//!
//! Billing-rule resolution: branch setting → global setting → hard-coded
//! default (`step=5, mode=ceil, grace=0`).
//!
//! The resolved rule is injected into the session as a snapshot at check-in;
//! nothing in the engine reads settings ambiently after that.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use baize_core::BillingRule;

/// Repository for billing-rule settings.
#[derive(Debug, Clone)]
pub struct SettingRepository {
    pool: SqlitePool,
}

impl SettingRepository {
    /// Creates a new SettingRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SettingRepository { pool }
    }

    /// Resolves the billing rule in force for a branch.
    pub async fn get_active_billing_rule(&self, branch_id: Option<&str>) -> DbResult<BillingRule> {
        let mut conn = self.pool.acquire().await?;
        self.get_active_billing_rule_conn(&mut conn, branch_id).await
    }

    /// Resolves the billing rule on an existing connection (check-in reads
    /// it inside the transaction).
    pub async fn get_active_billing_rule_conn(
        &self,
        conn: &mut SqliteConnection,
        branch_id: Option<&str>,
    ) -> DbResult<BillingRule> {
        if let Some(branch) = branch_id {
            if let Some(rule) = fetch_rule(conn, "branch", Some(branch)).await? {
                return Ok(rule);
            }
        }
        if let Some(rule) = fetch_rule(conn, "global", None).await? {
            return Ok(rule);
        }
        debug!("No billing rule configured, using hard default");
        Ok(BillingRule::default())
    }

    /// Writes the billing rule for a scope (`branch_id = None` is global).
    pub async fn upsert_billing_rule(
        &self,
        branch_id: Option<&str>,
        rule: &BillingRule,
    ) -> DbResult<()> {
        let scope = if branch_id.is_some() { "branch" } else { "global" };
        let billing = serde_json::to_string(rule)?;
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE settings SET billing = ?1, updated_at = ?2 WHERE scope = ?3 AND branch_id IS ?4",
        )
        .bind(&billing)
        .bind(now)
        .bind(scope)
        .bind(branch_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            sqlx::query(
                "INSERT INTO settings (id, scope, branch_id, billing, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(scope)
            .bind(branch_id)
            .bind(&billing)
            .bind(now)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }
}

async fn fetch_rule(
    conn: &mut SqliteConnection,
    scope: &str,
    branch_id: Option<&str>,
) -> DbResult<Option<BillingRule>> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT billing FROM settings WHERE scope = ?1 AND branch_id IS ?2")
            .bind(scope)
            .bind(branch_id)
            .fetch_optional(conn)
            .await?;

    match row {
        Some((json,)) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
