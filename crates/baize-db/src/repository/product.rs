//! # Product Repository
//!
//! Catalog lookups for service products. Full product CRUD is owned by an
//! excluded layer; the billing engine needs by-id lookups (snapshotting at
//! add-item time) and the category back-fill used when normalizing service
//! lines for product-scope promotions.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::debug;

use crate::error::DbResult;
use baize_core::Product;

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: String,
    branch_id: Option<String>,
    name: String,
    category_id: Option<String>,
    price_units: i64,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Product {
            id: r.id,
            branch_id: r.branch_id,
            name: r.name,
            category_id: r.category_id,
            price_units: r.price_units,
            active: r.active,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

const PRODUCT_COLUMNS: &str =
    "id, branch_id, name, category_id, price_units, active, created_at, updated_at";

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let row: Option<ProductRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Product::from))
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self) -> DbResult<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE active = 1 ORDER BY name");
        let rows: Vec<ProductRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Inserts a product.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, branch_id, name, category_id, price_units, active,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&product.id)
        .bind(&product.branch_id)
        .bind(&product.name)
        .bind(&product.category_id)
        .bind(product.price_units)
        .bind(product.active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Maps product ids to their category ids.
    ///
    /// Used to normalize session items into promotion service lines when an
    /// item snapshot lacks category information.
    pub async fn categories_for(&self, ids: &[String]) -> DbResult<HashMap<String, Option<String>>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "SELECT id, category_id FROM products WHERE id IN ({})",
            placeholders.join(", ")
        );

        let mut query = sqlx::query_as::<_, (String, Option<String>)>(&sql);
        for id in ids {
            query = query.bind(id);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use uuid::Uuid;

    fn product(name: &str, category: Option<&str>, price: i64) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4().to_string(),
            branch_id: None,
            name: name.into(),
            category_id: category.map(String::from),
            price_units: price,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_product_roundtrip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let p = product("Cola", Some("c-drinks"), 25_000);
        db.products().insert(&p).await.unwrap();

        let loaded = db.products().get_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Cola");
        assert_eq!(loaded.price().units(), 25_000);

        let active = db.products().list_active().await.unwrap();
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn test_categories_for() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let a = product("Cola", Some("c-drinks"), 25_000);
        let b = product("Chips", None, 15_000);
        db.products().insert(&a).await.unwrap();
        db.products().insert(&b).await.unwrap();

        let map = db
            .products()
            .categories_for(&[a.id.clone(), b.id.clone(), "missing".into()])
            .await
            .unwrap();
        assert_eq!(map.get(&a.id), Some(&Some("c-drinks".to_string())));
        assert_eq!(map.get(&b.id), Some(&None));
        assert!(!map.contains_key("missing"));

        let empty = db.products().categories_for(&[]).await.unwrap();
        assert!(empty.is_empty());
    }
}
