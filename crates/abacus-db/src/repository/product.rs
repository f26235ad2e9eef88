//! # Product Repository
//!
//! Catalog operations: listing, CRUD and manual stock levels.
//!
//! Sales never adjust stock through this repository. The conditional
//! decrement lives in the checkout transaction.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use abacus_core::validation::{validate_product_input, validate_stock};
use abacus_core::{Product, ProductId, ProductInput};

const PRODUCT_COLUMNS: &str =
    "id, name, price, stock, description, created_at, updated_at";

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let catalog = repo.list().await?;
/// let cola = repo.get_by_id(1).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Lists the whole catalog, newest first.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Listed products");
        Ok(products)
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: ProductId) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Inserts a new product and returns it with its generated id.
    pub async fn insert(&self, input: &ProductInput) -> DbResult<Product> {
        validate_product_input(input)?;

        let now = Utc::now();
        let name = input.name.trim();

        let result = sqlx::query(
            r#"
            INSERT INTO products (name, price, stock, description, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(input.price)
        .bind(input.stock)
        .bind(&input.description)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        info!(id, name = %name, price = %input.price, stock = input.stock, "Product created");

        Ok(Product {
            id,
            name: name.to_string(),
            price: input.price,
            stock: input.stock,
            description: input.description.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Replaces every editable field of a product.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - No product with this id
    pub async fn update(&self, id: ProductId, input: &ProductInput) -> DbResult<Product> {
        validate_product_input(input)?;

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = ?, price = ?, stock = ?, description = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(input.name.trim())
        .bind(input.price)
        .bind(input.stock)
        .bind(&input.description)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        debug!(id, "Product updated");

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Sets the stock level directly (restock, stocktake correction).
    pub async fn set_stock(&self, id: ProductId, stock: i64) -> DbResult<()> {
        validate_stock(stock)?;

        let result = sqlx::query("UPDATE products SET stock = ?, updated_at = ? WHERE id = ?")
            .bind(stock)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        debug!(id, stock, "Stock level set");
        Ok(())
    }

    /// Deletes a product. Past order lines keep their product id.
    pub async fn delete(&self, id: ProductId) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        info!(id, "Product deleted");
        Ok(())
    }

    /// Counts products in the catalog.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use abacus_core::{Money, ValidationError};

    fn cola() -> ProductInput {
        ProductInput {
            name: "Cola".to_string(),
            price: Money::from_cents(3000),
            stock: 100,
            description: Some("Refreshing soft drink".to_string()),
        }
    }

    async fn repo() -> ProductRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().products()
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let repo = repo().await;

        let created = repo.insert(&cola()).await.unwrap();
        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();

        assert_eq!(fetched.name, "Cola");
        assert_eq!(fetched.price, Money::from_cents(3000));
        assert_eq!(fetched.stock, 100);
        assert_eq!(fetched.description.as_deref(), Some("Refreshing soft drink"));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let repo = repo().await;
        assert!(repo.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let repo = repo().await;
        let first = repo.insert(&cola()).await.unwrap();
        let mut chips = cola();
        chips.name = "Chips".to_string();
        let second = repo.insert(&chips).await.unwrap();

        let ids: Vec<_> = repo.list().await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_update_replaces_fields() {
        let repo = repo().await;
        let created = repo.insert(&cola()).await.unwrap();

        let updated = repo
            .update(
                created.id,
                &ProductInput {
                    name: "Cola Zero".to_string(),
                    price: Money::from_cents(3200),
                    stock: 40,
                    description: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Cola Zero");
        assert_eq!(updated.price, Money::from_cents(3200));
        assert_eq!(updated.stock, 40);
        assert!(updated.description.is_none());
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let repo = repo().await;
        let err = repo.update(42, &cola()).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_invalid_input_rejected() {
        let repo = repo().await;
        let mut input = cola();
        input.name = "  ".to_string();

        let err = repo.insert(&input).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(ValidationError::Required { .. })));
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_stock() {
        let repo = repo().await;
        let created = repo.insert(&cola()).await.unwrap();

        repo.set_stock(created.id, 7).await.unwrap();
        assert_eq!(repo.get_by_id(created.id).await.unwrap().unwrap().stock, 7);

        assert!(matches!(
            repo.set_stock(created.id, -1).await,
            Err(DbError::Validation(_))
        ));
        assert!(matches!(
            repo.set_stock(999, 1).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = repo().await;
        let created = repo.insert(&cola()).await.unwrap();

        repo.delete(created.id).await.unwrap();
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
        assert!(matches!(
            repo.delete(created.id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_negative_stock_blocked_by_schema() {
        let repo = repo().await;
        let created = repo.insert(&cola()).await.unwrap();

        let err: DbError = sqlx::query("UPDATE products SET stock = -1 WHERE id = ?")
            .bind(created.id)
            .execute(&repo.pool)
            .await
            .unwrap_err()
            .into();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }
}
