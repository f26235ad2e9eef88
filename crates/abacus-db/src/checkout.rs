//! # Checkout
//!
//! Turns a submitted cart into an order, all or nothing.
//!
//! ## Transaction Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      place_order(request, actor)                        │
//! │                                                                         │
//! │  validate_checkout(request) ── fail ──► Validation (store untouched)   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN                                                                  │
//! │       │                                                                 │
//! │       ▼  for each line, in cart order                                   │
//! │  UPDATE products SET stock = stock - qty                                │
//! │   WHERE id = ? AND stock >= qty                                         │
//! │       │                                                                 │
//! │       ├── 0 rows ──► SELECT stock ──► UnknownProduct / InsufficientStock│
//! │       │                                 │                               │
//! │       ▼                                 ▼                               │
//! │  INSERT orders (client totals, actor)   ROLLBACK ──► Err               │
//! │  INSERT order_items (client prices)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ──► Ok(order_id)                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//! The stock check and the decrement are one statement, so two placements
//! can never both pass the check for the same units. The first statement of
//! every placement is a write: SQLite hands out the write lock before any
//! stock is read, and a competing placement waits (up to the busy timeout)
//! until the first commits or rolls back.

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info, warn};

use crate::error::{CheckoutError, DbError};
use abacus_core::validation::validate_checkout;
use abacus_core::{Actor, CheckoutRequest, OrderId, UserId};

/// Places orders against the shared pool.
///
/// One transaction per call. Nothing is retried.
///
/// ## Usage
/// ```rust,ignore
/// let request: CheckoutRequest = serde_json::from_slice(&body)?;
/// match db.checkout().place_order(&request, Some(&actor)).await {
///     Ok(order_id) => {
///         let placed = OrderPlaced { order_id };
///         respond(placed.http_status(), &placed)
///     }
///     Err(e) => respond(e.http_status(), &e.to_rejection()),
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CheckoutService {
    pool: SqlitePool,
}

impl CheckoutService {
    pub fn new(pool: SqlitePool) -> Self {
        CheckoutService { pool }
    }

    /// Validates the cart, reserves stock, and records the order.
    ///
    /// `actor` is the authenticated caller; `None` records an order without
    /// a user. Subtotal, tax, total and line prices are stored exactly as
    /// submitted.
    ///
    /// ## Returns
    /// * `Ok(order_id)` - Committed
    /// * `Err(CheckoutError)` - Nothing was changed
    pub async fn place_order(
        &self,
        request: &CheckoutRequest,
        actor: Option<&Actor>,
    ) -> Result<OrderId, CheckoutError> {
        let user_id = actor.map(|a| a.user_id);

        if let Err(e) = validate_checkout(request) {
            warn!(user_id = ?user_id, error = %e, "Checkout rejected");
            return Err(e.into());
        }

        let mut tx = self.pool.begin().await?;

        match Self::write_order(&mut tx, request, user_id).await {
            Ok(order_id) => {
                tx.commit()
                    .await
                    .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

                info!(
                    order_id,
                    user_id = ?user_id,
                    lines = request.items.len(),
                    total = %request.total,
                    "Order placed"
                );
                Ok(order_id)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Checkout rollback failed");
                }

                warn!(
                    user_id = ?user_id,
                    product_id = ?err.product_id(),
                    error = %err,
                    "Checkout rejected"
                );
                Err(err)
            }
        }
    }

    /// Runs the statements of one placement inside `tx`.
    async fn write_order(
        tx: &mut Transaction<'_, Sqlite>,
        request: &CheckoutRequest,
        user_id: Option<UserId>,
    ) -> Result<OrderId, CheckoutError> {
        let now = Utc::now();

        for line in &request.items {
            let decremented = sqlx::query(
                r#"
                UPDATE products
                SET stock = stock - ?, updated_at = ?
                WHERE id = ? AND stock >= ?
                "#,
            )
            .bind(line.quantity)
            .bind(now)
            .bind(line.product_id)
            .bind(line.quantity)
            .execute(&mut **tx)
            .await?;

            if decremented.rows_affected() == 0 {
                let available: Option<i64> =
                    sqlx::query_scalar("SELECT stock FROM products WHERE id = ?")
                        .bind(line.product_id)
                        .fetch_optional(&mut **tx)
                        .await?;

                return Err(match available {
                    None => CheckoutError::UnknownProduct(line.product_id),
                    Some(available) => CheckoutError::InsufficientStock {
                        product_id: line.product_id,
                        available,
                        requested: line.quantity,
                    },
                });
            }

            debug!(
                product_id = line.product_id,
                quantity = line.quantity,
                "Stock reserved"
            );
        }

        let order_id = sqlx::query(
            r#"
            INSERT INTO orders (user_id, subtotal, tax, total, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(request.subtotal)
        .bind(request.tax)
        .bind(request.total)
        .bind(now)
        .execute(&mut **tx)
        .await?
        .last_insert_rowid();

        for line in &request.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, quantity, price)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(order_id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.price)
            .execute(&mut **tx)
            .await?;
        }

        debug!(order_id, lines = request.items.len(), "Order rows written");
        Ok(order_id)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RejectionCode;
    use crate::{Database, DbConfig};
    use abacus_core::{
        CartLine, Money, NewUser, ProductId, ProductInput, Role, TaxRate, ValidationError,
        DEFAULT_TAX_RATE_BPS,
    };

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn add_product(db: &Database, name: &str, price_cents: i64, stock: i64) -> ProductId {
        db.products()
            .insert(&ProductInput {
                name: name.to_string(),
                price: Money::from_cents(price_cents),
                stock,
                description: None,
            })
            .await
            .unwrap()
            .id
    }

    async fn add_cashier(db: &Database) -> Actor {
        let user = db
            .users()
            .create(&NewUser {
                username: "cashier".to_string(),
                password: "secret123".to_string(),
                name: None,
                role: Role::User,
            })
            .await
            .unwrap();
        Actor::from(&user)
    }

    async fn stock_of(db: &Database, id: ProductId) -> i64 {
        db.products().get_by_id(id).await.unwrap().unwrap().stock
    }

    fn line(product_id: ProductId, quantity: i64, price_cents: i64) -> CartLine {
        CartLine {
            product_id,
            quantity,
            price: Money::from_cents(price_cents),
        }
    }

    /// Request whose totals follow the lines at the register's tax rate.
    fn request(items: Vec<CartLine>) -> CheckoutRequest {
        let subtotal: Money = items.iter().map(|l| l.line_total().unwrap()).sum();
        let tax = subtotal
            .calculate_tax(TaxRate::from_bps(DEFAULT_TAX_RATE_BPS))
            .unwrap();
        CheckoutRequest {
            items,
            subtotal,
            tax,
            total: subtotal + tax,
        }
    }

    #[tokio::test]
    async fn test_successful_order() {
        let db = setup().await;
        let cola = add_product(&db, "Cola", 3000, 100).await;
        let actor = add_cashier(&db).await;

        let order_id = db
            .checkout()
            .place_order(&request(vec![line(cola, 30, 3000)]), Some(&actor))
            .await
            .unwrap();

        assert_eq!(stock_of(&db, cola).await, 70);
        assert_eq!(db.orders().count().await.unwrap(), 1);

        let entry = db.orders().get_with_lines(order_id).await.unwrap().unwrap();
        assert_eq!(entry.order.user_id, Some(actor.user_id));
        assert_eq!(entry.order.subtotal, Money::from_cents(90000));
        assert_eq!(entry.order.tax, Money::from_cents(4500));
        assert_eq!(entry.order.total, Money::from_cents(94500));
        assert_eq!(entry.lines.len(), 1);
        assert_eq!(entry.lines[0].product_id, cola);
        assert_eq!(entry.lines[0].quantity, 30);
    }

    #[tokio::test]
    async fn test_line_prices_are_the_submitted_prices() {
        let db = setup().await;
        let cola = add_product(&db, "Cola", 3000, 100).await;

        // The catalog price moved after the cashier loaded the grid.
        let order_id = db
            .checkout()
            .place_order(&request(vec![line(cola, 2, 2750)]), None)
            .await
            .unwrap();

        let lines = db.orders().get_lines(order_id).await.unwrap();
        assert_eq!(lines[0].price, Money::from_cents(2750));
        assert_eq!(
            db.products().get_by_id(cola).await.unwrap().unwrap().price,
            Money::from_cents(3000)
        );
    }

    #[tokio::test]
    async fn test_client_totals_stored_verbatim() {
        let db = setup().await;
        let cola = add_product(&db, "Cola", 3000, 10).await;

        let submitted = CheckoutRequest {
            items: vec![line(cola, 1, 3000)],
            subtotal: Money::from_cents(3000),
            tax: Money::from_cents(0),
            total: Money::from_cents(2999),
        };
        let order_id = db.checkout().place_order(&submitted, None).await.unwrap();

        let order = db.orders().get_by_id(order_id).await.unwrap().unwrap();
        assert_eq!(order.user_id, None);
        assert_eq!(order.tax, Money::zero());
        assert_eq!(order.total, Money::from_cents(2999));
    }

    #[tokio::test]
    async fn test_insufficient_stock_changes_nothing() {
        let db = setup().await;
        let chips = add_product(&db, "Chips", 5000, 5).await;

        let err = db
            .checkout()
            .place_order(&request(vec![line(chips, 10, 5000)]), None)
            .await
            .unwrap_err();

        match err {
            CheckoutError::InsufficientStock {
                product_id,
                available,
                requested,
            } => {
                assert_eq!(product_id, chips);
                assert_eq!(available, 5);
                assert_eq!(requested, 10);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(stock_of(&db, chips).await, 5);
        assert_eq!(db.orders().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_exact_stock_can_be_sold_out() {
        let db = setup().await;
        let bread = add_product(&db, "Bread", 3500, 5).await;

        db.checkout()
            .place_order(&request(vec![line(bread, 5, 3500)]), None)
            .await
            .unwrap();
        assert_eq!(stock_of(&db, bread).await, 0);

        let err = db
            .checkout()
            .place_order(&request(vec![line(bread, 1, 3500)]), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::InsufficientStock { available: 0, .. }
        ));
    }

    #[tokio::test]
    async fn test_unknown_product_rolls_back_earlier_lines() {
        let db = setup().await;
        let cola = add_product(&db, "Cola", 3000, 100).await;

        let err = db
            .checkout()
            .place_order(
                &request(vec![line(cola, 10, 3000), line(999, 1, 1000)]),
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::UnknownProduct(999)));
        assert_eq!(err.http_status(), 404);
        assert!(err.to_rejection().message.contains("999"));
        assert_eq!(stock_of(&db, cola).await, 100);
        assert_eq!(db.orders().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failure_on_middle_line_is_atomic() {
        let db = setup().await;
        let cola = add_product(&db, "Cola", 3000, 100).await;
        let chips = add_product(&db, "Chips", 5000, 2).await;
        let water = add_product(&db, "Water", 2000, 150).await;

        let err = db
            .checkout()
            .place_order(
                &request(vec![
                    line(cola, 10, 3000),
                    line(chips, 3, 5000),
                    line(water, 1, 2000),
                ]),
                None,
            )
            .await
            .unwrap_err();

        assert_eq!(err.product_id(), Some(chips));
        assert_eq!(stock_of(&db, cola).await, 100);
        assert_eq!(stock_of(&db, chips).await, 2);
        assert_eq!(stock_of(&db, water).await, 150);
        assert_eq!(db.orders().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_repeated_product_lines_share_stock() {
        let db = setup().await;
        let chocolate = add_product(&db, "Chocolate", 4500, 6).await;

        let err = db
            .checkout()
            .place_order(
                &request(vec![line(chocolate, 4, 4500), line(chocolate, 4, 4500)]),
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::InsufficientStock {
                available: 2,
                requested: 4,
                ..
            }
        ));
        assert_eq!(stock_of(&db, chocolate).await, 6);
    }

    #[tokio::test]
    async fn test_invalid_carts_rejected_before_store() {
        let db = setup().await;
        let cola = add_product(&db, "Cola", 3000, 100).await;

        let empty = db
            .checkout()
            .place_order(&request(vec![]), None)
            .await
            .unwrap_err();
        assert!(matches!(
            empty,
            CheckoutError::Validation(ValidationError::Required { .. })
        ));
        assert_eq!(empty.code(), RejectionCode::ValidationError);

        for quantity in [0, -5] {
            let err = db
                .checkout()
                .place_order(&request(vec![line(cola, quantity, 3000)]), None)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                CheckoutError::Validation(ValidationError::MustBePositive { .. })
            ));
            assert_eq!(err.http_status(), 400);
        }

        assert_eq!(stock_of(&db, cola).await, 100);
        assert_eq!(db.orders().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_vanished_actor_rolls_back() {
        let db = setup().await;
        let cola = add_product(&db, "Cola", 3000, 100).await;
        let ghost = Actor::new(4242, Role::User);

        let err = db
            .checkout()
            .place_order(&request(vec![line(cola, 1, 3000)]), Some(&ghost))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::StoreUnavailable(DbError::ForeignKeyViolation { .. })
        ));
        assert_eq!(err.http_status(), 400);
        assert_eq!(stock_of(&db, cola).await, 100);
        assert_eq!(db.orders().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_closed_pool_is_store_unavailable() {
        let db = setup().await;
        let cola = add_product(&db, "Cola", 3000, 100).await;
        db.close().await;

        let err = db
            .checkout()
            .place_order(&request(vec![line(cola, 1, 3000)]), None)
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::StoreUnavailable(_)));
        assert_eq!(err.http_status(), 500);
    }

    /// Two placements of 60 against stock 100: a read-then-decrement
    /// checkout lets both through and ends at -20. Exactly one must win.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_orders_cannot_oversell() {
        let path = std::env::temp_dir().join(format!("abacus-checkout-{}.db", uuid::Uuid::new_v4()));
        let db = Database::new(DbConfig::new(&path).max_connections(5))
            .await
            .unwrap();
        let cola = add_product(&db, "Cola", 3000, 100).await;

        let mut handles = Vec::new();
        for _ in 0..2 {
            let checkout = db.checkout();
            let cart = request(vec![line(cola, 60, 3000)]);
            handles.push(tokio::spawn(async move {
                checkout.place_order(&cart, None).await
            }));
        }

        let mut placed = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => placed += 1,
                Err(CheckoutError::InsufficientStock { available, .. }) => {
                    assert_eq!(available, 40);
                    rejected += 1;
                }
                Err(other) => panic!("unexpected checkout error: {other:?}"),
            }
        }

        assert_eq!((placed, rejected), (1, 1));
        assert_eq!(stock_of(&db, cola).await, 40);
        assert_eq!(db.orders().count().await.unwrap(), 1);

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }
}
