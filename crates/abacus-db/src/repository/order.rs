//! # Order Repository
//!
//! Read side of placed orders. Orders are written only by
//! [`crate::checkout::CheckoutService`] and never edited afterwards.

use std::collections::HashMap;

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use abacus_core::{Order, OrderId, OrderLine, OrderWithLines, UserId};

const ORDER_COLUMNS: &str = "id, user_id, subtotal, tax, total, created_at";
/// Line columns with the current catalog name. A deleted product leaves
/// the line in place with a NULL name.
const LINE_SELECT: &str = r#"
    SELECT oi.id, oi.order_id, oi.product_id, p.name AS product_name, oi.quantity, oi.price
    FROM order_items oi
    LEFT JOIN products p ON p.id = oi.product_id
"#;

/// Repository for order history.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order header by id.
    pub async fn get_by_id(&self, id: OrderId) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Gets the lines of an order in the order they were submitted.
    pub async fn get_lines(&self, order_id: OrderId) -> DbResult<Vec<OrderLine>> {
        let lines = sqlx::query_as::<_, OrderLine>(&format!(
            "{LINE_SELECT} WHERE oi.order_id = ? ORDER BY oi.id"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Gets an order together with its lines.
    pub async fn get_with_lines(&self, id: OrderId) -> DbResult<Option<OrderWithLines>> {
        let Some(order) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        let lines = self.get_lines(id).await?;
        Ok(Some(OrderWithLines { order, lines }))
    }

    /// Order history for one user, newest first, each with its lines.
    ///
    /// Two queries regardless of history length: the headers, then every
    /// line belonging to them.
    pub async fn list_for_user(&self, user_id: UserId) -> DbResult<Vec<OrderWithLines>> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ? ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let lines = sqlx::query_as::<_, OrderLine>(&format!(
            "{LINE_SELECT} INNER JOIN orders o ON o.id = oi.order_id WHERE o.user_id = ? ORDER BY oi.id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut by_order: HashMap<OrderId, Vec<OrderLine>> = HashMap::new();
        for line in lines {
            by_order.entry(line.order_id).or_default().push(line);
        }

        debug!(user_id, orders = orders.len(), "Loaded order history");

        Ok(orders
            .into_iter()
            .map(|order| {
                let lines = by_order.remove(&order.id).unwrap_or_default();
                OrderWithLines { order, lines }
            })
            .collect())
    }

    /// Counts all placed orders.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
