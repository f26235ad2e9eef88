//! # Domain Types
//!
//! Core domain types used throughout Abacus POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Order      │   │   OrderLine     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  id             │   │  order_id (FK)  │       │
//! │  │  name           │◄──│  user_id?       │──►│  product_id     │       │
//! │  │  price          │   │  subtotal/tax   │   │  quantity       │       │
//! │  │  stock (>= 0)   │   │  total          │   │  price (locked) │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      User       │   │     Actor       │   │ CheckoutRequest │       │
//! │  │  username (uq)  │   │  user_id        │   │  items[]        │       │
//! │  │  role           │   │  role           │   │  subtotal/tax   │       │
//! │  └─────────────────┘   └─────────────────┘   │  total          │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Every row has a store-generated integer id. Orders reference users
//! weakly: deleting a user keeps the order and clears `user_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::validation::{validate_amount, validate_quantity, ValidationResult};
use crate::MAX_CART_ITEMS;

/// Product primary key.
pub type ProductId = i64;
/// User primary key.
pub type UserId = i64;
/// Order primary key.
pub type OrderId = i64;
/// Order line primary key.
pub type OrderLineId = i64;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 500 bps = 5%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

// =============================================================================
// Users & Identity
// =============================================================================

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Cashier account.
    #[default]
    User,
    /// Can manage the catalog and read sales reports.
    Admin,
}

impl Role {
    /// The stored spelling of the role.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

/// The authenticated identity a request acts as.
///
/// Built by the HTTP layer from its session and handed explicitly to the
/// operations that need it. Nothing in this workspace reads ambient
/// session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub const fn new(user_id: UserId, role: Role) -> Self {
        Actor { user_id, role }
    }

    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Actor::new(user.id, user.role)
    }
}

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// Argon2 PHC string. Never leaves the backend.
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    pub password_hash: String,
    /// Display name; falls back to the username at registration.
    pub name: String,
    pub role: Role,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Registration input. The password is hashed by the store layer.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Role,
}

/// Partial profile change. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Deserialize, TS)]
#[ts(export)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl ProfileUpdate {
    /// True when no field would change.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.password.is_none()
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Current catalog price. Orders keep their own copy.
    #[ts(type = "string")]
    pub price: Money,
    /// Units on hand, never negative.
    pub stock: i64,
    pub description: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Catalog input for creating a product or replacing all of its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductInput {
    pub name: String,
    #[ts(type = "string")]
    pub price: Money,
    pub stock: i64,
    #[serde(default)]
    pub description: Option<String>,
}

// =============================================================================
// Orders
// =============================================================================

/// A placed order. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: OrderId,
    /// Cashier who placed it; cleared if the account is deleted.
    pub user_id: Option<UserId>,
    #[ts(type = "string")]
    pub subtotal: Money,
    #[ts(type = "string")]
    pub tax: Money,
    #[ts(type = "string")]
    pub total: Money,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// One line of a placed order.
///
/// `price` is the unit price submitted with the cart, frozen at sale time.
/// `product_name` is read from the catalog and is `None` once the product
/// has been deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    #[serde(default)]
    pub product_name: Option<String>,
    pub quantity: i64,
    #[ts(type = "string")]
    pub price: Money,
}

impl OrderLine {
    /// Returns `price × quantity`, or `None` if it overflows.
    #[inline]
    pub fn line_total(&self) -> Option<Money> {
        self.price.checked_mul_quantity(self.quantity)
    }
}

/// Order history entry: the order row plus its lines.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct OrderWithLines {
    #[serde(flatten)]
    pub order: Order,
    pub lines: Vec<OrderLine>,
}

impl OrderWithLines {
    /// Total units across all lines.
    pub fn item_count(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

// =============================================================================
// Checkout Wire Types
// =============================================================================

/// One cart line as submitted by the register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: i64,
    /// Unit price the cashier saw; becomes the order line price.
    #[ts(type = "string")]
    pub price: Money,
}

impl CartLine {
    /// Returns `price × quantity`, or `None` if it overflows.
    #[inline]
    pub fn line_total(&self) -> Option<Money> {
        self.price.checked_mul_quantity(self.quantity)
    }
}

/// Sum of the line totals, or `None` on overflow.
fn sum_lines(lines: &[CartLine]) -> Option<Money> {
    lines
        .iter()
        .try_fold(Money::zero(), |acc, line| acc.checked_add(line.line_total()?))
}

/// Checkout payload: `{items, subtotal, tax, total}`.
///
/// The totals are computed by the client and stored as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutRequest {
    pub items: Vec<CartLine>,
    #[ts(type = "string")]
    pub subtotal: Money,
    #[ts(type = "string")]
    pub tax: Money,
    #[ts(type = "string")]
    pub total: Money,
}

impl CheckoutRequest {
    /// Sum of `price × quantity` over the submitted lines, or `None` if
    /// it overflows.
    pub fn lines_subtotal(&self) -> Option<Money> {
        sum_lines(&self.items)
    }
}

/// Successful checkout response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderPlaced {
    pub order_id: OrderId,
}

impl OrderPlaced {
    /// HTTP-equivalent status for a placed order (Created).
    pub const fn http_status(&self) -> u16 {
        201
    }
}

// =============================================================================
// Cart
// =============================================================================

/// Register-side cart that produces a [`CheckoutRequest`].
///
/// ## User Workflow
/// ```text
/// tap "Cola" ──► add(1, 1, 30.00) ──► lines: [Cola ×1]
/// tap "Cola" ──► add(1, 1, 30.00) ──► lines: [Cola ×2]   (merged)
/// checkout(5%) ──► subtotal 60.00, tax 3.00, total 63.00
/// ```
///
/// Every line passes [`validate_quantity`] and the subtotal always fits in
/// an `i64` of cents; an `add` that would break either is rejected and
/// leaves the cart unchanged.
#[derive(Debug, Clone, Default)]
pub struct Cart {
    lines: Vec<CartLine>,
    subtotal: Money,
}

impl Cart {
    pub fn new() -> Self {
        Cart::default()
    }

    /// Adds units of a product, merging with an existing line for it.
    ///
    /// The price of the first add wins; it is the price locked for the line.
    pub fn add(
        &mut self,
        product_id: ProductId,
        quantity: i64,
        price: Money,
    ) -> ValidationResult<()> {
        validate_quantity(quantity)?;

        let mut lines = self.lines.clone();
        match lines.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => {
                line.quantity += quantity;
                validate_quantity(line.quantity)?;
            }
            None => {
                if lines.len() >= MAX_CART_ITEMS {
                    return Err(ValidationError::TooMany {
                        field: "items".to_string(),
                        max: MAX_CART_ITEMS,
                    });
                }
                validate_amount("price", price)?;
                lines.push(CartLine {
                    product_id,
                    quantity,
                    price,
                });
            }
        }

        self.subtotal = sum_lines(&lines).ok_or_else(|| ValidationError::TooLarge {
            field: "subtotal".to_string(),
        })?;
        self.lines = lines;
        Ok(())
    }

    /// Drops the line for a product, if any.
    pub fn remove(&mut self, product_id: ProductId) {
        self.lines.retain(|l| l.product_id != product_id);
        // A subset of lines that fit still fits.
        self.subtotal = sum_lines(&self.lines).unwrap_or_default();
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    /// Freezes the cart into a checkout payload.
    ///
    /// Fails with `TooLarge` when the tax or total overflows.
    pub fn checkout(&self, rate: TaxRate) -> ValidationResult<CheckoutRequest> {
        let subtotal = self.subtotal;
        let tax = subtotal.calculate_tax(rate).ok_or_else(|| ValidationError::TooLarge {
            field: "tax".to_string(),
        })?;
        let total = subtotal.checked_add(tax).ok_or_else(|| ValidationError::TooLarge {
            field: "total".to_string(),
        })?;

        Ok(CheckoutRequest {
            items: self.lines.clone(),
            subtotal,
            tax,
            total,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
