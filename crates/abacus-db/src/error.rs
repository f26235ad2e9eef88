//! # Database Error Types
//!
//! Error types for database operations and order placement.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError ← classified (unique, foreign key, check, pool, ...)          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CheckoutError::StoreUnavailable    (alongside Validation,             │
//! │       │                              UnknownProduct, InsufficientStock) │
//! │       ▼                                                                 │
//! │  Rejection { code, message } + http_status() ← what the caller sends   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;

use abacus_core::{ProductId, ValidationError};

// =============================================================================
// DbError
// =============================================================================

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation (e.g. a taken username).
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - An order names a user id that no longer exists
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation (negative stock, zero quantity, ...).
    #[error("Constraint violation: {message}")]
    CheckViolation { message: String },

    /// Input rejected before reaching SQL.
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Begin, commit or rollback failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// All connections in use past the acquire timeout.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal error (hashing, decoding, ...).
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → by SQLite constraint message
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::PoolClosed     → DbError::ConnectionFailed
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite reports constraints as:
                //   "UNIQUE constraint failed: <table>.<column>"
                //   "FOREIGN KEY constraint failed"
                //   "CHECK constraint failed: <expr>"
                if let Some(field) = msg.strip_prefix("UNIQUE constraint failed: ") {
                    DbError::duplicate(field, "unknown")
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// CheckoutError
// =============================================================================

/// Why an order was not placed.
///
/// Every variant is terminal for the call: nothing is retried internally,
/// and by the time the caller sees one the transaction has been rolled back.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Empty cart, non-positive quantity, negative amount.
    #[error("Invalid checkout: {0}")]
    Validation(#[from] ValidationError),

    /// A cart line names a product that does not exist.
    #[error("Product {0} does not exist")]
    UnknownProduct(ProductId),

    /// A cart line asks for more units than are in stock.
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
        requested: i64,
    },

    /// Pool, transaction or statement failure.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] DbError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(err: sqlx::Error) -> Self {
        CheckoutError::StoreUnavailable(err.into())
    }
}

impl CheckoutError {
    /// Machine-readable rejection code.
    pub fn code(&self) -> RejectionCode {
        match self {
            CheckoutError::Validation(_) => RejectionCode::ValidationError,
            CheckoutError::UnknownProduct(_) => RejectionCode::UnknownProduct,
            CheckoutError::InsufficientStock { .. } => RejectionCode::InsufficientStock,
            CheckoutError::StoreUnavailable(DbError::ForeignKeyViolation { .. }) => {
                RejectionCode::InvalidReference
            }
            CheckoutError::StoreUnavailable(_) => RejectionCode::StoreUnavailable,
        }
    }

    /// HTTP-equivalent status for the rejection.
    ///
    /// ```text
    /// ValidationError    → 400
    /// UnknownProduct     → 404
    /// InsufficientStock  → 400
    /// InvalidReference   → 400   (acting user vanished)
    /// StoreUnavailable   → 500
    /// ```
    pub fn http_status(&self) -> u16 {
        match self.code() {
            RejectionCode::ValidationError
            | RejectionCode::InsufficientStock
            | RejectionCode::InvalidReference => 400,
            RejectionCode::UnknownProduct => 404,
            RejectionCode::StoreUnavailable => 500,
        }
    }

    /// The offending product, for the two stock-phase rejections.
    pub fn product_id(&self) -> Option<ProductId> {
        match self {
            CheckoutError::UnknownProduct(id) => Some(*id),
            CheckoutError::InsufficientStock { product_id, .. } => Some(*product_id),
            _ => None,
        }
    }

    /// Builds the response body. Store internals are logged, not exposed.
    pub fn to_rejection(&self) -> Rejection {
        let message = match self {
            CheckoutError::StoreUnavailable(DbError::ForeignKeyViolation { .. }) => {
                "Acting user no longer exists".to_string()
            }
            CheckoutError::StoreUnavailable(e) => {
                tracing::error!(error = %e, "Checkout failed in the store");
                "Database operation failed".to_string()
            }
            other => other.to_string(),
        };

        Rejection {
            code: self.code(),
            message,
        }
    }
}

/// Rejection codes for checkout responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionCode {
    ValidationError,
    UnknownProduct,
    InsufficientStock,
    InvalidReference,
    StoreUnavailable,
}

/// Body returned to the register when checkout fails.
///
/// ```json
/// { "code": "INSUFFICIENT_STOCK",
///   "message": "Insufficient stock for product 2: available 5, requested 10" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct Rejection {
    pub code: RejectionCode,
    pub message: String,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_name_the_product() {
        let err = CheckoutError::InsufficientStock {
            product_id: 2,
            available: 5,
            requested: 10,
        };
        assert_eq!(err.http_status(), 400);
        assert_eq!(err.product_id(), Some(2));
        assert_eq!(
            err.to_rejection().message,
            "Insufficient stock for product 2: available 5, requested 10"
        );

        let err = CheckoutError::UnknownProduct(999);
        assert_eq!(err.http_status(), 404);
        assert_eq!(err.to_rejection().message, "Product 999 does not exist");
    }

    #[test]
    fn test_store_errors_hide_internals() {
        let err = CheckoutError::from(DbError::QueryFailed("disk I/O error".to_string()));
        let rejection = err.to_rejection();

        assert_eq!(err.http_status(), 500);
        assert_eq!(rejection.code, RejectionCode::StoreUnavailable);
        assert!(!rejection.message.contains("disk"));
    }

    #[test]
    fn test_vanished_user_is_a_client_error() {
        let err = CheckoutError::from(DbError::ForeignKeyViolation {
            message: "FOREIGN KEY constraint failed".to_string(),
        });
        assert_eq!(err.code(), RejectionCode::InvalidReference);
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn test_rejection_serialization() {
        let body = CheckoutError::Validation(ValidationError::Required {
            field: "items".to_string(),
        })
        .to_rejection();

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert_eq!(json["message"], "Invalid checkout: items is required");
    }
}
