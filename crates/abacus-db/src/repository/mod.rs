//! # Repository Module
//!
//! Database repository implementations for Abacus POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  HTTP handler                                                          │
//! │       │                                                                 │
//! │       │  db.products().list()                                          │
//! │       ▼                                                                 │
//! │  ProductRepository                                                     │
//! │  ├── list / get_by_id / count                                          │
//! │  ├── insert(&ProductInput)                                             │
//! │  ├── update(id, &ProductInput)                                         │
//! │  └── set_stock / delete                                                │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock decrements for sales do not go through [`ProductRepository`]; they
//! happen inside the checkout transaction (see [`crate::checkout`]).
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Catalog CRUD and stock levels
//! - [`user::UserRepository`] - Accounts and profile updates
//! - [`order::OrderRepository`] - Order history reads

pub mod order;
pub mod product;
pub mod user;
