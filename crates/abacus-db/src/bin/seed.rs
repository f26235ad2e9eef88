//! # Seed Data
//!
//! Prepares a database for a fresh register: applies migrations, fills an
//! empty catalog with the sample products, and creates the default admin.
//!
//! ## Usage
//! ```bash
//! # Database from ABACUS_DATABASE_PATH (default ./abacus.db)
//! cargo run -p abacus-db --bin abacus-seed
//!
//! # Explicit path and admin password
//! cargo run -p abacus-db --bin abacus-seed -- --db ./data/pos.db --admin-password s3cret!
//! ```
//!
//! Safe to run repeatedly: a non-empty catalog and an existing `admin`
//! account are left alone.

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use abacus_core::{Money, NewUser, ProductInput, Role};
use abacus_db::{Database, DbConfig};

const ADMIN_USERNAME: &str = "admin";
const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// Sample catalog: (name, price in cents, stock, description)
const SAMPLE_PRODUCTS: &[(&str, i64, i64, &str)] = &[
    ("Cola", 3000, 100, "Refreshing soft drink"),
    ("Chips", 5000, 80, "Crispy potato chips"),
    ("Chocolate", 4500, 60, "Milk chocolate bar"),
    ("Water", 2000, 150, "Mineral water"),
    ("Bread", 3500, 50, "Fresh bread"),
];

#[derive(Parser, Debug)]
#[command(name = "abacus-seed")]
#[command(about = "Apply migrations and seed the sample catalog and admin account")]
struct Cli {
    /// Database file path. Overrides ABACUS_DATABASE_PATH.
    #[arg(short, long)]
    db: Option<PathBuf>,

    /// Password for the default admin account when it is created.
    #[arg(long, default_value = DEFAULT_ADMIN_PASSWORD)]
    admin_password: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    let mut config = DbConfig::from_env()?;
    if let Some(path) = cli.db {
        config.database_path = path;
    }

    let db = Database::new(config).await?;

    let products = seed_products(&db).await?;
    let admin_created = seed_admin(&db, &cli.admin_password).await?;

    info!(products, admin_created, "Seed complete");
    db.close().await;
    Ok(())
}

/// Inserts the sample catalog if no products exist. Returns how many were added.
async fn seed_products(db: &Database) -> Result<usize, abacus_db::DbError> {
    let existing = db.products().count().await?;
    if existing > 0 {
        info!(existing, "Catalog already populated, skipping sample products");
        return Ok(0);
    }

    let repo = db.products();
    for &(name, cents, stock, description) in SAMPLE_PRODUCTS {
        repo.insert(&ProductInput {
            name: name.to_string(),
            price: Money::from_cents(cents),
            stock,
            description: Some(description.to_string()),
        })
        .await?;
    }

    Ok(SAMPLE_PRODUCTS.len())
}

/// Creates the `admin` account if absent.
async fn seed_admin(db: &Database, password: &str) -> Result<bool, abacus_db::DbError> {
    let users = db.users();
    if users.get_by_username(ADMIN_USERNAME).await?.is_some() {
        info!("Admin account already exists");
        return Ok(false);
    }

    if password == DEFAULT_ADMIN_PASSWORD {
        warn!("Creating admin with the default password; change it before going live");
    }

    users
        .create(&NewUser {
            username: ADMIN_USERNAME.to_string(),
            password: password.to_string(),
            name: Some("Administrator".to_string()),
            role: Role::Admin,
        })
        .await?;

    Ok(true)
}
