//! # User Repository
//!
//! Accounts: registration, lookup, profile changes, removal.
//!
//! ## Passwords
//! Stored as Argon2 PHC strings. Plaintext never reaches SQL.
//!
//! ## Partial Updates
//! ```text
//! ProfileUpdate { name: Some("Ann"), password: None }
//!       │
//!       ▼
//! QueryBuilder:  UPDATE users SET name = ?1 WHERE id = ?2
//!                                  └── bound, never spliced
//! ```

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use abacus_core::validation::{validate_display_name, validate_password, validate_username};
use abacus_core::{NewUser, ProfileUpdate, User, UserId, ValidationError};

const USER_COLUMNS: &str = "id, username, password_hash, name, role, created_at";

/// Repository for user accounts.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Registers an account.
    ///
    /// ## Rules
    /// - username: 3 to 50 characters after trimming, unique
    /// - password: at least 6 characters
    /// - name: defaults to the username when absent or blank
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - Username already taken
    /// * `Err(DbError::Validation)` - Rule above not met
    pub async fn create(&self, new_user: &NewUser) -> DbResult<User> {
        let username = validate_username(&new_user.username)?;
        validate_password(&new_user.password)?;

        let name = match new_user.name.as_deref() {
            Some(name) => validate_display_name(name)?,
            None => String::new(),
        };
        let name = if name.is_empty() { username.clone() } else { name };

        let password_hash = Self::hash_password(&new_user.password)?;
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO users (username, password_hash, name, role, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&username)
        .bind(&password_hash)
        .bind(&name)
        .bind(new_user.role)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("username", username.as_str()),
            other => other,
        })?;

        let id = result.last_insert_rowid();
        info!(id, username = %username, role = new_user.role.as_str(), "User registered");

        Ok(User {
            id,
            username,
            password_hash,
            name,
            role: new_user.role,
            created_at: now,
        })
    }

    /// Gets a user by id.
    pub async fn get_by_id(&self, id: UserId) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Gets a user by exact username.
    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
        ))
        .bind(username.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Applies the fields present in `update` and returns the fresh row.
    ///
    /// An empty update touches nothing and still reports `NotFound` for an
    /// unknown id.
    pub async fn update_profile(&self, id: UserId, update: &ProfileUpdate) -> DbResult<User> {
        if update.is_empty() {
            return self
                .get_by_id(id)
                .await?
                .ok_or_else(|| DbError::not_found("User", id));
        }

        let name = match update.name.as_deref() {
            Some(name) => {
                let name = validate_display_name(name)?;
                if name.is_empty() {
                    return Err(ValidationError::Required {
                        field: "name".to_string(),
                    }
                    .into());
                }
                Some(name)
            }
            None => None,
        };

        let password_hash = match update.password.as_deref() {
            Some(password) => {
                validate_password(password)?;
                Some(Self::hash_password(password)?)
            }
            None => None,
        };

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE users SET ");
        {
            let mut fields = builder.separated(", ");
            if let Some(name) = name {
                fields.push("name = ");
                fields.push_bind_unseparated(name);
            }
            if let Some(hash) = password_hash {
                fields.push("password_hash = ");
                fields.push_bind_unseparated(hash);
            }
        }
        builder.push(" WHERE id = ");
        builder.push_bind(id);

        let result = builder.build().execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        debug!(
            id,
            name = update.name.is_some(),
            password = update.password.is_some(),
            "Profile updated"
        );

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))
    }

    /// Deletes an account. Its orders stay, with `user_id` cleared.
    pub async fn delete(&self, id: UserId) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        info!(id, "User deleted");
        Ok(())
    }

    /// Hashes a password with Argon2id and a random salt.
    pub fn hash_password(password: &str) -> DbResult<String> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| DbError::Internal(format!("Failed to hash password: {}", e)))?;

        Ok(hash.to_string())
    }

    /// Checks a password against a stored hash. Malformed hashes never match.
    pub fn verify_password(password: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(h) => h,
            Err(_) => return false,
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
