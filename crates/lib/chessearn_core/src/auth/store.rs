//! Credential store: persisted user records.
//!
//! [`CredentialStore`] is the seam the session layer talks to;
//! [`PgCredentialStore`] is the PostgreSQL implementation used in production.
//! Identity fields are expected to be normalized by
//! [`super::validation`] before they reach the store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::AuthError;
use super::validation::IdentifierKeys;
use crate::models::auth::{NewUser, Role, User, UserChanges, UserWithPassword};

/// Persisted user records keyed by id, with unique email/username/phone.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look a user up by email, username or phone number. When more than one
    /// field could match, email wins over username, which wins over phone.
    async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<UserWithPassword>, AuthError>;

    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, AuthError>;

    /// Insert a user. Fails with [`AuthError::Duplicate`] when the email,
    /// username or phone number is taken.
    async fn create(&self, new_user: NewUser) -> Result<User, AuthError>;

    /// Apply a partial update. Returns `None` when the user does not exist.
    async fn update(&self, user_id: &str, changes: UserChanges)
    -> Result<Option<User>, AuthError>;

    async fn update_password(&self, user_id: &str, password_hash: &str)
    -> Result<bool, AuthError>;

    async fn set_photo(&self, user_id: &str, filename: &str) -> Result<bool, AuthError>;

    async fn delete(&self, user_id: &str) -> Result<bool, AuthError>;

    /// All users, oldest first.
    async fn list_all(&self) -> Result<Vec<User>, AuthError>;
}

const USER_COLUMNS: &str = "id, first_name, last_name, email, username, phone_number, \
     password_hash, role, wallet_balance, ranking, is_active, is_verified, \
     photo_filename, created_at";

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    username: String,
    phone_number: String,
    password_hash: String,
    role: String,
    wallet_balance: f64,
    ranking: i32,
    is_active: bool,
    is_verified: bool,
    photo_filename: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserWithPassword {
    type Error = AuthError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role: Role = row
            .role
            .parse()
            .map_err(|e| AuthError::Internal(format!("stored role: {e}")))?;
        Ok(UserWithPassword {
            user: User {
                id: row.id.to_string(),
                first_name: row.first_name,
                last_name: row.last_name,
                email: row.email,
                username: row.username,
                phone_number: row.phone_number,
                role,
                wallet_balance: row.wallet_balance,
                ranking: row.ranking,
                is_active: row.is_active,
                is_verified: row.is_verified,
                photo_filename: row.photo_filename,
                created_at: row.created_at,
            },
            password_hash: row.password_hash,
        })
    }
}

fn into_user(row: UserRow) -> Result<User, AuthError> {
    UserWithPassword::try_from(row).map(|u| u.user)
}

/// Ids that are not UUIDs cannot exist; treat them as "not found" rather
/// than letting Postgres raise a cast error.
fn parse_id(user_id: &str) -> Option<Uuid> {
    Uuid::parse_str(user_id).ok()
}

/// Map unique-constraint violations to [`AuthError::Duplicate`].
fn map_write_error(e: sqlx::Error) -> AuthError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            let field = match db.constraint() {
                Some("users_email_key") => "Email",
                Some("users_username_key") => "Username",
                Some("users_phone_number_key") => "Phone number",
                _ => "User",
            };
            return AuthError::Duplicate(format!("{field} already exists"));
        }
    }
    AuthError::Db(e)
}

/// PostgreSQL-backed credential store.
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<UserWithPassword>, AuthError> {
        let keys = IdentifierKeys::from_raw(identifier);
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE email = $1 OR username = $2 OR phone_number = $3 \
             ORDER BY CASE WHEN email = $1 THEN 0 WHEN username = $2 THEN 1 ELSE 2 END \
             LIMIT 1"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&keys.email)
            .bind(&keys.username)
            .bind(keys.phone.as_deref())
            .fetch_optional(&self.pool)
            .await?;
        row.map(UserWithPassword::try_from).transpose()
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, AuthError> {
        let Some(id) = parse_id(user_id) else {
            return Ok(None);
        };
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(into_user).transpose()
    }

    async fn create(&self, new_user: NewUser) -> Result<User, AuthError> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "INSERT INTO users \
             (first_name, last_name, email, username, phone_number, password_hash, role) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&new_user.first_name)
            .bind(&new_user.last_name)
            .bind(&new_user.email)
            .bind(&new_user.username)
            .bind(&new_user.phone_number)
            .bind(&new_user.password_hash)
            .bind(new_user.role.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(map_write_error)?;
        tx.commit().await?;
        debug!(username = %new_user.username, "user row inserted");
        into_user(row)
    }

    async fn update(
        &self,
        user_id: &str,
        changes: UserChanges,
    ) -> Result<Option<User>, AuthError> {
        let Some(id) = parse_id(user_id) else {
            return Ok(None);
        };
        let mut tx = self.pool.begin().await?;

        let select = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE");
        let Some(row) = sqlx::query_as::<_, UserRow>(&select)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };
        let current = UserWithPassword::try_from(row)?;
        let mut user = current.user;
        changes.apply(&mut user);
        let password_hash = changes.password_hash.unwrap_or(current.password_hash);

        let update = format!(
            "UPDATE users SET first_name = $2, last_name = $3, email = $4, username = $5, \
             phone_number = $6, role = $7, password_hash = $8, is_active = $9, is_verified = $10 \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&update)
            .bind(id)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.phone_number)
            .bind(user.role.as_str())
            .bind(&password_hash)
            .bind(user.is_active)
            .bind(user.is_verified)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_write_error)?;
        tx.commit().await?;
        into_user(row).map(Some)
    }

    async fn update_password(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<bool, AuthError> {
        let Some(id) = parse_id(user_id) else {
            return Ok(false);
        };
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_photo(&self, user_id: &str, filename: &str) -> Result<bool, AuthError> {
        let Some(id) = parse_id(user_id) else {
            return Ok(false);
        };
        let result = sqlx::query("UPDATE users SET photo_filename = $2 WHERE id = $1")
            .bind(id)
            .bind(filename)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, user_id: &str) -> Result<bool, AuthError> {
        let Some(id) = parse_id(user_id) else {
            return Ok(false);
        };
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_all(&self) -> Result<Vec<User>, AuthError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at, username");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(into_user).collect()
    }
}
