//! Revocation ledger: durable record of revoked token IDs (jti).
//!
//! A token whose jti is in the ledger is rejected even if its signature and
//! expiry are valid. The ledger only ever stores the jti, never the token.
//! Records older than the retention window are pruned by a periodic task; by
//! then every token they refer to has expired on its own.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::debug;

use super::AuthError;

/// Default age after which revocation records are pruned.
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

#[async_trait]
pub trait RevocationLedger: Send + Sync {
    /// Whether `jti` has been revoked.
    async fn is_revoked(&self, jti: &str) -> Result<bool, AuthError>;

    /// Record every jti in `jtis` as revoked at `revoked_at`, all or none.
    /// Revoking an already-present jti is a no-op and never an error.
    async fn revoke_many_at(
        &self,
        jtis: &[&str],
        revoked_at: DateTime<Utc>,
    ) -> Result<(), AuthError>;

    /// Record every jti in `jtis` as revoked now, all or none.
    async fn revoke_many(&self, jtis: &[&str]) -> Result<(), AuthError> {
        self.revoke_many_at(jtis, Utc::now()).await
    }

    async fn revoke_at(&self, jti: &str, revoked_at: DateTime<Utc>) -> Result<(), AuthError> {
        self.revoke_many_at(&[jti], revoked_at).await
    }

    /// Record `jti` as revoked now.
    async fn revoke(&self, jti: &str) -> Result<(), AuthError> {
        self.revoke_at(jti, Utc::now()).await
    }

    /// Delete records revoked before `now - age`. Returns how many went.
    async fn prune_older_than(&self, age: Duration) -> Result<u64, AuthError>;
}

/// PostgreSQL-backed ledger over the `token_blacklist` table.
#[derive(Debug, Clone)]
pub struct PgRevocationLedger {
    pool: PgPool,
}

impl PgRevocationLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RevocationLedger for PgRevocationLedger {
    async fn is_revoked(&self, jti: &str) -> Result<bool, AuthError> {
        let revoked = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM token_blacklist WHERE jti = $1)",
        )
        .bind(jti)
        .fetch_one(&self.pool)
        .await?;
        Ok(revoked)
    }

    async fn revoke_many_at(
        &self,
        jtis: &[&str],
        revoked_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let mut tx = self.pool.begin().await?;
        for jti in jtis {
            let result = sqlx::query(
                "INSERT INTO token_blacklist (jti, revoked_at) VALUES ($1, $2) \
                 ON CONFLICT (jti) DO NOTHING",
            )
            .bind(*jti)
            .bind(revoked_at)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 0 {
                debug!(jti, "token already revoked");
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn prune_older_than(&self, age: Duration) -> Result<u64, AuthError> {
        let cutoff = Utc::now() - age;
        let result = sqlx::query("DELETE FROM token_blacklist WHERE revoked_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
