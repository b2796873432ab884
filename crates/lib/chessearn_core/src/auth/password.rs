//! Password hashing via bcrypt.

use std::sync::{Arc, OnceLock};

use super::AuthError;

/// Default bcrypt cost factor.
pub const DEFAULT_BCRYPT_COST: u32 = 10;

/// Salted one-way password hashing.
///
/// The async variants run bcrypt on tokio's blocking pool so request
/// handlers never stall a runtime worker.
#[derive(Debug)]
pub struct PasswordHasher {
    cost: u32,
    dummy: OnceLock<String>,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_BCRYPT_COST)
    }
}

impl PasswordHasher {
    /// `cost` is clamped into bcrypt's accepted range.
    pub fn new(cost: u32) -> Self {
        Self {
            cost: cost.clamp(4, 31),
            dummy: OnceLock::new(),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a password with bcrypt.
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        bcrypt::hash(password, self.cost)
            .map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
    }

    /// Verify a password against a bcrypt hash.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        bcrypt::verify(password, hash)
            .map_err(|e| AuthError::Internal(format!("bcrypt verify: {e}")))
    }

    /// Burn one verification against a fixed digest. Used when no account
    /// matched so the response time matches a wrong-password attempt.
    pub fn verify_dummy(&self, password: &str) {
        let dummy = self.dummy.get_or_init(|| {
            bcrypt::hash("chessearn-timing-equalizer", self.cost).unwrap_or_default()
        });
        let _ = bcrypt::verify(password, dummy);
    }

    pub async fn hash_async(self: Arc<Self>, password: String) -> Result<String, AuthError> {
        tokio::task::spawn_blocking(move || self.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("hash task: {e}")))?
    }

    pub async fn verify_async(
        self: Arc<Self>,
        password: String,
        hash: String,
    ) -> Result<bool, AuthError> {
        tokio::task::spawn_blocking(move || self.verify(&password, &hash))
            .await
            .map_err(|e| AuthError::Internal(format!("verify task: {e}")))?
    }

    pub async fn verify_dummy_async(self: Arc<Self>, password: String) {
        let _ = tokio::task::spawn_blocking(move || self.verify_dummy(&password)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hasher = PasswordHasher::new(4);
        let digest = hasher.hash("longenough1").unwrap();
        assert_ne!(digest, "longenough1");
        assert!(hasher.verify("longenough1", &digest).unwrap());
        assert!(!hasher.verify("wrong-password", &digest).unwrap());
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let hasher = PasswordHasher::new(4);
        let a = hasher.hash("longenough1").unwrap();
        let b = hasher.hash("longenough1").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn cost_is_clamped() {
        assert_eq!(PasswordHasher::new(1).cost(), 4);
        assert_eq!(PasswordHasher::new(99).cost(), 31);
    }

    #[tokio::test]
    async fn async_variants_run_off_the_runtime() {
        let hasher = Arc::new(PasswordHasher::new(4));
        let digest = hasher.clone().hash_async("longenough1".into()).await.unwrap();
        let ok = hasher
            .clone()
            .verify_async("longenough1".into(), digest)
            .await
            .unwrap();
        assert!(ok);
        hasher.verify_dummy_async("whatever".into()).await;
    }
}
