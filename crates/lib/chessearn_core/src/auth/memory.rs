//! In-process implementations of [`CredentialStore`] and [`RevocationLedger`].
//!
//! State lives in this process only, so a logout recorded here is invisible
//! to other instances. Use these for tests and single-process demos; deploy
//! with the PostgreSQL implementations.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::AuthError;
use super::revocation::RevocationLedger;
use super::store::CredentialStore;
use super::validation::IdentifierKeys;
use crate::models::auth::{NewUser, User, UserChanges, UserWithPassword};

/// Credential store backed by a mutex-guarded vector.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    users: Mutex<Vec<UserWithPassword>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<UserWithPassword>>, AuthError> {
        self.users
            .lock()
            .map_err(|_| AuthError::Internal("credential store lock poisoned".into()))
    }
}

/// Reject `candidate` if another user (not `except_id`) already holds one of
/// its unique fields.
fn check_unique(
    users: &[UserWithPassword],
    except_id: Option<&str>,
    email: &str,
    username: &str,
    phone: &str,
) -> Result<(), AuthError> {
    for existing in users.iter().map(|u| &u.user) {
        if Some(existing.id.as_str()) == except_id {
            continue;
        }
        if existing.email == email {
            return Err(AuthError::Duplicate("Email already exists".into()));
        }
        if existing.username == username {
            return Err(AuthError::Duplicate("Username already exists".into()));
        }
        if existing.phone_number == phone {
            return Err(AuthError::Duplicate("Phone number already exists".into()));
        }
    }
    Ok(())
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<UserWithPassword>, AuthError> {
        let keys = IdentifierKeys::from_raw(identifier);
        let users = self.lock()?;
        let by_email = users.iter().find(|u| u.user.email == keys.email);
        let by_username = || users.iter().find(|u| u.user.username == keys.username);
        let by_phone = || {
            keys.phone
                .as_deref()
                .and_then(|phone| users.iter().find(|u| u.user.phone_number == phone))
        };
        Ok(by_email.or_else(by_username).or_else(by_phone).cloned())
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, AuthError> {
        let users = self.lock()?;
        Ok(users
            .iter()
            .find(|u| u.user.id == user_id)
            .map(|u| u.user.clone()))
    }

    async fn create(&self, new_user: NewUser) -> Result<User, AuthError> {
        let mut users = self.lock()?;
        check_unique(
            &users,
            None,
            &new_user.email,
            &new_user.username,
            &new_user.phone_number,
        )?;
        let user = User {
            id: Uuid::new_v4().to_string(),
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            email: new_user.email,
            username: new_user.username,
            phone_number: new_user.phone_number,
            role: new_user.role,
            wallet_balance: 0.0,
            ranking: 1200,
            is_active: true,
            is_verified: false,
            photo_filename: None,
            created_at: Utc::now(),
        };
        users.push(UserWithPassword {
            user: user.clone(),
            password_hash: new_user.password_hash,
        });
        Ok(user)
    }

    async fn update(
        &self,
        user_id: &str,
        changes: UserChanges,
    ) -> Result<Option<User>, AuthError> {
        let mut users = self.lock()?;
        let Some(index) = users.iter().position(|u| u.user.id == user_id) else {
            return Ok(None);
        };
        let mut updated = users[index].user.clone();
        changes.apply(&mut updated);
        check_unique(
            &users,
            Some(user_id),
            &updated.email,
            &updated.username,
            &updated.phone_number,
        )?;
        let entry = &mut users[index];
        entry.user = updated.clone();
        if let Some(hash) = changes.password_hash {
            entry.password_hash = hash;
        }
        Ok(Some(updated))
    }

    async fn update_password(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<bool, AuthError> {
        let mut users = self.lock()?;
        match users.iter_mut().find(|u| u.user.id == user_id) {
            Some(entry) => {
                entry.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_photo(&self, user_id: &str, filename: &str) -> Result<bool, AuthError> {
        let mut users = self.lock()?;
        match users.iter_mut().find(|u| u.user.id == user_id) {
            Some(entry) => {
                entry.user.photo_filename = Some(filename.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, user_id: &str) -> Result<bool, AuthError> {
        let mut users = self.lock()?;
        let before = users.len();
        users.retain(|u| u.user.id != user_id);
        Ok(users.len() < before)
    }

    async fn list_all(&self) -> Result<Vec<User>, AuthError> {
        let users = self.lock()?;
        Ok(users.iter().map(|u| u.user.clone()).collect())
    }
}

/// Revocation ledger backed by a concurrent map of jti → revoked-at.
#[derive(Debug, Default)]
pub struct MemoryRevocationLedger {
    entries: DashMap<String, DateTime<Utc>>,
}

impl MemoryRevocationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RevocationLedger for MemoryRevocationLedger {
    async fn is_revoked(&self, jti: &str) -> Result<bool, AuthError> {
        Ok(self.entries.contains_key(jti))
    }

    async fn revoke_many_at(
        &self,
        jtis: &[&str],
        revoked_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        for jti in jtis {
            self.entries.entry(jti.to_string()).or_insert(revoked_at);
        }
        Ok(())
    }

    async fn prune_older_than(&self, age: Duration) -> Result<u64, AuthError> {
        let cutoff = Utc::now() - age;
        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| *entry.value() < cutoff)
            .map(|entry| entry.key().clone())
            .collect();
        let mut removed = 0;
        for jti in stale {
            if self
                .entries
                .remove_if(&jti, |_, revoked_at| *revoked_at < cutoff)
                .is_some()
            {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
