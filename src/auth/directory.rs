//! In-memory user directory backing the login and register endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};

use super::password::PasswordHasher;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("user already exists")]
    UserExists,
    #[error("user not found")]
    UserNotFound,
    #[error("password hashing failed: {0}")]
    Hashing(argon2::password_hash::Error),
}

/// A `username:password` pair loaded from configuration at startup.
#[derive(Debug, Clone)]
pub struct SeedUser {
    pub username: String,
    pub password: SecretString,
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub pending_totp_secret: Option<String>,
}

#[derive(Clone)]
pub struct UserDirectory {
    users: Arc<RwLock<HashMap<String, UserRecord>>>,
    hasher: PasswordHasher,
    // Checked when the username is unknown so both paths cost one hash verification.
    dummy_hash: Arc<str>,
}

impl UserDirectory {
    pub fn new(hasher: PasswordHasher) -> Result<Self, DirectoryError> {
        let dummy_hash = hasher
            .hash("keygate-unknown-user")
            .map_err(DirectoryError::Hashing)?;

        Ok(Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            hasher,
            dummy_hash: Arc::from(dummy_hash),
        })
    }

    pub fn seed(&self, seeds: &[SeedUser]) -> Result<usize, DirectoryError> {
        let mut created = 0;
        for seed in seeds {
            match self.register(&seed.username, seed.password.expose_secret()) {
                Ok(()) => created += 1,
                Err(DirectoryError::UserExists) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(created)
    }

    pub fn register(&self, username: &str, password: &str) -> Result<(), DirectoryError> {
        if self.users.read().contains_key(username) {
            return Err(DirectoryError::UserExists);
        }

        let password_hash = self.hasher.hash(password).map_err(DirectoryError::Hashing)?;

        let mut users = self.users.write();
        if users.contains_key(username) {
            return Err(DirectoryError::UserExists);
        }
        users.insert(
            username.to_string(),
            UserRecord {
                username: username.to_string(),
                password_hash,
                created_at: Utc::now(),
                pending_totp_secret: None,
            },
        );
        Ok(())
    }

    /// Returns `Ok(false)` for unknown users and wrong passwords alike.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<bool, DirectoryError> {
        let stored_hash = self
            .users
            .read()
            .get(username)
            .map(|user| user.password_hash.clone());

        match stored_hash {
            Some(hash) => self
                .hasher
                .verify(password, &hash)
                .map_err(DirectoryError::Hashing),
            None => {
                let _ = self.hasher.verify(password, &self.dummy_hash);
                Ok(false)
            }
        }
    }

    pub fn get(&self, username: &str) -> Option<UserRecord> {
        self.users.read().get(username).cloned()
    }

    pub fn set_pending_totp(&self, username: &str, secret: String) -> Result<(), DirectoryError> {
        let mut users = self.users.write();
        let user = users
            .get_mut(username)
            .ok_or(DirectoryError::UserNotFound)?;
        user.pending_totp_secret = Some(secret);
        Ok(())
    }
}
