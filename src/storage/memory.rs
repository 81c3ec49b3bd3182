//! In-process account store with salted SHA3-256 password hashes

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

use super::repository::{RepoResult, UserRecord, UserRepo};
use crate::auth::{generate_salt, hash_password, validate_new_credentials, verify_password, AuthError};

#[derive(Debug, Clone)]
struct StoredUser {
    record: UserRecord,
    salt: String,
    password_hash: String,
}

#[derive(Debug, Default)]
pub struct InMemoryUserRepo {
    /// login → user
    users: RwLock<HashMap<String, StoredUser>>,
    next_id: AtomicU64,
}

impl InMemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepo for InMemoryUserRepo {
    async fn create_user(&self, login: &str, password: &str) -> RepoResult<UserRecord> {
        validate_new_credentials(login, password)?;

        let mut users = self.users.write();
        if users.contains_key(login) {
            return Err(AuthError::LoginTaken(login.to_string()));
        }

        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let record = UserRecord {
            id: format!("{n:016x}"),
            login: login.to_string(),
            created_at: Utc::now(),
        };
        let salt = generate_salt();
        let password_hash = hash_password(&salt, password);
        users.insert(
            login.to_string(),
            StoredUser {
                record: record.clone(),
                salt,
                password_hash,
            },
        );
        info!(user_id = %record.id, login, "account created");
        Ok(record)
    }

    async fn validate_credentials(&self, login: &str, password: &str) -> RepoResult<UserRecord> {
        let users = self.users.read();
        let user = users.get(login).ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(&user.salt, password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(user.record.clone())
    }

    async fn get_user_by_id(&self, id: &str) -> RepoResult<UserRecord> {
        self.users
            .read()
            .values()
            .find(|u| u.record.id == id)
            .map(|u| u.record.clone())
            .ok_or_else(|| AuthError::UserNotFound(id.to_string()))
    }

    async fn count(&self) -> RepoResult<usize> {
        Ok(self.users.read().len())
    }
}
