//! Repository traits - abstraction layer for account data
//!
//! The game core only needs three questions answered about accounts; any
//! backend that can answer them plugs in behind [`UserRepo`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::AuthError;

/// Result type for repository operations
pub type RepoResult<T> = Result<T, AuthError>;

/// Public account record (never carries the password hash)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: String,
    pub login: String,
    pub created_at: DateTime<Utc>,
}

/// Repository for player accounts
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn create_user(&self, login: &str, password: &str) -> RepoResult<UserRecord>;
    async fn validate_credentials(&self, login: &str, password: &str) -> RepoResult<UserRecord>;
    async fn get_user_by_id(&self, id: &str) -> RepoResult<UserRecord>;
    async fn count(&self) -> RepoResult<usize>;
}
