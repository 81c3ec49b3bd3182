//! Account authentication: salted password hashes, session tokens, and the
//! token check a game connection passes before a player is created.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::RngCore;
use sha3::{Digest, Sha3_256};
use std::collections::HashMap;
use thiserror::Error;

use crate::storage::repository::UserRepo;

#[derive(Debug, Error, PartialEq)]
pub enum AuthError {
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("Invalid login or password")]
    InvalidCredentials,
    #[error("Login already taken: {0}")]
    LoginTaken(String),
    #[error("Invalid or expired session token")]
    InvalidToken,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Identity handed to the world when a connection is accepted
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub username: String,
}

// ============================================================================
// Hashing
// ============================================================================

pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Random salt, hex-encoded
pub fn generate_salt() -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    to_hex(&salt)
}

/// SHA3-256 over salt then password, hex-encoded
pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    to_hex(&hasher.finalize())
}

/// Compare without short-circuiting on the first differing byte
pub fn verify_password(salt: &str, password: &str, expected_hash: &str) -> bool {
    let actual = hash_password(salt, password);
    actual.len() == expected_hash.len()
        && actual
            .bytes()
            .zip(expected_hash.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Logins: 3–32 chars of `[A-Za-z0-9_-]`. Passwords: at least 6 chars.
pub fn validate_new_credentials(login: &str, password: &str) -> Result<(), AuthError> {
    let login_ok = (3..=32).contains(&login.chars().count())
        && login
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !login_ok {
        return Err(AuthError::InvalidInput(
            "login must be 3-32 characters of letters, digits, '_' or '-'".into(),
        ));
    }
    if password.chars().count() < 6 {
        return Err(AuthError::InvalidInput(
            "password must be at least 6 characters".into(),
        ));
    }
    Ok(())
}

// ============================================================================
// Sessions
// ============================================================================

#[derive(Debug, Clone)]
struct Session {
    user_id: String,
    issued_at: DateTime<Utc>,
}

/// Opaque bearer tokens issued on login
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, user_id: &str) -> String {
        let mut raw = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut raw);
        let token = to_hex(&raw);
        self.sessions.write().insert(
            token.clone(),
            Session {
                user_id: user_id.to_string(),
                issued_at: Utc::now(),
            },
        );
        token
    }

    pub fn resolve(&self, token: &str) -> Option<String> {
        self.sessions.read().get(token).map(|s| s.user_id.clone())
    }

    /// Drop a token. Returns when it was issued, or `None` if it was unknown.
    pub fn revoke(&self, token: &str) -> Option<DateTime<Utc>> {
        self.sessions.write().remove(token).map(|s| s.issued_at)
    }

    pub fn active_count(&self) -> usize {
        self.sessions.read().len()
    }
}

/// Resolve a connection token to the account behind it
pub async fn authenticate(
    users: &dyn UserRepo,
    sessions: &SessionStore,
    token: Option<&str>,
) -> Result<AuthenticatedUser, AuthError> {
    let token = token.filter(|t| !t.is_empty()).ok_or(AuthError::InvalidToken)?;
    let user_id = sessions.resolve(token).ok_or(AuthError::InvalidToken)?;
    let user = users.get_user_by_id(&user_id).await?;
    Ok(AuthenticatedUser {
        user_id: user.id,
        username: user.login,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::InMemoryUserRepo;

    #[test]
    fn test_hash_is_salted() {
        let a = hash_password("salt-a", "hunter22");
        let b = hash_password("salt-b", "hunter22");
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert_eq!(a, hash_password("salt-a", "hunter22"));
    }

    #[test]
    fn test_verify_password() {
        let salt = generate_salt();
        let hash = hash_password(&salt, "correct horse");
        assert!(verify_password(&salt, "correct horse", &hash));
        assert!(!verify_password(&salt, "wrong horse", &hash));
        assert!(!verify_password(&salt, "correct horse", "abc"));
    }

    #[test]
    fn test_credential_rules() {
        assert!(validate_new_credentials("alice", "secret1").is_ok());
        assert!(validate_new_credentials("al", "secret1").is_err());
        assert!(validate_new_credentials("bad login", "secret1").is_err());
        assert!(validate_new_credentials("alice", "123").is_err());
    }

    #[test]
    fn test_session_issue_resolve_revoke() {
        let store = SessionStore::new();
        let token = store.issue("u1");
        assert_eq!(token.len(), 64);
        assert_eq!(store.resolve(&token), Some("u1".to_string()));
        assert_ne!(store.issue("u1"), token);
        assert_eq!(store.active_count(), 2);

        let before = Utc::now();
        let issued = store.revoke(&token).unwrap();
        assert!(issued <= before);
        assert_eq!(store.resolve(&token), None);
        assert_eq!(store.revoke(&token), None);
        assert_eq!(store.active_count(), 1);
    }

    #[tokio::test]
    async fn test_authenticate() {
        let users = InMemoryUserRepo::new();
        let sessions = SessionStore::new();
        let user = users.create_user("alice", "secret1").await.unwrap();
        let token = sessions.issue(&user.id);

        let who = authenticate(&users, &sessions, Some(&token)).await.unwrap();
        assert_eq!(who.user_id, user.id);
        assert_eq!(who.username, "alice");

        assert_eq!(
            authenticate(&users, &sessions, Some("bogus")).await,
            Err(AuthError::InvalidToken)
        );
        assert_eq!(
            authenticate(&users, &sessions, None).await,
            Err(AuthError::InvalidToken)
        );
    }
}
