//! Domain records handed out by the repository.
//!
//! These are immutable snapshots. Changes to a user's refresh tokens go back
//! through the unit of work as explicit [`TokenChange`] commands.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

/// Longest username the schema accepts.
pub const MAX_USERNAME_LENGTH: usize = 60;

/// Ordered role hierarchy. A higher role implies every permission of the lower ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UserRole {
    Guest,
    User,
    Admin,
}

impl UserRole {
    pub const ALL: [UserRole; 3] = [UserRole::Guest, UserRole::User, UserRole::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Guest => "Guest",
            UserRole::User => "User",
            UserRole::Admin => "Admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UserRole::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| AuthError::Validation(format!("Unknown role '{s}'")))
    }
}

/// One outstanding refresh credential. Only the salted hash of the secret is kept.
#[derive(Clone, PartialEq, Eq)]
pub struct ActiveRefreshToken {
    pub id: Uuid,
    pub user_id: i32,
    pub token_hash: Vec<u8>,
    pub token_salt: Vec<u8>,
    pub expiration: DateTime<Utc>,
}

impl ActiveRefreshToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration <= now
    }
}

impl fmt::Debug for ActiveRefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveRefreshToken")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

/// Snapshot of a user and the refresh tokens it owns.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub password_hash: Vec<u8>,
    pub password_salt: Vec<u8>,
    pub role: UserRole,
    pub refresh_tokens: Vec<ActiveRefreshToken>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("role", &self.role)
            .field("refresh_tokens", &self.refresh_tokens)
            .finish_non_exhaustive()
    }
}

/// Input to [`crate::store::UserRepository::add`].
#[derive(Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: Vec<u8>,
    pub password_salt: Vec<u8>,
    pub role: UserRole,
}

/// Mutation command for a user's refresh-token collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenChange {
    Add(ActiveRefreshToken),
    /// Redeem or revoke a token. Fails the write if the token is already gone.
    Remove(Uuid),
    /// Drop an expired token. A token already gone is skipped.
    Prune(Uuid),
}

/// Reject blank or over-long usernames.
pub fn validate_username(username: &str) -> Result<(), AuthError> {
    if username.trim().is_empty() {
        return Err(AuthError::Validation("Username is required".to_string()));
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(AuthError::Validation(format!(
            "Username must be at most {MAX_USERNAME_LENGTH} characters"
        )));
    }
    Ok(())
}
