use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::jwt::TokenData;
use crate::auth::password::PasswordHasher;
use crate::domain::{ActiveRefreshToken, TokenChange, User};
use crate::error::AuthError;

/// One user's active refresh tokens for the duration of a unit of work.
///
/// Starts from the repository snapshot. Every mutation is mirrored into a
/// [`TokenChange`] journal, which the caller applies through the unit of work
/// before committing.
#[derive(Debug, Clone)]
pub struct RefreshTokenSet {
    user_id: i32,
    tokens: Vec<ActiveRefreshToken>,
    changes: Vec<TokenChange>,
}

impl RefreshTokenSet {
    pub fn new(user_id: i32, tokens: Vec<ActiveRefreshToken>) -> Self {
        Self {
            user_id,
            tokens,
            changes: Vec::new(),
        }
    }

    pub fn for_user(user: &User) -> Self {
        Self::new(user.id, user.refresh_tokens.clone())
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveRefreshToken> {
        self.tokens.iter()
    }

    pub fn add(&mut self, token: ActiveRefreshToken) {
        self.changes.push(TokenChange::Add(token.clone()));
        self.tokens.push(token);
    }

    pub fn remove(&mut self, id: Uuid) -> Option<ActiveRefreshToken> {
        let index = self.tokens.iter().position(|t| t.id == id)?;
        self.changes.push(TokenChange::Remove(id));
        Some(self.tokens.remove(index))
    }

    /// Drop every token whose expiration is at or before `now`.
    pub fn prune_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.tokens.len();
        let changes = &mut self.changes;
        self.tokens.retain(|t| {
            if t.is_expired(now) {
                changes.push(TokenChange::Prune(t.id));
                false
            } else {
                true
            }
        });
        before - self.tokens.len()
    }

    /// Find the stored token whose hash matches `candidate`.
    ///
    /// Hashes the candidate once per stored token with that token's salt, so
    /// the cost grows linearly with a user's active sessions.
    pub fn find_match(&self, hasher: &PasswordHasher, candidate: &str) -> Option<&ActiveRefreshToken> {
        self.tokens
            .iter()
            .find(|t| hasher.verify(candidate, &t.token_hash, &t.token_salt))
    }

    /// Hash a freshly issued refresh token and add it. Returns the new record's id.
    pub fn store_issued(&mut self, hasher: &PasswordHasher, issued: &TokenData) -> Result<Uuid, AuthError> {
        let hashed = hasher.hash(&issued.token)?;
        let id = Uuid::now_v7();

        self.add(ActiveRefreshToken {
            id,
            user_id: self.user_id,
            token_hash: hashed.hash,
            token_salt: hashed.salt,
            expiration: issued.expiration,
        });
        Ok(id)
    }

    pub fn changes(&self) -> &[TokenChange] {
        &self.changes
    }

    pub fn into_changes(self) -> Vec<TokenChange> {
        self.changes
    }
}
