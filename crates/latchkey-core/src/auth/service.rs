//! Login, refresh and logout as explicit state machines over a unit of work.
//!
//! Every operation opens exactly one (possibly nested) transaction on the unit
//! it is given. A `Success` outcome commits; any other outcome, and any error,
//! rolls back so nothing from a rejected attempt is persisted.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::auth::jwt::{Claims, NewToken, TokenIssuer};
use crate::auth::password::PasswordHasher;
use crate::auth::refresh::RefreshTokenSet;
use crate::clock::Clock;
use crate::config::AuthSettings;
use crate::error::AuthError;
use crate::store::UnitOfWork;

/// Why a login or refresh attempt was refused. Never shown to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    UnknownUser,
    InvalidCredential,
}

/// Result of a login or token refresh.
///
/// The flows here report a missing user as `Failure(Rejection::UnknownUser)`.
/// Callers must still treat `NotFound` like any `Failure`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success(NewToken),
    NotFound,
    Failure(Rejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutOutcome {
    Success,
    NotFound,
}

pub(crate) trait Outcome {
    fn is_success(&self) -> bool;
}

impl Outcome for LoginOutcome {
    fn is_success(&self) -> bool {
        matches!(self, LoginOutcome::Success(_))
    }
}

impl Outcome for LogoutOutcome {
    fn is_success(&self) -> bool {
        matches!(self, LogoutOutcome::Success)
    }
}

/// Coordinates password checks, refresh-token bookkeeping and token issuance.
pub struct AuthService {
    hasher: PasswordHasher,
    issuer: TokenIssuer,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    pub fn new(settings: AuthSettings, clock: Arc<dyn Clock>) -> Result<Self, AuthError> {
        Self::with_hasher(settings, clock, PasswordHasher::new())
    }

    pub fn with_hasher(
        settings: AuthSettings,
        clock: Arc<dyn Clock>,
        hasher: PasswordHasher,
    ) -> Result<Self, AuthError> {
        let issuer = TokenIssuer::new(settings, Arc::clone(&clock))?;
        Ok(Self {
            hasher,
            issuer,
            clock,
        })
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.issuer.validate_access_token(token)
    }

    pub async fn attempt_login<U: UnitOfWork>(
        &self,
        uow: &mut U,
        username: &str,
        password: &str,
    ) -> Result<LoginOutcome, AuthError> {
        uow.begin().await?;
        let result = self.login(uow, username, password).await;
        finish(uow, result).await
    }

    pub async fn attempt_token_refresh<U: UnitOfWork>(
        &self,
        uow: &mut U,
        username: &str,
        refresh_token: &str,
    ) -> Result<LoginOutcome, AuthError> {
        uow.begin().await?;
        let result = self.refresh(uow, username, refresh_token).await;
        finish(uow, result).await
    }

    pub async fn attempt_logout<U: UnitOfWork>(
        &self,
        uow: &mut U,
        username: &str,
        refresh_token: &str,
    ) -> Result<LogoutOutcome, AuthError> {
        uow.begin().await?;
        let result = self.logout(uow, username, refresh_token).await;
        finish(uow, result).await
    }

    async fn login<U: UnitOfWork>(
        &self,
        uow: &mut U,
        username: &str,
        password: &str,
    ) -> Result<LoginOutcome, AuthError> {
        let Some(user) = uow.get_by_username(username).await? else {
            self.hasher.verify_absent(password);
            debug!(username, "Login rejected: unknown user");
            return Ok(LoginOutcome::Failure(Rejection::UnknownUser));
        };

        if !self
            .hasher
            .verify(password, &user.password_hash, &user.password_salt)
        {
            debug!(username, "Login rejected: invalid password");
            return Ok(LoginOutcome::Failure(Rejection::InvalidCredential));
        }

        let mut tokens = RefreshTokenSet::for_user(&user);
        let pruned = tokens.prune_expired(self.clock.now());

        let issued = self.issuer.create_token(&user)?;
        tokens.store_issued(&self.hasher, &issued.refresh_token)?;
        let active = tokens.len();
        uow.apply_token_changes(user.id, &tokens.into_changes()).await?;

        info!(username, pruned, active, "Login succeeded");
        Ok(LoginOutcome::Success(issued))
    }

    async fn refresh<U: UnitOfWork>(
        &self,
        uow: &mut U,
        username: &str,
        refresh_token: &str,
    ) -> Result<LoginOutcome, AuthError> {
        let Some(user) = uow.get_by_username(username).await? else {
            self.hasher.verify_absent(refresh_token);
            debug!(username, "Refresh rejected: unknown user");
            return Ok(LoginOutcome::Failure(Rejection::UnknownUser));
        };

        let mut tokens = RefreshTokenSet::for_user(&user);
        tokens.prune_expired(self.clock.now());

        let Some(matched) = tokens.find_match(&self.hasher, refresh_token).map(|t| t.id) else {
            debug!(username, "Refresh rejected: no matching refresh token");
            return Ok(LoginOutcome::Failure(Rejection::InvalidCredential));
        };
        tokens.remove(matched);

        let issued = self.issuer.create_token(&user)?;
        tokens.store_issued(&self.hasher, &issued.refresh_token)?;
        uow.apply_token_changes(user.id, tokens.changes()).await?;

        info!(username, "Token refreshed");
        Ok(LoginOutcome::Success(issued))
    }

    async fn logout<U: UnitOfWork>(
        &self,
        uow: &mut U,
        username: &str,
        refresh_token: &str,
    ) -> Result<LogoutOutcome, AuthError> {
        let Some(user) = uow.get_by_username(username).await? else {
            self.hasher.verify_absent(refresh_token);
            debug!(username, "Logout: unknown user");
            return Ok(LogoutOutcome::NotFound);
        };

        // Expired tokens are still revocable here.
        let mut tokens = RefreshTokenSet::for_user(&user);
        let Some(matched) = tokens.find_match(&self.hasher, refresh_token).map(|t| t.id) else {
            debug!(username, "Logout: no matching refresh token");
            return Ok(LogoutOutcome::NotFound);
        };
        tokens.remove(matched);
        uow.apply_token_changes(user.id, tokens.changes()).await?;

        info!(username, "Logged out");
        Ok(LogoutOutcome::Success)
    }
}

/// Commit a successful outcome, roll back anything else.
pub(crate) async fn finish<U: UnitOfWork, T: Outcome>(
    uow: &mut U,
    result: Result<T, AuthError>,
) -> Result<T, AuthError> {
    match result {
        Ok(outcome) if outcome.is_success() => {
            uow.commit().await?;
            Ok(outcome)
        }
        Ok(outcome) => {
            uow.rollback().await?;
            Ok(outcome)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                warn!(error = %rollback_err, "Rollback after failed operation also failed");
            }
            Err(err)
        }
    }
}
