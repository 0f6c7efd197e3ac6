//! Caller-facing operations.
//!
//! Collapses the orchestrator's outcomes into a deliberately coarse result so
//! callers cannot tell an unknown user from a wrong password or a spent
//! refresh token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::jwt::{Claims, NewToken, TokenData};
use crate::auth::service::{AuthService, LoginOutcome, LogoutOutcome};
use crate::domain::{User, UserRole};
use crate::error::AuthError;
use crate::store::UnitOfWorkFactory;
use crate::users::{RegisterOutcome, UserService};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    /// Defaults to `User` when omitted.
    #[serde(default)]
    pub role: Option<UserRole>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRefreshRequest {
    pub username: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub username: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDataDto {
    pub token: String,
    /// RFC 3339
    pub expiration: DateTime<Utc>,
}

impl From<TokenData> for TokenDataDto {
    fn from(data: TokenData) -> Self {
        TokenDataDto {
            token: data.token,
            expiration: data.expiration,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: TokenDataDto,
    pub refresh_token: TokenDataDto,
}

impl From<NewToken> for TokenResponse {
    fn from(token: NewToken) -> Self {
        TokenResponse {
            access_token: token.access_token.into(),
            refresh_token: token.refresh_token.into(),
        }
    }
}

/// Public user data (safe to return to callers).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub role: UserRole,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            username: user.username,
            role: user.role,
        }
    }
}

/// Error detail in a response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Boundary error. Internal details never leave this layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Unauthorized => 401,
            ApiError::Conflict(_) => 409,
            ApiError::BadRequest(_) => 400,
            ApiError::Internal => 500,
        }
    }

    /// Get the error code string for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Internal => "INTERNAL_ERROR",
        }
    }

    pub fn detail(&self) -> ErrorDetail {
        ErrorDetail {
            code: self.error_code().to_string(),
            message: self.to_string(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(message) => ApiError::BadRequest(message),
            AuthError::Conflict(message) => ApiError::Conflict(message),
            AuthError::InvalidCredential | AuthError::InvalidToken(_) => ApiError::Unauthorized,
            other => {
                tracing::error!(code = other.error_code(), error = %other, "Request failed");
                ApiError::Internal
            }
        }
    }
}

/// Registration, login, refresh and logout over one store.
///
/// Each call runs in its own unit of work from `F`.
pub struct AuthApi<F: UnitOfWorkFactory> {
    store: F,
    auth: AuthService,
    users: UserService,
}

impl<F: UnitOfWorkFactory> AuthApi<F> {
    pub fn new(store: F, auth: AuthService) -> Self {
        let users = UserService::new(auth.hasher().clone());
        Self { store, auth, users }
    }

    pub fn store(&self) -> &F {
        &self.store
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<UserResponse, ApiError> {
        let mut uow = self.store.unit_of_work();
        let role = request.role.unwrap_or(UserRole::User);

        match self
            .users
            .register(&mut uow, &request.username, &request.password, role)
            .await?
        {
            RegisterOutcome::Created(user) => Ok(user.into()),
            RegisterOutcome::DuplicateUsername => {
                Err(ApiError::Conflict("Username is already taken".to_string()))
            }
        }
    }

    pub async fn login(&self, request: LoginRequest) -> Result<TokenResponse, ApiError> {
        let mut uow = self.store.unit_of_work();
        let outcome = self
            .auth
            .attempt_login(&mut uow, &request.username, &request.password)
            .await?;
        token_response(outcome)
    }

    pub async fn refresh(&self, request: TokenRefreshRequest) -> Result<TokenResponse, ApiError> {
        let mut uow = self.store.unit_of_work();
        let outcome = self
            .auth
            .attempt_token_refresh(&mut uow, &request.username, &request.refresh_token)
            .await?;
        token_response(outcome)
    }

    pub async fn logout(&self, request: LogoutRequest) -> Result<(), ApiError> {
        let mut uow = self.store.unit_of_work();
        match self
            .auth
            .attempt_logout(&mut uow, &request.username, &request.refresh_token)
            .await?
        {
            LogoutOutcome::Success => Ok(()),
            LogoutOutcome::NotFound => Err(ApiError::Unauthorized),
        }
    }

    /// Validate an access token issued by this service.
    pub fn inspect(&self, access_token: &str) -> Result<Claims, ApiError> {
        Ok(self.auth.validate_access_token(access_token)?)
    }
}

fn token_response(outcome: LoginOutcome) -> Result<TokenResponse, ApiError> {
    match outcome {
        LoginOutcome::Success(token) => Ok(token.into()),
        LoginOutcome::NotFound | LoginOutcome::Failure(_) => Err(ApiError::Unauthorized),
    }
}
