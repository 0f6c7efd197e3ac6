use thiserror::Error;

/// Standard error type for the authentication core.
///
/// Expected negative results (unknown user, wrong password, unmatched refresh
/// token) are *outcomes*, not errors; see [`crate::auth::service`]. This type
/// carries the unexpected and the fatal cases.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// A refresh token was redeemed or revoked by a concurrent unit of work.
    #[error("Invalid credential")]
    InvalidCredential,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl AuthError {
    /// Get the error code string for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::NotFound(_) => "NOT_FOUND",
            AuthError::InvalidCredential => "INVALID_CREDENTIAL",
            AuthError::Conflict(_) => "CONFLICT",
            AuthError::InvalidToken(_) => "INVALID_TOKEN",
            AuthError::Validation(_) => "VALIDATION_ERROR",
            AuthError::Configuration(_) => "CONFIGURATION_ERROR",
            AuthError::Storage(_) => "STORAGE_FAILURE",
            AuthError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Whether this error means the process is misconfigured and must not serve requests.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AuthError::Configuration(_))
    }
}

impl From<ring::error::Unspecified> for AuthError {
    fn from(_: ring::error::Unspecified) -> Self {
        AuthError::Storage("Cryptographic operation failed".to_string())
    }
}
