use std::fmt;

use serde::Deserialize;

use crate::error::AuthError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database connection URL (e.g. sqlite://latchkey.db?mode=rwc, postgres://...)
    pub database_url: String,

    /// Environment: development, production, test
    pub environment: String,

    /// Token signing material and lifetimes.
    pub auth: AuthSettings,
}

/// Signing configuration for issued tokens.
///
/// Every field is required. There is no development fallback for the signing
/// key: a missing key is a startup failure.
#[derive(Clone, Deserialize)]
pub struct AuthSettings {
    /// Symmetric HMAC-SHA256 key for access tokens.
    pub token_signing_key: String,

    /// `iss` claim written into and required from access tokens.
    pub token_issuer: String,

    /// `aud` claim written into and required from access tokens.
    pub token_audience: String,

    /// Access token lifetime in minutes.
    pub access_token_lifetime_minutes: u32,

    /// Refresh token lifetime in minutes. Must exceed the access lifetime.
    pub refresh_token_lifetime_minutes: u32,
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("token_signing_key", &"<redacted>")
            .field("token_issuer", &self.token_issuer)
            .field("token_audience", &self.token_audience)
            .field(
                "access_token_lifetime_minutes",
                &self.access_token_lifetime_minutes,
            )
            .field(
                "refresh_token_lifetime_minutes",
                &self.refresh_token_lifetime_minutes,
            )
            .finish()
    }
}

impl AuthSettings {
    /// Check the startup invariants of the signing configuration.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.token_signing_key.trim().is_empty() {
            return Err(AuthError::Configuration(
                "Token signing key is missing".to_string(),
            ));
        }
        if self.token_issuer.trim().is_empty() {
            return Err(AuthError::Configuration(
                "Token issuer is missing".to_string(),
            ));
        }
        if self.token_audience.trim().is_empty() {
            return Err(AuthError::Configuration(
                "Token audience is missing".to_string(),
            ));
        }
        if self.access_token_lifetime_minutes == 0 {
            return Err(AuthError::Configuration(
                "Access token lifetime must be positive".to_string(),
            ));
        }
        if self.refresh_token_lifetime_minutes <= self.access_token_lifetime_minutes {
            return Err(AuthError::Configuration(
                "Refresh token lifetime must exceed the access token lifetime".to_string(),
            ));
        }
        Ok(())
    }

    /// Load the signing configuration from `AUTH_*` environment variables.
    pub fn from_env() -> Result<Self, AuthError> {
        let settings = AuthSettings {
            token_signing_key: required_var("AUTH_TOKEN_SIGNING_KEY")?,
            token_issuer: required_var("AUTH_TOKEN_ISSUER")?,
            token_audience: required_var("AUTH_TOKEN_AUDIENCE")?,
            access_token_lifetime_minutes: required_minutes("AUTH_ACCESS_TOKEN_LIFETIME_MINUTES")?,
            refresh_token_lifetime_minutes: required_minutes(
                "AUTH_REFRESH_TOKEN_LIFETIME_MINUTES",
            )?,
        };
        settings.validate()?;
        Ok(settings)
    }
}

impl Config {
    /// Load configuration from environment variables (with .env support).
    pub fn from_env() -> Result<Self, AuthError> {
        // Load .env file if present (ignore errors if missing)
        let _ = dotenvy::dotenv();

        Ok(Config {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://latchkey.db?mode=rwc".to_string()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            auth: AuthSettings::from_env()?,
        })
    }

    /// Check if running in development mode.
    pub fn is_dev(&self) -> bool {
        self.environment == "development"
    }
}

fn required_var(name: &str) -> Result<String, AuthError> {
    std::env::var(name).map_err(|_| AuthError::Configuration(format!("{name} is not set")))
}

fn required_minutes(name: &str) -> Result<u32, AuthError> {
    required_var(name)?
        .trim()
        .parse()
        .map_err(|e| AuthError::Configuration(format!("{name} is not a valid minute count: {e}")))
}
