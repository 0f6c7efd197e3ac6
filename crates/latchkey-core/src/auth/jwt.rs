use std::fmt;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::rbac;
use crate::clock::Clock;
use crate::config::AuthSettings;
use crate::domain::{User, UserRole};
use crate::error::AuthError;

/// Entropy of an opaque refresh token, before base64.
pub const REFRESH_TOKEN_BYTES: usize = 32;

/// Allowed disagreement between issuer and validator clocks.
const CLOCK_SKEW_SECS: i64 = 1;

/// JWT claims payload of an access token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Username
    pub sub: String,
    /// Every role implied by the user's role
    pub roles: Vec<String>,
    /// Random per-issuance serial number
    #[serde(rename = "sn")]
    pub serial_number: String,
    pub iss: String,
    pub aud: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Not before (Unix timestamp)
    pub nbf: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Whether this token passes a check for `role` under the role hierarchy.
    pub fn has_role(&self, role: UserRole) -> bool {
        rbac::satisfies(&self.roles, role)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    AccessToken,
    RefreshToken,
}

/// A token string plus its type and absolute expiration.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenData {
    pub token: String,
    pub token_type: TokenType,
    pub expiration: DateTime<Utc>,
}

impl fmt::Debug for TokenData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenData")
            .field("token_type", &self.token_type)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

/// Access and refresh token minted by one issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewToken {
    pub access_token: TokenData,
    pub refresh_token: TokenData,
}

/// Mints access/refresh token pairs and validates the access tokens it minted.
pub struct TokenIssuer {
    settings: AuthSettings,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    /// Build an issuer, refusing invalid signing configuration.
    pub fn new(settings: AuthSettings, clock: Arc<dyn Clock>) -> Result<Self, AuthError> {
        settings.validate()?;

        let secret = settings.token_signing_key.as_bytes();
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            settings,
            clock,
        })
    }

    pub fn access_token_lifetime(&self) -> Duration {
        Duration::minutes(i64::from(self.settings.access_token_lifetime_minutes))
    }

    pub fn refresh_token_lifetime(&self) -> Duration {
        Duration::minutes(i64::from(self.settings.refresh_token_lifetime_minutes))
    }

    /// Mint a fresh access/refresh pair for `user`.
    pub fn create_token(&self, user: &User) -> Result<NewToken, AuthError> {
        if self.settings.token_signing_key.trim().is_empty() {
            return Err(AuthError::Configuration(
                "Token signing key is missing".to_string(),
            ));
        }

        let now = self.clock.now();
        let access_token = self.create_access_token(user, now)?;
        let refresh_token = self.create_refresh_token(now);

        Ok(NewToken {
            access_token,
            refresh_token,
        })
    }

    fn create_access_token(&self, user: &User, now: DateTime<Utc>) -> Result<TokenData, AuthError> {
        let expiration = now + self.access_token_lifetime();

        let claims = Claims {
            sub: user.username.clone(),
            roles: rbac::role_claims(user.role),
            serial_number: Uuid::new_v4().simple().to_string(),
            iss: self.settings.token_issuer.clone(),
            aud: self.settings.token_audience.clone(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expiration.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Configuration(format!("Failed to sign token: {}", e)))?;

        Ok(TokenData {
            token,
            token_type: TokenType::AccessToken,
            expiration,
        })
    }

    fn create_refresh_token(&self, now: DateTime<Utc>) -> TokenData {
        let mut buffer = [0u8; REFRESH_TOKEN_BYTES];
        OsRng.fill_bytes(&mut buffer);

        TokenData {
            token: BASE64.encode(buffer),
            token_type: TokenType::RefreshToken,
            expiration: now + self.refresh_token_lifetime(),
        }
    }

    /// Validate an access token and return its claims.
    ///
    /// Signature, issuer and audience are checked by `jsonwebtoken`; the
    /// lifetime is checked against the injected clock.
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.settings.token_issuer.as_str()]);
        validation.set_audience(&[self.settings.token_audience.as_str()]);
        validation.validate_exp = false;
        validation.validate_nbf = false;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?
            .claims;

        let now = self.clock.now().timestamp();
        if now < claims.nbf - CLOCK_SKEW_SECS {
            return Err(AuthError::InvalidToken("Token is not yet valid".to_string()));
        }
        if now > claims.exp + CLOCK_SKEW_SECS {
            return Err(AuthError::InvalidToken("Token has expired".to_string()));
        }

        Ok(claims)
    }
}
