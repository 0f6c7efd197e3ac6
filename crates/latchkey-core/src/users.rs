use tracing::{debug, info, warn};

use crate::auth::password::PasswordHasher;
use crate::auth::service::{finish, Outcome};
use crate::domain::{validate_username, NewUser, User, UserRole};
use crate::error::AuthError;
use crate::store::UnitOfWork;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    Created(User),
    DuplicateUsername,
}

impl Outcome for RegisterOutcome {
    fn is_success(&self) -> bool {
        matches!(self, RegisterOutcome::Created(_))
    }
}

/// User registration and lookup.
#[derive(Debug, Clone)]
pub struct UserService {
    hasher: PasswordHasher,
}

impl UserService {
    pub fn new(hasher: PasswordHasher) -> Self {
        Self { hasher }
    }

    /// Create a user unless the username is taken.
    ///
    /// Input is validated before any transaction opens. A registration that
    /// loses a race for the same username at insert or commit time is also
    /// reported as `DuplicateUsername`.
    pub async fn register<U: UnitOfWork>(
        &self,
        uow: &mut U,
        username: &str,
        password: &str,
        role: UserRole,
    ) -> Result<RegisterOutcome, AuthError> {
        validate_username(username)?;
        if password.is_empty() {
            return Err(AuthError::Validation("Password is required".to_string()));
        }

        uow.begin().await?;
        let result = self.create(uow, username, password, role).await;
        match finish(uow, result).await {
            Err(AuthError::Conflict(message)) => {
                debug!(username, %message, "Registration rejected: username taken concurrently");
                Ok(RegisterOutcome::DuplicateUsername)
            }
            other => other,
        }
    }

    async fn create<U: UnitOfWork>(
        &self,
        uow: &mut U,
        username: &str,
        password: &str,
        role: UserRole,
    ) -> Result<RegisterOutcome, AuthError> {
        if uow.get_by_username(username).await?.is_some() {
            debug!(username, "Registration rejected: username taken");
            return Ok(RegisterOutcome::DuplicateUsername);
        }

        let hashed = self.hasher.hash(password)?;
        let user = uow
            .add(NewUser {
                username: username.to_string(),
                password_hash: hashed.hash,
                password_salt: hashed.salt,
                role,
            })
            .await?;

        info!(username, user_id = user.id, role = %user.role, "User registered");
        Ok(RegisterOutcome::Created(user))
    }

    pub async fn get_by_username<U: UnitOfWork>(
        &self,
        uow: &mut U,
        username: &str,
    ) -> Result<Option<User>, AuthError> {
        uow.begin().await?;
        match uow.get_by_username(username).await {
            Ok(user) => {
                uow.commit().await?;
                Ok(user)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(error = %rollback_err, "Rollback after failed lookup also failed");
                }
                Err(err)
            }
        }
    }
}
