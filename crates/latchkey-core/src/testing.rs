use std::num::NonZeroU32;
use std::sync::Arc;

use crate::api::{AuthApi, LoginRequest, RegisterRequest, TokenResponse};
use crate::auth::password::PasswordHasher;
use crate::auth::service::AuthService;
use crate::clock::ManualClock;
use crate::config::AuthSettings;
use crate::domain::UserRole;
use crate::store::{Database, MemoryStore, UnitOfWorkFactory};

/// PBKDF2 rounds used by test harnesses. Far below production strength.
pub const TEST_ITERATIONS: u32 = 1_000;

/// Signing settings for tests: 5 minute access tokens, 60 minute refresh tokens.
pub fn test_settings() -> AuthSettings {
    AuthSettings {
        token_signing_key: "test-signing-key-for-testing-0123456789".to_string(),
        token_issuer: "latchkey-test".to_string(),
        token_audience: "latchkey-test-clients".to_string(),
        access_token_lifetime_minutes: 5,
        refresh_token_lifetime_minutes: 60,
    }
}

pub fn test_hasher() -> PasswordHasher {
    PasswordHasher::with_iterations(NonZeroU32::new(TEST_ITERATIONS).expect("non-zero iterations"))
}

/// A ready-to-use [`AuthApi`] with a controllable clock.
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_login() {
///     let harness = TestHarness::memory();
///     harness.register("alice", "secret", UserRole::User).await;
///     let tokens = harness.login("alice", "secret").await;
///     assert!(tokens.access_token.expiration < tokens.refresh_token.expiration);
/// }
/// ```
pub struct TestHarness<F: UnitOfWorkFactory> {
    pub api: AuthApi<F>,
    pub clock: ManualClock,
}

impl TestHarness<MemoryStore> {
    /// Harness over a fresh in-memory store.
    pub fn memory() -> Self {
        Self::with_store(MemoryStore::new())
    }
}

impl TestHarness<Database> {
    /// Harness over a fresh, migrated in-memory SQLite database.
    pub async fn sqlite() -> Self {
        let db = Database::connect_url("sqlite::memory:")
            .await
            .expect("Failed to connect to test database");
        db.migrate().await.expect("Failed to run migrations");
        Self::with_store(db)
    }
}

impl<F: UnitOfWorkFactory> TestHarness<F> {
    pub fn with_store(store: F) -> Self {
        let clock = ManualClock::starting_now();
        let auth = AuthService::with_hasher(test_settings(), Arc::new(clock.clone()), test_hasher())
            .expect("Failed to build auth service");

        TestHarness {
            api: AuthApi::new(store, auth),
            clock,
        }
    }

    pub fn store(&self) -> &F {
        self.api.store()
    }

    /// Register a user, panicking on failure.
    pub async fn register(&self, username: &str, password: &str, role: UserRole) {
        self.api
            .register(RegisterRequest {
                username: username.to_string(),
                password: password.to_string(),
                role: Some(role),
            })
            .await
            .expect("Failed to register test user");
    }

    /// Log in, panicking on failure.
    pub async fn login(&self, username: &str, password: &str) -> TokenResponse {
        self.api
            .login(LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await
            .expect("Failed to log in test user")
    }
}
