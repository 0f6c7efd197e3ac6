use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use latchkey_core::auth::password::PasswordHasher;
use latchkey_core::auth::{AuthService, LoginOutcome, LogoutOutcome, Rejection};
use latchkey_core::clock::ManualClock;
use latchkey_core::domain::{NewUser, TokenChange, User, UserRole};
use latchkey_core::error::AuthError;
use latchkey_core::store::{
    MemoryStore, MemoryUnitOfWork, TransactionDepth, TransactionProvider, UnitOfWork,
    UnitOfWorkFactory, UserRepository,
};
use latchkey_core::testing::{test_hasher, test_settings};
use latchkey_core::users::{RegisterOutcome, UserService};

async fn setup() -> (MemoryStore, AuthService) {
    let store = MemoryStore::new();
    let auth = AuthService::with_hasher(
        test_settings(),
        Arc::new(ManualClock::starting_now()),
        test_hasher(),
    )
    .expect("Failed to build auth service");

    let users = UserService::new(test_hasher());
    let mut uow = store.unit_of_work();
    let outcome = users
        .register(&mut uow, "alice", "pw1", UserRole::User)
        .await
        .expect("Failed to register");
    assert!(matches!(outcome, RegisterOutcome::Created(_)));

    (store, auth)
}

#[tokio::test]
async fn test_rejection_reasons_are_distinguished_internally() {
    let (store, auth) = setup().await;

    let unknown = auth
        .attempt_login(&mut store.unit_of_work(), "bob", "wrong")
        .await
        .expect("login should not error");
    let wrong = auth
        .attempt_login(&mut store.unit_of_work(), "alice", "wrongpw")
        .await
        .expect("login should not error");

    assert_eq!(unknown, LoginOutcome::Failure(Rejection::UnknownUser));
    assert_eq!(wrong, LoginOutcome::Failure(Rejection::InvalidCredential));
}

#[tokio::test]
async fn test_refresh_rejection_reasons() {
    let (store, auth) = setup().await;

    let unknown = auth
        .attempt_token_refresh(&mut store.unit_of_work(), "bob", "token")
        .await
        .expect("refresh should not error");
    let unmatched = auth
        .attempt_token_refresh(&mut store.unit_of_work(), "alice", "token")
        .await
        .expect("refresh should not error");

    assert_eq!(unknown, LoginOutcome::Failure(Rejection::UnknownUser));
    assert_eq!(unmatched, LoginOutcome::Failure(Rejection::InvalidCredential));
}

#[tokio::test]
async fn test_unknown_user_costs_as_much_as_a_wrong_secret() {
    let store = MemoryStore::new();
    let hasher = PasswordHasher::with_iterations(NonZeroU32::new(20_000).expect("non-zero"));
    let auth = AuthService::with_hasher(
        test_settings(),
        Arc::new(ManualClock::starting_now()),
        hasher.clone(),
    )
    .expect("Failed to build auth service");
    UserService::new(hasher)
        .register(&mut store.unit_of_work(), "alice", "pw1", UserRole::User)
        .await
        .expect("Failed to register");
    auth.attempt_login(&mut store.unit_of_work(), "alice", "pw1")
        .await
        .expect("Failed to log in");
    let (auth, store) = (&auth, &store);

    async fn fastest<F, Fut>(mut run: F) -> Duration
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        let mut best = Duration::MAX;
        for _ in 0..3 {
            let start = Instant::now();
            run().await;
            best = best.min(start.elapsed());
        }
        best
    }

    let unknown_login = fastest(move || async move {
        auth.attempt_login(&mut store.unit_of_work(), "bob", "wrong")
            .await
            .expect("login should not error");
    })
    .await;
    let wrong_password = fastest(move || async move {
        auth.attempt_login(&mut store.unit_of_work(), "alice", "wrongpw")
            .await
            .expect("login should not error");
    })
    .await;
    assert!(
        unknown_login * 4 >= wrong_password,
        "unknown user took {unknown_login:?}, wrong password took {wrong_password:?}"
    );

    let unknown_refresh = fastest(move || async move {
        auth.attempt_token_refresh(&mut store.unit_of_work(), "bob", "token")
            .await
            .expect("refresh should not error");
    })
    .await;
    let wrong_token = fastest(move || async move {
        auth.attempt_token_refresh(&mut store.unit_of_work(), "alice", "token")
            .await
            .expect("refresh should not error");
    })
    .await;
    assert!(
        unknown_refresh * 4 >= wrong_token,
        "unknown user took {unknown_refresh:?}, wrong token took {wrong_token:?}"
    );
}

#[tokio::test]
async fn test_interleaved_refresh_redeems_token_once() {
    let (store, auth) = setup().await;
    let LoginOutcome::Success(tokens) = auth
        .attempt_login(&mut store.unit_of_work(), "alice", "pw1")
        .await
        .expect("Failed to log in")
    else {
        panic!("expected successful login");
    };
    let token = &tokens.refresh_token.token;

    // Both units read alice before either commits.
    let mut first = store.unit_of_work();
    let mut second = store.unit_of_work();
    first.begin().await.expect("Failed to begin");
    second.begin().await.expect("Failed to begin");

    let winner = auth
        .attempt_token_refresh(&mut first, "alice", token)
        .await
        .expect("refresh should not error");
    let loser = auth
        .attempt_token_refresh(&mut second, "alice", token)
        .await
        .expect("refresh should not error");
    let LoginOutcome::Success(winner) = winner else {
        panic!("expected first refresh to succeed");
    };
    assert!(matches!(loser, LoginOutcome::Success(_)));

    first.commit().await.expect("Failed to commit first refresh");
    assert!(matches!(
        second.commit().await,
        Err(AuthError::InvalidCredential)
    ));

    let committed = store.find_user("alice").await.expect("alice exists");
    assert_eq!(committed.refresh_tokens.len(), 1);

    let next = auth
        .attempt_token_refresh(&mut store.unit_of_work(), "alice", &winner.refresh_token.token)
        .await
        .expect("refresh should not error");
    assert!(matches!(next, LoginOutcome::Success(_)));
}

#[tokio::test]
async fn test_logout_outcomes() {
    let (store, auth) = setup().await;

    let LoginOutcome::Success(tokens) = auth
        .attempt_login(&mut store.unit_of_work(), "alice", "pw1")
        .await
        .expect("Failed to log in")
    else {
        panic!("expected successful login");
    };

    let missing = auth
        .attempt_logout(&mut store.unit_of_work(), "bob", &tokens.refresh_token.token)
        .await
        .expect("logout should not error");
    assert_eq!(missing, LogoutOutcome::NotFound);

    let done = auth
        .attempt_logout(&mut store.unit_of_work(), "alice", &tokens.refresh_token.token)
        .await
        .expect("logout should not error");
    assert_eq!(done, LogoutOutcome::Success);

    let again = auth
        .attempt_logout(&mut store.unit_of_work(), "alice", &tokens.refresh_token.token)
        .await
        .expect("logout should not error");
    assert_eq!(again, LogoutOutcome::NotFound);
}

#[tokio::test]
async fn test_operations_leave_transaction_closed() {
    let (store, auth) = setup().await;
    let mut uow = store.unit_of_work();

    auth.attempt_login(&mut uow, "alice", "pw1")
        .await
        .expect("Failed to log in");
    assert_eq!(uow.depth(), 0);

    auth.attempt_login(&mut uow, "alice", "bad")
        .await
        .expect("login should not error");
    assert_eq!(uow.depth(), 0);
}

#[tokio::test]
async fn test_login_inside_outer_transaction_commits_with_it() {
    let (store, auth) = setup().await;
    let mut uow = store.unit_of_work();

    uow.begin().await.expect("Failed to begin");
    let outcome = auth
        .attempt_login(&mut uow, "alice", "pw1")
        .await
        .expect("Failed to log in");
    assert!(matches!(outcome, LoginOutcome::Success(_)));
    assert_eq!(uow.depth(), 1);

    // Not visible until the outer scope commits.
    let committed = store.find_user("alice").await.expect("alice exists");
    assert!(committed.refresh_tokens.is_empty());

    uow.commit().await.expect("Failed to commit");
    let committed = store.find_user("alice").await.expect("alice exists");
    assert_eq!(committed.refresh_tokens.len(), 1);
}

#[tokio::test]
async fn test_failed_nested_login_poisons_outer_commit() {
    let (store, auth) = setup().await;
    let mut uow = store.unit_of_work();

    uow.begin().await.expect("Failed to begin");
    auth.attempt_login(&mut uow, "alice", "pw1")
        .await
        .expect("Failed to log in");
    auth.attempt_login(&mut uow, "alice", "wrong")
        .await
        .expect("login should not error");

    let result = uow.commit().await;
    assert!(matches!(result, Err(AuthError::Storage(_))));

    let committed = store.find_user("alice").await.expect("alice exists");
    assert!(committed.refresh_tokens.is_empty());
}

#[tokio::test]
async fn test_commit_without_begin_fails() {
    let store = MemoryStore::new();
    let mut uow = store.unit_of_work();

    assert!(matches!(uow.commit().await, Err(AuthError::Storage(_))));
    assert!(matches!(uow.rollback().await, Err(AuthError::Storage(_))));
}

#[tokio::test]
async fn test_dropped_unit_of_work_persists_nothing() {
    let (store, auth) = setup().await;
    {
        let mut uow = store.unit_of_work();
        uow.begin().await.expect("Failed to begin");
        auth.attempt_login(&mut uow, "alice", "pw1")
            .await
            .expect("Failed to log in");
        // dropped with the outer scope still open
    }

    let committed = store.find_user("alice").await.expect("alice exists");
    assert!(committed.refresh_tokens.is_empty());
}

/// Unit of work whose backend commit always fails.
struct FailingCommit(MemoryUnitOfWork);

#[async_trait]
impl UserRepository for FailingCommit {
    async fn get_by_username(&mut self, username: &str) -> Result<Option<User>, AuthError> {
        self.0.get_by_username(username).await
    }

    async fn add(&mut self, new_user: NewUser) -> Result<User, AuthError> {
        self.0.add(new_user).await
    }

    async fn apply_token_changes(
        &mut self,
        user_id: i32,
        changes: &[TokenChange],
    ) -> Result<(), AuthError> {
        self.0.apply_token_changes(user_id, changes).await
    }
}

#[async_trait]
impl TransactionProvider for FailingCommit {
    async fn open_transaction(&mut self) -> Result<(), AuthError> {
        self.0.open_transaction().await
    }

    async fn commit_transaction(&mut self) -> Result<(), AuthError> {
        self.0.rollback_transaction().await?;
        Err(AuthError::Storage("commit refused".to_string()))
    }

    async fn rollback_transaction(&mut self) -> Result<(), AuthError> {
        self.0.rollback_transaction().await
    }
}

impl UnitOfWork for FailingCommit {
    fn transaction_depth(&self) -> &TransactionDepth {
        self.0.transaction_depth()
    }

    fn transaction_depth_mut(&mut self) -> &mut TransactionDepth {
        self.0.transaction_depth_mut()
    }
}

#[tokio::test]
async fn test_failing_commit_leaves_no_partial_state() {
    let (store, auth) = setup().await;
    let mut uow = FailingCommit(store.unit_of_work());

    let result = auth.attempt_login(&mut uow, "alice", "pw1").await;
    assert!(matches!(result, Err(AuthError::Storage(_))));

    let committed = store.find_user("alice").await.expect("alice exists");
    assert!(committed.refresh_tokens.is_empty());
}

#[tokio::test]
async fn test_duplicate_registration() {
    let (store, _auth) = setup().await;
    let users = UserService::new(test_hasher());

    let outcome = users
        .register(&mut store.unit_of_work(), "alice", "other", UserRole::Admin)
        .await
        .expect("register should not error");
    assert_eq!(outcome, RegisterOutcome::DuplicateUsername);
    assert_eq!(store.user_count().await, 1);
}

#[tokio::test]
async fn test_registration_validates_username() {
    let store = MemoryStore::new();
    let users = UserService::new(test_hasher());

    let too_long = "a".repeat(61);
    let result = users
        .register(&mut store.unit_of_work(), &too_long, "pw", UserRole::User)
        .await;
    assert!(matches!(result, Err(AuthError::Validation(_))));

    let result = users
        .register(&mut store.unit_of_work(), "   ", "pw", UserRole::User)
        .await;
    assert!(matches!(result, Err(AuthError::Validation(_))));
    assert_eq!(store.user_count().await, 0);
}

#[tokio::test]
async fn test_stored_password_is_hashed() {
    let (store, auth) = setup().await;
    let users = UserService::new(test_hasher());

    let user = users
        .get_by_username(&mut store.unit_of_work(), "alice")
        .await
        .expect("lookup should not error")
        .expect("alice exists");

    assert_eq!(user.password_hash.len(), 64);
    assert_eq!(user.password_salt.len(), 64);
    assert_ne!(user.password_hash, b"pw1".to_vec());
    assert!(auth.hasher().verify("pw1", &user.password_hash, &user.password_salt));
}

/// Unit of work that lets a rival registration of the same username commit
/// right before its own commit.
struct RivalRegistration {
    inner: MemoryUnitOfWork,
    rival: Option<MemoryUnitOfWork>,
    username: String,
}

#[async_trait]
impl UserRepository for RivalRegistration {
    async fn get_by_username(&mut self, username: &str) -> Result<Option<User>, AuthError> {
        self.inner.get_by_username(username).await
    }

    async fn add(&mut self, new_user: NewUser) -> Result<User, AuthError> {
        self.inner.add(new_user).await
    }

    async fn apply_token_changes(
        &mut self,
        user_id: i32,
        changes: &[TokenChange],
    ) -> Result<(), AuthError> {
        self.inner.apply_token_changes(user_id, changes).await
    }
}

#[async_trait]
impl TransactionProvider for RivalRegistration {
    async fn open_transaction(&mut self) -> Result<(), AuthError> {
        self.inner.open_transaction().await
    }

    async fn commit_transaction(&mut self) -> Result<(), AuthError> {
        if let Some(mut rival) = self.rival.take() {
            rival.begin().await?;
            rival
                .add(NewUser {
                    username: self.username.clone(),
                    password_hash: vec![0; 64],
                    password_salt: vec![0; 64],
                    role: UserRole::Guest,
                })
                .await?;
            rival.commit().await?;
        }
        self.inner.commit_transaction().await
    }

    async fn rollback_transaction(&mut self) -> Result<(), AuthError> {
        self.inner.rollback_transaction().await
    }
}

impl UnitOfWork for RivalRegistration {
    fn transaction_depth(&self) -> &TransactionDepth {
        self.inner.transaction_depth()
    }

    fn transaction_depth_mut(&mut self) -> &mut TransactionDepth {
        self.inner.transaction_depth_mut()
    }
}

#[tokio::test]
async fn test_registration_losing_a_race_is_a_duplicate() {
    let store = MemoryStore::new();
    let users = UserService::new(test_hasher());
    let mut uow = RivalRegistration {
        inner: store.unit_of_work(),
        rival: Some(store.unit_of_work()),
        username: "carol".to_string(),
    };

    let outcome = users
        .register(&mut uow, "carol", "pw", UserRole::User)
        .await
        .expect("register should not error");
    assert_eq!(outcome, RegisterOutcome::DuplicateUsername);

    assert_eq!(store.user_count().await, 1);
    let carol = store.find_user("carol").await.expect("rival's carol exists");
    assert_eq!(carol.role, UserRole::Guest);
}
