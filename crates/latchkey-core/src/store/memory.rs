use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{NewUser, TokenChange, User};
use crate::error::AuthError;
use crate::store::{
    TransactionDepth, TransactionProvider, UnitOfWork, UnitOfWorkFactory, UserRepository,
};

#[derive(Debug, Default, Clone)]
struct MemoryState {
    users: BTreeMap<i32, User>,
}

impl MemoryState {
    fn find(&self, username: &str) -> Option<&User> {
        self.users.values().find(|u| u.username == username)
    }

    fn insert_user(&mut self, user: User) -> Result<(), AuthError> {
        if self.find(&user.username).is_some() {
            return Err(AuthError::Conflict(format!(
                "Username '{}' already exists",
                user.username
            )));
        }
        self.users.insert(user.id, user);
        Ok(())
    }

    fn apply(&mut self, user_id: i32, changes: &[TokenChange]) -> Result<(), AuthError> {
        let user = self
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AuthError::NotFound(format!("User {user_id}")))?;

        for change in changes {
            match change {
                TokenChange::Add(token) => user.refresh_tokens.push(token.clone()),
                TokenChange::Remove(id) => {
                    let index = user
                        .refresh_tokens
                        .iter()
                        .position(|t| t.id == *id)
                        .ok_or(AuthError::InvalidCredential)?;
                    user.refresh_tokens.remove(index);
                }
                TokenChange::Prune(id) => user.refresh_tokens.retain(|t| t.id != *id),
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
enum PendingWrite {
    AddUser(User),
    TokenChanges {
        user_id: i32,
        changes: Vec<TokenChange>,
    },
}

/// In-memory user store (good for development and testing).
///
/// A unit of work reads from a private copy taken when its transaction opens
/// and replays its writes onto the shared state at commit, all or nothing.
/// Replay fails if a token this unit redeemed was already removed by an
/// earlier commit, so a refresh token is only ever redeemed once.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
    next_id: Arc<AtomicI32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            state: Arc::new(RwLock::new(MemoryState::default())),
            next_id: Arc::new(AtomicI32::new(1)),
        }
    }

    /// Committed snapshot of a user, outside any transaction.
    pub async fn find_user(&self, username: &str) -> Option<User> {
        self.state.read().await.find(username).cloned()
    }

    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitOfWorkFactory for MemoryStore {
    type Unit = MemoryUnitOfWork;

    fn unit_of_work(&self) -> MemoryUnitOfWork {
        MemoryUnitOfWork {
            state: Arc::clone(&self.state),
            next_id: Arc::clone(&self.next_id),
            working: None,
            pending: Vec::new(),
            depth: TransactionDepth::new(),
        }
    }
}

/// Unit of work over a [`MemoryStore`]. Dropping it uncommitted discards its writes.
#[derive(Debug)]
pub struct MemoryUnitOfWork {
    state: Arc<RwLock<MemoryState>>,
    next_id: Arc<AtomicI32>,
    working: Option<MemoryState>,
    pending: Vec<PendingWrite>,
    depth: TransactionDepth,
}

impl MemoryUnitOfWork {
    fn working(&mut self) -> Result<&mut MemoryState, AuthError> {
        self.working
            .as_mut()
            .ok_or_else(|| AuthError::Storage("No transaction started".to_string()))
    }
}

#[async_trait]
impl UserRepository for MemoryUnitOfWork {
    async fn get_by_username(&mut self, username: &str) -> Result<Option<User>, AuthError> {
        Ok(self.working()?.find(username).cloned())
    }

    async fn add(&mut self, new_user: NewUser) -> Result<User, AuthError> {
        let user = User {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            username: new_user.username,
            password_hash: new_user.password_hash,
            password_salt: new_user.password_salt,
            role: new_user.role,
            refresh_tokens: Vec::new(),
        };

        self.working()?.insert_user(user.clone())?;
        self.pending.push(PendingWrite::AddUser(user.clone()));
        Ok(user)
    }

    async fn apply_token_changes(
        &mut self,
        user_id: i32,
        changes: &[TokenChange],
    ) -> Result<(), AuthError> {
        self.working()?.apply(user_id, changes)?;
        self.pending.push(PendingWrite::TokenChanges {
            user_id,
            changes: changes.to_vec(),
        });
        Ok(())
    }
}

#[async_trait]
impl TransactionProvider for MemoryUnitOfWork {
    async fn open_transaction(&mut self) -> Result<(), AuthError> {
        let snapshot = self.state.read().await.clone();
        self.working = Some(snapshot);
        self.pending.clear();
        Ok(())
    }

    async fn commit_transaction(&mut self) -> Result<(), AuthError> {
        if self.working.take().is_none() {
            return Err(AuthError::Storage("No transaction started".to_string()));
        }
        let pending = std::mem::take(&mut self.pending);

        let mut state = self.state.write().await;
        let mut next = state.clone();
        for write in pending {
            match write {
                PendingWrite::AddUser(user) => next.insert_user(user)?,
                PendingWrite::TokenChanges { user_id, changes } => next.apply(user_id, &changes)?,
            }
        }
        *state = next;
        Ok(())
    }

    async fn rollback_transaction(&mut self) -> Result<(), AuthError> {
        if self.working.take().is_none() {
            return Err(AuthError::Storage("No transaction started".to_string()));
        }
        self.pending.clear();
        Ok(())
    }
}

impl UnitOfWork for MemoryUnitOfWork {
    fn transaction_depth(&self) -> &TransactionDepth {
        &self.depth
    }

    fn transaction_depth_mut(&mut self) -> &mut TransactionDepth {
        &mut self.depth
    }
}
