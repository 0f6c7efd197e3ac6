//! Storage collaborators consumed by the auth core.
//!
//! The core never talks to a database directly. It asks a [`UnitOfWork`] for
//! user snapshots and hands back explicit [`TokenChange`] commands, all inside
//! one reentrant transaction.
//!
//! Two implementations ship with the crate:
//!
//! - [`MemoryStore`]: shared in-memory state, good for development and tests.
//! - [`Database`]: SeaORM over any sqlx backend (SQLite, Postgres).

use async_trait::async_trait;

use crate::domain::{NewUser, TokenChange, User};
use crate::error::AuthError;

pub mod database;
pub mod memory;
pub mod transaction;

pub use database::{Database, DatabaseUnitOfWork};
pub use memory::{MemoryStore, MemoryUnitOfWork};
pub use transaction::{Finalize, TransactionDepth};

/// User lookups and refresh-token mutations. Requires an open transaction.
#[async_trait]
pub trait UserRepository: Send {
    /// Snapshot of the user and all of its stored refresh tokens.
    async fn get_by_username(&mut self, username: &str) -> Result<Option<User>, AuthError>;

    /// Persist a new user and return it with its assigned id.
    async fn add(&mut self, new_user: NewUser) -> Result<User, AuthError>;

    /// Apply refresh-token commands to one user's collection, in order.
    async fn apply_token_changes(
        &mut self,
        user_id: i32,
        changes: &[TokenChange],
    ) -> Result<(), AuthError>;
}

/// The real, non-reentrant transaction primitives of a backend.
#[async_trait]
pub trait TransactionProvider: Send {
    async fn open_transaction(&mut self) -> Result<(), AuthError>;
    async fn commit_transaction(&mut self) -> Result<(), AuthError>;
    async fn rollback_transaction(&mut self) -> Result<(), AuthError>;
}

/// Atomic boundary around one logical request.
///
/// `begin`/`commit`/`rollback` are reentrant: they route through the
/// unit's [`TransactionDepth`] and only touch the backend at depth zero.
/// Dropping a unit whose transaction is still open rolls it back.
#[async_trait]
pub trait UnitOfWork: UserRepository + TransactionProvider {
    fn transaction_depth(&self) -> &TransactionDepth;

    fn transaction_depth_mut(&mut self) -> &mut TransactionDepth;

    fn depth(&self) -> u32 {
        self.transaction_depth().depth()
    }

    async fn begin(&mut self) -> Result<(), AuthError> {
        if self.transaction_depth_mut().enter() {
            if let Err(err) = self.open_transaction().await {
                self.transaction_depth_mut().reset();
                return Err(err);
            }
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), AuthError> {
        match self.transaction_depth_mut().commit()? {
            Finalize::Nested => Ok(()),
            Finalize::Commit => self.commit_transaction().await,
            Finalize::Rollback => {
                self.rollback_transaction().await?;
                Err(AuthError::Storage(
                    "Transaction was marked rollback-only by a nested scope".to_string(),
                ))
            }
        }
    }

    async fn rollback(&mut self) -> Result<(), AuthError> {
        match self.transaction_depth_mut().rollback()? {
            Finalize::Nested => Ok(()),
            Finalize::Commit | Finalize::Rollback => self.rollback_transaction().await,
        }
    }
}

/// Creates one fresh unit of work per logical request.
pub trait UnitOfWorkFactory: Send + Sync {
    type Unit: UnitOfWork;

    fn unit_of_work(&self) -> Self::Unit;
}
