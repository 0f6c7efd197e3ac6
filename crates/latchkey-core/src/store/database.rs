use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;
use sea_orm_migration::MigratorTrait;

use crate::config::Config;
use crate::db;
use crate::domain::{NewUser, TokenChange, User, UserRole};
use crate::error::AuthError;
use crate::migrations::Migrator;
use crate::models::{refresh_token, user};
use crate::store::{
    TransactionDepth, TransactionProvider, UnitOfWork, UnitOfWorkFactory, UserRepository,
};

/// Relational user store backed by SeaORM.
#[derive(Debug, Clone)]
pub struct Database {
    conn: DatabaseConnection,
}

impl Database {
    pub fn new(conn: DatabaseConnection) -> Self {
        Database { conn }
    }

    pub async fn connect(config: &Config) -> Result<Self, AuthError> {
        Ok(Database::new(db::connect(config).await?))
    }

    pub async fn connect_url(url: &str) -> Result<Self, AuthError> {
        Ok(Database::new(db::connect_url(url, false).await?))
    }

    /// Apply all pending schema migrations.
    pub async fn migrate(&self) -> Result<(), AuthError> {
        Migrator::up(&self.conn, None).await?;
        Ok(())
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }
}

impl UnitOfWorkFactory for Database {
    type Unit = DatabaseUnitOfWork;

    fn unit_of_work(&self) -> DatabaseUnitOfWork {
        DatabaseUnitOfWork {
            conn: self.conn.clone(),
            txn: None,
            depth: TransactionDepth::new(),
        }
    }
}

/// Unit of work over one database transaction.
///
/// Dropping it with the transaction still open rolls the transaction back.
pub struct DatabaseUnitOfWork {
    conn: DatabaseConnection,
    txn: Option<DatabaseTransaction>,
    depth: TransactionDepth,
}

impl DatabaseUnitOfWork {
    fn txn(&self) -> Result<&DatabaseTransaction, AuthError> {
        self.txn
            .as_ref()
            .ok_or_else(|| AuthError::Storage("No transaction started".to_string()))
    }
}

#[async_trait]
impl UserRepository for DatabaseUnitOfWork {
    async fn get_by_username(&mut self, username: &str) -> Result<Option<User>, AuthError> {
        let txn = self.txn()?;

        let Some(row) = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(txn)
            .await?
        else {
            return Ok(None);
        };

        let tokens = refresh_token::Entity::find()
            .filter(refresh_token::Column::UserId.eq(row.id))
            .order_by_asc(refresh_token::Column::Id)
            .all(txn)
            .await?;

        let role = row.role.parse::<UserRole>().map_err(|_| {
            AuthError::Storage(format!("User {} has unknown role '{}'", row.id, row.role))
        })?;

        Ok(Some(User {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            password_salt: row.password_salt,
            role,
            refresh_tokens: tokens.into_iter().map(Into::into).collect(),
        }))
    }

    async fn add(&mut self, new_user: NewUser) -> Result<User, AuthError> {
        let txn = self.txn()?;
        let username = new_user.username.clone();

        let model = user::ActiveModel {
            username: Set(new_user.username),
            password_hash: Set(new_user.password_hash),
            password_salt: Set(new_user.password_salt),
            role: Set(new_user.role.as_str().to_string()),
            ..Default::default()
        }
        .insert(txn)
        .await
        .map_err(|err| match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                AuthError::Conflict(format!("Username '{username}' already exists"))
            }
            _ => AuthError::Database(err),
        })?;

        Ok(User {
            id: model.id,
            username: model.username,
            password_hash: model.password_hash,
            password_salt: model.password_salt,
            role: new_user.role,
            refresh_tokens: Vec::new(),
        })
    }

    async fn apply_token_changes(
        &mut self,
        user_id: i32,
        changes: &[TokenChange],
    ) -> Result<(), AuthError> {
        let txn = self.txn()?;

        for change in changes {
            match change {
                TokenChange::Add(token) => {
                    refresh_token::Entity::insert(refresh_token::ActiveModel::from(token))
                        .exec(txn)
                        .await?;
                }
                TokenChange::Remove(id) => {
                    if delete_token(txn, user_id, *id).await? != 1 {
                        return Err(AuthError::InvalidCredential);
                    }
                }
                TokenChange::Prune(id) => {
                    delete_token(txn, user_id, *id).await?;
                }
            }
        }
        Ok(())
    }
}

/// Delete one of a user's tokens. Returns the number of rows removed.
async fn delete_token(txn: &DatabaseTransaction, user_id: i32, id: Uuid) -> Result<u64, DbErr> {
    let result = refresh_token::Entity::delete_many()
        .filter(refresh_token::Column::Id.eq(id))
        .filter(refresh_token::Column::UserId.eq(user_id))
        .exec(txn)
        .await?;
    Ok(result.rows_affected)
}

#[async_trait]
impl TransactionProvider for DatabaseUnitOfWork {
    async fn open_transaction(&mut self) -> Result<(), AuthError> {
        self.txn = Some(self.conn.begin().await?);
        Ok(())
    }

    async fn commit_transaction(&mut self) -> Result<(), AuthError> {
        let txn = self
            .txn
            .take()
            .ok_or_else(|| AuthError::Storage("No transaction started".to_string()))?;
        txn.commit().await?;
        Ok(())
    }

    async fn rollback_transaction(&mut self) -> Result<(), AuthError> {
        let txn = self
            .txn
            .take()
            .ok_or_else(|| AuthError::Storage("No transaction started".to_string()))?;
        txn.rollback().await?;
        Ok(())
    }
}

impl UnitOfWork for DatabaseUnitOfWork {
    fn transaction_depth(&self) -> &TransactionDepth {
        &self.depth
    }

    fn transaction_depth_mut(&mut self) -> &mut TransactionDepth {
        &mut self.depth
    }
}
