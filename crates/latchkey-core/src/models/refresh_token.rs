use sea_orm::entity::prelude::*;

use crate::domain::ActiveRefreshToken;

/// A hashed refresh token that can still be exchanged or revoked.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "active_refresh_tokens")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: i32,

    pub token_hash: Vec<u8>,
    pub token_salt: Vec<u8>,

    pub expiration: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for ActiveRefreshToken {
    fn from(model: Model) -> Self {
        ActiveRefreshToken {
            id: model.id,
            user_id: model.user_id,
            token_hash: model.token_hash,
            token_salt: model.token_salt,
            expiration: model.expiration,
        }
    }
}

impl From<&ActiveRefreshToken> for ActiveModel {
    fn from(token: &ActiveRefreshToken) -> Self {
        use sea_orm::ActiveValue::Set;

        ActiveModel {
            id: Set(token.id),
            user_id: Set(token.user_id),
            token_hash: Set(token.token_hash.clone()),
            token_salt: Set(token.token_salt.clone()),
            expiration: Set(token.expiration),
        }
    }
}
