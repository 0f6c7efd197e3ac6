use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ── Create users table ──
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Users::Username)
                            .string_len(60)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Users::PasswordHash).blob().not_null())
                    .col(ColumnDef::new(Users::PasswordSalt).blob().not_null())
                    .col(ColumnDef::new(Users::Role).string_len(16).not_null())
                    .to_owned(),
            )
            .await?;

        // ── Create active_refresh_tokens table ──
        manager
            .create_table(
                Table::create()
                    .table(ActiveRefreshTokens::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ActiveRefreshTokens::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ActiveRefreshTokens::UserId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ActiveRefreshTokens::TokenHash)
                            .blob()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ActiveRefreshTokens::TokenSalt)
                            .blob()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ActiveRefreshTokens::Expiration)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_active_refresh_tokens_user")
                            .from(ActiveRefreshTokens::Table, ActiveRefreshTokens::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_active_refresh_tokens_user_id")
                    .table(ActiveRefreshTokens::Table)
                    .col(ActiveRefreshTokens::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ActiveRefreshTokens::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
    Username,
    PasswordHash,
    PasswordSalt,
    Role,
}

#[derive(Iden)]
enum ActiveRefreshTokens {
    Table,
    Id,
    UserId,
    TokenHash,
    TokenSalt,
    Expiration,
}
