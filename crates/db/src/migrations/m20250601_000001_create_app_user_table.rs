//! Create app_user table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AppUser::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(AppUser::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(AppUser::Email).string_len(254).not_null().unique_key())
                    .col(ColumnDef::new(AppUser::Name).string_len(256))
                    .col(ColumnDef::new(AppUser::Role).string_len(16).not_null().default("user"))
                    .col(ColumnDef::new(AppUser::Cpf).string_len(11).unique_key())
                    .col(ColumnDef::new(AppUser::Phone).string_len(32))
                    .col(ColumnDef::new(AppUser::TokenHash).string_len(64).unique_key())
                    .col(ColumnDef::new(AppUser::IsActive).boolean().not_null().default(true))
                    .col(
                        ColumnDef::new(AppUser::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(AppUser::UpdatedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(AppUser::LastLoginAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // Index: (role, is_active) for staff listings
        manager
            .create_index(
                Index::create()
                    .name("idx_app_user_role_active")
                    .table(AppUser::Table)
                    .col(AppUser::Role)
                    .col(AppUser::IsActive)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AppUser::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum AppUser {
    Table,
    Id,
    Email,
    Name,
    Role,
    Cpf,
    Phone,
    TokenHash,
    IsActive,
    CreatedAt,
    UpdatedAt,
    LastLoginAt,
}
