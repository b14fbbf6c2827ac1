//! Create protocol_counter table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProtocolCounter::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProtocolCounter::Day)
                            .string_len(8)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProtocolCounter::LastValue)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProtocolCounter::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ProtocolCounter {
    Table,
    Day,
    LastValue,
}
