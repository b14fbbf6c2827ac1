//! Create report table migration.
//!
//! `created_by` and `assigned_authority_id` deliberately carry no foreign
//! key: removing a user must leave their reports untouched.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Report::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Report::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Report::Protocol).string_len(18).not_null().unique_key())
                    .col(ColumnDef::new(Report::Address).string_len(512).not_null())
                    .col(ColumnDef::new(Report::Neighborhood).string_len(128).not_null())
                    .col(ColumnDef::new(Report::IncidentType).string_len(32).not_null())
                    .col(ColumnDef::new(Report::Species).string_len(64).not_null())
                    .col(ColumnDef::new(Report::Condition).string_len(16).not_null())
                    .col(ColumnDef::new(Report::Description).text())
                    .col(ColumnDef::new(Report::SuspectName).string_len(256))
                    .col(ColumnDef::new(Report::OtherInfo).text())
                    .col(ColumnDef::new(Report::ReporterName).string_len(256))
                    .col(ColumnDef::new(Report::ReporterCpf).string_len(11))
                    .col(ColumnDef::new(Report::ReporterContact).string_len(64))
                    .col(ColumnDef::new(Report::Stage).integer().not_null().default(1))
                    .col(
                        ColumnDef::new(Report::Status)
                            .string_len(32)
                            .not_null()
                            .default("CRIADA"),
                    )
                    .col(
                        ColumnDef::new(Report::Priority)
                            .string_len(16)
                            .not_null()
                            .default("MEDIA"),
                    )
                    .col(ColumnDef::new(Report::CreatedBy).string_len(32).not_null())
                    .col(ColumnDef::new(Report::AssignedAuthorityId).string_len(32))
                    .col(ColumnDef::new(Report::AssignedAuthorityEmail).string_len(254))
                    .col(ColumnDef::new(Report::Comments).json_binary().not_null().default("[]"))
                    .col(ColumnDef::new(Report::Evidence).json_binary().not_null().default("[]"))
                    .col(ColumnDef::new(Report::Feedback).json_binary().not_null().default("[]"))
                    .col(ColumnDef::new(Report::History).json_binary().not_null().default("[]"))
                    .col(ColumnDef::new(Report::ConfirmationDeadline).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Report::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Report::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Report::ConcludedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Report::Version).integer().not_null().default(1))
                    .check(Expr::col(Report::Stage).between(1, 6))
                    .to_owned(),
            )
            .await?;

        // Index: (created_by, status) for a citizen's own listing
        manager
            .create_index(
                Index::create()
                    .name("idx_report_created_by_status")
                    .table(Report::Table)
                    .col(Report::CreatedBy)
                    .col(Report::Status)
                    .to_owned(),
            )
            .await?;

        // Index: (assigned_authority_id, status)
        manager
            .create_index(
                Index::create()
                    .name("idx_report_authority_status")
                    .table(Report::Table)
                    .col(Report::AssignedAuthorityId)
                    .col(Report::Status)
                    .to_owned(),
            )
            .await?;

        // Index: (incident_type, neighborhood)
        manager
            .create_index(
                Index::create()
                    .name("idx_report_type_neighborhood")
                    .table(Report::Table)
                    .col(Report::IncidentType)
                    .col(Report::Neighborhood)
                    .to_owned(),
            )
            .await?;

        // Index: (priority, status)
        manager
            .create_index(
                Index::create()
                    .name("idx_report_priority_status")
                    .table(Report::Table)
                    .col(Report::Priority)
                    .col(Report::Status)
                    .to_owned(),
            )
            .await?;

        // Index: created_at (default listing order)
        manager
            .create_index(
                Index::create()
                    .name("idx_report_created_at")
                    .table(Report::Table)
                    .col(Report::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Report::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Report {
    Table,
    Id,
    Protocol,
    Address,
    Neighborhood,
    IncidentType,
    Species,
    Condition,
    Description,
    SuspectName,
    OtherInfo,
    ReporterName,
    ReporterCpf,
    ReporterContact,
    Stage,
    Status,
    Priority,
    CreatedBy,
    AssignedAuthorityId,
    AssignedAuthorityEmail,
    Comments,
    Evidence,
    Feedback,
    History,
    ConfirmationDeadline,
    CreatedAt,
    UpdatedAt,
    ConcludedAt,
    Version,
}
