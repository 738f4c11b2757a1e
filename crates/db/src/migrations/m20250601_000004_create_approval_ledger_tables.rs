//! Create the approval ledger (logs, decisions) and final documents.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ApprovalLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ApprovalLog::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ApprovalLog::RequestId).string().not_null())
                    .col(ColumnDef::new(ApprovalLog::StepOrder).integer().not_null())
                    .col(ColumnDef::new(ApprovalLog::StepRole).string().not_null())
                    .col(ColumnDef::new(ApprovalLog::RoleId).string().not_null())
                    .col(ColumnDef::new(ApprovalLog::UserId).string().not_null())
                    .col(
                        ColumnDef::new(ApprovalLog::DecidedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ApprovalLog::Status).string_len(16).not_null())
                    .col(ColumnDef::new(ApprovalLog::Note).text().null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(ApprovalLog::Table, ApprovalLog::RequestId)
                            .to(PermitRequest::Table, PermitRequest::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_approval_log_request")
                    .table(ApprovalLog::Table)
                    .col(ApprovalLog::RequestId)
                    .col(ApprovalLog::DecidedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ApprovalDecision::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ApprovalDecision::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ApprovalDecision::RequestId).string().not_null())
                    .col(ColumnDef::new(ApprovalDecision::StepOrder).integer().not_null())
                    .col(ColumnDef::new(ApprovalDecision::RoleId).string().not_null())
                    .col(ColumnDef::new(ApprovalDecision::UserId).string().not_null())
                    .col(
                        ColumnDef::new(ApprovalDecision::DecidedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ApprovalDecision::Status)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ApprovalDecision::Note).text().null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(ApprovalDecision::Table, ApprovalDecision::RequestId)
                            .to(PermitRequest::Table, PermitRequest::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_approval_decision_request_step")
                    .table(ApprovalDecision::Table)
                    .col(ApprovalDecision::RequestId)
                    .col(ApprovalDecision::StepOrder)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FinalDocument::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FinalDocument::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FinalDocument::RequestId).string().not_null())
                    .col(ColumnDef::new(FinalDocument::Filename).string().not_null())
                    .col(ColumnDef::new(FinalDocument::Url).text().not_null())
                    .col(ColumnDef::new(FinalDocument::Checksum).string_len(64).null())
                    .col(ColumnDef::new(FinalDocument::GeneratedBy).string().not_null())
                    .col(
                        ColumnDef::new(FinalDocument::GeneratedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(FinalDocument::Table, FinalDocument::RequestId)
                            .to(PermitRequest::Table, PermitRequest::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_final_document_request")
                    .table(FinalDocument::Table)
                    .col(FinalDocument::RequestId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FinalDocument::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ApprovalDecision::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ApprovalLog::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum ApprovalLog {
    Table,
    Id,
    RequestId,
    StepOrder,
    StepRole,
    RoleId,
    UserId,
    DecidedAt,
    Status,
    Note,
}

#[derive(DeriveIden)]
enum ApprovalDecision {
    Table,
    Id,
    RequestId,
    StepOrder,
    RoleId,
    UserId,
    DecidedAt,
    Status,
    Note,
}

#[derive(DeriveIden)]
enum FinalDocument {
    Table,
    Id,
    RequestId,
    Filename,
    Url,
    Checksum,
    GeneratedBy,
    GeneratedAt,
}

#[derive(DeriveIden)]
enum PermitRequest {
    Table,
    Id,
}
