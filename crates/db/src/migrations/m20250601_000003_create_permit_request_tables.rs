//! Create permit request tables: requests, dynamic data and uploaded documents.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PermitRequest::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PermitRequest::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PermitRequest::Code).string_len(32).not_null())
                    .col(ColumnDef::new(PermitRequest::PermitTypeId).string().not_null())
                    .col(ColumnDef::new(PermitRequest::CitizenId).string().not_null())
                    .col(ColumnDef::new(PermitRequest::CompanyId).string().null())
                    .col(ColumnDef::new(PermitRequest::SubdistrictId).string().null())
                    .col(
                        ColumnDef::new(PermitRequest::SubmittedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PermitRequest::CurrentStep)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PermitRequest::CurrentStepRoles)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PermitRequest::Status)
                            .string_len(16)
                            .not_null()
                            .default("submitted"),
                    )
                    .col(
                        ColumnDef::new(PermitRequest::ApprovedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(PermitRequest::RegisterNumber).string().null())
                    .col(
                        ColumnDef::new(PermitRequest::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PermitRequest::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(PermitRequest::Table, PermitRequest::PermitTypeId)
                            .to(PermitType::Table, PermitType::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(PermitRequest::Table, PermitRequest::CitizenId)
                            .to(Citizen::Table, Citizen::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_permit_request_code")
                    .table(PermitRequest::Table)
                    .col(PermitRequest::Code)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_permit_request_type_register")
                    .table(PermitRequest::Table)
                    .col(PermitRequest::PermitTypeId)
                    .col(PermitRequest::RegisterNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_permit_request_citizen")
                    .table(PermitRequest::Table)
                    .col(PermitRequest::CitizenId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_permit_request_company_created")
                    .table(PermitRequest::Table)
                    .col(PermitRequest::CompanyId)
                    .col(PermitRequest::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RequestDynamicData::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RequestDynamicData::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(RequestDynamicData::RequestId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RequestDynamicData::Data).json_binary().not_null())
                    .col(
                        ColumnDef::new(RequestDynamicData::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RequestDynamicData::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(RequestDynamicData::Table, RequestDynamicData::RequestId)
                            .to(PermitRequest::Table, PermitRequest::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_request_dynamic_data_request")
                    .table(RequestDynamicData::Table)
                    .col(RequestDynamicData::RequestId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UploadedDocument::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UploadedDocument::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UploadedDocument::RequestId).string().not_null())
                    .col(ColumnDef::new(UploadedDocument::Filename).string().not_null())
                    .col(ColumnDef::new(UploadedDocument::Url).text().not_null())
                    .col(ColumnDef::new(UploadedDocument::UploadedBy).string().null())
                    .col(
                        ColumnDef::new(UploadedDocument::RequirementCode)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UploadedDocument::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(UploadedDocument::Table, UploadedDocument::RequestId)
                            .to(PermitRequest::Table, PermitRequest::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_uploaded_document_request")
                    .table(UploadedDocument::Table)
                    .col(UploadedDocument::RequestId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UploadedDocument::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RequestDynamicData::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PermitRequest::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum PermitRequest {
    Table,
    Id,
    Code,
    PermitTypeId,
    CitizenId,
    CompanyId,
    SubdistrictId,
    SubmittedAt,
    CurrentStep,
    CurrentStepRoles,
    Status,
    ApprovedAt,
    RegisterNumber,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum RequestDynamicData {
    Table,
    Id,
    RequestId,
    Data,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum UploadedDocument {
    Table,
    Id,
    RequestId,
    Filename,
    Url,
    UploadedBy,
    RequirementCode,
    CreatedAt,
}

#[derive(DeriveIden)]
enum PermitType {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Citizen {
    Table,
    Id,
}
