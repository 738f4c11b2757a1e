//! Create the permit catalog: roles, permit types, fields, requirements and approval flow.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Role::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Role::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Role::Name).string().not_null())
                    .col(
                        ColumnDef::new(Role::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PermitType::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PermitType::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PermitType::Slug).string_len(64).not_null())
                    .col(ColumnDef::new(PermitType::Name).string().not_null())
                    .col(ColumnDef::new(PermitType::Description).text().null())
                    .col(ColumnDef::new(PermitType::SubdistrictId).string().null())
                    .col(ColumnDef::new(PermitType::CompanyId).string().null())
                    .col(ColumnDef::new(PermitType::TemplateId).string().null())
                    .col(ColumnDef::new(PermitType::TemplateConfig).json_binary().null())
                    .col(
                        ColumnDef::new(PermitType::RegisterSeq)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PermitType::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PermitType::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_permit_type_slug_subdistrict")
                    .table(PermitType::Table)
                    .col(PermitType::Slug)
                    .col(PermitType::SubdistrictId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FieldDefinition::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FieldDefinition::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(FieldDefinition::PermitTypeId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(FieldDefinition::Key).string_len(64).not_null())
                    .col(ColumnDef::new(FieldDefinition::Label).string().not_null())
                    .col(
                        ColumnDef::new(FieldDefinition::Kind)
                            .string_len(16)
                            .not_null()
                            .default("text"),
                    )
                    .col(
                        ColumnDef::new(FieldDefinition::Required)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(FieldDefinition::DisplayOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(FieldDefinition::Options).json_binary().null())
                    .col(
                        ColumnDef::new(FieldDefinition::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(FieldDefinition::Table, FieldDefinition::PermitTypeId)
                            .to(PermitType::Table, PermitType::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_field_definition_type_key")
                    .table(FieldDefinition::Table)
                    .col(FieldDefinition::PermitTypeId)
                    .col(FieldDefinition::Key)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Requirement::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Requirement::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Requirement::Code).string_len(64).not_null())
                    .col(ColumnDef::new(Requirement::Name).string().not_null())
                    .col(ColumnDef::new(Requirement::Description).text().null())
                    .col(ColumnDef::new(Requirement::SubdistrictId).string().null())
                    .col(
                        ColumnDef::new(Requirement::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_requirement_code")
                    .table(Requirement::Table)
                    .col(Requirement::Code)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PermitTypeRequirement::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PermitTypeRequirement::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PermitTypeRequirement::PermitTypeId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PermitTypeRequirement::RequirementId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PermitTypeRequirement::Mandatory)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(
                                PermitTypeRequirement::Table,
                                PermitTypeRequirement::PermitTypeId,
                            )
                            .to(PermitType::Table, PermitType::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(
                                PermitTypeRequirement::Table,
                                PermitTypeRequirement::RequirementId,
                            )
                            .to(Requirement::Table, Requirement::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_permit_type_requirement_pair")
                    .table(PermitTypeRequirement::Table)
                    .col(PermitTypeRequirement::PermitTypeId)
                    .col(PermitTypeRequirement::RequirementId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ApprovalStep::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ApprovalStep::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ApprovalStep::PermitTypeId).string().not_null())
                    .col(ColumnDef::new(ApprovalStep::StepOrder).integer().not_null())
                    .col(ColumnDef::new(ApprovalStep::Description).text().null())
                    .col(
                        ColumnDef::new(ApprovalStep::ApprovalMode)
                            .string_len(16)
                            .not_null()
                            .default("single"),
                    )
                    .col(
                        ColumnDef::new(ApprovalStep::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(ApprovalStep::Table, ApprovalStep::PermitTypeId)
                            .to(PermitType::Table, PermitType::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Step orders must never collide within a permit type.
        manager
            .create_index(
                Index::create()
                    .name("idx_approval_step_type_order")
                    .table(ApprovalStep::Table)
                    .col(ApprovalStep::PermitTypeId)
                    .col(ApprovalStep::StepOrder)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ApprovalStepRole::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ApprovalStepRole::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ApprovalStepRole::StepId).string().not_null())
                    .col(ColumnDef::new(ApprovalStepRole::RoleId).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(ApprovalStepRole::Table, ApprovalStepRole::StepId)
                            .to(ApprovalStep::Table, ApprovalStep::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(ApprovalStepRole::Table, ApprovalStepRole::RoleId)
                            .to(Role::Table, Role::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_approval_step_role_pair")
                    .table(ApprovalStepRole::Table)
                    .col(ApprovalStepRole::StepId)
                    .col(ApprovalStepRole::RoleId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ApprovalStepRole::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ApprovalStep::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PermitTypeRequirement::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Requirement::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(FieldDefinition::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PermitType::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Role::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Role {
    Table,
    Id,
    Name,
    CreatedAt,
}

#[derive(DeriveIden)]
enum PermitType {
    Table,
    Id,
    Slug,
    Name,
    Description,
    SubdistrictId,
    CompanyId,
    TemplateId,
    TemplateConfig,
    RegisterSeq,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum FieldDefinition {
    Table,
    Id,
    PermitTypeId,
    Key,
    Label,
    Kind,
    Required,
    DisplayOrder,
    Options,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Requirement {
    Table,
    Id,
    Code,
    Name,
    Description,
    SubdistrictId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum PermitTypeRequirement {
    Table,
    Id,
    PermitTypeId,
    RequirementId,
    Mandatory,
}

#[derive(DeriveIden)]
enum ApprovalStep {
    Table,
    Id,
    PermitTypeId,
    StepOrder,
    Description,
    ApprovalMode,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ApprovalStepRole {
    Table,
    Id,
    StepId,
    RoleId,
}
