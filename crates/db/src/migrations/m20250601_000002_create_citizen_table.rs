//! Create citizen table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Citizen::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Citizen::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Citizen::Nik).string_len(32).not_null())
                    .col(ColumnDef::new(Citizen::Name).string().not_null())
                    .col(ColumnDef::new(Citizen::Email).string().null())
                    .col(ColumnDef::new(Citizen::Phone).string_len(32).null())
                    .col(ColumnDef::new(Citizen::Address).text().null())
                    .col(
                        ColumnDef::new(Citizen::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_citizen_nik")
                    .table(Citizen::Table)
                    .col(Citizen::Nik)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Citizen::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Citizen {
    Table,
    Id,
    Nik,
    Name,
    Email,
    Phone,
    Address,
    CreatedAt,
}
