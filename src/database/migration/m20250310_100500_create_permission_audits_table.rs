use super::PermissionAudits;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PermissionAudits::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PermissionAudits::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PermissionAudits::Operation)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PermissionAudits::TargetType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PermissionAudits::TargetIdentifier)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PermissionAudits::Details).text().not_null())
                    .col(
                        ColumnDef::new(PermissionAudits::CreateTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PermissionAudits::Table).to_owned())
            .await
    }
}
