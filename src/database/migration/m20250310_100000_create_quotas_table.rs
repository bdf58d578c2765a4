use super::Quotas;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Quotas::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Quotas::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Quotas::UserId).string().not_null())
                    .col(ColumnDef::new(Quotas::Amount).decimal().not_null())
                    .col(
                        ColumnDef::new(Quotas::ExpiryDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Quotas::Status)
                            .string_len(16)
                            .not_null()
                            .default("VALID"),
                    )
                    .col(
                        ColumnDef::new(Quotas::CreateTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Quotas::UpdateTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Lot lookups are always per user and expiry-ordered
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_quotas_user_expiry")
                    .table(Quotas::Table)
                    .col(Quotas::UserId)
                    .col(Quotas::ExpiryDate)
                    .to_owned(),
            )
            .await?;

        // The expiry sweep scans by status and expiry date
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_quotas_status_expiry")
                    .table(Quotas::Table)
                    .col(Quotas::Status)
                    .col(Quotas::ExpiryDate)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Quotas::Table).to_owned())
            .await
    }
}
