use super::QuotaAudits;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(QuotaAudits::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(QuotaAudits::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(QuotaAudits::UserId).string().not_null())
                    .col(ColumnDef::new(QuotaAudits::Amount).decimal().not_null())
                    .col(
                        ColumnDef::new(QuotaAudits::Operation)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(QuotaAudits::VoucherCode).string().null())
                    .col(ColumnDef::new(QuotaAudits::RelatedUser).string().null())
                    .col(ColumnDef::new(QuotaAudits::StrategyName).string().null())
                    .col(
                        ColumnDef::new(QuotaAudits::ExpiryDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(QuotaAudits::Details).text().null())
                    .col(
                        ColumnDef::new(QuotaAudits::CreateTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Pagination queries order by (create_time, id) per user
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_quota_audits_user_create_time")
                    .table(QuotaAudits::Table)
                    .col(QuotaAudits::UserId)
                    .col(QuotaAudits::CreateTime)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(QuotaAudits::Table).to_owned())
            .await
    }
}
