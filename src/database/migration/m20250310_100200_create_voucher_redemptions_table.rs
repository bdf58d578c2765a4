use super::VoucherRedemptions;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(VoucherRedemptions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VoucherRedemptions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(VoucherRedemptions::VoucherCode)
                            .string_len(2000)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VoucherRedemptions::ReceiverId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VoucherRedemptions::CreateTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // At-most-once redemption hinges on this unique index
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uniq_voucher_redemptions_code")
                    .table(VoucherRedemptions::Table)
                    .col(VoucherRedemptions::VoucherCode)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(VoucherRedemptions::Table).to_owned())
            .await
    }
}
