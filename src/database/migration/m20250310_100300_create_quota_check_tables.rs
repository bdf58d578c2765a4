use super::{EffectiveQuotaCheckSettings, QuotaCheckSettings};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(QuotaCheckSettings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(QuotaCheckSettings::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(QuotaCheckSettings::TargetType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QuotaCheckSettings::TargetIdentifier)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QuotaCheckSettings::Enabled)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QuotaCheckSettings::CreateTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QuotaCheckSettings::UpdateTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uniq_quota_check_settings_target")
                    .table(QuotaCheckSettings::Table)
                    .col(QuotaCheckSettings::TargetType)
                    .col(QuotaCheckSettings::TargetIdentifier)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EffectiveQuotaCheckSettings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EffectiveQuotaCheckSettings::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EffectiveQuotaCheckSettings::UserId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EffectiveQuotaCheckSettings::Enabled)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EffectiveQuotaCheckSettings::SettingId)
                            .integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EffectiveQuotaCheckSettings::UpdateTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uniq_effective_quota_check_settings_user")
                    .table(EffectiveQuotaCheckSettings::Table)
                    .col(EffectiveQuotaCheckSettings::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(EffectiveQuotaCheckSettings::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(QuotaCheckSettings::Table).to_owned())
            .await
    }
}
