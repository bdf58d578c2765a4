use super::{EffectiveStarCheckSettings, StarCheckSettings};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StarCheckSettings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StarCheckSettings::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(StarCheckSettings::TargetType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StarCheckSettings::TargetIdentifier)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StarCheckSettings::Enabled)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StarCheckSettings::CreateTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StarCheckSettings::UpdateTime)
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
                    .name("uniq_star_check_settings_target")
                    .table(StarCheckSettings::Table)
                    .col(StarCheckSettings::TargetType)
                    .col(StarCheckSettings::TargetIdentifier)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EffectiveStarCheckSettings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EffectiveStarCheckSettings::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EffectiveStarCheckSettings::UserId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EffectiveStarCheckSettings::Enabled)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EffectiveStarCheckSettings::SettingId)
                            .integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EffectiveStarCheckSettings::UpdateTime)
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
                    .name("uniq_effective_star_check_settings_user")
                    .table(EffectiveStarCheckSettings::Table)
                    .col(EffectiveStarCheckSettings::UserId)
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
                    .table(EffectiveStarCheckSettings::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(StarCheckSettings::Table).to_owned())
            .await
    }
}
