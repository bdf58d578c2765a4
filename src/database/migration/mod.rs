use sea_orm_migration::prelude::*;

pub use sea_orm_migration::MigratorTrait;

mod m20250310_100000_create_quotas_table;
mod m20250310_100100_create_quota_audits_table;
mod m20250310_100200_create_voucher_redemptions_table;
mod m20250310_100300_create_quota_check_tables;
mod m20250310_100400_create_star_check_tables;
mod m20250310_100500_create_permission_audits_table;
mod m20250310_100600_create_directory_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250310_100000_create_quotas_table::Migration),
            Box::new(m20250310_100100_create_quota_audits_table::Migration),
            Box::new(m20250310_100200_create_voucher_redemptions_table::Migration),
            Box::new(m20250310_100300_create_quota_check_tables::Migration),
            Box::new(m20250310_100400_create_star_check_tables::Migration),
            Box::new(m20250310_100500_create_permission_audits_table::Migration),
            Box::new(m20250310_100600_create_directory_tables::Migration),
        ]
    }
}

/// Common table and column identifiers
#[derive(Iden)]
pub enum Quotas {
    Table,
    Id,
    UserId,
    Amount,
    ExpiryDate,
    Status,
    CreateTime,
    UpdateTime,
}

#[derive(Iden)]
pub enum QuotaAudits {
    Table,
    Id,
    UserId,
    Amount,
    Operation,
    VoucherCode,
    RelatedUser,
    StrategyName,
    ExpiryDate,
    Details,
    CreateTime,
}

#[derive(Iden)]
pub enum VoucherRedemptions {
    Table,
    Id,
    VoucherCode,
    ReceiverId,
    CreateTime,
}

#[derive(Iden)]
pub enum QuotaCheckSettings {
    Table,
    Id,
    TargetType,
    TargetIdentifier,
    Enabled,
    CreateTime,
    UpdateTime,
}

#[derive(Iden)]
pub enum StarCheckSettings {
    Table,
    Id,
    TargetType,
    TargetIdentifier,
    Enabled,
    CreateTime,
    UpdateTime,
}

#[derive(Iden)]
pub enum EffectiveQuotaCheckSettings {
    Table,
    Id,
    UserId,
    Enabled,
    SettingId,
    UpdateTime,
}

#[derive(Iden)]
pub enum EffectiveStarCheckSettings {
    Table,
    Id,
    UserId,
    Enabled,
    SettingId,
    UpdateTime,
}

#[derive(Iden)]
pub enum PermissionAudits {
    Table,
    Id,
    Operation,
    TargetType,
    TargetIdentifier,
    Details,
    CreateTime,
}

#[derive(Iden)]
pub enum AuthUsers {
    Table,
    Id,
    Name,
    Phone,
    GithubId,
    GithubStar,
    EmployeeNumber,
    RegisterTime,
    AccessTime,
}

#[derive(Iden)]
pub enum EmployeeDepartments {
    Table,
    Id,
    EmployeeNumber,
    DeptFullLevelNames,
}
