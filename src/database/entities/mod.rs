pub mod auth_users;
pub mod effective_quota_check_settings;
pub mod effective_star_check_settings;
pub mod employee_departments;
pub mod permission_audits;
pub mod quota_audits;
pub mod quota_check_settings;
pub mod quotas;
pub mod star_check_settings;
pub mod voucher_redemptions;

use sea_orm::entity::prelude::*;
use sea_orm::sea_query::StringLen;
use serde::{Deserialize, Serialize};

/// Lifecycle of a quota lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum QuotaStatus {
    #[sea_orm(string_value = "VALID")]
    #[serde(rename = "VALID")]
    Valid,
    #[sea_orm(string_value = "EXPIRED")]
    #[serde(rename = "EXPIRED")]
    Expired,
}

/// Ledger operation recorded in the quota audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum QuotaOperation {
    #[sea_orm(string_value = "RECHARGE")]
    #[serde(rename = "RECHARGE")]
    Recharge,
    #[sea_orm(string_value = "TRANSFER_IN")]
    #[serde(rename = "TRANSFER_IN")]
    TransferIn,
    #[sea_orm(string_value = "TRANSFER_OUT")]
    #[serde(rename = "TRANSFER_OUT")]
    TransferOut,
}

/// Addressee of a permission setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum TargetType {
    #[sea_orm(string_value = "user")]
    #[serde(rename = "user")]
    User,
    #[sea_orm(string_value = "department")]
    #[serde(rename = "department")]
    Department,
}

pub use auth_users::Entity as AuthUsers;
pub use effective_quota_check_settings::Entity as EffectiveQuotaCheckSettings;
pub use effective_star_check_settings::Entity as EffectiveStarCheckSettings;
pub use employee_departments::Entity as EmployeeDepartments;
pub use permission_audits::Entity as PermissionAudits;
pub use quota_audits::Entity as QuotaAudits;
pub use quota_check_settings::Entity as QuotaCheckSettings;
pub use quotas::Entity as Quotas;
pub use star_check_settings::Entity as StarCheckSettings;
pub use voucher_redemptions::Entity as VoucherRedemptions;

// Type aliases
pub type AuthUser = auth_users::Model;
pub type EmployeeDepartment = employee_departments::Model;
pub type QuotaLot = quotas::Model;
pub type QuotaAudit = quota_audits::Model;
pub type VoucherRedemption = voucher_redemptions::Model;

pub use quota_audits::{AuditItemStatus, QuotaAuditDetailItem, QuotaAuditDetails, QuotaAuditSummary};
