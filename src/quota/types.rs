use crate::database::entities::{QuotaAuditDetails, QuotaOperation};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Authenticated principal as resolved by the auth layer.
#[derive(Debug, Clone, Default)]
pub struct AuthUser {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub github: String,
}

/// Aggregate quota view returned by `get_user_quota`.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaInfo {
    pub total_quota: Decimal,
    pub used_quota: Decimal,
    /// Net-available lots, earliest expiry first, usage already deducted.
    pub quota_list: Vec<QuotaDetailItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotaDetailItem {
    pub amount: Decimal,
    pub expiry_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferOutRequest {
    pub receiver_id: String,
    pub quota_list: Vec<TransferQuotaItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferQuotaItem {
    pub amount: Decimal,
    pub expiry_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferOutResponse {
    pub voucher_code: String,
    pub related_user: String,
    pub operation: QuotaOperation,
    pub quota_list: Vec<TransferQuotaItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferInRequest {
    pub voucher_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransferStatus {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "PARTIAL_SUCCESS")]
    PartialSuccess,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "ALREADY_REDEEMED")]
    AlreadyRedeemed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransferFailureReason {
    #[serde(rename = "EXPIRED")]
    Expired,
    #[serde(rename = "PENDING")]
    Pending,
}

/// Per-item outcome of a transfer-in.
#[derive(Debug, Clone, Serialize)]
pub struct TransferQuotaResult {
    pub amount: Decimal,
    pub expiry_date: DateTime<Utc>,
    pub is_expired: bool,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<TransferFailureReason>,
}

/// Transfer-in always resolves to a well-formed response; failures are a
/// status, never an error return.
#[derive(Debug, Clone, Serialize)]
pub struct TransferInResponse {
    pub giver_id: String,
    pub giver_name: String,
    pub giver_phone: String,
    pub giver_github: String,
    pub receiver_id: String,
    pub quota_list: Vec<TransferQuotaResult>,
    pub voucher_code: String,
    pub operation: QuotaOperation,
    pub amount: Decimal,
    pub status: TransferStatus,
    pub message: String,
}

/// Audit record view with the detail payload already parsed.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaAuditRecord {
    pub amount: Decimal,
    pub operation: QuotaOperation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voucher_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy_name: Option<String>,
    pub expiry_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<QuotaAuditDetails>,
    pub create_time: DateTime<Utc>,
}
