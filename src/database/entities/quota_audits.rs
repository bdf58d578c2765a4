use super::QuotaOperation;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only audit row written in the same transaction as the ledger
/// mutation that produced it. `amount` is signed: negative for transfer-out.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "quota_audits")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: String,
    pub amount: Decimal,
    pub operation: QuotaOperation,
    pub voucher_code: Option<String>,
    pub related_user: Option<String>,
    pub strategy_name: Option<String>,
    /// Earliest expiry date affected by the operation.
    pub expiry_date: DateTime<Utc>,
    /// JSON-encoded [`QuotaAuditDetails`].
    pub details: Option<String>,
    pub create_time: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Parse the structured detail payload. Parse failures are downgraded to
    /// `None`; audit reads never fail on malformed details.
    pub fn decode_details(&self) -> Option<QuotaAuditDetails> {
        self.details
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }
}

/// Outcome of a single item inside an audit detail payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditItemStatus {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "EXPIRED")]
    Expired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaAuditDetailItem {
    pub amount: Decimal,
    pub expiry_date: DateTime<Utc>,
    pub status: AuditItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Lot amount before a recharge, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_quota: Option<Decimal>,
    /// Lot amount after a recharge, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_quota: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuotaAuditSummary {
    pub total_amount: Decimal,
    pub total_items: usize,
    pub successful_items: usize,
    #[serde(default)]
    pub failed_items: usize,
    #[serde(default)]
    pub expired_items: usize,
    pub earliest_expiry_date: Option<DateTime<Utc>>,
}

/// Structured per-item breakdown stored as JSON on the audit row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaAuditDetails {
    pub operation: QuotaOperation,
    pub summary: QuotaAuditSummary,
    pub items: Vec<QuotaAuditDetailItem>,
}

impl QuotaAuditDetails {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::SubsecRound;

    #[test]
    fn details_round_trip() {
        let details = QuotaAuditDetails {
            operation: QuotaOperation::TransferIn,
            summary: QuotaAuditSummary {
                total_amount: Decimal::from(100),
                total_items: 2,
                successful_items: 1,
                failed_items: 0,
                expired_items: 1,
                earliest_expiry_date: Some(Utc::now().trunc_subsecs(0)),
            },
            items: vec![QuotaAuditDetailItem {
                amount: Decimal::from(100),
                expiry_date: Utc::now().trunc_subsecs(0),
                status: AuditItemStatus::Success,
                failure_reason: None,
                original_quota: None,
                new_quota: None,
            }],
        };

        let encoded = details.encode().unwrap();
        let decoded: QuotaAuditDetails = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, details);
    }

    #[test]
    fn malformed_details_decode_to_none() {
        let model = Model {
            id: 1,
            user_id: "u".to_string(),
            amount: Decimal::ZERO,
            operation: QuotaOperation::Recharge,
            voucher_code: None,
            related_user: None,
            strategy_name: None,
            expiry_date: Utc::now(),
            details: Some("{not json".to_string()),
            create_time: Utc::now(),
        };
        assert!(model.decode_details().is_none());
    }
}
