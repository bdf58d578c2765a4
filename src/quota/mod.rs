//! The quota accounting engine.
//!
//! Owns the authoritative ledger of quota lots and keeps it reconciled with
//! the gateway's aggregate counters. Every mutating operation performs the
//! ledger write and its audit record inside one transaction, with the gateway
//! call ordered last so a gateway rejection rolls the whole scope back.

pub mod availability;
pub mod expiry;
pub mod types;

pub use types::*;

use crate::config::GithubStarCheckConfig;
use crate::database::entities::{
    quota_audits, quotas, voucher_redemptions, AuditItemStatus, QuotaAuditDetailItem,
    QuotaAuditDetails, QuotaAuditSummary, QuotaOperation, QuotaStatus,
};
use crate::database::DatabaseManager;
use crate::error::ServiceError;
use crate::gateway::AiGatewayClient;
use crate::voucher::{VoucherData, VoucherQuotaItem, VoucherService};
use chrono::{DateTime, Local, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, ConnectionTrait, EntityTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

pub struct QuotaService {
    db: Arc<DatabaseManager>,
    gateway: Arc<dyn AiGatewayClient>,
    voucher: Arc<VoucherService>,
    star_check: RwLock<GithubStarCheckConfig>,
}

enum TransferInOutcome {
    Completed(TransferInResponse),
    AlreadyRedeemed,
    Aborted(String),
}

impl QuotaService {
    pub fn new(
        db: Arc<DatabaseManager>,
        gateway: Arc<dyn AiGatewayClient>,
        voucher: Arc<VoucherService>,
        star_check: GithubStarCheckConfig,
    ) -> Self {
        Self {
            db,
            gateway,
            voucher,
            star_check: RwLock::new(star_check),
        }
    }

    /// Current star policy applied to transfer-out.
    pub fn star_check_policy(&self) -> GithubStarCheckConfig {
        match self.star_check.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Swap the star policy at runtime; visible on the next call.
    pub fn set_star_check_policy(&self, policy: GithubStarCheckConfig) {
        match self.star_check.write() {
            Ok(mut guard) => *guard = policy,
            Err(poisoned) => *poisoned.into_inner() = policy,
        }
    }

    /// Aggregate quota view: gateway counters plus the net-available lots,
    /// usage attributed FIFO-by-expiry.
    pub async fn get_user_quota(&self, user_id: &str) -> Result<QuotaInfo, ServiceError> {
        let total_quota = self.gateway.get_total_quota(user_id).await?;
        let used_quota = self.gateway.get_used_quota(user_id).await?;

        let lots = self.valid_lots_by_expiry(&self.db.connection, user_id).await?;

        Ok(QuotaInfo {
            total_quota,
            used_quota,
            quota_list: availability::net_available(&lots, used_quota),
        })
    }

    /// Audit page ordered `(create_time DESC, id DESC)` plus the total count.
    pub async fn get_quota_audit_records(
        &self,
        user_id: &str,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<QuotaAuditRecord>, u64), ServiceError> {
        let page = page.max(1);

        let total = quota_audits::Entity::find()
            .filter(quota_audits::Column::UserId.eq(user_id))
            .count(&self.db.connection)
            .await
            .map_err(|e| ServiceError::storage("count audit records", e))?;

        let rows = quota_audits::Entity::find()
            .filter(quota_audits::Column::UserId.eq(user_id))
            .order_by_desc(quota_audits::Column::CreateTime)
            .order_by_desc(quota_audits::Column::Id)
            .offset(Some((page - 1) * page_size))
            .limit(Some(page_size))
            .all(&self.db.connection)
            .await
            .map_err(|e| ServiceError::storage("list audit records", e))?;

        let records = rows
            .into_iter()
            .map(|row| QuotaAuditRecord {
                amount: row.amount,
                operation: row.operation,
                voucher_code: row.voucher_code.clone(),
                related_user: row.related_user.clone(),
                strategy_name: row.strategy_name.clone(),
                expiry_date: row.expiry_date,
                details: row.decode_details(),
                create_time: row.create_time,
            })
            .collect();

        Ok((records, total))
    }

    /// Grant quota from a strategy run. The lot expires at the end of the
    /// current month, or the next one when fewer than 30 days remain.
    pub async fn add_quota_for_strategy(
        &self,
        user_id: &str,
        amount: Decimal,
        strategy_name: &str,
    ) -> Result<(), ServiceError> {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::validation("amount", "must be positive"));
        }

        let expiry_date = expiry::truncate_to_second(
            expiry::strategy_expiry(Local::now()).with_timezone(&Utc),
        );
        let now = expiry::truncate_to_second(Utc::now());

        let txn = self
            .db
            .connection
            .begin()
            .await
            .map_err(|e| ServiceError::storage("begin strategy recharge", e))?;

        match self
            .recharge_in_txn(&txn, user_id, amount, strategy_name, expiry_date, now)
            .await
        {
            Ok(()) => {
                txn.commit()
                    .await
                    .map_err(|e| ServiceError::storage("commit strategy recharge", e))?;
                info!(user_id, %amount, strategy = strategy_name, "strategy recharge committed");
                Ok(())
            }
            Err(err) => {
                let _ = txn.rollback().await;
                Err(err)
            }
        }
    }

    async fn recharge_in_txn<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
        amount: Decimal,
        strategy_name: &str,
        expiry_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let (original_amount, new_amount) =
            self.upsert_lot(conn, user_id, amount, expiry_date, now).await?;

        let details = QuotaAuditDetails {
            operation: QuotaOperation::Recharge,
            summary: QuotaAuditSummary {
                total_amount: amount,
                total_items: 1,
                successful_items: 1,
                failed_items: 0,
                expired_items: 0,
                earliest_expiry_date: Some(expiry_date),
            },
            items: vec![QuotaAuditDetailItem {
                amount,
                expiry_date,
                status: AuditItemStatus::Success,
                failure_reason: None,
                original_quota: Some(original_amount),
                new_quota: Some(new_amount),
            }],
        };

        self.insert_audit(
            conn,
            user_id,
            amount,
            QuotaOperation::Recharge,
            None,
            None,
            Some(strategy_name),
            expiry_date,
            &details,
            now,
        )
        .await?;

        self.gateway.delta_total_quota(user_id, amount).await?;
        Ok(())
    }

    /// Reserve quota out of the giver's lots and issue a voucher for the
    /// receiver. The availability check and the decrement run against the
    /// same rows, so concurrent overlapping transfers serialize on the store.
    pub async fn transfer_out(
        &self,
        giver: &AuthUser,
        req: &TransferOutRequest,
    ) -> Result<TransferOutResponse, ServiceError> {
        let receiver_id = req.receiver_id.trim().to_string();
        if receiver_id.is_empty() {
            return Err(ServiceError::validation("receiver_id", "cannot be empty"));
        }
        if req.quota_list.is_empty() {
            return Err(ServiceError::validation(
                "quota_list",
                "must contain at least one item",
            ));
        }
        if req.quota_list.iter().any(|i| i.amount <= Decimal::ZERO) {
            return Err(ServiceError::validation(
                "quota_list",
                "item amounts must be positive",
            ));
        }

        let items: Vec<TransferQuotaItem> = req
            .quota_list
            .iter()
            .map(|i| TransferQuotaItem {
                amount: i.amount,
                expiry_date: expiry::truncate_to_second(i.expiry_date),
            })
            .collect();

        // Starred projects feed the policy gate and ride the voucher
        let giver_github_star = self
            .db
            .users()
            .find_by_id(&giver.id)
            .await
            .ok()
            .flatten()
            .map(|u| u.github_star)
            .unwrap_or_default();

        let policy = self.star_check_policy();
        if policy.enabled {
            let required_repo = policy.required_repo.trim();
            let starred = giver_github_star
                .split(',')
                .map(str::trim)
                .any(|project| project == required_repo);
            if !starred {
                return Err(ServiceError::StarRequired(required_repo.to_string()));
            }
        }

        let used_quota = self.gateway.get_used_quota(&giver.id).await?;
        let lots = self.valid_lots_by_expiry(&self.db.connection, &giver.id).await?;
        let available = availability::availability_by_expiry(&lots, used_quota);

        for item in &items {
            match available.get(&item.expiry_date) {
                None => return Err(ServiceError::ExpiryNotFound(item.expiry_date)),
                Some(have) if *have < item.amount => {
                    return Err(ServiceError::InsufficientQuota {
                        expiry_date: item.expiry_date,
                        have: *have,
                        need: item.amount,
                    });
                }
                Some(_) => {}
            }
        }

        let txn = self
            .db
            .connection
            .begin()
            .await
            .map_err(|e| ServiceError::storage("begin transfer out", e))?;

        match self
            .transfer_out_in_txn(&txn, giver, &receiver_id, &items, &giver_github_star)
            .await
        {
            Ok(voucher_code) => {
                txn.commit()
                    .await
                    .map_err(|e| ServiceError::storage("commit transfer out", e))?;
                info!(giver = %giver.id, receiver = %receiver_id, "quota transfer out committed");
                Ok(TransferOutResponse {
                    voucher_code,
                    related_user: receiver_id,
                    operation: QuotaOperation::TransferOut,
                    quota_list: items,
                })
            }
            Err(err) => {
                let _ = txn.rollback().await;
                Err(err)
            }
        }
    }

    async fn transfer_out_in_txn<C: ConnectionTrait>(
        &self,
        conn: &C,
        giver: &AuthUser,
        receiver_id: &str,
        items: &[TransferQuotaItem],
        giver_github_star: &str,
    ) -> Result<String, ServiceError> {
        let now = expiry::truncate_to_second(Utc::now());

        for item in items {
            self.withdraw_from_lots(conn, &giver.id, item, now).await?;
        }

        let voucher_code = self
            .voucher
            .generate(&VoucherData {
                giver_id: giver.id.clone(),
                giver_name: giver.name.clone(),
                giver_phone: giver.phone.clone(),
                giver_github: giver.github.clone(),
                giver_github_star: giver_github_star.to_string(),
                receiver_id: receiver_id.to_string(),
                quota_list: items
                    .iter()
                    .map(|i| VoucherQuotaItem {
                        amount: i.amount,
                        expiry_date: i.expiry_date,
                    })
                    .collect(),
            })
            .map_err(|e| ServiceError::Voucher(e.to_string()))?;

        let total_amount: Decimal = items.iter().map(|i| i.amount).sum();
        let earliest_expiry = items
            .iter()
            .map(|i| i.expiry_date)
            .min()
            .unwrap_or(now);

        let details = QuotaAuditDetails {
            operation: QuotaOperation::TransferOut,
            summary: QuotaAuditSummary {
                total_amount,
                total_items: items.len(),
                successful_items: items.len(),
                failed_items: 0,
                expired_items: 0,
                earliest_expiry_date: Some(earliest_expiry),
            },
            items: items
                .iter()
                .map(|i| QuotaAuditDetailItem {
                    amount: i.amount,
                    expiry_date: i.expiry_date,
                    status: AuditItemStatus::Success,
                    failure_reason: None,
                    original_quota: None,
                    new_quota: None,
                })
                .collect(),
        };

        self.insert_audit(
            conn,
            &giver.id,
            -total_amount,
            QuotaOperation::TransferOut,
            Some(&voucher_code),
            Some(receiver_id),
            None,
            earliest_expiry,
            &details,
            now,
        )
        .await?;

        self.gateway
            .delta_total_quota(&giver.id, -total_amount)
            .await?;

        Ok(voucher_code)
    }

    /// Take `item.amount` out of the giver's lots at one expiry date,
    /// re-validating against the rows inside the transaction. Lots drained to
    /// zero are deleted; duplicates are drained lowest id first.
    async fn withdraw_from_lots<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
        item: &TransferQuotaItem,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let lots = quotas::Entity::find()
            .filter(quotas::Column::UserId.eq(user_id))
            .filter(quotas::Column::ExpiryDate.eq(item.expiry_date))
            .filter(quotas::Column::Status.eq(QuotaStatus::Valid))
            .order_by_asc(quotas::Column::Id)
            .all(conn)
            .await
            .map_err(|e| ServiceError::storage("read quota lots for withdrawal", e))?;

        if lots.is_empty() {
            return Err(ServiceError::ExpiryNotFound(item.expiry_date));
        }

        let total: Decimal = lots.iter().map(|l| l.amount).sum();
        if total < item.amount {
            return Err(ServiceError::InsufficientQuota {
                expiry_date: item.expiry_date,
                have: total,
                need: item.amount,
            });
        }

        let mut remaining = item.amount;
        for lot in lots {
            if remaining <= Decimal::ZERO {
                break;
            }
            if lot.amount <= remaining {
                remaining -= lot.amount;
                quotas::Entity::delete_by_id(lot.id)
                    .exec(conn)
                    .await
                    .map_err(|e| ServiceError::storage("delete drained quota lot", e))?;
            } else {
                let updated = lot.amount - remaining;
                remaining = Decimal::ZERO;
                let mut active: quotas::ActiveModel = lot.into();
                active.amount = Set(updated);
                active.update_time = Set(now);
                active
                    .update(conn)
                    .await
                    .map_err(|e| ServiceError::storage("decrement quota lot", e))?;
            }
        }

        Ok(())
    }

    /// Redeem a voucher into the receiver's ledger. Always resolves to a
    /// well-formed response; the unique redemption index makes concurrent
    /// redeems of one code yield exactly one winner.
    pub async fn transfer_in(
        &self,
        receiver: &AuthUser,
        req: &TransferInRequest,
    ) -> Result<TransferInResponse, ServiceError> {
        let voucher = match self.voucher.decode(&req.voucher_code) {
            Ok(data) => data,
            Err(err) => {
                warn!(user_id = %receiver.id, error = %err, "rejecting voucher");
                return Ok(Self::failed_response("Invalid voucher code"));
            }
        };

        if voucher.receiver_id != receiver.id {
            return Ok(Self::failed_response("Voucher is not for this user"));
        }

        // Fast path; the unique index arbitrates races inside the transaction
        let already = voucher_redemptions::Entity::find()
            .filter(voucher_redemptions::Column::VoucherCode.eq(&req.voucher_code))
            .one(&self.db.connection)
            .await
            .map_err(|e| ServiceError::storage("check voucher redemption", e))?;
        if already.is_some() {
            return Ok(Self::already_redeemed_response(&voucher, receiver, req));
        }

        let txn = self
            .db
            .connection
            .begin()
            .await
            .map_err(|e| ServiceError::storage("begin transfer in", e))?;

        match self.transfer_in_in_txn(&txn, receiver, req, &voucher).await {
            TransferInOutcome::Completed(response) => {
                txn.commit()
                    .await
                    .map_err(|e| ServiceError::storage("commit transfer in", e))?;

                // Best effort; never alters the transfer status
                if !voucher.giver_github_star.is_empty() {
                    if let Err(err) = self
                        .gateway
                        .set_starred_projects(&receiver.id, &voucher.giver_github_star)
                        .await
                    {
                        warn!(
                            user_id = %receiver.id,
                            starred_projects = %voucher.giver_github_star,
                            error = %err,
                            "failed to propagate starred projects"
                        );
                    }
                }

                Ok(response)
            }
            TransferInOutcome::AlreadyRedeemed => {
                let _ = txn.rollback().await;
                Ok(Self::already_redeemed_response(&voucher, receiver, req))
            }
            TransferInOutcome::Aborted(message) => {
                let _ = txn.rollback().await;
                Ok(Self::failed_response(&message))
            }
        }
    }

    async fn transfer_in_in_txn<C: ConnectionTrait>(
        &self,
        conn: &C,
        receiver: &AuthUser,
        req: &TransferInRequest,
        voucher: &VoucherData,
    ) -> TransferInOutcome {
        let now = expiry::truncate_to_second(Utc::now());

        let redemption = voucher_redemptions::ActiveModel {
            id: ActiveValue::NotSet,
            voucher_code: Set(req.voucher_code.clone()),
            receiver_id: Set(receiver.id.clone()),
            create_time: Set(now),
        };
        if let Err(err) = redemption.insert(conn).await {
            return match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => TransferInOutcome::AlreadyRedeemed,
                _ => {
                    warn!(error = %err, "failed to record voucher redemption");
                    TransferInOutcome::Aborted("Failed to record voucher redemption".to_string())
                }
            };
        }

        let mut total_amount = Decimal::ZERO;
        let mut earliest_expiry: Option<DateTime<Utc>> = None;
        let mut results = Vec::with_capacity(voucher.quota_list.len());

        for item in &voucher.quota_list {
            let expiry_date = expiry::truncate_to_second(item.expiry_date);
            let is_expired = now > expiry_date;
            let mut result = TransferQuotaResult {
                amount: item.amount,
                expiry_date,
                is_expired,
                success: false,
                failure_reason: None,
            };

            if is_expired {
                result.failure_reason = Some(TransferFailureReason::Expired);
            } else {
                match self
                    .upsert_lot(conn, &receiver.id, item.amount, expiry_date, now)
                    .await
                {
                    Ok(_) => {
                        result.success = true;
                        total_amount += item.amount;
                        earliest_expiry = Some(match earliest_expiry {
                            Some(earliest) if earliest <= expiry_date => earliest,
                            _ => expiry_date,
                        });
                    }
                    Err(err) => {
                        // One bad item does not sink the rest of the voucher
                        warn!(user_id = %receiver.id, error = %err, "transfer-in item deferred");
                        result.failure_reason = Some(TransferFailureReason::Pending);
                    }
                }
            }

            results.push(result);
        }

        let success_count = results.iter().filter(|r| r.success).count();

        if success_count > 0 {
            let expired_count = results.iter().filter(|r| r.is_expired).count();
            let failed_count = results.len() - success_count - expired_count;
            let earliest = earliest_expiry.unwrap_or(now);

            let details = QuotaAuditDetails {
                operation: QuotaOperation::TransferIn,
                summary: QuotaAuditSummary {
                    total_amount,
                    total_items: results.len(),
                    successful_items: success_count,
                    failed_items: failed_count,
                    expired_items: expired_count,
                    earliest_expiry_date: Some(earliest),
                },
                items: results
                    .iter()
                    .map(|r| QuotaAuditDetailItem {
                        amount: r.amount,
                        expiry_date: r.expiry_date,
                        status: if r.is_expired {
                            AuditItemStatus::Expired
                        } else if r.success {
                            AuditItemStatus::Success
                        } else {
                            AuditItemStatus::Failed
                        },
                        failure_reason: match (r.is_expired, r.failure_reason) {
                            (true, _) => Some("Quota expired".to_string()),
                            (false, Some(TransferFailureReason::Pending)) => {
                                Some("PENDING".to_string())
                            }
                            _ => None,
                        },
                        original_quota: None,
                        new_quota: None,
                    })
                    .collect(),
            };

            if let Err(err) = self
                .insert_audit(
                    conn,
                    &receiver.id,
                    total_amount,
                    QuotaOperation::TransferIn,
                    Some(&req.voucher_code),
                    Some(&voucher.giver_id),
                    None,
                    earliest,
                    &details,
                    now,
                )
                .await
            {
                warn!(error = %err, "failed to record transfer-in audit");
                return TransferInOutcome::Aborted("Failed to create audit record".to_string());
            }
        }

        if total_amount > Decimal::ZERO {
            if let Err(err) = self
                .gateway
                .delta_total_quota(&receiver.id, total_amount)
                .await
            {
                warn!(user_id = %receiver.id, error = %err, "gateway rejected transfer-in delta");
                return TransferInOutcome::Aborted("Failed to update AI gateway quota".to_string());
            }
        }

        let (status, message) = aggregate_status(&results);

        TransferInOutcome::Completed(TransferInResponse {
            giver_id: voucher.giver_id.clone(),
            giver_name: voucher.giver_name.clone(),
            giver_phone: voucher.giver_phone.clone(),
            giver_github: voucher.giver_github.clone(),
            receiver_id: receiver.id.clone(),
            quota_list: results,
            voucher_code: req.voucher_code.clone(),
            operation: QuotaOperation::TransferIn,
            amount: total_amount,
            status,
            message,
        })
    }

    /// Expire overdue lots and realign the gateway counters: used resets to
    /// zero and total becomes the remaining valid sum, forfeiting both unused
    /// expiring credit and the carried-over used debt.
    pub async fn expire_quotas(&self) -> Result<u64, ServiceError> {
        let now = expiry::truncate_to_second(Utc::now());

        let expired = quotas::Entity::find()
            .filter(quotas::Column::Status.eq(QuotaStatus::Valid))
            .filter(quotas::Column::ExpiryDate.lt(now))
            .all(&self.db.connection)
            .await
            .map_err(|e| ServiceError::storage("find expired quota lots", e))?;

        if expired.is_empty() {
            return Ok(0);
        }

        let mut expired_by_user: HashMap<String, Decimal> = HashMap::new();
        for lot in &expired {
            *expired_by_user
                .entry(lot.user_id.clone())
                .or_insert(Decimal::ZERO) += lot.amount;
        }

        let txn = self
            .db
            .connection
            .begin()
            .await
            .map_err(|e| ServiceError::storage("begin expiry sweep", e))?;

        match self.expire_in_txn(&txn, now, &expired_by_user).await {
            Ok(()) => {
                txn.commit()
                    .await
                    .map_err(|e| ServiceError::storage("commit expiry sweep", e))?;
                info!(
                    lots = expired.len(),
                    users = expired_by_user.len(),
                    "expired quota lots"
                );
                Ok(expired.len() as u64)
            }
            Err(err) => {
                let _ = txn.rollback().await;
                Err(err)
            }
        }
    }

    async fn expire_in_txn<C: ConnectionTrait>(
        &self,
        conn: &C,
        now: DateTime<Utc>,
        expired_by_user: &HashMap<String, Decimal>,
    ) -> Result<(), ServiceError> {
        quotas::Entity::update_many()
            .set(quotas::ActiveModel {
                status: Set(QuotaStatus::Expired),
                update_time: Set(now),
                ..Default::default()
            })
            .filter(quotas::Column::Status.eq(QuotaStatus::Valid))
            .filter(quotas::Column::ExpiryDate.lt(now))
            .exec(conn)
            .await
            .map_err(|e| ServiceError::storage("mark quota lots expired", e))?;

        for user_id in expired_by_user.keys() {
            let valid_sum = self.sum_valid_lots(conn, user_id).await?;
            let total = self.gateway.get_total_quota(user_id).await?;
            let used = self.gateway.get_used_quota(user_id).await?;

            // Used debt was consumed against now-gone lots; reset it
            self.gateway.delta_used_quota(user_id, -used).await?;

            let delta = valid_sum - total;
            if delta != Decimal::ZERO {
                self.gateway.delta_total_quota(user_id, delta).await?;
            }
        }

        Ok(())
    }

    /// Collapse duplicate lots per `(user, expiry, status)` into one row with
    /// the summed amount; groups whose sum is not positive are dropped.
    pub async fn merge_quota_records(&self) -> Result<u64, ServiceError> {
        #[derive(FromQueryResult)]
        struct QuotaGroup {
            user_id: String,
            expiry_date: DateTime<Utc>,
            status: QuotaStatus,
            total_amount: Option<Decimal>,
            record_count: i64,
        }

        let groups: Vec<QuotaGroup> = quotas::Entity::find()
            .select_only()
            .column(quotas::Column::UserId)
            .column(quotas::Column::ExpiryDate)
            .column(quotas::Column::Status)
            .column_as(quotas::Column::Amount.sum(), "total_amount")
            .column_as(quotas::Column::Id.count(), "record_count")
            .group_by(quotas::Column::UserId)
            .group_by(quotas::Column::ExpiryDate)
            .group_by(quotas::Column::Status)
            .having(Expr::expr(quotas::Column::Id.count()).gt(1))
            .into_model()
            .all(&self.db.connection)
            .await
            .map_err(|e| ServiceError::storage("find duplicate quota groups", e))?;

        if groups.is_empty() {
            return Ok(0);
        }

        let now = expiry::truncate_to_second(Utc::now());

        let txn = self
            .db
            .connection
            .begin()
            .await
            .map_err(|e| ServiceError::storage("begin lot merge", e))?;

        let merge = async {
            for group in &groups {
                quotas::Entity::delete_many()
                    .filter(quotas::Column::UserId.eq(&group.user_id))
                    .filter(quotas::Column::ExpiryDate.eq(group.expiry_date))
                    .filter(quotas::Column::Status.eq(group.status))
                    .exec(&txn)
                    .await
                    .map_err(|e| ServiceError::storage("delete duplicate quota lots", e))?;

                let total_amount = group.total_amount.unwrap_or(Decimal::ZERO);
                if total_amount > Decimal::ZERO {
                    quotas::ActiveModel {
                        id: ActiveValue::NotSet,
                        user_id: Set(group.user_id.clone()),
                        amount: Set(total_amount),
                        expiry_date: Set(group.expiry_date),
                        status: Set(group.status),
                        create_time: Set(now),
                        update_time: Set(now),
                    }
                    .insert(&txn)
                    .await
                    .map_err(|e| ServiceError::storage("insert merged quota lot", e))?;
                }

                info!(
                    user_id = %group.user_id,
                    records = group.record_count,
                    "merged duplicate quota lots"
                );
            }
            Ok::<(), ServiceError>(())
        }
        .await;

        match merge {
            Ok(()) => {
                txn.commit()
                    .await
                    .map_err(|e| ServiceError::storage("commit lot merge", e))?;
                Ok(groups.len() as u64)
            }
            Err(err) => {
                let _ = txn.rollback().await;
                Err(err)
            }
        }
    }

    /// Pass-through adjustment of the gateway used counter.
    pub async fn delta_used_quota(&self, user_id: &str, delta: Decimal) -> Result<(), ServiceError> {
        self.gateway.delta_used_quota(user_id, delta).await?;
        Ok(())
    }

    async fn valid_lots_by_expiry<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
    ) -> Result<Vec<quotas::Model>, ServiceError> {
        quotas::Entity::find()
            .filter(quotas::Column::UserId.eq(user_id))
            .filter(quotas::Column::Status.eq(QuotaStatus::Valid))
            .order_by_asc(quotas::Column::ExpiryDate)
            .all(conn)
            .await
            .map_err(|e| ServiceError::storage("list valid quota lots", e))
    }

    async fn sum_valid_lots<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
    ) -> Result<Decimal, ServiceError> {
        let sum = quotas::Entity::find()
            .select_only()
            .column_as(quotas::Column::Amount.sum(), "amount_sum")
            .filter(quotas::Column::UserId.eq(user_id))
            .filter(quotas::Column::Status.eq(QuotaStatus::Valid))
            .into_tuple::<Option<Decimal>>()
            .one(conn)
            .await
            .map_err(|e| ServiceError::storage("sum valid quota lots", e))?;

        Ok(sum.flatten().unwrap_or(Decimal::ZERO))
    }

    /// Create or top up the lot at `(user_id, expiry_date, VALID)`, returning
    /// the amounts before and after.
    async fn upsert_lot<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
        amount: Decimal,
        expiry_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(Decimal, Decimal), ServiceError> {
        let existing = quotas::Entity::find()
            .filter(quotas::Column::UserId.eq(user_id))
            .filter(quotas::Column::ExpiryDate.eq(expiry_date))
            .filter(quotas::Column::Status.eq(QuotaStatus::Valid))
            .order_by_asc(quotas::Column::Id)
            .one(conn)
            .await
            .map_err(|e| ServiceError::storage("find quota lot", e))?;

        match existing {
            Some(lot) => {
                let updated = lot.amount + amount;
                let original = lot.amount;
                let mut active: quotas::ActiveModel = lot.into();
                active.amount = Set(updated);
                active.update_time = Set(now);
                active
                    .update(conn)
                    .await
                    .map_err(|e| ServiceError::storage("update quota lot", e))?;
                Ok((original, updated))
            }
            None => {
                quotas::ActiveModel {
                    id: ActiveValue::NotSet,
                    user_id: Set(user_id.to_string()),
                    amount: Set(amount),
                    expiry_date: Set(expiry_date),
                    status: Set(QuotaStatus::Valid),
                    create_time: Set(now),
                    update_time: Set(now),
                }
                .insert(conn)
                .await
                .map_err(|e| ServiceError::storage("insert quota lot", e))?;
                Ok((Decimal::ZERO, amount))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn insert_audit<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
        amount: Decimal,
        operation: QuotaOperation,
        voucher_code: Option<&str>,
        related_user: Option<&str>,
        strategy_name: Option<&str>,
        expiry_date: DateTime<Utc>,
        details: &QuotaAuditDetails,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let details_json = details
            .encode()
            .map_err(|e| ServiceError::Internal(format!("failed to encode audit details: {e}")))?;

        quota_audits::ActiveModel {
            id: ActiveValue::NotSet,
            user_id: Set(user_id.to_string()),
            amount: Set(amount),
            operation: Set(operation),
            voucher_code: Set(voucher_code.map(str::to_string)),
            related_user: Set(related_user.map(str::to_string)),
            strategy_name: Set(strategy_name.map(str::to_string)),
            expiry_date: Set(expiry_date),
            details: Set(Some(details_json)),
            create_time: Set(now),
        }
        .insert(conn)
        .await
        .map_err(|e| ServiceError::storage("insert quota audit", e))?;

        Ok(())
    }

    fn failed_response(message: &str) -> TransferInResponse {
        TransferInResponse {
            giver_id: String::new(),
            giver_name: String::new(),
            giver_phone: String::new(),
            giver_github: String::new(),
            receiver_id: String::new(),
            quota_list: Vec::new(),
            voucher_code: String::new(),
            operation: QuotaOperation::TransferIn,
            amount: Decimal::ZERO,
            status: TransferStatus::Failed,
            message: message.to_string(),
        }
    }

    fn already_redeemed_response(
        voucher: &VoucherData,
        receiver: &AuthUser,
        req: &TransferInRequest,
    ) -> TransferInResponse {
        TransferInResponse {
            giver_id: voucher.giver_id.clone(),
            giver_name: voucher.giver_name.clone(),
            giver_phone: voucher.giver_phone.clone(),
            giver_github: voucher.giver_github.clone(),
            receiver_id: receiver.id.clone(),
            quota_list: Vec::new(),
            voucher_code: req.voucher_code.clone(),
            operation: QuotaOperation::TransferIn,
            amount: Decimal::ZERO,
            status: TransferStatus::AlreadyRedeemed,
            message: "Voucher has already been redeemed".to_string(),
        }
    }
}

/// Aggregate status over per-item transfer results.
fn aggregate_status(results: &[TransferQuotaResult]) -> (TransferStatus, String) {
    let total = results.len();
    let success_count = results.iter().filter(|r| r.success).count();
    let expired_count = results.iter().filter(|r| r.is_expired).count();

    if success_count == 0 {
        (
            TransferStatus::Failed,
            "All quota transfers failed".to_string(),
        )
    } else if success_count == total {
        (
            TransferStatus::Success,
            "All quota transfers completed successfully".to_string(),
        )
    } else if expired_count > 0 {
        (
            TransferStatus::PartialSuccess,
            format!(
                "{success_count} of {total} quota transfers completed successfully, {expired_count} expired"
            ),
        )
    } else {
        (
            TransferStatus::PartialSuccess,
            format!("{success_count} of {total} quota transfers completed successfully"),
        )
    }
}
