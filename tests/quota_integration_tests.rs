//! Integration tests for the quota engine against an in-memory ledger and a
//! mock gateway.

use chrono::{Duration, SubsecRound, Utc};
use quota_manager::database::entities::{
    quota_audits, quotas, voucher_redemptions, QuotaOperation, QuotaStatus,
};
use quota_manager::error::ServiceError;
use quota_manager::quota::{TransferInRequest, TransferOutRequest, TransferQuotaItem, TransferStatus};
use quota_manager::test_utils::TestEnvBuilder;
use quota_manager::voucher::{VoucherData, VoucherQuotaItem};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

fn days_from_now(days: i64) -> chrono::DateTime<Utc> {
    (Utc::now() + Duration::days(days)).trunc_subsecs(0)
}

async fn valid_lots(
    env: &quota_manager::test_utils::TestEnv,
    user_id: &str,
) -> Vec<quotas::Model> {
    quotas::Entity::find()
        .filter(quotas::Column::UserId.eq(user_id))
        .filter(quotas::Column::Status.eq(QuotaStatus::Valid))
        .all(&env.database.connection)
        .await
        .unwrap()
}

#[tokio::test]
async fn strategy_recharge_builds_fifo_view() {
    let env = TestEnvBuilder::new().build().await;
    env.create_auth_user("u1", "User One", "").await;

    env.quota_service
        .add_quota_for_strategy("u1", dec!(100), "s1")
        .await
        .unwrap();
    env.quota_service
        .add_quota_for_strategy("u1", dec!(50), "s1")
        .await
        .unwrap();

    // Both recharges land on the same end-of-month lot
    let lots = valid_lots(&env, "u1").await;
    assert_eq!(lots.len(), 1);
    assert_eq!(lots[0].amount, dec!(150));

    env.gateway.set_used("u1", dec!(20));

    let info = env.quota_service.get_user_quota("u1").await.unwrap();
    assert_eq!(info.total_quota, dec!(150));
    assert_eq!(info.used_quota, dec!(20));
    assert_eq!(info.quota_list.len(), 1);
    assert_eq!(info.quota_list[0].amount, dec!(130));

    // total - used equals the net-available sum
    let available: Decimal = info.quota_list.iter().map(|i| i.amount).sum();
    assert_eq!(info.total_quota - info.used_quota, available);
}

#[tokio::test]
async fn recharge_rolls_back_when_gateway_rejects() {
    let env = TestEnvBuilder::new().build().await;
    env.create_auth_user("u1", "User One", "").await;
    env.gateway.fail_delta_total(true);

    let err = env
        .quota_service
        .add_quota_for_strategy("u1", dec!(100), "s1")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Gateway(_)));

    assert!(valid_lots(&env, "u1").await.is_empty());
    let audits = quota_audits::Entity::find()
        .filter(quota_audits::Column::UserId.eq("u1"))
        .count(&env.database.connection)
        .await
        .unwrap();
    assert_eq!(audits, 0);
}

#[tokio::test]
async fn transfer_round_trip_and_double_redeem() {
    let env = TestEnvBuilder::new().build().await;
    let giver = env.create_auth_user("giver", "Giver", "").await;
    let receiver = env.create_auth_user("receiver", "Receiver", "").await;

    let expiry = days_from_now(30);
    env.create_quota_lot("giver", dec!(100), expiry).await;
    env.gateway.set_total("giver", dec!(100));

    let out = env
        .quota_service
        .transfer_out(
            &giver,
            &TransferOutRequest {
                receiver_id: "receiver".to_string(),
                quota_list: vec![TransferQuotaItem {
                    amount: dec!(50),
                    expiry_date: expiry,
                }],
            },
        )
        .await
        .unwrap();
    assert_eq!(out.related_user, "receiver");
    assert_eq!(out.operation, QuotaOperation::TransferOut);

    let giver_lots = valid_lots(&env, "giver").await;
    assert_eq!(giver_lots.len(), 1);
    assert_eq!(giver_lots[0].amount, dec!(50));
    assert_eq!(env.gateway.total("giver"), dec!(50));

    let response = env
        .quota_service
        .transfer_in(
            &receiver,
            &TransferInRequest {
                voucher_code: out.voucher_code.clone(),
            },
        )
        .await
        .unwrap();
    assert_eq!(response.status, TransferStatus::Success);
    assert_eq!(response.amount, dec!(50));
    assert_eq!(response.giver_id, "giver");
    assert_eq!(response.giver_name, "Giver");

    let receiver_lots = valid_lots(&env, "receiver").await;
    assert_eq!(receiver_lots.len(), 1);
    assert_eq!(receiver_lots[0].amount, dec!(50));
    assert_eq!(receiver_lots[0].expiry_date, expiry);
    assert_eq!(env.gateway.total("receiver"), dec!(50));

    // Exactly one redemption row for the code
    let redemptions = voucher_redemptions::Entity::find()
        .filter(voucher_redemptions::Column::VoucherCode.eq(&out.voucher_code))
        .count(&env.database.connection)
        .await
        .unwrap();
    assert_eq!(redemptions, 1);

    // Second redeem resolves to ALREADY_REDEEMED and changes nothing
    let again = env
        .quota_service
        .transfer_in(
            &receiver,
            &TransferInRequest {
                voucher_code: out.voucher_code.clone(),
            },
        )
        .await
        .unwrap();
    assert_eq!(again.status, TransferStatus::AlreadyRedeemed);
    assert_eq!(again.giver_id, "giver");
    assert_eq!(env.gateway.total("receiver"), dec!(50));
}

#[tokio::test]
async fn transfer_out_validation_failures_leave_ledger_untouched() {
    let env = TestEnvBuilder::new().build().await;
    let giver = env.create_auth_user("giver", "Giver", "").await;
    let expiry = days_from_now(30);
    env.create_quota_lot("giver", dec!(100), expiry).await;
    env.gateway.set_total("giver", dec!(100));

    let err = env
        .quota_service
        .transfer_out(
            &giver,
            &TransferOutRequest {
                receiver_id: "  ".to_string(),
                quota_list: vec![TransferQuotaItem {
                    amount: dec!(10),
                    expiry_date: expiry,
                }],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation { .. }));

    // No lot at the requested expiry date
    let err = env
        .quota_service
        .transfer_out(
            &giver,
            &TransferOutRequest {
                receiver_id: "receiver".to_string(),
                quota_list: vec![TransferQuotaItem {
                    amount: dec!(10),
                    expiry_date: days_from_now(60),
                }],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ExpiryNotFound(_)));

    // More than available
    let err = env
        .quota_service
        .transfer_out(
            &giver,
            &TransferOutRequest {
                receiver_id: "receiver".to_string(),
                quota_list: vec![TransferQuotaItem {
                    amount: dec!(150),
                    expiry_date: expiry,
                }],
            },
        )
        .await
        .unwrap_err();
    match err {
        ServiceError::InsufficientQuota { have, need, .. } => {
            assert_eq!(have, dec!(100));
            assert_eq!(need, dec!(150));
        }
        other => panic!("expected InsufficientQuota, got {other:?}"),
    }

    assert_eq!(valid_lots(&env, "giver").await[0].amount, dec!(100));
    assert_eq!(env.gateway.total("giver"), dec!(100));
}

#[tokio::test]
async fn usage_reduces_transferable_availability() {
    let env = TestEnvBuilder::new().build().await;
    let giver = env.create_auth_user("giver", "Giver", "").await;
    let expiry = days_from_now(30);
    env.create_quota_lot("giver", dec!(100), expiry).await;
    env.gateway.set_total("giver", dec!(100));
    env.gateway.set_used("giver", dec!(80));

    let err = env
        .quota_service
        .transfer_out(
            &giver,
            &TransferOutRequest {
                receiver_id: "receiver".to_string(),
                quota_list: vec![TransferQuotaItem {
                    amount: dec!(30),
                    expiry_date: expiry,
                }],
            },
        )
        .await
        .unwrap_err();
    match err {
        ServiceError::InsufficientQuota { have, need, .. } => {
            assert_eq!(have, dec!(20));
            assert_eq!(need, dec!(30));
        }
        other => panic!("expected InsufficientQuota, got {other:?}"),
    }
}

#[tokio::test]
async fn expired_voucher_item_yields_partial_success() {
    let env = TestEnvBuilder::new().build().await;
    let receiver = env.create_auth_user("receiver", "Receiver", "").await;

    let past = days_from_now(-1);
    let future = days_from_now(30);
    let code = env
        .voucher
        .generate(&VoucherData {
            giver_id: "giver".to_string(),
            giver_name: "Giver".to_string(),
            giver_phone: "13800138000".to_string(),
            giver_github: "giver".to_string(),
            giver_github_star: String::new(),
            receiver_id: "receiver".to_string(),
            quota_list: vec![
                VoucherQuotaItem {
                    amount: dec!(100),
                    expiry_date: past,
                },
                VoucherQuotaItem {
                    amount: dec!(100),
                    expiry_date: future,
                },
            ],
        })
        .unwrap();

    let response = env
        .quota_service
        .transfer_in(
            &receiver,
            &TransferInRequest {
                voucher_code: code.clone(),
            },
        )
        .await
        .unwrap();

    assert_eq!(response.status, TransferStatus::PartialSuccess);
    assert_eq!(response.amount, dec!(100));
    assert!(response.message.contains("1 of 2"));
    assert!(response.message.contains("1 expired"));

    assert!(response.quota_list[0].is_expired);
    assert!(!response.quota_list[0].success);
    assert!(response.quota_list[1].success);

    assert_eq!(env.gateway.total("receiver"), dec!(100));

    let audits = quota_audits::Entity::find()
        .filter(quota_audits::Column::UserId.eq("receiver"))
        .all(&env.database.connection)
        .await
        .unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].amount, dec!(100));
    assert_eq!(audits[0].expiry_date, future);
    let details = audits[0].decode_details().unwrap();
    assert_eq!(details.summary.expired_items, 1);
    assert_eq!(details.summary.successful_items, 1);
}

#[tokio::test]
async fn transfer_in_rejects_foreign_and_invalid_vouchers() {
    let env = TestEnvBuilder::new().build().await;
    let receiver = env.create_auth_user("receiver", "Receiver", "").await;

    let response = env
        .quota_service
        .transfer_in(
            &receiver,
            &TransferInRequest {
                voucher_code: "definitely-not-a-voucher".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(response.status, TransferStatus::Failed);
    assert_eq!(response.message, "Invalid voucher code");

    let code = env
        .voucher
        .generate(&VoucherData {
            giver_id: "giver".to_string(),
            giver_name: "Giver".to_string(),
            giver_phone: String::new(),
            giver_github: String::new(),
            giver_github_star: String::new(),
            receiver_id: "someone-else".to_string(),
            quota_list: vec![VoucherQuotaItem {
                amount: dec!(10),
                expiry_date: days_from_now(30),
            }],
        })
        .unwrap();

    let response = env
        .quota_service
        .transfer_in(&receiver, &TransferInRequest { voucher_code: code })
        .await
        .unwrap();
    assert_eq!(response.status, TransferStatus::Failed);
    assert_eq!(response.message, "Voucher is not for this user");
}

#[tokio::test]
async fn transfer_in_rolls_back_on_gateway_failure() {
    let env = TestEnvBuilder::new().build().await;
    let receiver = env.create_auth_user("receiver", "Receiver", "").await;

    let code = env
        .voucher
        .generate(&VoucherData {
            giver_id: "giver".to_string(),
            giver_name: "Giver".to_string(),
            giver_phone: String::new(),
            giver_github: String::new(),
            giver_github_star: String::new(),
            receiver_id: "receiver".to_string(),
            quota_list: vec![VoucherQuotaItem {
                amount: dec!(40),
                expiry_date: days_from_now(30),
            }],
        })
        .unwrap();

    env.gateway.fail_delta_total(true);

    let response = env
        .quota_service
        .transfer_in(
            &receiver,
            &TransferInRequest {
                voucher_code: code.clone(),
            },
        )
        .await
        .unwrap();
    assert_eq!(response.status, TransferStatus::Failed);

    // The whole transfer rolled back, including the redemption row
    assert!(valid_lots(&env, "receiver").await.is_empty());
    let redemptions = voucher_redemptions::Entity::find()
        .filter(voucher_redemptions::Column::VoucherCode.eq(&code))
        .count(&env.database.connection)
        .await
        .unwrap();
    assert_eq!(redemptions, 0);

    // The voucher stays redeemable once the gateway recovers
    env.gateway.fail_delta_total(false);
    let response = env
        .quota_service
        .transfer_in(&receiver, &TransferInRequest { voucher_code: code })
        .await
        .unwrap();
    assert_eq!(response.status, TransferStatus::Success);
    assert_eq!(env.gateway.total("receiver"), dec!(40));
}

#[tokio::test]
async fn transfer_in_propagates_giver_starred_projects() {
    let env = TestEnvBuilder::new().build().await;
    let receiver = env.create_auth_user("receiver", "Receiver", "").await;

    let code = env
        .voucher
        .generate(&VoucherData {
            giver_id: "giver".to_string(),
            giver_name: "Giver".to_string(),
            giver_phone: String::new(),
            giver_github: String::new(),
            giver_github_star: "org/repo,other/x".to_string(),
            receiver_id: "receiver".to_string(),
            quota_list: vec![VoucherQuotaItem {
                amount: dec!(10),
                expiry_date: days_from_now(30),
            }],
        })
        .unwrap();

    // Propagation is best effort: a failing gateway call must not change the
    // transfer outcome
    env.gateway.fail_set_starred(true);
    let response = env
        .quota_service
        .transfer_in(&receiver, &TransferInRequest { voucher_code: code })
        .await
        .unwrap();
    assert_eq!(response.status, TransferStatus::Success);
    assert_eq!(env.gateway.starred_projects("receiver"), None);

    env.gateway.fail_set_starred(false);
    let code = env
        .voucher
        .generate(&VoucherData {
            giver_id: "giver".to_string(),
            giver_name: "Giver".to_string(),
            giver_phone: String::new(),
            giver_github: String::new(),
            giver_github_star: "org/repo".to_string(),
            receiver_id: "receiver".to_string(),
            quota_list: vec![VoucherQuotaItem {
                amount: dec!(10),
                expiry_date: days_from_now(30),
            }],
        })
        .unwrap();
    let response = env
        .quota_service
        .transfer_in(&receiver, &TransferInRequest { voucher_code: code })
        .await
        .unwrap();
    assert_eq!(response.status, TransferStatus::Success);
    assert_eq!(
        env.gateway.starred_projects("receiver").as_deref(),
        Some("org/repo")
    );
}

#[tokio::test]
async fn star_policy_gates_transfer_out() {
    let env = TestEnvBuilder::new()
        .with_star_check(true, "org/repo")
        .build()
        .await;

    let starred = env
        .create_auth_user("starred", "Starred", "other/x,org/repo")
        .await;
    let unstarred = env.create_auth_user("unstarred", "Unstarred", "other/x").await;

    let expiry = days_from_now(30);
    env.create_quota_lot("starred", dec!(100), expiry).await;
    env.create_quota_lot("unstarred", dec!(100), expiry).await;
    env.gateway.set_total("starred", dec!(100));
    env.gateway.set_total("unstarred", dec!(100));

    let request = TransferOutRequest {
        receiver_id: "receiver".to_string(),
        quota_list: vec![TransferQuotaItem {
            amount: dec!(50),
            expiry_date: expiry,
        }],
    };

    env.quota_service
        .transfer_out(&starred, &request)
        .await
        .unwrap();

    let err = env
        .quota_service
        .transfer_out(&unstarred, &request)
        .await
        .unwrap_err();
    match err {
        ServiceError::StarRequired(repo) => assert_eq!(repo, "org/repo"),
        other => panic!("expected StarRequired, got {other:?}"),
    }

    // No ledger or gateway mutation for the rejected giver
    assert_eq!(valid_lots(&env, "unstarred").await[0].amount, dec!(100));
    assert_eq!(env.gateway.total("unstarred"), dec!(100));
    let audits = quota_audits::Entity::find()
        .filter(quota_audits::Column::UserId.eq("unstarred"))
        .count(&env.database.connection)
        .await
        .unwrap();
    assert_eq!(audits, 0);

    // Policy is runtime-swappable: disabling it lets the transfer through
    env.quota_service.set_star_check_policy(
        quota_manager::config::GithubStarCheckConfig {
            enabled: false,
            required_repo: String::new(),
        },
    );
    env.quota_service
        .transfer_out(&unstarred, &request)
        .await
        .unwrap();
}

#[tokio::test]
async fn expiry_sweep_realigns_gateway_counters() {
    let env = TestEnvBuilder::new().build().await;
    env.create_auth_user("u1", "User One", "").await;

    let past = days_from_now(-2);
    let future = days_from_now(30);
    env.create_quota_lot("u1", dec!(40), past).await;
    env.create_quota_lot("u1", dec!(60), future).await;
    env.gateway.set_total("u1", dec!(100));
    env.gateway.set_used("u1", dec!(30));

    let expired = env.quota_service.expire_quotas().await.unwrap();
    assert_eq!(expired, 1);

    let lots = quotas::Entity::find()
        .filter(quotas::Column::UserId.eq("u1"))
        .all(&env.database.connection)
        .await
        .unwrap();
    assert_eq!(lots.len(), 2);
    for lot in &lots {
        if lot.expiry_date == past {
            assert_eq!(lot.status, QuotaStatus::Expired);
            assert_eq!(lot.amount, dec!(40));
        } else {
            assert_eq!(lot.status, QuotaStatus::Valid);
            assert_eq!(lot.amount, dec!(60));
        }
    }

    assert_eq!(env.gateway.total("u1"), dec!(60));
    assert_eq!(env.gateway.used("u1"), Decimal::ZERO);

    // Idempotent when nothing is left to expire
    assert_eq!(env.quota_service.expire_quotas().await.unwrap(), 0);
}

#[tokio::test]
async fn merge_collapses_duplicates_and_preserves_sums() {
    let env = TestEnvBuilder::new().build().await;
    env.create_auth_user("u1", "User One", "").await;

    let e1 = days_from_now(30);
    let e2 = days_from_now(60);
    env.create_quota_lot("u1", dec!(30), e1).await;
    env.create_quota_lot("u1", dec!(20), e1).await;
    env.create_quota_lot("u1", dec!(10), e2).await;

    let merged = env.quota_service.merge_quota_records().await.unwrap();
    assert_eq!(merged, 1);

    let lots = valid_lots(&env, "u1").await;
    assert_eq!(lots.len(), 2);
    let at_e1: Vec<_> = lots.iter().filter(|l| l.expiry_date == e1).collect();
    assert_eq!(at_e1.len(), 1);
    assert_eq!(at_e1[0].amount, dec!(50));

    let total: Decimal = lots.iter().map(|l| l.amount).sum();
    assert_eq!(total, dec!(60));

    // Running again is a no-op
    assert_eq!(env.quota_service.merge_quota_records().await.unwrap(), 0);
}

#[tokio::test]
async fn audit_records_page_newest_first() {
    let env = TestEnvBuilder::new().build().await;
    env.create_auth_user("u1", "User One", "").await;

    for amount in [dec!(10), dec!(20), dec!(30)] {
        env.quota_service
            .add_quota_for_strategy("u1", amount, "s1")
            .await
            .unwrap();
    }

    let (page, total) = env
        .quota_service
        .get_quota_audit_records("u1", 1, 2)
        .await
        .unwrap();
    assert_eq!(total, 3);
    assert_eq!(page.len(), 2);
    // Same create_time second: the id tiebreak keeps newest first
    assert_eq!(page[0].amount, dec!(30));
    assert_eq!(page[1].amount, dec!(20));
    assert_eq!(page[0].operation, QuotaOperation::Recharge);
    assert_eq!(page[0].strategy_name.as_deref(), Some("s1"));
    assert!(page[0].details.is_some());

    let (page, _) = env
        .quota_service
        .get_quota_audit_records("u1", 2, 2)
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].amount, dec!(10));
}

#[tokio::test]
async fn withdrawal_drains_duplicate_lots_as_one_pool() {
    let env = TestEnvBuilder::new().build().await;
    let giver = env.create_auth_user("giver", "Giver", "").await;

    let expiry = days_from_now(30);
    env.create_quota_lot("giver", dec!(30), expiry).await;
    env.create_quota_lot("giver", dec!(20), expiry).await;
    env.gateway.set_total("giver", dec!(50));

    env.quota_service
        .transfer_out(
            &giver,
            &TransferOutRequest {
                receiver_id: "receiver".to_string(),
                quota_list: vec![TransferQuotaItem {
                    amount: dec!(40),
                    expiry_date: expiry,
                }],
            },
        )
        .await
        .unwrap();

    // First lot fully drained and deleted, second reduced to the remainder
    let lots = valid_lots(&env, "giver").await;
    assert_eq!(lots.len(), 1);
    assert_eq!(lots[0].amount, dec!(10));
    assert_eq!(env.gateway.total("giver"), dec!(10));
}
