//! Concurrency tests: mixed parallel operations on one user, and duplicate
//! voucher redemption racing.

use chrono::{Duration, SubsecRound, Utc};
use quota_manager::database::entities::{
    quotas, voucher_redemptions, QuotaOperation, QuotaStatus,
};
use quota_manager::quota::{TransferInRequest, TransferOutRequest, TransferQuotaItem, TransferStatus};
use quota_manager::test_utils::TestEnvBuilder;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

#[tokio::test]
async fn concurrent_mixed_operations_stay_consistent() {
    let env = TestEnvBuilder::new().build().await;
    let user = env.create_auth_user("u1", "User One", "").await;
    env.create_auth_user("u2", "User Two", "").await;

    // Initial recharge: total 500, one audit record
    env.quota_service
        .add_quota_for_strategy("u1", dec!(500), "init")
        .await
        .unwrap();

    // All strategy lots this month share one expiry; transfers target it
    let lot = quotas::Entity::find()
        .filter(quotas::Column::UserId.eq("u1"))
        .filter(quotas::Column::Status.eq(QuotaStatus::Valid))
        .one(&env.database.connection)
        .await
        .unwrap()
        .unwrap();
    let expiry = lot.expiry_date;

    let mut handles = Vec::new();

    for _ in 0..5 {
        let service = env.quota_service.clone();
        handles.push(tokio::spawn(async move {
            service.delta_used_quota("u1", dec!(10)).await.map(|_| ())
        }));
    }

    for _ in 0..3 {
        let service = env.quota_service.clone();
        let giver = user.clone();
        handles.push(tokio::spawn(async move {
            service
                .transfer_out(
                    &giver,
                    &TransferOutRequest {
                        receiver_id: "u2".to_string(),
                        quota_list: vec![TransferQuotaItem {
                            amount: dec!(30),
                            expiry_date: expiry,
                        }],
                    },
                )
                .await
                .map(|_| ())
        }));
    }

    for i in 0..2 {
        let service = env.quota_service.clone();
        handles.push(tokio::spawn(async move {
            service
                .add_quota_for_strategy("u1", dec!(25), &format!("c-{i}"))
                .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // total = 500 + 2*25 - 3*30 = 460, used = 5*10 = 50
    let info = env.quota_service.get_user_quota("u1").await.unwrap();
    assert_eq!(info.total_quota, dec!(460));
    assert_eq!(info.used_quota, dec!(50));
    let available: Decimal = info.quota_list.iter().map(|i| i.amount).sum();
    assert_eq!(available, dec!(410));

    // 6 audit records: 3 recharges (initial + 2) and 3 transfer-outs
    let (records, total) = env
        .quota_service
        .get_quota_audit_records("u1", 1, 100)
        .await
        .unwrap();
    assert_eq!(total, 6);
    let recharges = records
        .iter()
        .filter(|r| r.operation == QuotaOperation::Recharge)
        .count();
    let transfer_outs = records
        .iter()
        .filter(|r| r.operation == QuotaOperation::TransferOut)
        .count();
    assert_eq!(recharges, 3);
    assert_eq!(transfer_outs, 3);
}

#[tokio::test]
async fn concurrent_redeems_have_exactly_one_winner() {
    let env = TestEnvBuilder::new().build().await;
    let receiver = env.create_auth_user("receiver", "Receiver", "").await;

    let expiry = (Utc::now() + Duration::days(30)).trunc_subsecs(0);
    let code = env
        .voucher
        .generate(&quota_manager::voucher::VoucherData {
            giver_id: "giver".to_string(),
            giver_name: "Giver".to_string(),
            giver_phone: String::new(),
            giver_github: String::new(),
            giver_github_star: String::new(),
            receiver_id: "receiver".to_string(),
            quota_list: vec![quota_manager::voucher::VoucherQuotaItem {
                amount: dec!(50),
                expiry_date: expiry,
            }],
        })
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let service = env.quota_service.clone();
        let receiver = receiver.clone();
        let code = code.clone();
        handles.push(tokio::spawn(async move {
            service
                .transfer_in(&receiver, &TransferInRequest { voucher_code: code })
                .await
                .unwrap()
        }));
    }

    let mut successes = 0;
    let mut already_redeemed = 0;
    for handle in handles {
        match handle.await.unwrap().status {
            TransferStatus::Success => successes += 1,
            TransferStatus::AlreadyRedeemed => already_redeemed += 1,
            other => panic!("unexpected status {other:?}"),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(already_redeemed, 3);

    // The quota landed exactly once
    let lots = quotas::Entity::find()
        .filter(quotas::Column::UserId.eq("receiver"))
        .all(&env.database.connection)
        .await
        .unwrap();
    assert_eq!(lots.len(), 1);
    assert_eq!(lots[0].amount, dec!(50));
    assert_eq!(env.gateway.total("receiver"), dec!(50));

    let redemptions = voucher_redemptions::Entity::find()
        .filter(voucher_redemptions::Column::VoucherCode.eq(&code))
        .count(&env.database.connection)
        .await
        .unwrap();
    assert_eq!(redemptions, 1);
}

#[tokio::test]
async fn overlapping_transfers_cannot_overdraw_a_lot() {
    let env = TestEnvBuilder::new().build().await;
    let giver = env.create_auth_user("giver", "Giver", "").await;
    env.create_auth_user("r1", "Receiver One", "").await;
    env.create_auth_user("r2", "Receiver Two", "").await;

    let expiry = (Utc::now() + Duration::days(30)).trunc_subsecs(0);
    env.create_quota_lot("giver", dec!(100), expiry).await;
    env.gateway.set_total("giver", dec!(100));

    let mut handles = Vec::new();
    for receiver in ["r1", "r2"] {
        let service = env.quota_service.clone();
        let giver = giver.clone();
        handles.push(tokio::spawn(async move {
            service
                .transfer_out(
                    &giver,
                    &TransferOutRequest {
                        receiver_id: receiver.to_string(),
                        quota_list: vec![TransferQuotaItem {
                            amount: dec!(70),
                            expiry_date: expiry,
                        }],
                    },
                )
                .await
        }));
    }

    let mut ok = 0;
    let mut insufficient = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(quota_manager::error::ServiceError::InsufficientQuota { .. }) => insufficient += 1,
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }

    // At most one 70-unit withdrawal fits into a 100-unit lot
    assert_eq!(ok, 1);
    assert_eq!(insufficient, 1);

    let lots = quotas::Entity::find()
        .filter(quotas::Column::UserId.eq("giver"))
        .filter(quotas::Column::Status.eq(QuotaStatus::Valid))
        .all(&env.database.connection)
        .await
        .unwrap();
    assert_eq!(lots.len(), 1);
    assert_eq!(lots[0].amount, dec!(30));
    assert_eq!(env.gateway.total("giver"), dec!(30));
}
