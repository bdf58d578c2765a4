//! FIFO-by-expiry usage attribution.
//!
//! The gateway stores only an aggregate `used` counter, so the engine decides
//! which lots that usage consumed: earliest-expiring lots first. This keeps
//! forfeiture of soon-to-expire credit minimal.

use super::types::QuotaDetailItem;
use crate::database::entities::quotas;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Net-available view of the given lots after deducting `used` from the
/// earliest-expiring lots. Fully consumed lots are omitted. Lots must be
/// ordered by expiry date ascending.
pub fn net_available(lots: &[quotas::Model], used: Decimal) -> Vec<QuotaDetailItem> {
    let mut remaining_used = used;
    let mut items = Vec::new();

    for lot in lots {
        if remaining_used <= Decimal::ZERO {
            items.push(QuotaDetailItem {
                amount: lot.amount,
                expiry_date: lot.expiry_date,
            });
        } else if lot.amount > remaining_used {
            items.push(QuotaDetailItem {
                amount: lot.amount - remaining_used,
                expiry_date: lot.expiry_date,
            });
            remaining_used = Decimal::ZERO;
        } else {
            remaining_used -= lot.amount;
        }
    }

    items
}

/// Available amount per expiry date after FIFO deduction. Duplicate lots on
/// the same expiry accumulate.
pub fn availability_by_expiry(
    lots: &[quotas::Model],
    used: Decimal,
) -> HashMap<DateTime<Utc>, Decimal> {
    let mut map: HashMap<DateTime<Utc>, Decimal> = HashMap::new();
    let mut remaining_used = used;

    for lot in lots {
        let available = if remaining_used <= Decimal::ZERO {
            lot.amount
        } else if lot.amount > remaining_used {
            let available = lot.amount - remaining_used;
            remaining_used = Decimal::ZERO;
            available
        } else {
            remaining_used -= lot.amount;
            Decimal::ZERO
        };

        *map.entry(lot.expiry_date).or_insert(Decimal::ZERO) += available;
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entities::QuotaStatus;
    use chrono::{Duration, SubsecRound};

    fn lot(amount: i64, expiry: DateTime<Utc>) -> quotas::Model {
        quotas::Model {
            id: 0,
            user_id: "u".to_string(),
            amount: Decimal::from(amount),
            expiry_date: expiry,
            status: QuotaStatus::Valid,
            create_time: Utc::now(),
            update_time: Utc::now(),
        }
    }

    #[test]
    fn usage_consumes_earliest_lot_first() {
        let e1 = Utc::now().trunc_subsecs(0) + Duration::days(10);
        let e2 = e1 + Duration::days(20);
        let lots = vec![lot(100, e1), lot(50, e2)];

        let items = net_available(&lots, Decimal::from(20));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].amount, Decimal::from(80));
        assert_eq!(items[0].expiry_date, e1);
        assert_eq!(items[1].amount, Decimal::from(50));
    }

    #[test]
    fn fully_consumed_lots_are_omitted() {
        let e1 = Utc::now().trunc_subsecs(0) + Duration::days(10);
        let e2 = e1 + Duration::days(20);
        let lots = vec![lot(30, e1), lot(50, e2)];

        let items = net_available(&lots, Decimal::from(40));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].amount, Decimal::from(40));
        assert_eq!(items[0].expiry_date, e2);
    }

    #[test]
    fn no_usage_returns_lots_unchanged() {
        let e1 = Utc::now().trunc_subsecs(0) + Duration::days(10);
        let items = net_available(&[lot(70, e1)], Decimal::ZERO);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].amount, Decimal::from(70));
    }

    #[test]
    fn duplicate_expiry_lots_accumulate_in_map() {
        let e1 = Utc::now().trunc_subsecs(0) + Duration::days(10);
        let lots = vec![lot(100, e1), lot(50, e1)];

        let map = availability_by_expiry(&lots, Decimal::from(20));
        assert_eq!(map.get(&e1).copied(), Some(Decimal::from(130)));
    }

    #[test]
    fn usage_exceeding_all_lots_leaves_nothing() {
        let e1 = Utc::now().trunc_subsecs(0) + Duration::days(10);
        let map = availability_by_expiry(&[lot(100, e1)], Decimal::from(150));
        assert_eq!(map.get(&e1).copied(), Some(Decimal::ZERO));
        assert!(net_available(&[lot(100, e1)], Decimal::from(150)).is_empty());
    }
}
