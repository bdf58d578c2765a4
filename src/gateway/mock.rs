use super::{AiGatewayClient, GatewayError};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// In-memory gateway for tests.
///
/// Counters behave like the real admin API: deltas accumulate, reads return
/// zero for unknown users. Failure injection flips individual operations into
/// rejections so transactional rollback paths can be exercised.
#[derive(Default)]
pub struct MockAiGateway {
    totals: Mutex<HashMap<String, Decimal>>,
    used: Mutex<HashMap<String, Decimal>>,
    starred: Mutex<HashMap<String, String>>,
    quota_check: Mutex<HashMap<String, bool>>,
    star_check: Mutex<HashMap<String, bool>>,
    fail_delta_total: AtomicBool,
    fail_delta_used: AtomicBool,
    fail_set_starred: AtomicBool,
    fail_set_permission: AtomicBool,
}

impl MockAiGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_total(&self, user_id: &str, value: Decimal) {
        self.totals
            .lock()
            .unwrap()
            .insert(user_id.to_string(), value);
    }

    pub fn set_used(&self, user_id: &str, value: Decimal) {
        self.used.lock().unwrap().insert(user_id.to_string(), value);
    }

    pub fn total(&self, user_id: &str) -> Decimal {
        self.totals
            .lock()
            .unwrap()
            .get(user_id)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn used(&self, user_id: &str) -> Decimal {
        self.used
            .lock()
            .unwrap()
            .get(user_id)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn starred_projects(&self, user_id: &str) -> Option<String> {
        self.starred.lock().unwrap().get(user_id).cloned()
    }

    pub fn quota_check_permission(&self, user_id: &str) -> Option<bool> {
        self.quota_check.lock().unwrap().get(user_id).copied()
    }

    pub fn star_check_permission(&self, user_id: &str) -> Option<bool> {
        self.star_check.lock().unwrap().get(user_id).copied()
    }

    pub fn fail_delta_total(&self, fail: bool) {
        self.fail_delta_total.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delta_used(&self, fail: bool) {
        self.fail_delta_used.store(fail, Ordering::SeqCst);
    }

    pub fn fail_set_starred(&self, fail: bool) {
        self.fail_set_starred.store(fail, Ordering::SeqCst);
    }

    pub fn fail_set_permission(&self, fail: bool) {
        self.fail_set_permission.store(fail, Ordering::SeqCst);
    }

    fn rejected(op: &str) -> GatewayError {
        GatewayError::Rejected {
            code: "ai-gateway.mock_failure".to_string(),
            message: format!("injected failure for {op}"),
        }
    }
}

#[async_trait]
impl AiGatewayClient for MockAiGateway {
    async fn get_total_quota(&self, user_id: &str) -> Result<Decimal, GatewayError> {
        Ok(self.total(user_id))
    }

    async fn get_used_quota(&self, user_id: &str) -> Result<Decimal, GatewayError> {
        Ok(self.used(user_id))
    }

    async fn delta_total_quota(&self, user_id: &str, delta: Decimal) -> Result<(), GatewayError> {
        if self.fail_delta_total.load(Ordering::SeqCst) {
            return Err(Self::rejected("delta_total_quota"));
        }
        let mut totals = self.totals.lock().unwrap();
        let entry = totals.entry(user_id.to_string()).or_insert(Decimal::ZERO);
        *entry += delta;
        Ok(())
    }

    async fn delta_used_quota(&self, user_id: &str, delta: Decimal) -> Result<(), GatewayError> {
        if self.fail_delta_used.load(Ordering::SeqCst) {
            return Err(Self::rejected("delta_used_quota"));
        }
        let mut used = self.used.lock().unwrap();
        let entry = used.entry(user_id.to_string()).or_insert(Decimal::ZERO);
        *entry += delta;
        Ok(())
    }

    async fn set_quota_check_permission(
        &self,
        user_id: &str,
        enabled: bool,
    ) -> Result<(), GatewayError> {
        if self.fail_set_permission.load(Ordering::SeqCst) {
            return Err(Self::rejected("set_quota_check_permission"));
        }
        self.quota_check
            .lock()
            .unwrap()
            .insert(user_id.to_string(), enabled);
        Ok(())
    }

    async fn set_star_check_permission(
        &self,
        user_id: &str,
        enabled: bool,
    ) -> Result<(), GatewayError> {
        if self.fail_set_permission.load(Ordering::SeqCst) {
            return Err(Self::rejected("set_star_check_permission"));
        }
        self.star_check
            .lock()
            .unwrap()
            .insert(user_id.to_string(), enabled);
        Ok(())
    }

    async fn set_starred_projects(
        &self,
        user_id: &str,
        projects: &str,
    ) -> Result<(), GatewayError> {
        if self.fail_set_starred.load(Ordering::SeqCst) {
            return Err(Self::rejected("set_starred_projects"));
        }
        self.starred
            .lock()
            .unwrap()
            .insert(user_id.to_string(), projects.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deltas_accumulate() {
        let gateway = MockAiGateway::new();
        gateway.set_total("u1", Decimal::from(100));

        gateway
            .delta_total_quota("u1", Decimal::from(-30))
            .await
            .unwrap();
        assert_eq!(gateway.total("u1"), Decimal::from(70));

        gateway.delta_used_quota("u1", Decimal::from(10)).await.unwrap();
        assert_eq!(gateway.used("u1"), Decimal::from(10));
    }

    #[tokio::test]
    async fn injected_failure_is_rejected() {
        let gateway = MockAiGateway::new();
        gateway.fail_delta_total(true);

        let err = gateway
            .delta_total_quota("u1", Decimal::ONE)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Rejected { .. }));
        assert_eq!(gateway.total("u1"), Decimal::ZERO);
    }
}
