use super::Sweep;
use crate::error::ServiceError;
use crate::quota::QuotaService;
use async_trait::async_trait;
use std::sync::Arc;

/// Collapses duplicate lots per (user, expiry, status).
pub struct MergeSweep {
    service: Arc<QuotaService>,
}

impl MergeSweep {
    pub fn new(service: Arc<QuotaService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Sweep for MergeSweep {
    fn name(&self) -> &str {
        "merge_quotas"
    }

    async fn run(&self) -> Result<u64, ServiceError> {
        self.service.merge_quota_records().await
    }
}
