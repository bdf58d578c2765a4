use super::Sweep;
use crate::error::ServiceError;
use crate::quota::QuotaService;
use async_trait::async_trait;
use std::sync::Arc;

/// Expires overdue lots and realigns the gateway counters.
pub struct ExpireSweep {
    service: Arc<QuotaService>,
}

impl ExpireSweep {
    pub fn new(service: Arc<QuotaService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Sweep for ExpireSweep {
    fn name(&self) -> &str {
        "expire_quotas"
    }

    async fn run(&self) -> Result<u64, ServiceError> {
        self.service.expire_quotas().await
    }
}
