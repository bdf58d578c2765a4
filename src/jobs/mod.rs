//! Periodic ledger sweeps.
//!
//! The engine needs exactly two background passes: expiring overdue lots and
//! merging duplicate lots. Both are idempotent, so they run on plain
//! intervals; there is no general cron surface here.

use crate::error::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod expire;
pub mod merge;
pub mod scheduler;

pub use expire::ExpireSweep;
pub use merge::MergeSweep;
pub use scheduler::SweepScheduler;

/// Configuration for the periodic sweeps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Enable/disable the in-process sweeps
    pub enabled: bool,

    /// Quota expiry sweep
    pub expire_quotas: SweepConfig,

    /// Duplicate-lot merge sweep
    pub merge_quotas: SweepConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Seconds between runs
    pub interval_secs: u64,
}

impl SweepConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            expire_quotas: SweepConfig {
                interval_secs: 3600, // hourly
            },
            merge_quotas: SweepConfig {
                interval_secs: 24 * 3600, // daily
            },
        }
    }
}

/// A periodic ledger pass. Returns the number of items it touched.
#[async_trait]
pub trait Sweep: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> Result<u64, ServiceError>;
}
