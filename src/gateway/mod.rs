//! Client for the external AI routing gateway.
//!
//! The gateway owns the aggregate `total`/`used` counters per user; the quota
//! engine keeps its lot ledger reconciled with them but never meters usage
//! itself.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

pub mod client;
pub mod mock;

pub use client::HttpAiGatewayClient;
pub use mock::MockAiGateway;

#[derive(Error, Debug)]
pub enum GatewayError {
    /// The gateway answered with `success = false`; code and message are
    /// surfaced verbatim.
    #[error("gateway error: {code} - {message}")]
    Rejected { code: String, message: String },

    /// Transport failure, including the bounded request timeout.
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway response could not be decoded: {0}")]
    Decode(String),
}

/// Narrow adapter over the gateway admin endpoints.
///
/// Every call is bounded by the configured timeout and surfaces a typed
/// [`GatewayError`].
#[async_trait]
pub trait AiGatewayClient: Send + Sync {
    /// Read the aggregate total quota counter.
    async fn get_total_quota(&self, user_id: &str) -> Result<Decimal, GatewayError>;

    /// Read the aggregate used quota counter.
    async fn get_used_quota(&self, user_id: &str) -> Result<Decimal, GatewayError>;

    /// Adjust the total counter by a signed delta.
    async fn delta_total_quota(&self, user_id: &str, delta: Decimal) -> Result<(), GatewayError>;

    /// Adjust the used counter by a signed delta.
    async fn delta_used_quota(&self, user_id: &str, delta: Decimal) -> Result<(), GatewayError>;

    async fn set_quota_check_permission(
        &self,
        user_id: &str,
        enabled: bool,
    ) -> Result<(), GatewayError>;

    async fn set_star_check_permission(
        &self,
        user_id: &str,
        enabled: bool,
    ) -> Result<(), GatewayError>;

    /// Replace the user's starred-projects list (comma separated).
    async fn set_starred_projects(&self, user_id: &str, projects: &str)
        -> Result<(), GatewayError>;
}
