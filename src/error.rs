use crate::database::DatabaseError;
use crate::gateway::GatewayError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

/// Error taxonomy of the quota engine and the permission services.
///
/// Handlers map these kinds to wire codes; the engine itself never maps.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("user not found: '{0}' does not exist")]
    UserNotFound(String),

    #[error("department not found: no employee belongs to department '{0}'")]
    DepartmentNotFound(String),

    #[error("validation failed for '{field}': {reason}")]
    Validation { field: String, reason: String },

    #[error("user must star the repository '{0}' before transferring quota")]
    StarRequired(String),

    #[error("insufficient quota for expiry date {expiry_date}: have {have}, need {need}")]
    InsufficientQuota {
        expiry_date: DateTime<Utc>,
        have: Decimal,
        need: Decimal,
    },

    #[error("no quota found for expiry date {0}")]
    ExpiryNotFound(DateTime<Utc>),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("storage error during {op}: {source}")]
    Storage {
        op: String,
        #[source]
        source: sea_orm::DbErr,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("voucher error: {0}")]
    Voucher(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        ServiceError::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn storage(op: &str, source: sea_orm::DbErr) -> Self {
        ServiceError::Storage {
            op: op.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = ServiceError::UserNotFound("u-123".to_string());
        assert!(err.to_string().contains("u-123"));

        let err = ServiceError::validation("receiver_id", "cannot be empty");
        assert_eq!(
            err.to_string(),
            "validation failed for 'receiver_id': cannot be empty"
        );

        let err = ServiceError::StarRequired("org/repo".to_string());
        assert!(err.to_string().contains("org/repo"));
    }

    #[test]
    fn insufficient_quota_reports_amounts() {
        let err = ServiceError::InsufficientQuota {
            expiry_date: Utc::now(),
            have: Decimal::from(10),
            need: Decimal::from(30),
        };
        let msg = err.to_string();
        assert!(msg.contains("have 10"));
        assert!(msg.contains("need 30"));
    }
}
