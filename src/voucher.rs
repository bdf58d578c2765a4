//! Voucher envelope codec.
//!
//! A voucher is a stateless, signed promise from a giver to one specific
//! receiver. The envelope is an HS256-signed token; redemption bookkeeping
//! (at-most-once semantics) lives in the database, not here.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Wire bounds for an encoded voucher.
const MIN_VOUCHER_LEN: usize = 10;
const MAX_VOUCHER_LEN: usize = 2000;

#[derive(Error, Debug)]
pub enum VoucherError {
    #[error("voucher code length must be between {MIN_VOUCHER_LEN} and {MAX_VOUCHER_LEN}")]
    InvalidLength,
    #[error("voucher signature or payload invalid: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherQuotaItem {
    pub amount: Decimal,
    pub expiry_date: DateTime<Utc>,
}

/// Payload carried by a voucher envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherData {
    pub giver_id: String,
    pub giver_name: String,
    pub giver_phone: String,
    pub giver_github: String,
    /// Comma-separated starred projects propagated to the receiver.
    pub giver_github_star: String,
    pub receiver_id: String,
    pub quota_list: Vec<VoucherQuotaItem>,
}

#[derive(Debug, Serialize, Deserialize)]
struct VoucherClaims {
    #[serde(flatten)]
    data: VoucherData,
    /// Unique envelope id; makes every issued code globally distinct.
    jti: String,
    iat: i64,
}

pub struct VoucherService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl VoucherService {
    pub fn new(signing_key: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(signing_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(signing_key.as_bytes()),
        }
    }

    /// Encode and sign a voucher envelope.
    pub fn generate(&self, data: &VoucherData) -> Result<String, VoucherError> {
        let claims = VoucherClaims {
            data: data.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: Utc::now().timestamp(),
        };
        let code = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(code)
    }

    /// Verify the signature and decode the payload.
    ///
    /// Item expiry is deliberately not checked here; vouchers carry expiring
    /// items, the envelope itself does not expire.
    pub fn decode(&self, code: &str) -> Result<VoucherData, VoucherError> {
        if code.len() < MIN_VOUCHER_LEN || code.len() > MAX_VOUCHER_LEN {
            return Err(VoucherError::InvalidLength);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let token = jsonwebtoken::decode::<VoucherClaims>(code, &self.decoding_key, &validation)?;
        Ok(token.claims.data)
    }
}
