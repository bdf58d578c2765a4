use super::{AiGatewayClient, GatewayError};
use crate::config::AiGatewayConfig;
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

/// Response envelope shared by all gateway admin endpoints.
#[derive(Debug, Deserialize)]
struct GatewayEnvelope {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    success: bool,
    #[serde(default)]
    data: Option<QuotaData>,
}

#[derive(Debug, Deserialize)]
struct QuotaData {
    #[allow(dead_code)]
    #[serde(default)]
    user_id: String,
    quota: Decimal,
}

/// HTTP implementation of [`AiGatewayClient`] against the gateway admin API.
pub struct HttpAiGatewayClient {
    config: AiGatewayConfig,
    http: Client,
}

impl HttpAiGatewayClient {
    pub fn new(config: AiGatewayConfig) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, http })
    }

    fn admin_url(&self, suffix: &str) -> String {
        format!(
            "{}{}{}",
            self.config.base_url, self.config.admin_path, suffix
        )
    }

    fn with_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if !self.config.auth_header.is_empty() && !self.config.auth_value.is_empty() {
            req.header(&self.config.auth_header, &self.config.auth_value)
        } else {
            req
        }
    }

    async fn get_counter(&self, suffix: &str, user_id: &str) -> Result<Decimal, GatewayError> {
        let req = self
            .http
            .get(self.admin_url(suffix))
            .query(&[("user_id", user_id)]);
        let resp = self.with_auth(req).send().await?;
        let envelope: GatewayEnvelope = resp
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        if !envelope.success {
            return Err(GatewayError::Rejected {
                code: envelope.code,
                message: envelope.message,
            });
        }

        envelope
            .data
            .map(|d| d.quota)
            .ok_or_else(|| GatewayError::Decode("missing data.quota in response".to_string()))
    }

    async fn post_form(
        &self,
        suffix: &str,
        form: &[(&str, String)],
    ) -> Result<(), GatewayError> {
        let req = self.http.post(self.admin_url(suffix)).form(form);
        let resp = self.with_auth(req).send().await?;
        let envelope: GatewayEnvelope = resp
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        if !envelope.success {
            return Err(GatewayError::Rejected {
                code: envelope.code,
                message: envelope.message,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl AiGatewayClient for HttpAiGatewayClient {
    async fn get_total_quota(&self, user_id: &str) -> Result<Decimal, GatewayError> {
        self.get_counter("", user_id).await
    }

    async fn get_used_quota(&self, user_id: &str) -> Result<Decimal, GatewayError> {
        self.get_counter("/used", user_id).await
    }

    async fn delta_total_quota(&self, user_id: &str, delta: Decimal) -> Result<(), GatewayError> {
        self.post_form(
            "/delta",
            &[
                ("user_id", user_id.to_string()),
                ("value", delta.to_string()),
            ],
        )
        .await
    }

    async fn delta_used_quota(&self, user_id: &str, delta: Decimal) -> Result<(), GatewayError> {
        self.post_form(
            "/used/delta",
            &[
                ("user_id", user_id.to_string()),
                ("value", delta.to_string()),
            ],
        )
        .await
    }

    async fn set_quota_check_permission(
        &self,
        user_id: &str,
        enabled: bool,
    ) -> Result<(), GatewayError> {
        self.post_form(
            "/quota-check-permission",
            &[
                ("user_id", user_id.to_string()),
                ("enabled", enabled.to_string()),
            ],
        )
        .await
    }

    async fn set_star_check_permission(
        &self,
        user_id: &str,
        enabled: bool,
    ) -> Result<(), GatewayError> {
        self.post_form(
            "/star-check-permission",
            &[
                ("user_id", user_id.to_string()),
                ("enabled", enabled.to_string()),
            ],
        )
        .await
    }

    async fn set_starred_projects(
        &self,
        user_id: &str,
        projects: &str,
    ) -> Result<(), GatewayError> {
        self.post_form(
            "/star-projects",
            &[
                ("user_id", user_id.to_string()),
                ("projects", projects.to_string()),
            ],
        )
        .await
    }
}
