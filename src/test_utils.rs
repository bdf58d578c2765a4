use crate::config::{Config, GithubStarCheckConfig};
use crate::database::entities::{auth_users, employee_departments, quotas, QuotaStatus};
use crate::database::DatabaseManager;
use crate::gateway::MockAiGateway;
use crate::permission::{QuotaCheckPermissionService, StarCheckPermissionService};
use crate::quota::{expiry::truncate_to_second, AuthUser, QuotaService};
use crate::voucher::VoucherService;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ActiveValue, Set};
use std::sync::Arc;

/// Test environment builder: in-memory database, mock gateway, services wired
/// the same way `Server::new` wires them.
pub struct TestEnvBuilder {
    config: Config,
}

impl TestEnvBuilder {
    pub fn new() -> Self {
        let mut config = Config::default();
        config.database.url = "sqlite::memory:".to_string();
        config.voucher.signing_key = "test-signing-key".to_string();
        config.jobs.enabled = false;
        Self { config }
    }

    pub fn with_star_check(mut self, enabled: bool, required_repo: &str) -> Self {
        self.config.github_star_check = GithubStarCheckConfig {
            enabled,
            required_repo: required_repo.to_string(),
        };
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub async fn build(self) -> TestEnv {
        // One pooled connection keeps every task on the same in-memory database
        let mut options = sea_orm::ConnectOptions::new(self.config.database.url.clone());
        options.max_connections(1);
        let connection = sea_orm::Database::connect(options)
            .await
            .expect("connect test database");

        let database = Arc::new(DatabaseManager::new(connection));
        database.migrate().await.expect("migrate test database");

        let gateway = Arc::new(MockAiGateway::new());
        let voucher = Arc::new(VoucherService::new(&self.config.voucher.signing_key));

        let quota_service = Arc::new(QuotaService::new(
            database.clone(),
            gateway.clone(),
            voucher.clone(),
            self.config.github_star_check.clone(),
        ));
        let quota_check_service = Arc::new(QuotaCheckPermissionService::new(
            database.clone(),
            gateway.clone(),
        ));
        let star_check_service = Arc::new(StarCheckPermissionService::new(
            database.clone(),
            gateway.clone(),
        ));

        TestEnv {
            config: self.config,
            database,
            gateway,
            voucher,
            quota_service,
            quota_check_service,
            star_check_service,
        }
    }
}

impl Default for TestEnvBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TestEnv {
    pub config: Config,
    pub database: Arc<DatabaseManager>,
    pub gateway: Arc<MockAiGateway>,
    pub voucher: Arc<VoucherService>,
    pub quota_service: Arc<QuotaService>,
    pub quota_check_service: Arc<QuotaCheckPermissionService>,
    pub star_check_service: Arc<StarCheckPermissionService>,
}

impl TestEnv {
    /// Insert an auth user and return the matching authenticated principal.
    pub async fn create_auth_user(&self, user_id: &str, name: &str, github_star: &str) -> AuthUser {
        let now = truncate_to_second(Utc::now());
        auth_users::ActiveModel {
            id: Set(user_id.to_string()),
            name: Set(name.to_string()),
            phone: Set(Some("13800138000".to_string())),
            github_id: Set(Some(user_id.to_string())),
            github_star: Set(github_star.to_string()),
            employee_number: Set(format!("emp-{user_id}")),
            register_time: Set(now),
            access_time: Set(now),
        }
        .insert(&self.database.connection)
        .await
        .expect("insert auth user");

        AuthUser {
            id: user_id.to_string(),
            name: name.to_string(),
            phone: "13800138000".to_string(),
            github: user_id.to_string(),
        }
    }

    /// Insert an employee-department row (path is comma-joined, root first).
    pub async fn create_employee(&self, employee_number: &str, dept_path: &str) {
        employee_departments::ActiveModel {
            id: ActiveValue::NotSet,
            employee_number: Set(employee_number.to_string()),
            dept_full_level_names: Set(dept_path.to_string()),
        }
        .insert(&self.database.connection)
        .await
        .expect("insert employee department");
    }

    /// Insert a VALID quota lot directly into the ledger.
    pub async fn create_quota_lot(
        &self,
        user_id: &str,
        amount: Decimal,
        expiry_date: DateTime<Utc>,
    ) {
        let now = truncate_to_second(Utc::now());
        quotas::ActiveModel {
            id: ActiveValue::NotSet,
            user_id: Set(user_id.to_string()),
            amount: Set(amount),
            expiry_date: Set(truncate_to_second(expiry_date)),
            status: Set(QuotaStatus::Valid),
            create_time: Set(now),
            update_time: Set(now),
        }
        .insert(&self.database.connection)
        .await
        .expect("insert quota lot");
    }
}
