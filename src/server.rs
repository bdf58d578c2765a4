use crate::config::Config;
use crate::database::DatabaseManager;
use crate::error::ServiceError;
use crate::gateway::{AiGatewayClient, HttpAiGatewayClient};
use crate::jobs::{ExpireSweep, MergeSweep, SweepScheduler};
use crate::permission::{QuotaCheckPermissionService, StarCheckPermissionService};
use crate::quota::QuotaService;
use crate::voucher::VoucherService;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// Wires configuration, storage, gateway client and services together, and
/// drives the periodic sweeps until shutdown.
pub struct Server {
    pub config: Arc<Config>,
    pub database: Arc<DatabaseManager>,
    pub gateway: Arc<dyn AiGatewayClient>,
    pub quota_service: Arc<QuotaService>,
    pub quota_check_service: Arc<QuotaCheckPermissionService>,
    pub star_check_service: Arc<StarCheckPermissionService>,
    sweep_scheduler: SweepScheduler,
    shutdown_tx: watch::Sender<bool>,
}

impl Server {
    pub async fn new(config: Config) -> Result<Self, ServiceError> {
        let config = Arc::new(config);

        let database = Arc::new(DatabaseManager::new_from_config(&config).await?);
        database.migrate().await?;

        let gateway: Arc<dyn AiGatewayClient> =
            Arc::new(HttpAiGatewayClient::new(config.ai_gateway.clone())?);
        let voucher = Arc::new(VoucherService::new(&config.voucher.signing_key));

        let quota_service = Arc::new(QuotaService::new(
            database.clone(),
            gateway.clone(),
            voucher,
            config.github_star_check.clone(),
        ));
        let quota_check_service = Arc::new(QuotaCheckPermissionService::new(
            database.clone(),
            gateway.clone(),
        ));
        let star_check_service = Arc::new(StarCheckPermissionService::new(
            database.clone(),
            gateway.clone(),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sweep_scheduler = SweepScheduler::new(shutdown_rx);

        Ok(Self {
            config,
            database,
            gateway,
            quota_service,
            quota_check_service,
            star_check_service,
            sweep_scheduler,
            shutdown_tx,
        })
    }

    /// Start the periodic sweeps and block until ctrl-c.
    pub async fn run(mut self) -> Result<(), ServiceError> {
        if self.config.jobs.enabled {
            self.sweep_scheduler.spawn(
                Arc::new(ExpireSweep::new(self.quota_service.clone())),
                self.config.jobs.expire_quotas.interval(),
            );
            self.sweep_scheduler.spawn(
                Arc::new(MergeSweep::new(self.quota_service.clone())),
                self.config.jobs.merge_quotas.interval(),
            );
        } else {
            info!("Periodic sweeps disabled in configuration");
        }

        info!("Quota manager running");

        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }

        let _ = self.shutdown_tx.send(true);
        self.sweep_scheduler.shutdown().await;

        Ok(())
    }
}
