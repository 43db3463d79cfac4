use std::sync::Arc;

use coverquote_core::config::{AppConfig, ConfigError, LoadOptions};
use coverquote_core::ports::{NotificationError, ServiceError};
use coverquote_core::{
    BindService, EngineDeps, EngineError, IntegrationRegistry, NotificationQueue,
    NotificationWorker, QuoteOrchestrator, TracingAuditSink,
};
use coverquote_db::repositories::{
    SqlAgencyLocationStore, SqlApplicationStore, SqlInsurerStore, SqlQuoteStore, SqlZipCodeLookup,
};
use coverquote_db::{connect, migrations, DbPool};
use coverquote_slack::poster_from_config;
use thiserror::Error;
use tracing::{info, warn};

use crate::api::ApiState;
use crate::clients::{HttpEmailSender, HttpEncryptionService, HttpQuestionCatalog};

pub struct Runtime {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub api: ApiState,
    pub notification_worker: NotificationWorker,
    pub carriers_registered: bool,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("service client setup failed: {0}")]
    Service(#[from] ServiceError),
    #[error("notification setup failed: {0}")]
    Notification(#[from] NotificationError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Runtime, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config, IntegrationRegistry::new()).await
}

/// Wires SQL stores, HTTP service clients and notification transports into the engine.
///
/// Carrier adapters are supplied by the caller through `integrations`.
pub async fn bootstrap_with_config(
    config: AppConfig,
    integrations: IntegrationRegistry,
) -> Result<Runtime, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        environment = config.runtime.environment.as_str(),
        "starting application bootstrap"
    );

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let carriers_registered = !integrations.is_empty();
    if !carriers_registered {
        warn!(
            event_name = "system.bootstrap.no_integrations",
            correlation_id = "bootstrap",
            "no carrier integrations registered; every application will end without quotes"
        );
    }

    let (notifications, receiver) = NotificationQueue::channel();
    let email = Arc::new(HttpEmailSender::new(&config.email, config.services.request_timeout_secs)?);
    let slack = poster_from_config(&config.slack)?;
    let notification_worker = NotificationWorker::new(receiver, email, slack, &config)?;

    let applications = Arc::new(SqlApplicationStore::new(db_pool.clone()));
    let deps = Arc::new(EngineDeps {
        zips: Arc::new(SqlZipCodeLookup::new(db_pool.clone())),
        agencies: Arc::new(SqlAgencyLocationStore::new(db_pool.clone())),
        insurers: Arc::new(SqlInsurerStore::new(db_pool.clone())),
        questions: Arc::new(HttpQuestionCatalog::new(&config.services)?),
        encryption: Arc::new(HttpEncryptionService::new(&config.services)?),
        applications: applications.clone(),
        quotes: Arc::new(SqlQuoteStore::new(db_pool.clone())),
        integrations,
        notifications,
        audit: Arc::new(TracingAuditSink),
        config: config.clone(),
    });

    let api = ApiState {
        orchestrator: QuoteOrchestrator::new(deps.clone()),
        binds: BindService::new(deps),
        applications,
    };

    Ok(Runtime { config, db_pool, api, notification_worker, carriers_registered })
}
