use std::sync::Arc;

use axum::Router;
use tokio::sync::mpsc;
use tracing::{info, warn};

use hyperbot_agent::{AssistantClient, ConversationService, ConversationSettings};
use hyperbot_core::auth::TokenError;
use hyperbot_core::config::{AppConfig, GoogleConfig};
use hyperbot_core::domain::uipath::JobId;
use hyperbot_db::repositories::{
    SqlMessageRepository, SqlThreadRepository, SqlUiPathJobRepository, SqlUserPointRepository,
    SqlUserRepository,
};
use hyperbot_db::{connect_with_settings, migrations, DbPool};
use hyperbot_sheets::{
    ServiceAccountKey, ServiceAccountTokenProvider, SheetService, SheetsClient, SheetsError,
};
use hyperbot_slack::socket::{ReconnectPolicy, SocketModeRunner, TungsteniteTransport};
use hyperbot_slack::{SlackPoster, SlackWebClient};
use hyperbot_uipath::{ChannelJobQueue, JobService, JobWorker, UiPathClient};
use thiserror::Error;

use crate::api::{self, AppState, AuthTokens};
use crate::{bot, health};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub router: Router,
    pub worker: Arc<JobWorker>,
    /// Receiving end of the job queue; hand it to [`JobWorker::run`].
    pub job_receiver: mpsc::Receiver<JobId>,
    pub slack_runner: SocketModeRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("auth token secrets are not usable: {0}")]
    Auth(#[source] TokenError),
    #[error("google sheets setup failed: {0}")]
    Sheets(#[source] SheetsError),
}

/// Connects storage, applies migrations and wires every service around a
/// loaded configuration. Nothing is started; see `main` for that.
pub async fn bootstrap(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let tokens = AuthTokens::from_config(&config.auth).map_err(BootstrapError::Auth)?;

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
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

    let web_client = Arc::new(SlackWebClient::from_config(&config.slack));
    let poster: Arc<dyn SlackPoster> = web_client.clone();

    let conversation = Arc::new(ConversationService::new(
        Arc::new(AssistantClient::from_config(&config.azure_openai)),
        Arc::new(SqlThreadRepository::new(db_pool.clone())),
        Arc::new(SqlMessageRepository::new(db_pool.clone())),
        poster.clone(),
        ConversationSettings::from_config(&config.azure_openai),
    ));

    let (queue, job_receiver) = ChannelJobQueue::bounded(config.worker.queue_capacity);
    let jobs = Arc::new(JobService::new(
        Arc::new(UiPathClient::from_config(&config.uipath)),
        Arc::new(SqlUiPathJobRepository::new(db_pool.clone())),
        Arc::new(queue),
        config.uipath.processes.clone(),
    ));
    let worker = Arc::new(JobWorker::from_config(jobs.clone(), poster.clone(), &config.worker));

    let sheets = sheet_service(&config.google).await?;

    let dispatcher = Arc::new(bot::dispatcher(
        conversation.clone(),
        jobs.clone(),
        sheets.clone(),
        poster.clone(),
        bot::CLOSE_THREAD_DELAY,
    ));

    let users = Arc::new(SqlUserRepository::new(db_pool.clone()));
    let state = AppState {
        users,
        points: Arc::new(SqlUserPointRepository::new(db_pool.clone())),
        tokens: Arc::new(tokens),
        poster: poster.clone(),
        signing_secret: config.slack.signing_secret.clone(),
        dispatcher: dispatcher.clone(),
        conversation,
        jobs,
        sheets,
    };
    let router = api::router(state).merge(health::router(db_pool.clone()));

    let slack_runner = SocketModeRunner::new(
        Arc::new(TungsteniteTransport::new(web_client)),
        dispatcher,
        poster,
        ReconnectPolicy::default(),
    );

    Ok(Application { config, db_pool, router, worker, job_receiver, slack_runner })
}

async fn sheet_service(config: &GoogleConfig) -> Result<Option<Arc<SheetService>>, BootstrapError> {
    let Some(path) = config.credentials_file.as_deref() else {
        warn!(
            event_name = "system.bootstrap.sheets_disabled",
            correlation_id = "bootstrap",
            "google.credentials_file is not set; sheets features are disabled"
        );
        return Ok(None);
    };

    let key = ServiceAccountKey::from_file(path).await.map_err(BootstrapError::Sheets)?;
    let tokens = ServiceAccountTokenProvider::new(key).map_err(BootstrapError::Sheets)?;
    let client = SheetsClient::from_config(Arc::new(tokens), config);
    Ok(Some(Arc::new(SheetService::new(client, config.shared_drive_folder_id.clone()))))
}
