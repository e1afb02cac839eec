use std::sync::Arc;

use retaily_agent::{AnswerWorkflow, CompletionError, HttpCompletionClient, WorkflowError};
use retaily_core::config::{AppConfig, ConfigError, LoadOptions};
use retaily_db::{connect_with_settings, migrations, DbPool, RetailStore};
use thiserror::Error;
use tracing::info;

pub type AppWorkflow = AnswerWorkflow<HttpCompletionClient, RetailStore>;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub workflow: Arc<AppWorkflow>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("completion client initialization failed: {0}")]
    CompletionClient(#[source] CompletionError),
    #[error("workflow initialization failed: {0}")]
    Workflow(#[source] WorkflowError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

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

    let completions =
        HttpCompletionClient::from_config(&config.llm).map_err(BootstrapError::CompletionClient)?;
    let workflow = AnswerWorkflow::new(completions, RetailStore::new(db_pool.clone()))
        .map_err(BootstrapError::Workflow)?;
    info!(
        event_name = "system.bootstrap.workflow_ready",
        correlation_id = "bootstrap",
        provider = ?config.llm.provider,
        model = %config.llm.model,
        "answer workflow assembled"
    );

    Ok(Application { config, db_pool, workflow: Arc::new(workflow) })
}

#[cfg(test)]
mod tests {
    use retaily_core::config::{ConfigOverrides, LlmProvider, LoadOptions};

    use crate::bootstrap::bootstrap;

    #[tokio::test]
    async fn bootstrap_fails_fast_when_provider_lacks_credentials() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                llm_provider: Some(LlmProvider::OpenAi),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("llm.api_key"));
    }

    #[tokio::test]
    async fn integration_smoke_covers_startup_and_data_path() {
        let app = bootstrap(valid_overrides("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'retail'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("expected retail table to be available after bootstrap");
        assert_eq!(table_count, 1, "bootstrap should expose the retail dataset table");

        app.db_pool.close().await;
    }

    fn valid_overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }
}
