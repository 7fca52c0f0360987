use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use deadliner_cfp::{NoopLinkSource, SubmissionLinkSource, WikiCfpDirectory};
use deadliner_core::config::{AppConfig, ConfigError, LoadOptions};
use deadliner_core::engine::DeadlineEngine;
use deadliner_db::{connect_with_settings, migrations, DbPool, SqliteDeadlineStore};
use deadliner_slack::events::DeadlineBot;
use deadliner_slack::socket::{
    NoopMessageSink, NoopSocketTransport, ReconnectPolicy, SocketModeRunner,
};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub slack_runner: SocketModeRunner<SqliteDeadlineStore>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
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

    let links: Arc<dyn SubmissionLinkSource> = if config.cfp.enabled {
        Arc::new(WikiCfpDirectory::new(
            config.cfp.base_url.clone(),
            config.cfp.timeout_secs,
            config.cfp.resolve_true_link,
        ))
    } else {
        Arc::new(NoopLinkSource)
    };

    let engine = DeadlineEngine::new(SqliteDeadlineStore::new(db_pool.clone()));
    let bot = DeadlineBot::new(engine, links);
    let slack_runner = SocketModeRunner::new(
        Arc::new(NoopSocketTransport),
        Arc::new(NoopMessageSink),
        bot,
        ReconnectPolicy::default(),
    );

    Ok(Application { config, db_pool, slack_runner })
}

#[cfg(test)]
mod tests {
    use deadliner_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn valid_overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                slack_app_token: Some("xapp-valid".to_string()),
                slack_bot_token: Some("xoxb-valid".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_required_slack_tokens() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                slack_app_token: Some("invalid-token".to_string()),
                slack_bot_token: Some("xoxb-valid".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("slack.app_token"));
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations_on_a_fresh_database() {
        let app = bootstrap(valid_overrides("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('deadline', 'response_deadline')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("expected baseline tables to be available after bootstrap");
        assert_eq!(table_count, 2, "bootstrap should expose both record tables");
    }
}
