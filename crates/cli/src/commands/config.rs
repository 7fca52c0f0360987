use secrecy::ExposeSecret;
use serde::Serialize;

use deadliner_core::config::{AppConfig, LoadOptions};

#[derive(Debug, Serialize)]
struct ConfigSummary {
    database_url: String,
    database_max_connections: u32,
    slack_app_token: &'static str,
    slack_bot_token: &'static str,
    cfp_enabled: bool,
    cfp_base_url: String,
    logging_level: String,
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "(unset)"
    } else {
        "(redacted)"
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(load_error) => {
            return format!("{{\"status\":\"error\",\"message\":\"{load_error}\"}}");
        }
    };

    let summary = ConfigSummary {
        database_url: config.database.url.clone(),
        database_max_connections: config.database.max_connections,
        slack_app_token: redact(config.slack.app_token.expose_secret()),
        slack_bot_token: redact(config.slack.bot_token.expose_secret()),
        cfp_enabled: config.cfp.enabled,
        cfp_base_url: config.cfp.base_url.clone(),
        logging_level: config.logging.level.clone(),
    };

    serde_json::to_string_pretty(&summary)
        .unwrap_or_else(|serialize_error| format!("failed to render config: {serialize_error}"))
}
