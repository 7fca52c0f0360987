use serde::Serialize;

use crate::commands::CommandResult;
use deadliner_core::config::{AppConfig, LoadOptions};
use deadliner_db::connect_with_settings;

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: &'static str,
    detail: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    status: &'static str,
    checks: Vec<DoctorCheck>,
}

pub fn run(json: bool) -> CommandResult {
    let mut checks = Vec::new();

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config",
                status: "ok",
                detail: "configuration loads and validates".to_string(),
            });
            Some(config)
        }
        Err(load_error) => {
            checks.push(DoctorCheck {
                name: "config",
                status: "failed",
                detail: load_error.to_string(),
            });
            None
        }
    };

    if let Some(config) = &config {
        checks.push(database_check(config));
    }

    let healthy = checks.iter().all(|check| check.status == "ok");
    let report =
        DoctorReport { status: if healthy { "ready" } else { "degraded" }, checks };

    let output = if json {
        serde_json::to_string(&report)
            .unwrap_or_else(|serialize_error| format!("failed to render report: {serialize_error}"))
    } else {
        render_text(&report)
    };

    CommandResult { exit_code: if healthy { 0 } else { 1 }, output }
}

fn database_check(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(runtime_error) => {
            return DoctorCheck {
                name: "database",
                status: "failed",
                detail: format!("failed to initialize async runtime: {runtime_error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await?;
        sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&pool).await?;
        pool.close().await;
        Ok::<(), sqlx::Error>(())
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "database",
            status: "ok",
            detail: "connection and probe query succeeded".to_string(),
        },
        Err(db_error) => {
            DoctorCheck { name: "database", status: "failed", detail: db_error.to_string() }
        }
    }
}

fn render_text(report: &DoctorReport) -> String {
    let mut lines = vec![format!("overall: {}", report.status)];
    for check in &report.checks {
        lines.push(format!("  {}: {} ({})", check.name, check.status, check.detail));
    }
    lines.join("\n")
}
