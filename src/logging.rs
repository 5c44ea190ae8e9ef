use anyhow::{Context, Result};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Configuration;
use crate::job::render_fields;
use crate::rclone::Rclone;
use crate::restic::Restic;

/// Installs a text logger on stdout. `RUST_LOG` takes precedence over `level`.
pub fn init_logging(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => level_filter(level)?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stdout),
        )
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to install logger: {error}"))
}

fn level_filter(level: &str) -> Result<EnvFilter> {
    let level: LevelFilter = level
        .parse()
        .with_context(|| format!("invalid log level: {level}"))?;
    Ok(EnvFilter::default().add_directive(level.into()))
}

pub fn log_plan(config: &Configuration) {
    for line in plan_lines(config) {
        tracing::info!("{line}");
    }
}

fn plan_lines(config: &Configuration) -> Vec<String> {
    let mut lines = vec!["Run plan".to_string()];

    match &config.restic {
        Some(restic) => {
            lines.push(format!("  restic ({})", restic.binary));
            for job in Restic::new(restic).jobs() {
                lines.push(job_line(
                    job.kind(),
                    &render_fields(&job.log_fields()),
                    job.continue_on_error(),
                ));
            }
        }
        None => lines.push("  restic: not configured".to_string()),
    }

    match &config.rclone {
        Some(rclone) => {
            lines.push(format!("  rclone ({})", rclone.binary));
            for job in Rclone::new(rclone).jobs() {
                lines.push(job_line(
                    job.kind(),
                    &render_fields(&job.log_fields()),
                    job.continue_on_error(),
                ));
            }
        }
        None => lines.push("  rclone: not configured".to_string()),
    }

    lines
}

fn job_line(kind: &str, fields: &str, continue_on_error: bool) -> String {
    let policy = if continue_on_error {
        "continue on error"
    } else {
        "abort on error"
    };
    format!("    {kind}: {fields} [{policy}]")
}
