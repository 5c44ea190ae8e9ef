use anyhow::{Context, Result};

use crate::config::{load_config, resolve_config_path, Configuration};
use crate::logging::log_plan;
use crate::rclone::Rclone;
use crate::restic::Restic;

use super::runtime::{RunOptions, Runtime};

pub fn run(options: &RunOptions) -> Result<()> {
    run_with(&Runtime::from_process()?, options)
}

pub fn run_with(runtime: &Runtime, options: &RunOptions) -> Result<()> {
    let config = resolve_config_path(options.config_path.as_deref(), &runtime.cwd)
        .and_then(|path| load_config(&path, &runtime.env))
        .context("reading config file failed")?;

    run_jobs(runtime, &config)
}

/// Runs every restic job, then every rclone job. The first non-continuable
/// failure stops the whole run.
pub fn run_jobs(runtime: &Runtime, config: &Configuration) -> Result<()> {
    let start_time = runtime.time.now();
    tracing::info!("Run started at {}", start_time.to_rfc3339());
    log_plan(config);

    if let Some(restic) = &config.restic {
        Restic::new(restic)
            .run(runtime.runner.as_ref())
            .context("restic execution failed")?;
    }

    if let Some(rclone) = &config.rclone {
        Rclone::new(rclone)
            .run(runtime.runner.as_ref())
            .context("rclone execution failed")?;
    }

    let completion_time = runtime.time.now();
    let duration = completion_time - start_time;
    let elapsed_seconds = duration.num_milliseconds() as f64 / 1000.0;
    tracing::info!(
        "All jobs completed at {} (duration: {:.1}s)",
        completion_time.to_rfc3339(),
        elapsed_seconds
    );

    Ok(())
}
