use anyhow::Result;
use serde::Deserialize;

use crate::command::{CommandRunner, Invocation, StderrMode};
use crate::constants::{DEFAULT_RCLONE_BINARY, RCLONE_STATS_ARGS};
use crate::job::{render_fields, settle, LogFields};

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct RcloneConfig {
    #[serde(deserialize_with = "crate::config::scalar_string")]
    pub binary: String,
    pub copy: Vec<Transfer>,
    pub sync: Vec<Transfer>,
}

impl Default for RcloneConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_RCLONE_BINARY.to_string(),
            copy: Vec::new(),
            sync: Vec::new(),
        }
    }
}

/// One rclone copy or sync job. Both verbs take the same parameters.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct Transfer {
    #[serde(deserialize_with = "crate::config::scalar_string")]
    pub source: String,
    #[serde(deserialize_with = "crate::config::scalar_string")]
    pub destination: String,
    #[serde(deserialize_with = "crate::config::scalar_string")]
    pub bw_limit: String,
    pub continue_on_error: bool,
}

impl Transfer {
    fn arguments(&self, verb: &str) -> Vec<String> {
        let mut args = vec![
            verb.to_string(),
            self.source.clone(),
            self.destination.clone(),
        ];

        if !self.bw_limit.is_empty() {
            args.push("--bwlimit".to_string());
            args.push(self.bw_limit.clone());
        }

        args.extend(RCLONE_STATS_ARGS.iter().map(|arg| arg.to_string()));
        args
    }
}

#[derive(Debug, Clone, Copy)]
pub enum RcloneJob<'a> {
    Copy(&'a Transfer),
    Sync(&'a Transfer),
}

impl RcloneJob<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            RcloneJob::Copy(_) => "copy",
            RcloneJob::Sync(_) => "sync",
        }
    }

    fn transfer(&self) -> &Transfer {
        match *self {
            RcloneJob::Copy(transfer) | RcloneJob::Sync(transfer) => transfer,
        }
    }

    pub fn continue_on_error(&self) -> bool {
        self.transfer().continue_on_error
    }

    pub fn log_fields(&self) -> LogFields {
        let transfer = self.transfer();
        vec![
            ("source", transfer.source.clone()),
            ("destination", transfer.destination.clone()),
        ]
    }

    pub fn arguments(&self) -> Vec<String> {
        self.transfer().arguments(self.kind())
    }
}

/// Runs the configured rclone jobs: every copy, then every sync.
pub struct Rclone<'a> {
    config: &'a RcloneConfig,
}

impl<'a> Rclone<'a> {
    pub fn new(config: &'a RcloneConfig) -> Self {
        Self { config }
    }

    pub fn jobs(&self) -> impl Iterator<Item = RcloneJob<'a>> + 'a {
        let config = self.config;
        config
            .copy
            .iter()
            .map(RcloneJob::Copy)
            .chain(config.sync.iter().map(RcloneJob::Sync))
    }

    pub fn invocation(&self, job: &RcloneJob<'_>) -> Invocation {
        Invocation::new(&self.config.binary, job.arguments()).with_stderr(StderrMode::Log)
    }

    pub fn run(&self, runner: &dyn CommandRunner) -> Result<()> {
        for job in self.jobs() {
            let kind = job.kind();
            let fields = job.log_fields();
            tracing::info!(job = %render_fields(&fields), "start run rclone {kind}");

            let result = runner.run(&self.invocation(&job));
            settle(kind, job.continue_on_error(), &fields, result)?;

            tracing::info!("end run rclone {kind}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(bw_limit: &str) -> Transfer {
        Transfer {
            source: "/srv/photos".to_string(),
            destination: "b2:photos".to_string(),
            bw_limit: bw_limit.to_string(),
            continue_on_error: false,
        }
    }

    #[test]
    fn copy_without_bandwidth_limit_omits_bwlimit() {
        let transfer = transfer("");
        let args = RcloneJob::Copy(&transfer).arguments();
        assert_eq!(
            args,
            vec![
                "copy",
                "/srv/photos",
                "b2:photos",
                "--stats-log-level",
                "NOTICE",
                "--stats",
                "1m",
            ]
        );
    }

    #[test]
    fn copy_with_bandwidth_limit_appends_it_after_destination() {
        let transfer = transfer("10M");
        let args = RcloneJob::Copy(&transfer).arguments();
        assert_eq!(&args[..5], &["copy", "/srv/photos", "b2:photos", "--bwlimit", "10M"]);
        assert!(args.ends_with(&[
            "--stats-log-level".to_string(),
            "NOTICE".to_string(),
            "--stats".to_string(),
            "1m".to_string(),
        ]));
    }

    #[test]
    fn sync_uses_sync_verb() {
        let transfer = transfer("1M");
        let args = RcloneJob::Sync(&transfer).arguments();
        assert_eq!(args[0], "sync");
        assert!(args.contains(&"--bwlimit".to_string()));
    }

    #[test]
    fn invocation_routes_stderr_through_logger_without_env() {
        let config = RcloneConfig {
            copy: vec![transfer("")],
            ..Default::default()
        };
        let rclone = Rclone::new(&config);
        let job = rclone.jobs().next().unwrap();

        let invocation = rclone.invocation(&job);
        assert_eq!(invocation.program, "rclone");
        assert_eq!(invocation.stderr, StderrMode::Log);
        assert!(invocation.env.is_empty());
    }

    #[test]
    fn jobs_list_copies_before_syncs() {
        let config = RcloneConfig {
            copy: vec![transfer("")],
            sync: vec![transfer(""), transfer("")],
            ..Default::default()
        };
        let kinds: Vec<_> = Rclone::new(&config).jobs().map(|job| job.kind()).collect();
        assert_eq!(kinds, vec!["copy", "sync", "sync"]);
    }
}
