use std::collections::HashSet;
use std::fmt;

use anyhow::Result;
use serde::Deserialize;

use crate::command::{CommandRunner, Invocation, StderrMode};
use crate::constants::{DEFAULT_RESTIC_BINARY, RESTIC_PASSWORD_ENV_VAR};
use crate::error::JobError;
use crate::job::{render_fields, settle, LogFields};

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct ResticConfig {
    #[serde(deserialize_with = "crate::config::scalar_string")]
    pub binary: String,
    pub repositories: Vec<Repository>,
    pub backups: Vec<Backup>,
    pub forget: Vec<Forget>,
}

impl Default for ResticConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_RESTIC_BINARY.to_string(),
            repositories: Vec::new(),
            backups: Vec::new(),
            forget: Vec::new(),
        }
    }
}

impl ResticConfig {
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for repository in &self.repositories {
            if !seen.insert(repository.repository.as_str()) {
                anyhow::bail!(
                    "repository \"{}\" is defined more than once",
                    repository.repository
                );
            }
        }
        Ok(())
    }

    pub fn repository(&self, id: &str) -> Option<&Repository> {
        self.repositories.iter().find(|repo| repo.repository == id)
    }
}

#[derive(Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Repository {
    #[serde(deserialize_with = "crate::config::scalar_string")]
    pub repository: String,
    #[serde(deserialize_with = "crate::config::scalar_string")]
    pub path: String,
    #[serde(deserialize_with = "crate::config::scalar_string")]
    pub password: String,
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("repository", &self.repository)
            .field("path", &self.path)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct Backup {
    #[serde(deserialize_with = "crate::config::scalar_string")]
    pub backup: String,
    #[serde(deserialize_with = "crate::config::scalar_string")]
    pub repository: String,
    #[serde(deserialize_with = "crate::config::scalar_string")]
    pub source: String,
    pub exclude: Vec<String>,
    pub continue_on_error: bool,
}

impl Backup {
    pub fn arguments(&self, repo: &Repository) -> Vec<String> {
        let mut args = vec![
            "backup".to_string(),
            self.source.clone(),
            "--repo".to_string(),
            repo.path.clone(),
        ];
        for pattern in &self.exclude {
            args.push("--exclude".to_string());
            args.push(pattern.clone());
        }
        args
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct Forget {
    #[serde(deserialize_with = "crate::config::scalar_string")]
    pub repository: String,
    pub prune: bool,
    pub keep_last: u32,
    pub keep_hourly: u32,
    pub keep_daily: u32,
    pub keep_weekly: u32,
    pub keep_monthly: u32,
    pub keep_yearly: u32,
    pub keep_tag: Vec<String>,
    pub tag: Vec<String>,
    #[serde(deserialize_with = "crate::config::scalar_string")]
    pub hostname: String,
    pub continue_on_error: bool,
}

impl Forget {
    pub fn arguments(&self, repo: &Repository) -> Vec<String> {
        let mut args = vec!["forget".to_string(), "--repo".to_string(), repo.path.clone()];

        if !self.hostname.is_empty() {
            args.push("--hostname".to_string());
            args.push(self.hostname.clone());
        }

        let keep = [
            ("--keep-last", self.keep_last),
            ("--keep-hourly", self.keep_hourly),
            ("--keep-daily", self.keep_daily),
            ("--keep-weekly", self.keep_weekly),
            ("--keep-monthly", self.keep_monthly),
            ("--keep-yearly", self.keep_yearly),
        ];
        for (flag, count) in keep {
            if count > 0 {
                args.push(flag.to_string());
                args.push(count.to_string());
            }
        }

        if !self.keep_tag.is_empty() {
            args.push("--keep-tag".to_string());
            args.push(self.keep_tag.join(","));
        }

        if !self.tag.is_empty() {
            args.push("--tag".to_string());
            args.push(self.tag.join(","));
        }

        if self.prune {
            args.push("--prune".to_string());
        }

        args
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ResticJob<'a> {
    Backup(&'a Backup),
    Forget(&'a Forget),
}

impl ResticJob<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            ResticJob::Backup(_) => "backup",
            ResticJob::Forget(_) => "forget",
        }
    }

    pub fn continue_on_error(&self) -> bool {
        match self {
            ResticJob::Backup(backup) => backup.continue_on_error,
            ResticJob::Forget(forget) => forget.continue_on_error,
        }
    }

    pub fn repository_id(&self) -> &str {
        match self {
            ResticJob::Backup(backup) => &backup.repository,
            ResticJob::Forget(forget) => &forget.repository,
        }
    }

    pub fn log_fields(&self) -> LogFields {
        match self {
            ResticJob::Backup(backup) => vec![
                ("backup", backup.backup.clone()),
                ("repository", backup.repository.clone()),
                ("source", backup.source.clone()),
                ("exclude", backup.exclude.join(",")),
            ],
            ResticJob::Forget(forget) => vec![("repository", forget.repository.clone())],
        }
    }

    pub fn arguments(&self, repo: &Repository) -> Vec<String> {
        match self {
            ResticJob::Backup(backup) => backup.arguments(repo),
            ResticJob::Forget(forget) => forget.arguments(repo),
        }
    }
}

/// Runs the configured restic jobs: every backup, then every forget.
pub struct Restic<'a> {
    config: &'a ResticConfig,
}

impl<'a> Restic<'a> {
    pub fn new(config: &'a ResticConfig) -> Self {
        Self { config }
    }

    pub fn jobs(&self) -> impl Iterator<Item = ResticJob<'a>> + 'a {
        let config = self.config;
        config
            .backups
            .iter()
            .map(ResticJob::Backup)
            .chain(config.forget.iter().map(ResticJob::Forget))
    }

    pub fn invocation(&self, job: &ResticJob<'_>) -> Result<Invocation> {
        let repo = self
            .config
            .repository(job.repository_id())
            .ok_or_else(|| JobError::RepositoryNotFound(job.repository_id().to_string()))?;

        Ok(Invocation::new(&self.config.binary, job.arguments(repo))
            .with_env(RESTIC_PASSWORD_ENV_VAR, &repo.password)
            .with_stderr(StderrMode::Inherit))
    }

    pub fn run(&self, runner: &dyn CommandRunner) -> Result<()> {
        for job in self.jobs() {
            let kind = job.kind();
            let fields = job.log_fields();
            tracing::info!(job = %render_fields(&fields), "start run restic {kind}");

            let result = self
                .invocation(&job)
                .and_then(|invocation| runner.run(&invocation));
            settle(kind, job.continue_on_error(), &fields, result)?;

            tracing::info!("end run restic {kind}");
        }
        Ok(())
    }
}
