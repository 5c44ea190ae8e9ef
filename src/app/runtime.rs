use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::command::{CommandRunner, SystemCommandRunner};

pub trait TimeProvider: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Default, Debug, Clone, Copy)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    /// Explicit config file; discovered in `cwd` when absent.
    pub config_path: Option<PathBuf>,
}

/// Process-level collaborators, passed explicitly instead of read from globals.
pub struct Runtime {
    pub env: HashMap<String, String>,
    pub cwd: PathBuf,
    pub runner: Box<dyn CommandRunner>,
    pub time: Box<dyn TimeProvider>,
}

impl Runtime {
    pub fn from_process() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to read current directory")?;
        Ok(Self {
            env: std::env::vars().collect(),
            cwd,
            runner: Box::new(SystemCommandRunner),
            time: Box::new(SystemTimeProvider),
        })
    }
}
