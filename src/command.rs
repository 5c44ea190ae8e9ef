use std::fmt;
use std::io::{self, BufRead, BufReader, Read};
use std::process::{Command, Stdio};

use anyhow::Result;

use crate::error::JobError;

/// Where a tool's standard error ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StderrMode {
    Inherit,
    /// Each line is re-emitted through the logger.
    Log,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub stderr: StderrMode,
}

impl Invocation {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            env: Vec::new(),
            stderr: StderrMode::Inherit,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_stderr(mut self, stderr: StderrMode) -> Self {
        self.stderr = stderr;
        self
    }

    /// Short tool name used as a log label, e.g. `restic` for `/usr/bin/restic`.
    pub fn tool(&self) -> &str {
        std::path::Path::new(&self.program)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.program)
    }
}

// Environment values may hold secrets.
impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env: Vec<String> = self.env.iter().map(|(key, _)| format!("{key}=***")).collect();
        f.debug_struct("Invocation")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("env", &env)
            .field("stderr", &self.stderr)
            .finish()
    }
}

pub trait CommandRunner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> Result<()>;
}

/// Spawns the real executable and blocks until it exits.
#[derive(Default, Debug, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, invocation: &Invocation) -> Result<()> {
        run_command(invocation)
    }
}

pub fn run_command(invocation: &Invocation) -> Result<()> {
    let tool = invocation.tool();
    tracing::info!(arguments = ?invocation.args, "Executing {tool} command");

    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .envs(invocation.env.iter().cloned())
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit());
    command.stderr(match invocation.stderr {
        StderrMode::Inherit => Stdio::inherit(),
        StderrMode::Log => Stdio::piped(),
    });

    let mut child = command.spawn().map_err(|source| JobError::Launch {
        program: invocation.program.clone(),
        source,
    })?;

    if let Some(stderr) = child.stderr.take() {
        drain_to_log(tool, stderr);
    }

    let status = child.wait().map_err(|source| JobError::Launch {
        program: invocation.program.clone(),
        source,
    })?;

    if !status.success() {
        return Err(JobError::NonZeroExit {
            program: invocation.program.clone(),
            code: status.code(),
        }
        .into());
    }

    tracing::info!("{tool} exited with return code 0");
    Ok(())
}

/// Logs every line of `source` until EOF and returns how many were logged.
/// Invalid UTF-8 is replaced rather than rejected; the pipe has to stay
/// drained or the child dies of SIGPIPE.
fn drain_to_log(tool: &str, source: impl Read) -> usize {
    let mut reader = BufReader::new(source);
    let mut buf = Vec::new();
    let mut logged = 0;
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(|c: char| c == '\n' || c == '\r');
                tracing::info!(tool, "{line}");
                logged += 1;
            }
            Err(error) => {
                tracing::warn!(tool, error = %error, "failed to read {tool} output");
                if let Err(error) = io::copy(&mut reader, &mut io::sink()) {
                    tracing::warn!(tool, error = %error, "failed to discard {tool} output");
                }
                break;
            }
        }
    }
    logged
}
