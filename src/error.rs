use thiserror::Error;

/// Failures a single job can surface. All of them are subject to the
/// job's `continue-on-error` flag.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("repository \"{0}\" does not exist")]
    RepositoryNotFound(String),

    #[error("failed to launch {program}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {}", describe_exit(.code))]
    NonZeroExit { program: String, code: Option<i32> },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("return code {code}"),
        None => "no return code (terminated by signal)".to_string(),
    }
}
