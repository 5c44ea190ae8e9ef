use anyhow::Result;

/// Identifying key/value pairs attached to job log lines.
pub type LogFields = Vec<(&'static str, String)>;

pub fn render_fields(fields: &LogFields) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Applies a job's failure policy to its outcome. A failure is logged and
/// swallowed when `continue_on_error` is set; otherwise it is wrapped with
/// the job kind and returned so the caller aborts the whole run.
pub fn settle(
    kind: &str,
    continue_on_error: bool,
    fields: &LogFields,
    result: Result<()>,
) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(error) if continue_on_error => {
            tracing::warn!(
                kind,
                job = %render_fields(fields),
                error = %format!("{error:#}"),
                "run {kind} job failed. Continuing..."
            );
            Ok(())
        }
        Err(error) => Err(error.context(format!("run {kind} job failed"))),
    }
}
