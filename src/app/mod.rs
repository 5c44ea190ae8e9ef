mod orchestrator;
mod runtime;

pub use orchestrator::{run, run_jobs, run_with};
pub use runtime::{RunOptions, Runtime, SystemTimeProvider, TimeProvider};
