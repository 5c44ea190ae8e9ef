pub mod app;
pub mod command;
pub mod config;
pub mod constants;
pub mod error;
pub mod job;
pub mod logging;
pub mod rclone;
pub mod restic;

pub use app::{run, run_with, RunOptions, Runtime};
pub use config::Configuration;
pub use error::JobError;
