use std::path::PathBuf;

use backup_and_sync::constants::CONFIG_PATH_ENV_VAR;
use backup_and_sync::logging::init_logging;
use backup_and_sync::{run, RunOptions};
use clap::{Parser, Subcommand};

/// Backup directories using restic and sync folders using rclone
#[derive(Parser, Debug)]
#[command(name = "backup-and-sync", author, version, about, long_about = None)]
struct Args {
    /// Config file (default is ./backup.config)
    #[arg(long, value_name = "FILE", env = CONFIG_PATH_ENV_VAR, global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(
        long,
        default_value = "info",
        global = true,
        value_parser = ["trace", "debug", "info", "warn", "error"]
    )]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Run the configured restic jobs, then the rclone jobs
    Backup,
}

fn main() {
    let args = Args::parse();

    if let Err(error) = init_logging(&args.log_level) {
        eprintln!("error: {error:?}");
        std::process::exit(1);
    }

    match args.command {
        None | Some(Command::Backup) => {
            let options = RunOptions {
                config_path: args.config,
            };
            if let Err(error) = run(&options) {
                tracing::error!("{error:#}");
                std::process::exit(1);
            }
        }
    }
}
