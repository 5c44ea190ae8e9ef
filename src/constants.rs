pub const DEFAULT_RESTIC_BINARY: &str = "restic";
pub const DEFAULT_RCLONE_BINARY: &str = "rclone";
pub const RESTIC_PASSWORD_ENV_VAR: &str = "RESTIC_PASSWORD";

pub const CONFIG_FILE_STEM: &str = "backup.config";
pub const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "toml", "json"];
pub const CONFIG_PATH_ENV_VAR: &str = "BACKUP_AND_SYNC_CONFIG";
pub const CONFIG_OVERRIDE_PREFIX: &str = "BACKUP_AND_SYNC__";

pub const RCLONE_STATS_ARGS: &[&str] = &["--stats-log-level", "NOTICE", "--stats", "1m"];

pub fn config_file_candidates() -> Vec<String> {
    std::iter::once(CONFIG_FILE_STEM.to_string())
        .chain(
            CONFIG_FILE_EXTENSIONS
                .iter()
                .map(|extension| format!("{CONFIG_FILE_STEM}.{extension}")),
        )
        .collect()
}
