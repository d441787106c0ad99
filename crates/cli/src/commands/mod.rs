pub mod config_cmd;
pub mod doctor;
pub mod serve;
pub mod status;
pub mod sweep;

use rpgforge_config::AppConfig;
use std::path::{Path, PathBuf};

/// The config file to use: `--config` if given, else `~/.rpgforge/config.toml`.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

pub fn load_config(path: &Path) -> Result<AppConfig, Box<dyn std::error::Error>> {
    AppConfig::load_with_env(path).map_err(|e| format!("Failed to load config: {e}").into())
}
