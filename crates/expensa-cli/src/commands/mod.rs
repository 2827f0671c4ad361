//! CLI subcommands.

pub mod config;
pub mod extract;
pub mod lifecycle;

use std::path::{Path, PathBuf};

use expensa_core::ExpensaConfig;

/// Platform config location, e.g. `~/.config/expensa/config.json`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("expensa")
        .join("config.json")
}

/// The `--config` path if given, otherwise the platform default.
pub fn resolve_config_path(explicit: Option<&str>) -> PathBuf {
    explicit.map(PathBuf::from).unwrap_or_else(default_config_path)
}

/// Load configuration. An explicit path must exist; the default path falls back to defaults.
pub fn load_config(explicit: Option<&str>) -> anyhow::Result<ExpensaConfig> {
    if let Some(path) = explicit {
        return Ok(ExpensaConfig::from_file(Path::new(path))?);
    }

    let path = default_config_path();
    if path.exists() {
        Ok(ExpensaConfig::from_file(&path)?)
    } else {
        Ok(ExpensaConfig::default())
    }
}
