use anyhow::{Context, Result};
use std::path::PathBuf;

/// Returns the user config directory (~/.config/portblock/)
pub fn user_config_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .context(
            "Could not determine home directory. Please ensure HOME environment variable is set.",
        )
        .map(|p| p.join(".config").join("portblock"))
}

/// Returns the user config file path (~/.config/portblock/config.json)
pub fn user_config_file() -> Result<PathBuf> {
    Ok(user_config_dir()?.join("config.json"))
}

/// Ensures the user config directory exists
pub fn ensure_user_config_dir() -> Result<()> {
    std::fs::create_dir_all(user_config_dir()?)?;
    Ok(())
}

/// Returns the project config directory relative to a given root
pub fn project_config_dir_in(root: &std::path::Path) -> PathBuf {
    root.join(".portblock")
}

/// Returns the settings file path relative to a given root
pub fn settings_file_in(root: &std::path::Path) -> PathBuf {
    project_config_dir_in(root).join("settings.json")
}
