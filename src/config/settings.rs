use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;

use super::paths;

/// User-scoped settings (~/.config/portblock/config.json)
/// These are personal preferences that apply across all projects
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    /// Preferred base port hint, e.g. to keep developers on one machine
    /// out of each other's blocks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_port_hint: Option<u16>,

    /// Address to claim blocks on (e.g. "127.0.0.1", "::1")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl UserSettings {
    /// Load user settings from ~/.config/portblock/config.json
    pub fn load() -> Result<Option<Self>> {
        let config_path = paths::user_config_file()?;
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let settings: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;
        Ok(Some(settings))
    }

    /// Save user settings to ~/.config/portblock/config.json
    pub fn save(&self) -> Result<()> {
        paths::ensure_user_config_dir()?;
        let config_path = paths::user_config_file()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        Ok(())
    }
}

/// Team-shared settings (committed to repo)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_range_size")]
    pub range_size: u16,

    /// Position of the lock port relative to the base port, -1 to rangeSize
    #[serde(default = "default_lock_offset")]
    pub lock_offset: i32,

    /// Round an unaligned hint up to the next multiple of rangeSize
    #[serde(default)]
    pub align_hint: bool,

    /// Address to claim blocks on (optional, overrides user setting)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Base port hint (optional, overrides user setting)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_port_hint: Option<u16>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            range_size: default_range_size(),
            lock_offset: default_lock_offset(),
            align_hint: false,
            address: None,
            base_port_hint: None,
        }
    }
}

fn default_range_size() -> u16 {
    10
}
fn default_lock_offset() -> i32 {
    -1
}
fn default_address() -> String {
    "127.0.0.1".to_string()
}
fn default_base_port_hint() -> u16 {
    50000
}

/// Merged settings for runtime use
#[derive(Debug, Clone)]
pub struct MergedSettings {
    pub range_size: u16,
    pub lock_offset: i32,
    pub align_hint: bool,
    pub address: IpAddr,
    pub base_port_hint: u16,
}

impl MergedSettings {
    /// Load and merge settings from a specific root directory
    /// Priority: project settings > user settings > defaults
    pub fn load_from(root: &Path) -> Result<Self> {
        let settings_path = paths::settings_file_in(root);

        // Load project settings
        let settings: Settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)
                .with_context(|| format!("Failed to read {}", settings_path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", settings_path.display()))?
        } else {
            Settings::default()
        };

        // Load user settings
        let user_settings = UserSettings::load()?.unwrap_or_default();

        // Merge with priority: project > user > default
        let address = settings
            .address
            .or(user_settings.address)
            .unwrap_or_else(default_address);
        let base_port_hint = settings
            .base_port_hint
            .or(user_settings.base_port_hint)
            .unwrap_or_else(default_base_port_hint);

        Ok(Self {
            range_size: settings.range_size,
            lock_offset: settings.lock_offset,
            align_hint: settings.align_hint,
            address: parse_address(&address)?,
            base_port_hint,
        })
    }
}

/// Parse a configured address into an IpAddr
pub fn parse_address(address: &str) -> Result<IpAddr> {
    address
        .parse()
        .with_context(|| format!("Invalid address: {}", address))
}

/// Save settings to file
pub fn save_settings(settings: &Settings, root: &Path) -> Result<()> {
    let settings_path = paths::settings_file_in(root);
    let content = serde_json::to_string_pretty(settings)?;
    std::fs::write(&settings_path, content)
        .with_context(|| format!("Failed to write {}", settings_path.display()))?;
    Ok(())
}
