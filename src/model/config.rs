use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULTS: &str = include_str!("../../config/default.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub interface: InterfaceConfig,
    pub editor: EditorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    pub item_path: String,
    pub saved_feedback_ms: u64,
}

/// Which interface the host mounts and the option values it passes in.
#[derive(Debug, Clone, Deserialize)]
pub struct InterfaceConfig {
    pub id: String,
    #[serde(default)]
    pub options: HashMap<String, toml::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditorConfig {
    pub scroll_off: u16,
}

impl AppConfig {
    /// Load configuration with layering: defaults → user config.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::user_config_path().as_deref())
    }

    /// Same as [`load`](Self::load) with an explicit user config path. A
    /// missing file means "defaults only".
    pub fn load_from(user_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut merged = parse_table(DEFAULTS, "default config")?;

        if let Some(path) = user_path
            && path.exists()
        {
            let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let user = parse_table(&raw, &path.display().to_string())?;
            merge_tables(&mut merged, user);
            tracing::debug!("user config merged from {}", path.display());
        }

        let mut config: AppConfig =
            toml::Value::Table(merged)
                .try_into()
                .map_err(|source| ConfigError::Parse {
                    origin: "merged config".to_string(),
                    source,
                })?;

        if config.general.item_path.starts_with('~') {
            let home = dirs_home().ok_or(ConfigError::NoHomeDir)?;
            config.general.item_path =
                config
                    .general
                    .item_path
                    .replacen('~', &home.to_string_lossy(), 1);
        }

        Ok(config)
    }

    pub fn user_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "autosave")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn item_path(&self) -> PathBuf {
        PathBuf::from(&self.general.item_path)
    }

    pub fn feedback_window(&self) -> Duration {
        Duration::from_millis(self.general.saved_feedback_ms)
    }
}

fn parse_table(raw: &str, origin: &str) -> Result<toml::Table, ConfigError> {
    toml::from_str(raw).map_err(|source| ConfigError::Parse {
        origin: origin.to_string(),
        source,
    })
}

/// Overlay `overlay` onto `base`; nested tables merge key by key, every other
/// value replaces.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        let value = match value {
            toml::Value::Table(overlay_table) => match base.get_mut(&key) {
                Some(toml::Value::Table(base_table)) => {
                    merge_tables(base_table, overlay_table);
                    continue;
                }
                _ => toml::Value::Table(overlay_table),
            },
            other => other,
        };
        base.insert(key, value);
    }
}

fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}
