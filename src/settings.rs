use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::aggregator::DEFAULT_TOP_SERVICES;
use crate::db::DB_FILE;
use crate::error::{ClinicError, Result};
use crate::normalizer::ColumnMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_top_services_limit")]
    pub top_services_limit: usize,
    /// Accepted header aliases per logical column.
    #[serde(default)]
    pub columns: ColumnMap,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_top_services_limit() -> usize {
    DEFAULT_TOP_SERVICES
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            log_level: default_log_level(),
            top_services_limit: default_top_services_limit(),
            columns: ColumnMap::default(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("clinicboard")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("clinicboard")
}

pub fn parse_settings(content: &str) -> Result<Settings> {
    serde_json::from_str(content).map_err(|e| ClinicError::Settings(e.to_string()))
}

/// Settings from disk, or defaults when the file is missing or unreadable.
pub fn load_settings() -> Settings {
    let path = settings_path();
    if !path.exists() {
        return Settings::default();
    }
    let content = std::fs::read_to_string(&path).unwrap_or_default();
    match parse_settings(&content) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable settings");
            Settings::default()
        }
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn get_data_dir() -> PathBuf {
    PathBuf::from(&load_settings().data_dir)
}

pub fn db_path() -> PathBuf {
    get_data_dir().join(DB_FILE)
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}
