use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "config/client.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Endpoint WebSocket của backend hỗ trợ
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Base URL của REST API (lịch sử chat, gửi fallback)
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            api_base_url: default_api_base_url(),
        }
    }
}

fn default_server_url() -> String {
    "wss://support.rentwheels.app/ws".to_string()
}

fn default_api_base_url() -> String {
    "https://support.rentwheels.app/api".to_string()
}

pub fn load_config(path: &str) -> AppConfig {
    let path = Path::new(path);
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse config file {}: {err}", path.display());
                AppConfig::default()
            }
        },
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            AppConfig::default()
        }
    }
}

pub fn save_config(path: &str, config: &AppConfig) -> std::io::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)
}

/// Ghi lại endpoint do người dùng override qua CLI cho các lần chạy sau.
pub fn persist_server_url(path: &str, server_url: &str) {
    let mut config = load_config(path);
    config.server_url = server_url.to_string();

    if let Err(err) = save_config(path, &config) {
        log::error!("Failed to write config {}: {err}", path);
    } else {
        log::info!("Persisted server url {} to {}", server_url, path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let config = load_config("does/not/exist.json");
        assert_eq!(config.server_url, default_server_url());
        assert_eq!(config.api_base_url, default_api_base_url());
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"server_url": "ws://localhost:9100/ws"}"#).unwrap();
        assert_eq!(config.server_url, "ws://localhost:9100/ws");
        assert_eq!(config.api_base_url, default_api_base_url());
    }
}
