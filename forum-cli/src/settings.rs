use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use forum_client::HttpClientConfig;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub log_level: String,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_url = lookup("FORUM_API_URL")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let connect_timeout_secs = parse_u64(&lookup, "FORUM_CONNECT_TIMEOUT_SECS", 5)?;
        let request_timeout_secs = parse_u64(&lookup, "FORUM_REQUEST_TIMEOUT_SECS", 15)?;
        let log_level = lookup("LOG_LEVEL")
            .or_else(|| lookup("RUST_LOG"))
            .unwrap_or_else(|| "warn".to_string());

        Ok(Self {
            api_url,
            connect_timeout_secs,
            request_timeout_secs,
            log_level,
        })
    }

    /// `--server` из командной строки имеет приоритет над `FORUM_API_URL`.
    pub fn http_config(&self, server: Option<String>) -> HttpClientConfig {
        let base_url = normalize_server(server.unwrap_or_else(|| self.api_url.clone()));
        HttpClientConfig {
            base_url,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

pub fn normalize_server(server: String) -> String {
    if server.starts_with("http://") || server.starts_with("https://") {
        return server;
    }

    format!("http://{server}")
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<u64> {
    let value = lookup(key)
        .unwrap_or_else(|| default.to_string())
        .trim()
        .parse::<u64>()
        .with_context(|| format!("Failed to parse {key}, expecting positive integer"))?;

    if value == 0 {
        return Err(anyhow!("{key} must be > 0"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings_from(pairs: &[(&str, &str)]) -> Result<Settings> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_env_is_empty() {
        let settings = settings_from(&[]).expect("defaults");
        assert_eq!(settings.api_url, DEFAULT_API_URL);
        assert_eq!(settings.connect_timeout_secs, 5);
        assert_eq!(settings.request_timeout_secs, 15);
        assert_eq!(settings.log_level, "warn");
    }

    #[test]
    fn log_level_falls_back_to_rust_log() {
        let settings = settings_from(&[("RUST_LOG", "debug")]).expect("settings");
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = settings_from(&[("FORUM_REQUEST_TIMEOUT_SECS", "0")]).expect_err("zero");
        assert!(err.to_string().contains("FORUM_REQUEST_TIMEOUT_SECS"));
    }

    #[test]
    fn non_numeric_timeout_is_rejected() {
        assert!(settings_from(&[("FORUM_CONNECT_TIMEOUT_SECS", "soon")]).is_err());
    }

    #[test]
    fn server_flag_overrides_env_url() {
        let settings = settings_from(&[("FORUM_API_URL", "http://forum.local")]).expect("settings");

        let config = settings.http_config(Some("127.0.0.1:9999".to_string()));
        assert_eq!(config.base_url, "http://127.0.0.1:9999");

        let config = settings.http_config(None);
        assert_eq!(config.base_url, "http://forum.local");
        assert_eq!(config.request_timeout, Duration::from_secs(15));
    }

    #[test]
    fn normalize_server_keeps_scheme() {
        let s = normalize_server("https://example.com:8080".to_string());
        assert_eq!(s, "https://example.com:8080");
    }
}
