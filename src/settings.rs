//! Clipper settings: endpoints, auth-callback routes, and timing knobs

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

const APP_DIR_NAME: &str = "NovaTrekClipper";
const SETTINGS_FILENAME: &str = "settings.json";

/// Environment variable overriding the remote API base URL.
pub const API_BASE_ENV: &str = "NOVATREK_API_BASE";

/// Settings structure shared with the browser shim
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClipperSettings {
    pub api_base_url: String,
    pub bridge_addr: String,
    /// Hosts on which the auth-callback page may live.
    pub auth_callback_hosts: Vec<String>,
    /// Path prefix of the auth-callback route.
    pub auth_callback_path: String,
    pub dom_poll_interval_ms: u64,
    pub dom_poll_window_ms: u64,
    pub badge_reset_ms: u64,
    pub tab_close_delay_ms: u64,
    pub show_notifications: bool,
}

impl Default for ClipperSettings {
    fn default() -> Self {
        Self {
            api_base_url: "https://novatrek.app".to_string(),
            bridge_addr: "127.0.0.1:8942".to_string(),
            auth_callback_hosts: vec!["novatrek.app".to_string(), "www.novatrek.app".to_string()],
            auth_callback_path: "/auth/extension".to_string(),
            dom_poll_interval_ms: 100,
            dom_poll_window_ms: 10_000,
            badge_reset_ms: 2_000,
            tab_close_delay_ms: 1_500,
            show_notifications: true,
        }
    }
}

impl ClipperSettings {
    /// Load settings from the data directory, falling back to defaults.
    ///
    /// `NOVATREK_API_BASE` overrides the stored API base URL either way.
    pub fn load() -> Self {
        let mut settings: Self = settings_path()
            .ok()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|contents| serde_json::from_str(&contents).ok())
            .unwrap_or_default();

        if let Ok(base) = std::env::var(API_BASE_ENV) {
            if !base.is_empty() {
                settings.api_base_url = base;
            }
        }

        settings
    }

    /// Persist settings to the data directory.
    pub fn save(&self) -> Result<()> {
        let path = settings_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create settings directory")?;
        }
        let payload =
            serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(&path, payload).context("Failed to write settings")?;
        Ok(())
    }

    /// Whether a URL points at the auth-callback page of the web app.
    ///
    /// Matches host against the allow-list and the path against the
    /// configured prefix; query and fragment are ignored.
    pub fn is_auth_callback(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        self.auth_callback_hosts.iter().any(|h| h == host)
            && url.path().starts_with(&self.auth_callback_path)
    }

    pub fn dom_poll_interval(&self) -> Duration {
        Duration::from_millis(self.dom_poll_interval_ms)
    }

    pub fn dom_poll_window(&self) -> Duration {
        Duration::from_millis(self.dom_poll_window_ms)
    }

    pub fn badge_reset(&self) -> Duration {
        Duration::from_millis(self.badge_reset_ms)
    }

    pub fn tab_close_delay(&self) -> Duration {
        Duration::from_millis(self.tab_close_delay_ms)
    }
}

fn settings_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().context("Could not determine data directory")?;
    Ok(data_dir.join(APP_DIR_NAME).join(SETTINGS_FILENAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_json() {
        let settings = ClipperSettings::default();
        let payload = serde_json::to_string(&settings).unwrap();
        let parsed: ClipperSettings = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed.api_base_url, settings.api_base_url);
        assert_eq!(parsed.badge_reset_ms, 2_000);
        assert_eq!(parsed.dom_poll_interval_ms, 100);
    }

    #[test]
    fn partial_settings_fill_in_defaults() {
        let parsed: ClipperSettings =
            serde_json::from_str(r#"{"apiBaseUrl":"http://localhost:3000"}"#).unwrap();
        assert_eq!(parsed.api_base_url, "http://localhost:3000");
        assert_eq!(parsed.dom_poll_window_ms, 10_000);
    }

    #[test]
    fn auth_callback_requires_allowed_host_and_path() {
        let settings = ClipperSettings::default();
        let hit = Url::parse("https://novatrek.app/auth/extension?token=abc").unwrap();
        let wrong_host = Url::parse("https://evil.example/auth/extension").unwrap();
        let wrong_path = Url::parse("https://novatrek.app/trips").unwrap();

        assert!(settings.is_auth_callback(&hit));
        assert!(!settings.is_auth_callback(&wrong_host));
        assert!(!settings.is_auth_callback(&wrong_path));
    }
}
