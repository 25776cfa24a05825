use std::{collections::HashMap, fs, path::Path, time::Duration};

use tracing::warn;

use crate::listing::{DEFAULT_PAGE_SIZE, SEARCH_DEBOUNCE};

pub const SETTINGS_FILE: &str = "vendor_portal.toml";

/// What the network layer does when the API answers 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthorizedPolicy {
    /// Hand the failure back to the caller and leave the session alone.
    Ignore,
    /// Drop the session silently; protected routes then redirect.
    Demote,
    /// End the session with an expiry notice and navigate to sign-in.
    SignOut,
}

impl UnauthorizedPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ignore" => Some(Self::Ignore),
            "demote" => Some(Self::Demote),
            "sign_out" | "signout" | "sign-out" => Some(Self::SignOut),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub database_url: String,
    pub request_timeout_secs: u64,
    pub page_size: u32,
    pub search_debounce_ms: u64,
    pub unauthorized_policy: UnauthorizedPolicy,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:5000".into(),
            database_url: "sqlite://./data/vendor_session.db".into(),
            request_timeout_secs: 30,
            page_size: DEFAULT_PAGE_SIZE,
            search_debounce_ms: SEARCH_DEBOUNCE.as_millis() as u64,
            unauthorized_policy: UnauthorizedPolicy::Demote,
        }
    }
}

impl ClientSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

/// Defaults, then `vendor_portal.toml` in the working directory, then the
/// environment.
pub fn load_settings() -> ClientSettings {
    let mut settings = load_settings_from(Path::new(SETTINGS_FILE));
    apply_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

pub fn load_settings_from(path: &Path) -> ClientSettings {
    let mut settings = ClientSettings::default();

    let Ok(raw) = fs::read_to_string(path) else {
        return settings;
    };
    match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
        Ok(file_cfg) => {
            apply_overrides(&mut settings, |key| {
                let key = key
                    .trim_start_matches("VENDOR_PORTAL__")
                    .to_ascii_lowercase();
                file_cfg.get(&key).map(|value| match value {
                    toml::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
            });
        }
        Err(err) => warn!(path = %path.display(), error = %err, "ignoring unreadable settings file"),
    }

    settings
}

pub fn apply_overrides(settings: &mut ClientSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = lookup("VENDOR_PORTAL__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = lookup("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = lookup("VENDOR_PORTAL__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = lookup("VENDOR_PORTAL__REQUEST_TIMEOUT_SECS") {
        match v.parse::<u64>() {
            Ok(parsed) if parsed > 0 => settings.request_timeout_secs = parsed,
            _ => warn!(value = %v, "ignoring invalid request timeout"),
        }
    }

    if let Some(v) = lookup("VENDOR_PORTAL__PAGE_SIZE") {
        match v.parse::<u32>() {
            Ok(parsed) if parsed > 0 => settings.page_size = parsed,
            _ => warn!(value = %v, "ignoring invalid page size"),
        }
    }

    if let Some(v) = lookup("VENDOR_PORTAL__SEARCH_DEBOUNCE_MS") {
        match v.parse::<u64>() {
            Ok(parsed) => settings.search_debounce_ms = parsed,
            Err(_) => warn!(value = %v, "ignoring invalid search debounce"),
        }
    }

    if let Some(v) = lookup("VENDOR_PORTAL__UNAUTHORIZED_POLICY") {
        match UnauthorizedPolicy::parse(&v) {
            Some(policy) => settings.unauthorized_policy = policy,
            None => warn!(value = %v, "ignoring unknown unauthorized policy"),
        }
    }
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
