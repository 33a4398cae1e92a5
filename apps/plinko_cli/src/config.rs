use std::{collections::HashMap, fs, path::Path, time::Duration};

use anyhow::{bail, Context};
use client_core::PlaybackTiming;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";
const CONFIG_FILE: &str = "plinko.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    pub lead_in_ms: u64,
    pub tick_ms: u64,
    pub settle_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            request_timeout_ms: 10_000,
            lead_in_ms: 500,
            tick_ms: 300,
            settle_ms: 300,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn playback_timing(&self) -> PlaybackTiming {
        PlaybackTiming {
            lead_in: Duration::from_millis(self.lead_in_ms),
            tick: Duration::from_millis(self.tick_ms),
            settle: Duration::from_millis(self.settle_ms),
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();
    apply_file(&mut settings, Path::new(CONFIG_FILE));
    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file(settings: &mut Settings, path: &Path) {
    let Ok(raw) = fs::read_to_string(path) else {
        return;
    };
    match toml::from_str::<HashMap<String, String>>(&raw) {
        Ok(file_cfg) => apply_pairs(settings, |key| file_cfg.get(key).cloned()),
        Err(err) => tracing::warn!("ignoring unreadable {}: {err}", path.display()),
    }
}

fn apply_pairs(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("api_base_url") {
        settings.api_base_url = v;
    }
    set_millis(&mut settings.request_timeout_ms, lookup("request_timeout_ms"));
    set_millis(&mut settings.lead_in_ms, lookup("lead_in_ms"));
    set_millis(&mut settings.tick_ms, lookup("tick_ms"));
    set_millis(&mut settings.settle_ms, lookup("settle_ms"));
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("PLINKO_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = lookup("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }
    set_millis(
        &mut settings.request_timeout_ms,
        lookup("APP__REQUEST_TIMEOUT_MS"),
    );
    set_millis(&mut settings.lead_in_ms, lookup("APP__LEAD_IN_MS"));
    set_millis(&mut settings.tick_ms, lookup("APP__TICK_MS"));
    set_millis(&mut settings.settle_ms, lookup("APP__SETTLE_MS"));
}

fn set_millis(slot: &mut u64, raw: Option<String>) {
    let Some(raw) = raw else {
        return;
    };
    match raw.trim().parse::<u64>() {
        Ok(parsed) => *slot = parsed,
        Err(_) => tracing::warn!("ignoring non-numeric duration '{raw}'"),
    }
}

/// Trims whitespace and trailing slashes and checks the result is an http(s) URL.
pub fn normalize_base_url(raw: &str) -> anyhow::Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(DEFAULT_API_BASE_URL.to_string());
    }

    let parsed =
        Url::parse(trimmed).with_context(|| format!("invalid authority base url '{trimmed}'"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!(
            "authority base url '{trimmed}' must use http or https, not '{}'",
            parsed.scheme()
        );
    }
    Ok(trimmed.to_string())
}
