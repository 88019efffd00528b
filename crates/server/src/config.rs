use std::fs;

use anyhow::Context;
use serde::Deserialize;
use shared::template::{OperatingWindow, SlotTemplate};

const SETTINGS_FILE: &str = "server.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub open_at: String,
    pub close_at: String,
    pub slot_minutes: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            open_at: "8:00 AM".into(),
            close_at: "4:00 PM".into(),
            slot_minutes: 30,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    bind_addr: Option<String>,
    open_at: Option<String>,
    close_at: Option<String>,
    slot_minutes: Option<u32>,
}

impl Settings {
    pub fn template(&self) -> anyhow::Result<SlotTemplate> {
        let window = OperatingWindow::parse(&self.open_at, &self.close_at, self.slot_minutes)
            .context("invalid operating window")?;
        SlotTemplate::from_window(&window).context("invalid operating window")
    }
}

pub fn load_settings() -> anyhow::Result<Settings> {
    let raw = fs::read_to_string(SETTINGS_FILE).ok();
    load_settings_from(raw.as_deref(), |key| std::env::var(key).ok())
}

pub(crate) fn load_settings_from(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        let file_cfg: FileSettings =
            toml::from_str(raw).with_context(|| format!("failed to parse {SETTINGS_FILE}"))?;
        if let Some(v) = file_cfg.bind_addr {
            settings.server_bind = v;
        }
        if let Some(v) = file_cfg.open_at {
            settings.open_at = v;
        }
        if let Some(v) = file_cfg.close_at {
            settings.close_at = v;
        }
        if let Some(v) = file_cfg.slot_minutes {
            settings.slot_minutes = v;
        }
    }

    if let Some(v) = env("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = env("APP__OPEN_AT") {
        settings.open_at = v;
    }
    if let Some(v) = env("APP__CLOSE_AT") {
        settings.close_at = v;
    }

    if let Some(v) = env("APP__SLOT_MINUTES") {
        settings.slot_minutes = v
            .parse()
            .with_context(|| format!("APP__SLOT_MINUTES must be a whole number, got '{v}'"))?;
    }

    Ok(settings)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
