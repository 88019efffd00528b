use std::time::Duration;

use anyhow::Context;
use config::{Config, Environment, File};
use serde::Deserialize;
use shared::template::{OperatingWindow, SlotTemplate};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_TIMEOUT_SECS: i64 = 10;
const DEFAULT_OPEN_AT: &str = "8:00 AM";
const DEFAULT_CLOSE_AT: &str = "4:00 PM";
const DEFAULT_SLOT_MINUTES: i64 = 30;

#[derive(Debug, Clone, Deserialize)]
pub struct BoardSettings {
    pub server_url: String,
    pub request_timeout_secs: u64,
    pub open_at: String,
    pub close_at: String,
    pub slot_minutes: u32,
}

impl BoardSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn template(&self) -> anyhow::Result<SlotTemplate> {
        let window = OperatingWindow::parse(&self.open_at, &self.close_at, self.slot_minutes)
            .context("invalid operating window")?;
        SlotTemplate::from_window(&window).context("invalid operating window")
    }
}

/// `board.toml` in the working directory, then `BOARD_*` environment variables.
pub fn load_board_settings() -> anyhow::Result<BoardSettings> {
    with_defaults(Config::builder())?
        .add_source(File::with_name("board").required(false))
        .add_source(Environment::with_prefix("BOARD"))
        .build()
        .context("failed to read board settings")?
        .try_deserialize()
        .context("invalid board settings")
}

fn with_defaults(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> anyhow::Result<config::ConfigBuilder<config::builder::DefaultState>> {
    Ok(builder
        .set_default("server_url", DEFAULT_SERVER_URL)?
        .set_default("request_timeout_secs", DEFAULT_TIMEOUT_SECS)?
        .set_default("open_at", DEFAULT_OPEN_AT)?
        .set_default("close_at", DEFAULT_CLOSE_AT)?
        .set_default("slot_minutes", DEFAULT_SLOT_MINUTES)?)
}
