use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::pixel_format::PixelFormat;
use crate::protocol::FrameProtocol;
use crate::routing::RadioAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Reads box-addressed commands from serial and relays them over the radio
    Master,
    /// Receives radio messages and drives a strip
    Slave,
    /// Reads local commands from serial and drives its own strip
    Standalone,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub role: Role,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    pub serial: Option<SerialConfig>,
    pub radio: Option<RadioConfig>,
    /// Radio address of each box; the first entry is box 1.
    #[serde(default)]
    pub boxes: Vec<RadioAddress>,
    pub strip: Option<StripConfig>,
}

/// Operator-facing serial link.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SerialConfig {
    pub port: String,
    #[serde(default = "default_serial_baud_rate")]
    pub baud_rate: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RadioConfig {
    /// Local UDP socket standing in for the radio.
    pub bind: SocketAddr,
    /// This node's own radio address.
    pub address: RadioAddress,
    #[serde(default = "default_channel")]
    pub channel: u8,
    /// Where each known radio address can be reached.
    #[serde(default)]
    pub peers: BTreeMap<RadioAddress, SocketAddr>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripConfig {
    pub port: String,
    #[serde(default)]
    pub protocol: FrameProtocol,
    pub baud_rate: u32,
    #[serde(default = "default_led_count")]
    pub led_count: usize,
    #[serde(default = "default_brightness")]
    pub brightness: u8,
    #[serde(default)]
    pub pixel_format: PixelFormat,
}

fn default_poll_interval_ms() -> u64 {
    10
}

fn default_heartbeat_secs() -> u64 {
    15
}

fn default_serial_baud_rate() -> u32 {
    115200
}

fn default_channel() -> u8 {
    1
}

fn default_led_count() -> usize {
    81
}

fn default_brightness() -> u8 {
    96
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .context(format!("Failed to read config {}", path.display()))?;
        let config: Config = serde_json::from_str(&data)
            .context(format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs.max(1))
    }

    /// Check that the sections the role needs are present.
    pub fn validate(&self) -> Result<()> {
        let needs_serial = matches!(self.role, Role::Master | Role::Standalone);
        let needs_radio = matches!(self.role, Role::Master | Role::Slave);
        let needs_strip = matches!(self.role, Role::Slave | Role::Standalone);

        if needs_serial && self.serial.is_none() {
            anyhow::bail!("{:?} role requires a \"serial\" section", self.role);
        }
        if needs_radio && self.radio.is_none() {
            anyhow::bail!("{:?} role requires a \"radio\" section", self.role);
        }
        if needs_strip && self.strip.is_none() {
            anyhow::bail!("{:?} role requires a \"strip\" section", self.role);
        }
        if self.role == Role::Master && self.boxes.is_empty() {
            log::warn!("Routing table is empty; every command will be rejected");
        }

        Ok(())
    }
}
