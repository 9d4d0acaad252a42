//! Session configuration
//!
//! Read from an optional JSON file. Every field has a default, so a partial
//! or empty file is valid and a missing or broken one falls back entirely.

use crate::link::connection::ReconnectPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

fn default_endpoint() -> String {
    "ws://localhost:8080".to_string()
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_base_delay_ms() -> u64 {
    2000
}

fn default_frame_interval_ms() -> u64 {
    33
}

fn default_osc_points() -> usize {
    768
}

fn default_fft_bins() -> usize {
    384
}

fn default_sampling_rate() -> u32 {
    1000
}

fn default_sampling_rate_min() -> u32 {
    100
}

fn default_sampling_rate_max() -> u32 {
    10_000
}

fn default_sampling_rate_step() -> u32 {
    100
}

fn default_status_led_every() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

/// Configuration of one acquisition session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Instrument WebSocket URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Reconnect attempts before giving up
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Attempt `n` waits `n × reconnect_base_delay_ms`
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    /// Target frame interval (~30 Hz)
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    /// Points requested and synthesized per oscilloscope frame
    #[serde(default = "default_osc_points")]
    pub osc_points: usize,
    /// Bins requested and synthesized per spectrum frame
    #[serde(default = "default_fft_bins")]
    pub fft_bins: usize,
    /// Initial sampling-rate control value (Hz)
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: u32,
    #[serde(default = "default_sampling_rate_min")]
    pub sampling_rate_min: u32,
    #[serde(default = "default_sampling_rate_max")]
    pub sampling_rate_max: u32,
    #[serde(default = "default_sampling_rate_step")]
    pub sampling_rate_step: u32,
    /// Ticks between status indicator updates
    #[serde(default = "default_status_led_every")]
    pub status_led_every: u64,
    /// Cycle the status indicator on the low-frequency tick
    #[serde(default = "default_true")]
    pub simulate_status_led: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            frame_interval_ms: default_frame_interval_ms(),
            osc_points: default_osc_points(),
            fft_bins: default_fft_bins(),
            sampling_rate: default_sampling_rate(),
            sampling_rate_min: default_sampling_rate_min(),
            sampling_rate_max: default_sampling_rate_max(),
            sampling_rate_step: default_sampling_rate_step(),
            status_led_every: default_status_led_every(),
            simulate_status_led: default_true(),
        }
    }
}

impl SessionConfig {
    /// Load config from `path`, falling back to defaults on any error
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "Loaded config from disk");
                    config
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!(path = %path.display(), "No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save config to disk, creating parent directories if needed
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "Config saved to disk");
        Ok(())
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            self.max_reconnect_attempts,
            Duration::from_millis(self.reconnect_base_delay_ms),
        )
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}
