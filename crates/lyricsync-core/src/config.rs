//! Configuration types.
//!
//! The top-level [`Config`] struct carries the player and clock sections.
//! Every section defaults sensibly so a completely empty file is valid.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub player: PlayerConfig,
    pub clock: ClockConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.player.fps.is_nan() || self.player.fps <= 0.0 {
            warnings.push(format!(
                "player.fps is {}; falling back to {}",
                self.player.fps,
                default_fps()
            ));
        } else if self.player.fps > 240.0 {
            warnings.push(format!(
                "player.fps {} is above 240; ticks will be limited by the clock",
                self.player.fps
            ));
        }

        if self.player.throttle_interval_ms == 0 {
            warnings.push(
                "player.throttle_interval_ms is 0; throttled updates fire on every tick".into(),
            );
        }

        if self.player.text_char_duration_ms <= 0.0 {
            warnings.push("player.text_char_duration_ms must be positive".into());
        }

        if self.player.event_capacity == 0 {
            warnings.push("player.event_capacity is 0; using 1".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Sync loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Desired frames per second; `wait = 1000 / fps`.
    pub fps: f64,
    /// Minimum interval between throttled time updates.
    pub throttle_interval_ms: u64,
    /// Per-character duration used when building a video from plain text.
    pub text_char_duration_ms: f64,
    /// Buffer size of the player event broadcast channel.
    pub event_capacity: usize,
}

impl PlayerConfig {
    /// Desired tick interval in milliseconds.
    pub fn wait_ms(&self) -> f64 {
        if self.fps > 0.0 {
            1000.0 / self.fps
        } else {
            1000.0 / default_fps()
        }
    }

    /// Throttle interval as a [`Duration`].
    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_interval_ms)
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            throttle_interval_ms: 100,
            text_char_duration_ms: 250.0,
            event_capacity: 256,
        }
    }
}

fn default_fps() -> f64 {
    30.0
}

/// Which clock implementation the binary installs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockKind {
    /// Silent wall-clock timer.
    #[default]
    Basic,
    /// Host-driven clock; positions are pushed from outside.
    Manual,
}

/// Playback clock settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    pub kind: ClockKind,
    /// Pause automatically when the position reaches the end of the video.
    pub stop_at_end: bool,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            kind: ClockKind::Basic,
            stop_at_end: true,
        }
    }
}
