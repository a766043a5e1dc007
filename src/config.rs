//! Configuration
//!
//! `ExtensionSettings` mirrors the externally stored settings document and is
//! read-only to the engine. `AudioConfiguration` is the resolved, immutable
//! configuration a patch session runs with. `EngineOptions` carries the
//! engine's own tunables.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ============================================================================
// Modes and Variants
// ============================================================================

/// How the two input channels are folded onto the stereo output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StereoMode {
    Left,
    Right,
    #[default]
    Average,
}

impl StereoMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StereoMode::Left => "left",
            StereoMode::Right => "right",
            StereoMode::Average => "average",
        }
    }
}

impl FromStr for StereoMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "left" => Ok(StereoMode::Left),
            "right" => Ok(StereoMode::Right),
            "average" => Ok(StereoMode::Average),
            _ => Err(ConfigError::UnknownMode(s.to_string())),
        }
    }
}

impl fmt::Display for StereoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vocal isolation algorithm, ordered from cheapest to heaviest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VocalIsolationVariant {
    Basic,
    #[default]
    Enhanced,
    Spectral,
}

impl VocalIsolationVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            VocalIsolationVariant::Basic => "basic",
            VocalIsolationVariant::Enhanced => "enhanced",
            VocalIsolationVariant::Spectral => "spectral",
        }
    }

    /// Whether the graph gets the high-pass and dynamics stages
    pub fn uses_dynamics(&self) -> bool {
        *self >= VocalIsolationVariant::Enhanced
    }
}

impl FromStr for VocalIsolationVariant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(VocalIsolationVariant::Basic),
            "enhanced" => Ok(VocalIsolationVariant::Enhanced),
            "spectral" => Ok(VocalIsolationVariant::Spectral),
            _ => Err(ConfigError::UnknownVariant(s.to_string())),
        }
    }
}

impl fmt::Display for VocalIsolationVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Audio Configuration
// ============================================================================

/// Resolved configuration for one patch session.
///
/// Immutable; a settings change means re-patching with a new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioConfiguration {
    pub mode: StereoMode,
    pub vocal_isolation_enabled: bool,
    pub vocal_isolation_variant: VocalIsolationVariant,
}

impl AudioConfiguration {
    pub fn stereo(mode: StereoMode) -> Self {
        Self {
            mode,
            vocal_isolation_enabled: false,
            vocal_isolation_variant: VocalIsolationVariant::default(),
        }
    }

    pub fn with_isolation(mode: StereoMode, variant: VocalIsolationVariant) -> Self {
        Self {
            mode,
            vocal_isolation_enabled: true,
            vocal_isolation_variant: variant,
        }
    }
}

// ============================================================================
// Settings Document
// ============================================================================

/// The stored settings document, as written by the settings UI
///
/// ```json
/// { "enabled": true, "mode": "average", "musicRemoval": false,
///   "vocalIsolationVariant": "enhanced" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default)]
    pub music_removal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vocal_isolation_variant: Option<String>,
}

impl ExtensionSettings {
    /// Parse a settings document from JSON
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Resolve into the engine configuration, applying schema defaults
    pub fn audio_configuration(&self) -> Result<AudioConfiguration, ConfigError> {
        let mode = match &self.mode {
            Some(mode) => mode.parse()?,
            None => StereoMode::default(),
        };
        let variant = match &self.vocal_isolation_variant {
            Some(variant) => variant.parse()?,
            None => VocalIsolationVariant::default(),
        };
        Ok(AudioConfiguration {
            mode,
            vocal_isolation_enabled: self.music_removal,
            vocal_isolation_variant: variant,
        })
    }
}

// ============================================================================
// Engine Options
// ============================================================================

/// Default debounce window for rescans after DOM mutations
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;

/// Default minimum interval between spectral fault log entries
pub const DEFAULT_FAULT_LOG_INTERVAL_MS: u64 = 5000;

/// Default upper bound on the asynchronous spectral model load
pub const DEFAULT_SPECTRAL_LOAD_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub debounce_ms: u64,
    pub fault_log_interval_ms: u64,
    pub spectral_load_timeout_ms: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            fault_log_interval_ms: DEFAULT_FAULT_LOG_INTERVAL_MS,
            spectral_load_timeout_ms: DEFAULT_SPECTRAL_LOAD_TIMEOUT_MS,
        }
    }
}

impl EngineOptions {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn fault_log_interval(&self) -> Duration {
        Duration::from_millis(self.fault_log_interval_ms)
    }

    pub fn spectral_load_timeout(&self) -> Duration {
        Duration::from_millis(self.spectral_load_timeout_ms)
    }
}
