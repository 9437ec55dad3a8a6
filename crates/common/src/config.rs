//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Image size-convergence settings.
    pub image: ImageDefaults,

    /// Video playback-capture settings.
    pub video: VideoDefaults,

    /// Audio extraction settings.
    pub audio: AudioDefaults,

    /// Remote link lookup settings.
    pub lookup: LookupConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Tuning for the image convergence loop.
///
/// Qualities are expressed in tenths (9 = 0.9) so the search walks an exact
/// grid instead of accumulating floating-point drift.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageDefaults {
    /// Quality of the first attempt, in tenths.
    pub initial_quality_tenths: u8,

    /// Quality at or below which the loop escalates to a dimension shrink.
    pub quality_floor_tenths: u8,

    /// Quality restored after every dimension shrink, in tenths.
    pub reset_quality_tenths: u8,

    /// Factor applied to both dimensions on escalation.
    pub scale_factor: f64,

    /// Attempt ceiling.
    pub max_attempts: u32,

    /// Default target size in KB.
    pub default_target_kb: u64,

    /// Smallest target the shell accepts, in KB.
    pub min_target_kb: u64,

    /// Largest target the shell accepts, in KB.
    pub max_target_kb: u64,
}

/// Bitrate budgeting and capture settings for video transcoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoDefaults {
    /// Default whole-file target in MB.
    pub default_target_mb: f64,

    /// Smallest target the shell accepts, in MB.
    pub min_target_mb: f64,

    /// Largest target the shell accepts, in MB.
    pub max_target_mb: f64,

    /// Share of the byte budget given to the video encoder.
    pub safety_factor: f64,

    /// Lowest bitrate ever requested, in bits per second.
    pub min_bitrate_bps: u64,

    /// Bitrate used while the duration is still unknown.
    pub fallback_bitrate_bps: u64,

    /// Output formats in order of preference.
    pub format_preference: Vec<String>,

    /// Playback volume used when audio is captured straight from the element.
    pub fallback_playback_volume: f64,

    /// How long to wait for the encoder to flush after playback ends.
    pub stop_grace_secs: u64,
}

/// Audio extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioDefaults {
    /// Output format for extracted audio.
    pub format: String,

    /// How long to wait for the encoder to flush after playback ends.
    pub stop_grace_secs: u64,
}

/// Remote link lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Lookup service endpoint.
    pub endpoint: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "mediashrink=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for ImageDefaults {
    fn default() -> Self {
        Self {
            initial_quality_tenths: 9,
            quality_floor_tenths: 1,
            reset_quality_tenths: 5,
            scale_factor: 0.8,
            max_attempts: 10,
            default_target_kb: 200,
            min_target_kb: 10,
            max_target_kb: 5000,
        }
    }
}

impl Default for VideoDefaults {
    fn default() -> Self {
        Self {
            default_target_mb: 4.0,
            min_target_mb: 1.0,
            max_target_mb: 20.0,
            safety_factor: 0.7,
            min_bitrate_bps: 100_000,
            fallback_bitrate_bps: 2_500_000,
            format_preference: vec![
                "video/webm; codecs=vp9".to_string(),
                "video/webm; codecs=vp8".to_string(),
                "video/webm; codecs=h264".to_string(),
                "video/webm".to_string(),
                "video/mp4".to_string(),
            ],
            fallback_playback_volume: 0.05,
            stop_grace_secs: 10,
        }
    }
}

impl Default for AudioDefaults {
    fn default() -> Self {
        Self {
            format: "audio/webm".to_string(),
            stop_grace_secs: 10,
        }
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://www.tikwm.com/api/".to_string(),
            timeout_secs: 15,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl ImageDefaults {
    /// Clamp a requested target into the accepted range, snapped to 10 KB steps.
    pub fn clamp_target_kb(&self, kb: u64) -> u64 {
        let snapped = (kb / 10) * 10;
        snapped.clamp(self.min_target_kb, self.max_target_kb)
    }
}

impl VideoDefaults {
    /// Clamp a requested target into the accepted range, snapped to 0.5 MB steps.
    pub fn clamp_target_mb(&self, mb: f64) -> f64 {
        if !mb.is_finite() {
            return self.default_target_mb;
        }
        let snapped = (mb * 2.0).round() / 2.0;
        snapped.clamp(self.min_target_mb, self.max_target_mb)
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("mediashrink").join("config.json")
}
