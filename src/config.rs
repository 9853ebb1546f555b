//! Configuration types for the playback runtime.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReelConfig {
    /// Tool-call normalizer settings.
    pub normalizer: NormalizerConfig,
    /// Realtime deduplication settings.
    pub dedup: DedupConfig,
    /// Playback coordinator timing.
    pub playback: PlaybackConfig,
    /// Storage collaborator (signed URLs).
    pub storage: StorageConfig,
    /// Tracking collaborator.
    pub tracking: TrackingConfig,
}

/// Tool-call normalizer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Extract commands from `conversation.utterance` speech when the
    /// platform sends no explicit tool call.
    ///
    /// This is a best-effort heuristic and is off unless explicitly enabled.
    pub utterance_fallback: bool,
}

/// Realtime event deduplication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Interval in ms during which an identical forwarded call is dropped.
    pub window_ms: u64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self { window_ms: 1_500 }
    }
}

impl DedupConfig {
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Playback coordinator timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Suppression window opened by pause and resume, in ms.
    pub suppression_window_ms: u64,
    /// Suppression window opened by close, in ms.
    pub close_suppression_ms: u64,
    /// Delay between closing the player and revealing the trial CTA, in ms.
    pub cta_reveal_delay_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            suppression_window_ms: 1_500,
            close_suppression_ms: 1_000,
            cta_reveal_delay_ms: 800,
        }
    }
}

impl PlaybackConfig {
    #[must_use]
    pub fn suppression_window(&self) -> Duration {
        Duration::from_millis(self.suppression_window_ms)
    }

    #[must_use]
    pub fn close_suppression(&self) -> Duration {
        Duration::from_millis(self.close_suppression_ms)
    }

    #[must_use]
    pub fn cta_reveal_delay(&self) -> Duration {
        Duration::from_millis(self.cta_reveal_delay_ms)
    }
}

/// Storage collaborator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Endpoint that exchanges a stored reference for a signed URL.
    ///
    /// When `None`, only absolute source URLs are playable.
    pub signed_url_endpoint: Option<String>,
    /// Lifetime requested for signed URLs, in seconds.
    pub signed_url_ttl_secs: u64,
    /// Bearer token for the signing endpoint (if required).
    pub auth_token: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            signed_url_endpoint: None,
            signed_url_ttl_secs: 3_600,
            auth_token: None,
        }
    }
}

/// Tracking collaborator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Endpoint receiving `fetch_video` records. `None` disables tracking.
    pub endpoint: Option<String>,
    /// Bearer token for the tracking endpoint (if required).
    pub auth_token: Option<String>,
}

impl ReelConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::ReelError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::ReelError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/reel/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("reel").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("reel")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/reel-config/config.toml")
        }
    }

    /// Apply `REEL_*` environment overrides on top of file/default values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_with(|name| std::env::var(name).ok());
    }

    fn apply_env_overrides_with<F>(&mut self, get_env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = get_env("REEL_UTTERANCE_FALLBACK") {
            match parse_flag(&raw) {
                Some(enabled) => self.normalizer.utterance_fallback = enabled,
                None => tracing::warn!(value = %raw, "ignoring invalid REEL_UTTERANCE_FALLBACK"),
            }
        }
        if let Some(ms) = read_env_ms("REEL_SUPPRESSION_WINDOW_MS", &get_env) {
            self.playback.suppression_window_ms = ms;
        }
        if let Some(ms) = read_env_ms("REEL_CLOSE_SUPPRESSION_MS", &get_env) {
            self.playback.close_suppression_ms = ms;
        }
        if let Some(ms) = read_env_ms("REEL_DEDUP_WINDOW_MS", &get_env) {
            self.dedup.window_ms = ms;
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn read_env_ms<F>(name: &str, get_env: &F) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = get_env(name)?;
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(ms),
        Err(e) => {
            tracing::warn!(var = name, value = %raw, error = %e, "ignoring invalid duration override");
            None
        }
    }
}
