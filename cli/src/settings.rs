//! Persisted defaults for `graceexec run`.
//!
//! Stored as JSON at `~/.graceexec/config.json`. Flags given on the command
//! line always win over stored values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, Result};
use graceexec_core::DEFAULT_GRACE_PERIOD;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Settings stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Grace period between terminate and kill, in milliseconds.
    #[serde(default = "default_grace_period_ms", rename = "gracePeriodMs")]
    pub grace_period_ms: u64,

    /// Default timeout in milliseconds. No timeout when absent.
    #[serde(default, rename = "timeoutMs", skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

fn default_grace_period_ms() -> u64 {
    DEFAULT_GRACE_PERIOD.as_millis() as u64
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period_ms(),
            timeout_ms: None,
        }
    }
}

impl Settings {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Reads and writes [`Settings`].
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Store at the default path, `~/.graceexec/config.json`.
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(Self {
            path: home.join(".graceexec").join("config.json"),
        })
    }

    /// Store at a custom path (for testing).
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings, or the defaults when the file doesn't exist.
    pub async fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No settings file, using defaults");
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings in {}", self.path.display()))
    }

    /// Save settings, writing to a temp file and renaming it into place.
    pub async fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let content = serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;
        let temp_path = self.path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .context("Failed to create temp settings file")?;
        file.write_all(content.as_bytes())
            .await
            .context("Failed to write settings")?;
        file.sync_all().await.context("Failed to sync settings")?;

        fs::rename(&temp_path, &self.path)
            .await
            .context("Failed to rename settings file")?;

        debug!(path = %self.path.display(), "Saved settings");
        Ok(())
    }
}
