use anyhow::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs::try_exists;

use crate::queue::QueuePolicy;

pub const DEFAULT_SAVE_DELAY_MS: u64 = 2000;
pub const MAX_SAVE_DELAY_MS: u64 = 60_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Quiet period after the last edit before a save runs.
    #[serde(default = "default_save_delay_ms")]
    pub save_delay_ms: u64,
    #[serde(default)]
    pub queue_policy: QueuePolicy,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub resource_dir: Option<PathBuf>,
    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default)]
    pub code_theme_css: Option<String>,
    #[serde(default = "default_allow_math")]
    pub allow_math: bool,
}

fn default_save_delay_ms() -> u64 {
    DEFAULT_SAVE_DELAY_MS
}

fn default_theme() -> String {
    String::from("light")
}

fn default_allow_math() -> bool {
    true
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            code_theme_css: None,
            allow_math: true,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            save_delay_ms: DEFAULT_SAVE_DELAY_MS,
            queue_policy: QueuePolicy::LatestWins,
            data_dir: None,
            resource_dir: None,
            render: RenderConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn save_delay(&self) -> Duration {
        Duration::from_millis(self.save_delay_ms)
    }

    pub async fn load() -> Result<Self> {
        if let Some(config_path) = Self::config_path() {
            if try_exists(&config_path).await? {
                match tokio::fs::read_to_string(&config_path).await {
                    Ok(content) => {
                        if content.trim().is_empty() {
                            log::warn!("Config file is empty, creating new one");
                            let default_config = Self::default();
                            let _ = default_config.save().await;
                            return Ok(default_config);
                        }

                        match serde_json::from_str::<Self>(&content) {
                            Ok(mut config) => {
                                config.validate()?;
                                log::info!(
                                    "Successfully loaded config from: {}",
                                    config_path.display()
                                );
                                return Ok(config);
                            }
                            Err(json_err) => {
                                log::error!("Failed to parse config file: {}", json_err);

                                let backup_path = config_path.with_extension("bak");
                                if let Err(e) = tokio::fs::copy(&config_path, &backup_path).await {
                                    log::warn!("Failed to backup broken config: {}", e);
                                } else {
                                    log::info!(
                                        "Backed up broken config to: {}",
                                        backup_path.display()
                                    );
                                }

                                let default_config = Self::default();
                                let _ = default_config.save().await;
                                return Ok(default_config);
                            }
                        }
                    }
                    Err(io_err) => {
                        log::error!("Failed to read config file: {}", io_err);
                    }
                }
            } else {
                log::info!("Config file does not exist, creating default");
            }
        }

        let default_config = Self::default();
        let _ = default_config.save().await;
        Ok(default_config)
    }

    pub async fn save(&self) -> Result<()> {
        let Some(config_path) = Self::config_path() else {
            return Ok(());
        };

        let mut config_to_save = self.clone();
        config_to_save.validate()?;

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                anyhow::anyhow!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                )
            })?;
        }

        let content = serde_json::to_string_pretty(&config_to_save)?;
        tokio::fs::write(&config_path, content).await.map_err(|e| {
            anyhow::anyhow!(
                "Failed to write config file {}: {}",
                config_path.display(),
                e
            )
        })?;
        log::info!("Successfully saved config to: {}", config_path.display());
        Ok(())
    }

    /// Replace out-of-range values with defaults.
    pub fn validate(&mut self) -> Result<()> {
        let mut has_issues = false;

        if self.save_delay_ms > MAX_SAVE_DELAY_MS {
            log::warn!(
                "Save delay {} ms is too long, capping at {} ms",
                self.save_delay_ms,
                MAX_SAVE_DELAY_MS
            );
            self.save_delay_ms = MAX_SAVE_DELAY_MS;
            has_issues = true;
        }

        if self.render.theme.trim().is_empty() {
            log::warn!("Empty theme name, using default");
            self.render.theme = RenderConfig::default().theme;
            has_issues = true;
        }

        if has_issues {
            log::info!("Configuration validation completed with corrections");
        }

        Ok(())
    }

    /// Explicit `data_dir`, then `NOTE_SESSION_DATA_DIR`, then the platform
    /// data directory.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        if let Ok(dir) = std::env::var("NOTE_SESSION_DATA_DIR") {
            return Ok(PathBuf::from(dir));
        }
        let dirs = ProjectDirs::from("com", "scriptoris", "scriptoris")
            .ok_or_else(|| anyhow::anyhow!("Could not determine the data directory"))?;
        Ok(dirs.data_dir().to_path_buf())
    }

    pub fn resource_dir(&self) -> Result<PathBuf> {
        match &self.resource_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(self.data_dir()?.join("resources")),
        }
    }

    fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("NOTE_SESSION_CONFIG_PATH") {
            return Some(PathBuf::from(path));
        }

        if let Ok(dir) = std::env::var("NOTE_SESSION_CONFIG_DIR") {
            return Some(PathBuf::from(dir).join("config.json"));
        }

        Self::platform_config_path()
    }

    fn platform_config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "scriptoris", "scriptoris")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }
}
