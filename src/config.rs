use anyhow::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:5001".to_string()
}

fn default_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
    #[serde(default = "default_voice")]
    pub voice: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            voice: default_voice(),
        }
    }
}

fn default_difficulty() -> String {
    "beginner".to_string()
}

fn default_voice() -> String {
    "us".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_tick")]
    pub tick_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick(),
        }
    }
}

fn default_tick() -> u64 {
    100
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let content = fs::read_to_string(&path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Directory for generated artifacts (narration clip, diagrams).
    pub fn cache_dir() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.cache_dir().to_path_buf())
    }

    /// Log file path; logging goes to a file because stderr would draw
    /// over the alternate screen.
    pub fn log_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().join("study-tutor.log"))
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("", "", "study-tutor")
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.server.base_url, "http://127.0.0.1:5001");
        assert_eq!(config.server.timeout_secs, 60);
        assert_eq!(config.session.difficulty, "beginner");
        assert_eq!(config.session.voice, "us");
        assert_eq!(config.display.tick_ms, 100);
    }

    #[test]
    fn partial_config_fills_missing_fields() {
        let config: Config = toml::from_str(
            r#"
            [server]
            base_url = "http://tutor.local:8080"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.base_url, "http://tutor.local:8080");
        assert_eq!(config.server.timeout_secs, 60);
        assert_eq!(config.session.voice, "us");
    }
}
