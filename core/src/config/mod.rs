use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::agent::loop_::DEFAULT_MAX_STEPS;
use crate::agent::reasoner::DEFAULT_MAX_FORMAT_RETRIES;

const SGR_DIR: &str = ".sgr";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub provider: Option<String>,
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub max_steps: u32,
    pub max_format_retries: usize,
    pub concurrency: usize,
    pub task_timeout_secs: Option<u64>,
    /// System instructions prepended to every run. Falls back to a generic
    /// agent preamble when unset.
    pub instructions: Option<String>,
    pub results_dir: PathBuf,
    /// When set, each `sgr run` also logs to `<log_dir>/agent_<timestamp>.log`.
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            provider: None,
            api_key: String::new(),
            base_url: None,
            model: "gpt-4o".to_string(),
            temperature: 0.0,
            max_steps: DEFAULT_MAX_STEPS,
            max_format_retries: DEFAULT_MAX_FORMAT_RETRIES,
            concurrency: 1,
            task_timeout_secs: None,
            instructions: None,
            results_dir: get_sgr_dir().join("runs"),
            log_dir: None,
        }
    }
}

/// The subset of [`Config`] the agent loop itself consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSettings {
    pub max_steps: u32,
    pub max_format_retries: usize,
    pub instructions: Option<String>,
}

impl From<&Config> for AgentSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_steps: config.max_steps,
            max_format_retries: config.max_format_retries,
            instructions: config.instructions.clone(),
        }
    }
}

pub fn get_sgr_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(SGR_DIR)
}

pub fn get_config_path() -> PathBuf {
    get_sgr_dir().join("config.toml")
}

pub fn ensure_sgr_dir() -> Result<PathBuf> {
    let sgr_dir = get_sgr_dir();

    if !sgr_dir.exists() {
        std::fs::create_dir_all(&sgr_dir)
            .with_context(|| format!("Failed to create sgr directory at {}", sgr_dir.display()))?;
    }

    Ok(sgr_dir)
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        if config_exists() {
            load_config()
        } else {
            Ok(Config::default())
        }
    }

    pub fn run_log_path(&self) -> Option<PathBuf> {
        self.run_log_path_at(Local::now().naive_local())
    }

    pub fn run_log_path_at(&self, started: NaiveDateTime) -> Option<PathBuf> {
        self.log_dir.as_ref().map(|dir| {
            dir.join(format!(
                "agent_{}.log",
                started.format("%Y-%m-%d_%H-%M-%S")
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            anyhow::bail!("max_steps must be at least 1");
        }
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be at least 1");
        }
        Ok(())
    }
}

pub fn load_config() -> Result<Config> {
    load_from(&get_config_path())
}

pub fn load_from(config_path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(config_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            anyhow::anyhow!(
                "Config file not found at {}. Run 'sgr init' to set up your configuration.",
                config_path.display()
            )
        } else {
            anyhow::anyhow!("Failed to read config from {}: {}", config_path.display(), e)
        }
    })?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", config_path.display()))?;
    config.validate()?;

    Ok(config)
}

pub fn save_config(config: &Config) -> Result<()> {
    ensure_sgr_dir()?;
    save_to(config, &get_config_path())
}

pub fn save_to(config: &Config, config_path: &Path) -> Result<()> {
    let content =
        toml::to_string_pretty(config).with_context(|| "Failed to serialize config to TOML")?;

    std::fs::write(config_path, content)
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

    Ok(())
}

pub fn config_exists() -> bool {
    get_config_path().exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn partial_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "model = \"gpt-5\"\nmax_steps = 12\n").unwrap();

        let config = load_from(&path).unwrap();
        assert_eq!(config.model, "gpt-5");
        assert_eq!(config.max_steps, 12);
        assert_eq!(config.max_format_retries, DEFAULT_MAX_FORMAT_RETRIES);
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn save_then_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        let config = Config {
            provider: Some("ollama".into()),
            task_timeout_secs: Some(90),
            ..Config::default()
        };

        save_to(&config, &path).unwrap();
        assert_eq!(load_from(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_points_to_init() {
        let tmp = TempDir::new().unwrap();
        let err = load_from(&tmp.path().join("nope.toml")).unwrap_err();
        assert!(err.to_string().contains("sgr init"));
    }

    #[test]
    fn zero_step_cap_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "max_steps = 0\n").unwrap();
        assert!(load_from(&path).is_err());
    }

    #[test]
    fn run_log_is_timestamped_under_log_dir() {
        let started = chrono::NaiveDate::from_ymd_opt(2026, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 7)
            .unwrap();

        assert_eq!(Config::default().run_log_path_at(started), None);

        let config = Config {
            log_dir: Some(PathBuf::from("/var/log/sgr")),
            ..Config::default()
        };
        assert_eq!(
            config.run_log_path_at(started),
            Some(PathBuf::from("/var/log/sgr/agent_2026-03-09_14-05-07.log"))
        );
    }

    #[test]
    fn settings_follow_config() {
        let config = Config {
            max_steps: 7,
            instructions: Some("be brief".into()),
            ..Config::default()
        };
        let settings = AgentSettings::from(&config);
        assert_eq!(settings.max_steps, 7);
        assert_eq!(settings.instructions.as_deref(), Some("be brief"));
    }
}
