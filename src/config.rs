use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "skillcheck.toml";

// Configured question counts may narrow this range, never widen it
pub const QUESTION_COUNT_LIMITS: (usize, usize) = (5, 30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub default_question_count: usize,
    pub min_question_count: usize,
    pub max_question_count: usize,
    pub time_limit_minutes: u32,
    /// Per-question time budget shown to the learner.
    pub question_time_limit_seconds: u32,
    /// Longest accepted answer time.
    pub max_answer_seconds: u32,
    /// How many recent answers are excluded from new selections.
    pub recent_history_window: usize,
    pub certification_threshold: f64,
    /// Fixed RNG seed; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_question_count: 15,
            min_question_count: 5,
            max_question_count: 30,
            time_limit_minutes: 30,
            question_time_limit_seconds: 120,
            max_answer_seconds: 300,
            recent_history_window: 100,
            certification_threshold: 80.0,
            seed: None,
        }
    }
}

impl EngineConfig {
    // Missing file means defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: EngineConfig = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let (floor, ceiling) = QUESTION_COUNT_LIMITS;
        if self.min_question_count < floor
            || self.max_question_count > ceiling
            || self.min_question_count > self.max_question_count
        {
            return Err(ConfigError::Invalid(format!(
                "question count bounds {}..={} must be a range within {}..={}",
                self.min_question_count, self.max_question_count, floor, ceiling
            )));
        }
        if !(self.min_question_count..=self.max_question_count)
            .contains(&self.default_question_count)
        {
            return Err(ConfigError::Invalid(format!(
                "default question count {} is outside {}..={}",
                self.default_question_count, self.min_question_count, self.max_question_count
            )));
        }
        if self.time_limit_minutes == 0 {
            return Err(ConfigError::Invalid(
                "time_limit_minutes must be positive".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.certification_threshold) {
            return Err(ConfigError::Invalid(
                "certification_threshold must be within 0..=100".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("SKILLCHECK_CONFIG") {
        return PathBuf::from(path);
    }

    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("skillcheck")
        .join(CONFIG_FILE_NAME)
}
