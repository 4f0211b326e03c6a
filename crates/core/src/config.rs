//! Pipeline configuration loaded from YAML or JSON

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};
use vision_utils_detection::NmsConfig;
use vision_utils_preprocess::{Normalizer, PixelDataOptions};

/// Environment variable overriding [`BatchConfig::max_concurrency`]
pub const THREADS_ENV: &str = "VISION_UTILS_THREADS";

fn default_concurrency() -> usize {
    num_cpus::get()
}

fn default_cache_capacity() -> usize {
    128
}

/// Batch execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Worker threads in the batch pool
    #[serde(default = "default_concurrency")]
    pub max_concurrency: usize,

    /// Maximum cached results (0 disables the cache)
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_concurrency(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

/// Everything a preprocessing run needs, as one file
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub pixel: PixelDataOptions,
    pub batch: BatchConfig,
    pub nms: NmsConfig,
}

impl PipelineConfig {
    /// Load from a `.yaml`/`.yml` or `.json` file, apply the environment
    /// override and validate.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        let mut config: PipelineConfig = match extension.as_deref() {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&contents)?,
            Some("json") => serde_json::from_str(&contents)?,
            other => {
                return Err(ConfigError::Invalid(format!(
                    "unsupported config extension {:?} for {}",
                    other.unwrap_or(""),
                    path.display()
                )))
            }
        };
        debug!("Loaded config from {}", path.display());

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        let value = std::env::var(THREADS_ENV).ok();
        self.apply_thread_override(value.as_deref());
    }

    /// Apply a `VISION_UTILS_THREADS` style value. Unparseable or zero values
    /// are ignored with a warning.
    pub fn apply_thread_override(&mut self, value: Option<&str>) {
        let Some(raw) = value else {
            return;
        };
        match raw.trim().parse::<usize>() {
            Ok(threads) if threads > 0 => {
                debug!("{THREADS_ENV}={threads} overrides max_concurrency");
                self.batch.max_concurrency = threads;
            }
            _ => warn!("Ignoring invalid {THREADS_ENV} value '{raw}'"),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        Normalizer::new(&self.pixel.normalization)
            .map_err(|e| ConfigError::Invalid(format!("pixel.normalization: {e}")))?;
        if let Some(resize) = &self.pixel.resize {
            resize
                .target()
                .map_err(|e| ConfigError::Invalid(format!("pixel.resize: {e}")))?;
            if resize.stride == Some(0) {
                return Err(ConfigError::Invalid(
                    "pixel.resize: stride must be positive".to_string(),
                ));
            }
        }
        if self.batch.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "batch.max_concurrency must be positive".to_string(),
            ));
        }
        self.nms
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("nms: {e}")))?;
        Ok(())
    }
}
