//! TOML configuration for training and serving.
//!
//! Every field has a default, so a partial file (or none at all) is valid.
//! Relative paths in a config file are resolved against the file's directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs;
use crate::dataset::LabelLiterals;
use crate::ml::{DEFAULT_THRESHOLD, FeatureOptions, TrainOptions};

/// Config filename looked up in the application root directory.
pub const CONFIG_FILE_NAME: &str = "detox.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    SerializeToml(#[from] toml::ser::Error),
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetoxConfig {
    #[serde(default)]
    pub data: DataSettings,
    #[serde(default)]
    pub features: FeatureOptions,
    #[serde(default)]
    pub training: TrainOptions,
    #[serde(default)]
    pub model: ModelSettings,
}

/// Where training data comes from and how it is split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSettings {
    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    /// Seed for the train/test split.
    #[serde(default = "default_split_seed")]
    pub seed: u64,
    #[serde(default)]
    pub labels: LabelLiterals,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            dataset_path: default_dataset_path(),
            test_fraction: default_test_fraction(),
            seed: default_split_seed(),
            labels: LabelLiterals::default(),
        }
    }
}

/// Model archive location and decision threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default = "default_model_path")]
    pub path: PathBuf,
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            threshold: default_threshold(),
        }
    }
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("data/wikiDetoxAnnotated40kRows.tsv")
}

fn default_test_fraction() -> f64 {
    0.2
}

fn default_split_seed() -> u64 {
    1
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/toxicity_model.zip")
}

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

impl DetoxConfig {
    /// Load a config file, resolving relative paths against its directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(base) = path.parent() {
            config.data.dataset_path = resolve_path(base, &config.data.dataset_path);
            config.model.path = resolve_path(base, &config.model.path);
        }
        config.validate()?;
        Ok(config)
    }

    /// Load `explicit` if given, else `detox.toml` in the app root if present,
    /// else defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match app_dirs::app_root_dir() {
            Ok(root) => {
                let path = root.join(CONFIG_FILE_NAME);
                if path.is_file() {
                    tracing::info!("Using config {}", path.display());
                    Self::load(&path)
                } else {
                    Ok(Self::default())
                }
            }
            Err(err) => {
                tracing::warn!("Config directory unavailable ({err}); using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fraction = self.data.test_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "data.test_fraction must be in (0, 1), got {fraction}"
            )));
        }
        let threshold = self.model.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid(format!(
                "model.threshold must be in [0, 1], got {threshold}"
            )));
        }
        if self.data.labels.truthy.is_empty() || self.data.labels.falsy.is_empty() {
            return Err(ConfigError::Invalid(
                "data.labels needs at least one truthy and one falsy literal".to_string(),
            ));
        }
        let overlap = self.data.labels.overlapping();
        if !overlap.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "label literals are both truthy and falsy: {}",
                overlap.join(", ")
            )));
        }
        if self.features.max_features == 0 {
            return Err(ConfigError::Invalid(
                "features.max_features must be at least 1".to_string(),
            ));
        }
        if self.features.word_ngrams == 0 && self.features.char_ngrams == 0 {
            return Err(ConfigError::Invalid(
                "enable word or character n-grams".to_string(),
            ));
        }
        let lr = self.training.learning_rate;
        if !(lr.is_finite() && lr > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "training.learning_rate must be > 0, got {lr}"
            )));
        }
        if self.training.epochs == 0 {
            return Err(ConfigError::Invalid(
                "training.epochs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolve `path` relative to `base` unless it is already absolute.
pub fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
