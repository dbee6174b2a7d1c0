//! # Settings Module
//!
//! Optional TOML settings that seed the engine's defaults.
//!
//! ```toml
//! [sort]
//! copy_files = true
//! use_ml = false
//! conflict_resolution = "rename"
//!
//! [ml]
//! model_dir = "/home/me/.local/share/smartfile-flow/models"
//! confidence_threshold = 0.7
//!
//! [scan]
//! include_hidden = false
//! follow_symlinks = false
//! max_depth = 4
//! extensions = ["pdf", "jpg"]
//!
//! [rules.extensions]
//! blend = "3D"
//! md = "Notes"
//! ```
//!
//! Lookup order: explicit path, `./smartfile.toml`, then
//! `<config dir>/smartfile-flow/config.toml`, then built-in defaults.

use crate::core::classifier::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::core::resolver::ConflictPolicy;
use crate::core::rules::CategoryRules;
use crate::core::scanner::ScanConfig;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Settings file looked up in the working directory
pub const LOCAL_SETTINGS_FILE: &str = "smartfile.toml";

const APP_DIR: &str = "smartfile-flow";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub sort: SortSettings,
    pub ml: MlSettings,
    pub scan: ScanSettings,
    pub rules: RuleSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortSettings {
    pub copy_files: bool,
    pub use_ml: bool,
    pub conflict_resolution: ConflictPolicy,
}

impl Default for SortSettings {
    fn default() -> Self {
        Self {
            copy_files: true,
            use_ml: false,
            conflict_resolution: ConflictPolicy::Rename,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MlSettings {
    pub model_dir: PathBuf,
    pub confidence_threshold: f32,
}

impl Default for MlSettings {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub include_hidden: bool,
    pub follow_symlinks: bool,
    pub max_depth: Option<usize>,
    pub extensions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSettings {
    /// Extension to category overrides
    pub extensions: BTreeMap<String, String>,
}

/// `<data dir>/smartfile-flow/models`, or `./models` without a data dir
pub fn default_model_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR).join("models"))
        .unwrap_or_else(|| PathBuf::from("models"))
}

/// `<config dir>/smartfile-flow/config.toml`, if the platform has one
pub fn user_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}

impl Settings {
    /// Load settings following the lookup order.
    ///
    /// Only an explicitly given path is required to exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }

        let local = PathBuf::from(LOCAL_SETTINGS_FILE);
        if local.is_file() {
            return Self::load_from_file(&local);
        }

        if let Some(user) = user_settings_path() {
            if user.is_file() {
                return Self::load_from_file(&user);
            }
        }

        Ok(Self::default())
    }

    /// Load and validate one settings file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::SettingsNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::SettingsRead {
            path: path.to_path_buf(),
            source,
        })?;

        let settings = Self::from_toml(&content, path)?;
        tracing::debug!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    /// Parse and validate TOML text; `origin` is used in errors
    pub fn from_toml(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        let settings: Settings =
            toml::from_str(content).map_err(|e| ConfigError::InvalidSettings {
                path: origin.to_path_buf(),
                reason: e.to_string(),
            })?;
        settings.validate(origin)?;
        Ok(settings)
    }

    fn validate(&self, origin: &Path) -> Result<(), ConfigError> {
        let threshold = self.ml.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::InvalidSettings {
                path: origin.to_path_buf(),
                reason: format!("confidence_threshold {} must be within 0.0..=1.0", threshold),
            });
        }

        if let Some((ext, _)) = self
            .rules
            .extensions
            .iter()
            .find(|(ext, category)| ext.trim_start_matches('.').is_empty() || category.trim().is_empty())
        {
            return Err(ConfigError::InvalidSettings {
                path: origin.to_path_buf(),
                reason: format!("rule for '{}' needs a non-empty extension and category", ext),
            });
        }

        Ok(())
    }

    /// Rule table with the configured overrides applied
    pub fn category_rules(&self) -> CategoryRules {
        CategoryRules::with_overrides(&self.rules.extensions)
    }

    /// Scanner configuration; `exclude` is filled in per run
    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            follow_symlinks: self.scan.follow_symlinks,
            include_hidden: self.scan.include_hidden,
            max_depth: self.scan.max_depth,
            extensions: self.scan.extensions.clone(),
            ..ScanConfig::default()
        }
    }
}
