//! Configuration management for the experiments compiler
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (experiments.toml)
//! - Environment variables (EXPERIMENTS__*)
//!
//! ## Example config file (experiments.toml):
//! ```toml
//! [output]
//! mode = "grpc_oss_production"
//! copyright_year = 2025
//!
//! [validation]
//! check_expiry = true
//! reject_duplicates = true
//! allow_debug = false
//!
//! [tables.platforms_define]
//! ios = "GRPC_CFSTREAM"
//! posix = ""
//! windows = "GPR_WINDOWS"
//! ```

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::codegen::Mode;
use crate::error::Result;
use crate::tables::ReferenceTables;

/// Main configuration for the compiler
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Token and platform vocabulary
    #[serde(default)]
    pub tables: ReferenceTables,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Validation settings
    #[serde(default)]
    pub validation: ValidationConfig,
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Mode used when the command line does not name one
    #[serde(default = "default_mode")]
    pub mode: Mode,

    /// Fixed copyright year, for reproducible output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright_year: Option<i32>,

    /// Overrides the generator named in banners
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator_label: Option<String>,
}

/// Validation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Enforce expiry dates against the current date
    #[serde(default)]
    pub check_expiry: bool,

    /// Fail on a repeated experiment name instead of replacing it
    #[serde(default = "default_true")]
    pub reject_duplicates: bool,

    /// Permit experiments that default to `debug`
    #[serde(default = "default_true")]
    pub allow_debug: bool,
}

fn default_mode() -> Mode {
    Mode::OssProduction
}

fn default_true() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            copyright_year: None,
            generator_label: None,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            check_expiry: false,
            reject_duplicates: true,
            allow_debug: true,
        }
    }
}

impl CompilerConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, adding a required file when one is given
    pub fn load_from(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_locations = [
            "experiments.toml",
            ".experiments.toml",
            "config/experiments.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("io", "grpc", "experiments") {
            let xdg_config = config_dir.config_dir().join("experiments.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("EXPERIMENTS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = self.to_toml()?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
