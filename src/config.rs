//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `twoopt.toml` and deserializes into strongly-typed structs. Every
//! section has defaults, so a partial file (or none at all) is valid.
//! Per-dataset overrides stored in the data itself (`OPT_VIRT_*`) are
//! applied later, by the stages that read them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::optimizer::GaConfig;
use crate::orchestration::OrchestrationConfig;
use crate::planner::PlannerConfig;
use crate::simulation::SimulationConfig;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "twoopt.toml";

/// Environment variable pointing to a config file.
pub const CONFIG_PATH_ENV: &str = "TWOOPT_CONFIG";

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ga: GaConfig,
    pub orchestration: OrchestrationConfig,
    pub simulation: SimulationConfig,
    pub planner: PlannerConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where simulation traces are exported when tracing is on.
    pub trace_dir: PathBuf,
    /// Where orchestration reports are saved.
    pub report_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            trace_dir: PathBuf::from("traces"),
            report_dir: PathBuf::from("reports"),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Config file to use: the explicit one, `$TWOOPT_CONFIG`, or `twoopt.toml`.
    pub fn locate(explicit: Option<&Path>) -> PathBuf {
        match explicit {
            Some(path) => path.to_path_buf(),
            None => Self::resolve_env(CONFIG_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH)),
        }
    }

    /// Small GA and two orchestration iterations.
    pub fn test_profile() -> Self {
        Self {
            ga: GaConfig::test_profile(),
            orchestration: OrchestrationConfig::test_profile(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.ga.validate().context("Invalid [ga] section")?;
        self.simulation
            .validate()
            .context("Invalid [simulation] section")?;
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
