//! CLI-side configuration: an optional TOML file overlaying
//! [`ValidationConfig`]'s defaults.

use anyhow::{Context, Result};
use icgs_core::ValidationConfig;
use rust_decimal::Decimal;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
struct TomlOverrides {
    max_path_enumeration: Option<usize>,
    simplex_max_iterations: Option<u64>,
    simplex_tolerance: Option<String>,
    nfa_explosion_threshold: Option<usize>,
    enable_warm_start: Option<bool>,
    enable_cross_validation: Option<bool>,
}

pub struct CliConfig {
    pub session_path: PathBuf,
    pub validation: ValidationConfig,
}

impl CliConfig {
    pub fn load(config_path: Option<PathBuf>, session_path: PathBuf) -> Result<Self> {
        let mut validation = ValidationConfig::default();
        if let Some(path) = config_path {
            apply_overrides(&mut validation, load_overrides(&path)?)?;
        }
        Ok(Self {
            session_path,
            validation,
        })
    }
}

fn load_overrides(path: &Path) -> Result<TomlOverrides> {
    if !path.exists() {
        anyhow::bail!("config file not found: {}", path.display());
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("failed to parse config file: {}", path.display()))
}

fn apply_overrides(cfg: &mut ValidationConfig, overrides: TomlOverrides) -> Result<()> {
    if let Some(v) = overrides.max_path_enumeration {
        cfg.max_path_enumeration = v;
    }
    if let Some(v) = overrides.simplex_max_iterations {
        cfg.simplex_max_iterations = v;
    }
    if let Some(v) = overrides.simplex_tolerance {
        cfg.simplex_tolerance =
            Decimal::from_str(&v).with_context(|| format!("invalid simplex_tolerance: {v}"))?;
    }
    if let Some(v) = overrides.nfa_explosion_threshold {
        cfg.nfa_explosion_threshold = v;
    }
    if let Some(v) = overrides.enable_warm_start {
        cfg.enable_warm_start = v;
    }
    if let Some(v) = overrides.enable_cross_validation {
        cfg.enable_cross_validation = v;
    }
    Ok(())
}
