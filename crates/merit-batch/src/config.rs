//! TOML configuration for dispatch runs.
//!
//! Partial documents are accepted; missing sections and keys fall back to
//! their defaults.
//!
//! ```toml
//! [policy]
//! segment_count = 10
//! system_reserve_pct = 10.0
//!
//! [scheduler]
//! workers = 4
//!
//! [plan]
//! sweep_steps = 100
//! run_fraction = 0.05
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use merit_algo::DispatchPolicy;
use merit_core::{DispatchError, DispatchResult};
use serde::{Deserialize, Serialize};

use crate::plan::DEFAULT_SWEEP_STEPS;
use crate::runner::SchedulerConfig;

/// Settings for building step plans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    /// Loads in a merit-order sweep
    pub sweep_steps: usize,
    /// Leading share of the plan to run, in (0, 1]
    pub run_fraction: f64,
    /// Duration of one step, for energy totals
    pub step_hours: f64,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            sweep_steps: DEFAULT_SWEEP_STEPS,
            run_fraction: 1.0,
            step_hours: 1.0,
        }
    }
}

/// Complete run configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub policy: DispatchPolicy,
    pub scheduler: SchedulerConfig,
    pub plan: PlanConfig,
}

impl DispatchConfig {
    pub fn from_toml_str(contents: &str) -> DispatchResult<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| DispatchError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> DispatchResult<String> {
        toml::to_string_pretty(self).map_err(|e| DispatchError::Parse(e.to_string()))
    }

    /// Load and validate a configuration file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading dispatch config '{}'", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("parsing dispatch config '{}'", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory '{}'", parent.display()))?;
        }
        let contents = self.to_toml_string().context("serializing dispatch config")?;
        fs::write(path, contents)
            .with_context(|| format!("writing dispatch config '{}'", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> DispatchResult<()> {
        self.policy.validate()?;
        self.scheduler.validate()?;
        if self.plan.sweep_steps == 0 {
            return Err(DispatchError::Config("sweep_steps must be at least 1".into()));
        }
        if !(self.plan.run_fraction > 0.0 && self.plan.run_fraction <= 1.0) {
            return Err(DispatchError::Config(format!(
                "run_fraction must be within (0, 1], got {}",
                self.plan.run_fraction
            )));
        }
        if !(self.plan.step_hours > 0.0) || !self.plan.step_hours.is_finite() {
            return Err(DispatchError::Config(format!(
                "step_hours must be positive, got {}",
                self.plan.step_hours
            )));
        }
        Ok(())
    }
}
