//! Run-wide dispatch policy: segment count, reserve and minimum-output
//! percentages, flexible load and the per-step time limit.

use merit_core::{DispatchError, DispatchResult};
use serde::{Deserialize, Serialize};

use crate::linearize::DEFAULT_SEGMENT_COUNT;

/// Scalar operating policy applied to every step of a run.
///
/// Percentages are given on a 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchPolicy {
    /// Linear segments per cost curve
    pub segment_count: usize,
    /// System reserve requirement as % of load
    pub system_reserve_pct: f64,
    /// Per-unit reserve floor as % of unit capacity (non-renewables)
    pub unit_reserve_pct: f64,
    /// Minimum output as % of unit capacity (non-renewables)
    pub min_nonrenewable_pct: f64,
    /// Upper bound on flexible load (MW)
    pub flexible_load_cap_mw: f64,
    /// Benefit per MW of flexible load served ($/MWh)
    pub flexible_load_unit_cost: f64,
    /// Per-step solver time limit; `None` means unlimited
    pub step_time_limit_secs: Option<f64>,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            segment_count: DEFAULT_SEGMENT_COUNT,
            system_reserve_pct: 0.0,
            unit_reserve_pct: 0.0,
            min_nonrenewable_pct: 0.0,
            flexible_load_cap_mw: 0.0,
            flexible_load_unit_cost: 0.0,
            step_time_limit_secs: None,
        }
    }
}

impl DispatchPolicy {
    pub fn validate(&self) -> DispatchResult<()> {
        if self.segment_count == 0 {
            return Err(DispatchError::Config(
                "segment_count must be at least 1".into(),
            ));
        }
        for (label, pct) in [
            ("system_reserve_pct", self.system_reserve_pct),
            ("unit_reserve_pct", self.unit_reserve_pct),
            ("min_nonrenewable_pct", self.min_nonrenewable_pct),
        ] {
            if !pct.is_finite() || !(0.0..=100.0).contains(&pct) {
                return Err(DispatchError::Config(format!(
                    "{} must be within [0, 100], got {}",
                    label, pct
                )));
            }
        }
        if self.unit_reserve_pct + self.min_nonrenewable_pct > 100.0 {
            return Err(DispatchError::Config(format!(
                "unit_reserve_pct ({}) + min_nonrenewable_pct ({}) exceeds 100",
                self.unit_reserve_pct, self.min_nonrenewable_pct
            )));
        }
        if !self.flexible_load_cap_mw.is_finite() || self.flexible_load_cap_mw < 0.0 {
            return Err(DispatchError::Config(format!(
                "flexible_load_cap_mw must be finite and non-negative, got {}",
                self.flexible_load_cap_mw
            )));
        }
        if !self.flexible_load_unit_cost.is_finite() {
            return Err(DispatchError::Config(format!(
                "flexible_load_unit_cost must be finite, got {}",
                self.flexible_load_unit_cost
            )));
        }
        if let Some(limit) = self.step_time_limit_secs {
            if !(limit > 0.0) {
                return Err(DispatchError::Config(format!(
                    "step_time_limit_secs must be positive, got {}",
                    limit
                )));
            }
        }
        Ok(())
    }
}
