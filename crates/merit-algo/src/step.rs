//! Per-step input and output types.

use std::collections::BTreeMap;

use merit_core::{DispatchError, DispatchResult, Fleet, GeneratorCategory, GeneratorId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::DispatchPolicy;

/// Demand and constraints for one timestep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchStepInput {
    pub load_mw: f64,
    /// Availability fraction per renewable generator for this step
    #[serde(default)]
    pub renewable_caps: BTreeMap<GeneratorId, f64>,
    pub system_reserve_pct: f64,
    pub unit_reserve_pct: f64,
    pub min_nonrenewable_pct: f64,
    pub flexible_load_cap_mw: f64,
    pub flexible_load_unit_cost: f64,
}

impl DispatchStepInput {
    /// Step at `load_mw` with the policy's scalar parameters and no renewable caps.
    pub fn new(load_mw: f64, policy: &DispatchPolicy) -> Self {
        Self {
            load_mw,
            renewable_caps: BTreeMap::new(),
            system_reserve_pct: policy.system_reserve_pct,
            unit_reserve_pct: policy.unit_reserve_pct,
            min_nonrenewable_pct: policy.min_nonrenewable_pct,
            flexible_load_cap_mw: policy.flexible_load_cap_mw,
            flexible_load_unit_cost: policy.flexible_load_unit_cost,
        }
    }

    pub fn with_renewable_cap(mut self, id: GeneratorId, fraction: f64) -> Self {
        self.renewable_caps.insert(id, fraction);
        self
    }

    /// Effective availability fraction for a renewable generator, if any.
    ///
    /// The step's value wins over the generator's own default.
    pub fn renewable_cap(&self, id: GeneratorId, default: Option<f64>) -> Option<f64> {
        self.renewable_caps.get(&id).copied().or(default)
    }

    /// Reject malformed steps before any solve.
    pub fn validate(&self, fleet: &Fleet) -> DispatchResult<()> {
        if !self.load_mw.is_finite() || self.load_mw < 0.0 {
            return Err(DispatchError::Validation(format!(
                "load_mw must be finite and non-negative, got {}",
                self.load_mw
            )));
        }
        for (label, pct) in [
            ("system_reserve_pct", self.system_reserve_pct),
            ("unit_reserve_pct", self.unit_reserve_pct),
            ("min_nonrenewable_pct", self.min_nonrenewable_pct),
        ] {
            if !pct.is_finite() || !(0.0..=100.0).contains(&pct) {
                return Err(DispatchError::Validation(format!(
                    "{} must be within [0, 100], got {}",
                    label, pct
                )));
            }
        }
        if !self.flexible_load_cap_mw.is_finite() || self.flexible_load_cap_mw < 0.0 {
            return Err(DispatchError::Validation(format!(
                "flexible_load_cap_mw must be finite and non-negative, got {}",
                self.flexible_load_cap_mw
            )));
        }
        if !self.flexible_load_unit_cost.is_finite() {
            return Err(DispatchError::Validation(format!(
                "flexible_load_unit_cost must be finite, got {}",
                self.flexible_load_unit_cost
            )));
        }
        for (&id, &fraction) in &self.renewable_caps {
            let gen = fleet.get(id).ok_or_else(|| {
                DispatchError::Validation(format!("renewable cap for unknown generator {}", id))
            })?;
            if !gen.is_renewable() {
                return Err(DispatchError::Validation(format!(
                    "renewable cap given for {} '{}' which is {}",
                    id, gen.name, gen.category
                )));
            }
            if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
                return Err(DispatchError::Validation(format!(
                    "renewable cap for {} must be within [0, 1], got {}",
                    id, fraction
                )));
            }
        }
        Ok(())
    }
}

/// Why a step produced no dispatch.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FailureReason {
    /// Constraints cannot be met at this load
    #[error("infeasible")]
    Infeasible,

    /// Backend failure or non-converged solve
    #[error("solver error: {0}")]
    Solver(String),

    /// Per-step time limit reached
    #[error("solver time limit reached")]
    TimedOut,
}

/// Result of one step. Failed steps carry the sentinel values from
/// [`DispatchStepResult::failed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchStepResult {
    pub success: bool,
    /// True quadratic cost at the dispatch point ($/h); NaN on failure
    pub total_cost: f64,
    pub dispatch_by_type: BTreeMap<GeneratorCategory, f64>,
    pub reserves_by_type: BTreeMap<GeneratorCategory, f64>,
    /// Dispatch keyed by [`Generator::technology_label`](merit_core::Generator::technology_label)
    #[serde(default)]
    pub dispatch_by_technology: BTreeMap<String, f64>,
    #[serde(default)]
    pub reserves_by_technology: BTreeMap<String, f64>,
    pub flexible_load_mw: f64,
    /// Load-balance dual, ∂objective/∂load ($/MWh)
    pub marginal_price: f64,
    /// Dispatch per generator in fleet order
    pub generator_dispatch_mw: Vec<f64>,
    /// Reserve per generator in fleet order (0 for renewables)
    pub generator_reserve_mw: Vec<f64>,
}

impl DispatchStepResult {
    /// Sentinel record for a failed step.
    pub fn failed(fleet: &Fleet) -> Self {
        let zeros: BTreeMap<GeneratorCategory, f64> =
            fleet.categories().into_iter().map(|c| (c, 0.0)).collect();
        let technology_zeros: BTreeMap<String, f64> =
            fleet.technologies().into_iter().map(|t| (t, 0.0)).collect();
        Self {
            success: false,
            total_cost: f64::NAN,
            dispatch_by_type: zeros.clone(),
            reserves_by_type: zeros,
            dispatch_by_technology: technology_zeros.clone(),
            reserves_by_technology: technology_zeros,
            flexible_load_mw: 0.0,
            marginal_price: 0.0,
            generator_dispatch_mw: vec![0.0; fleet.len()],
            generator_reserve_mw: vec![0.0; fleet.len()],
        }
    }

    pub fn total_dispatch_mw(&self) -> f64 {
        self.generator_dispatch_mw.iter().sum()
    }
}

/// Tagged per-step outcome. The engine never returns an error for a step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Dispatched(DispatchStepResult),
    Failed(FailureReason),
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Dispatched(_))
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            StepOutcome::Dispatched(_) => None,
            StepOutcome::Failed(reason) => Some(reason),
        }
    }

    /// Collapse to a record, substituting sentinels on failure.
    pub fn into_record(self, fleet: &Fleet) -> DispatchStepResult {
        match self {
            StepOutcome::Dispatched(result) => result,
            StepOutcome::Failed(_) => DispatchStepResult::failed(fleet),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use merit_core::Generator;

    fn fleet() -> Fleet {
        Fleet::new(vec![
            Generator::new(GeneratorId::new(0), "Gas", GeneratorCategory::Dispatchable, 100.0)
                .with_technology("GasTurbinesPlants"),
            Generator::new(GeneratorId::new(1), "Solar", GeneratorCategory::SolarPV, 50.0),
        ])
        .unwrap()
    }

    #[test]
    fn step_copies_policy_scalars() {
        let policy = DispatchPolicy {
            system_reserve_pct: 10.0,
            flexible_load_cap_mw: 5.0,
            ..Default::default()
        };
        let step = DispatchStepInput::new(42.0, &policy);
        assert_eq!(step.load_mw, 42.0);
        assert_eq!(step.system_reserve_pct, 10.0);
        assert_eq!(step.flexible_load_cap_mw, 5.0);
        assert!(step.renewable_caps.is_empty());
    }

    #[test]
    fn step_cap_overrides_generator_default() {
        let step = DispatchStepInput::new(1.0, &DispatchPolicy::default())
            .with_renewable_cap(GeneratorId::new(1), 0.3);
        assert_eq!(step.renewable_cap(GeneratorId::new(1), Some(0.9)), Some(0.3));
        assert_eq!(step.renewable_cap(GeneratorId::new(2), Some(0.9)), Some(0.9));
        assert_eq!(step.renewable_cap(GeneratorId::new(2), None), None);
    }

    #[test]
    fn validation_rejects_bad_steps() {
        let fleet = fleet();
        let policy = DispatchPolicy::default();
        assert!(DispatchStepInput::new(-1.0, &policy).validate(&fleet).is_err());
        assert!(DispatchStepInput::new(f64::NAN, &policy).validate(&fleet).is_err());
        let unknown = DispatchStepInput::new(1.0, &policy).with_renewable_cap(GeneratorId::new(9), 0.5);
        assert!(unknown.validate(&fleet).is_err());
        let not_renewable =
            DispatchStepInput::new(1.0, &policy).with_renewable_cap(GeneratorId::new(0), 0.5);
        assert!(not_renewable.validate(&fleet).is_err());
        let out_of_range =
            DispatchStepInput::new(1.0, &policy).with_renewable_cap(GeneratorId::new(1), 1.5);
        assert!(out_of_range.validate(&fleet).is_err());
        let ok = DispatchStepInput::new(1.0, &policy).with_renewable_cap(GeneratorId::new(1), 0.5);
        assert!(ok.validate(&fleet).is_ok());
    }

    #[test]
    fn failed_record_uses_sentinels() {
        let fleet = fleet();
        let record = StepOutcome::Failed(FailureReason::Infeasible).into_record(&fleet);
        assert!(!record.success);
        assert!(record.total_cost.is_nan());
        assert_eq!(record.marginal_price, 0.0);
        assert_eq!(record.flexible_load_mw, 0.0);
        assert_eq!(record.dispatch_by_type.len(), 2);
        assert!(record.dispatch_by_type.values().all(|&v| v == 0.0));
        assert!(record.reserves_by_type.values().all(|&v| v == 0.0));
        let technologies: Vec<_> = record.dispatch_by_technology.keys().cloned().collect();
        assert_eq!(technologies, vec!["GasTurbinesPlants", "SolarPV"]);
        assert!(record.dispatch_by_technology.values().all(|&v| v == 0.0));
        assert_eq!(record.reserves_by_technology.len(), 2);
        assert_eq!(record.generator_dispatch_mw, vec![0.0, 0.0]);
    }

    #[test]
    fn failure_reason_display() {
        assert_eq!(FailureReason::Infeasible.to_string(), "infeasible");
        assert!(FailureReason::Solver("NumericalError".into())
            .to_string()
            .contains("NumericalError"));
        assert!(FailureReason::TimedOut.to_string().contains("time limit"));
    }
}
