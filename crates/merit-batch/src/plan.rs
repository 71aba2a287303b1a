//! Ordered step sequences for a run.

use merit_algo::{DispatchPolicy, DispatchStepInput};
use merit_core::{DispatchError, DispatchResult, Fleet};
use serde::{Deserialize, Serialize};

use crate::profile::AvailabilityProfile;

/// Default number of loads in a merit-order sweep.
pub const DEFAULT_SWEEP_STEPS: usize = 100;

/// Ordered step inputs; index `i` of every result series refers to step `i`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepPlan {
    steps: Vec<DispatchStepInput>,
}

impl StepPlan {
    pub fn new(steps: Vec<DispatchStepInput>) -> Self {
        Self { steps }
    }

    /// `steps` evenly spaced loads from 0 to total fleet capacity, inclusive.
    pub fn merit_sweep(fleet: &Fleet, policy: &DispatchPolicy, steps: usize) -> DispatchResult<Self> {
        if steps == 0 {
            return Err(DispatchError::Config("sweep needs at least one step".into()));
        }
        let top = fleet.total_capacity_mw();
        let loads = (0..steps).map(|i| {
            if steps == 1 {
                0.0
            } else {
                top * i as f64 / (steps - 1) as f64
            }
        });
        Ok(Self {
            steps: loads.map(|load| DispatchStepInput::new(load, policy)).collect(),
        })
    }

    /// One step per load value, with availability fractions expanded onto
    /// every generator of the matching category.
    pub fn load_profile(
        fleet: &Fleet,
        loads: &[f64],
        availability: &AvailabilityProfile,
        policy: &DispatchPolicy,
    ) -> DispatchResult<Self> {
        if let Some((i, load)) = loads
            .iter()
            .enumerate()
            .find(|(_, l)| !l.is_finite() || **l < 0.0)
        {
            return Err(DispatchError::Validation(format!(
                "load at step {} must be finite and non-negative, got {}",
                i, load
            )));
        }
        availability.validate(loads.len())?;

        let steps = loads
            .iter()
            .enumerate()
            .map(|(i, &load)| {
                fleet
                    .iter()
                    .filter_map(|g| availability.fraction(g.category, i).map(|f| (g.id, f)))
                    .fold(DispatchStepInput::new(load, policy), |step, (id, f)| {
                        step.with_renewable_cap(id, f)
                    })
            })
            .collect();
        Ok(Self { steps })
    }

    /// Keep the leading `⌊len · fraction⌋` steps.
    pub fn truncated(mut self, fraction: f64) -> DispatchResult<Self> {
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(DispatchError::Config(format!(
                "run fraction must be within (0, 1], got {}",
                fraction
            )));
        }
        let keep = (self.steps.len() as f64 * fraction).floor() as usize;
        self.steps.truncate(keep);
        Ok(self)
    }

    pub fn steps(&self) -> &[DispatchStepInput] {
        &self.steps
    }

    pub fn loads(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.load_mw).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn into_steps(self) -> Vec<DispatchStepInput> {
        self.steps
    }
}
