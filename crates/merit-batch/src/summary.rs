//! Whole-run economics.

use std::collections::BTreeMap;

use merit_algo::lp::DispatchLpBuilder;
use merit_algo::DispatchStepInput;
use merit_core::{DispatchError, DispatchResult, Fleet, GeneratorCategory};
use serde::{Deserialize, Serialize};

use crate::aggregate::TimeSeriesResult;

/// Totals over the successful steps of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemCostSummary {
    /// Σ cost · step_hours ($)
    pub total_cost: f64,
    /// Σ load · step_hours (MWh)
    pub energy_served_mwh: f64,
    /// total_cost / energy_served_mwh ($/MWh), 0 when nothing was served
    pub average_cost_per_mwh: f64,
    pub renewable_available_mwh: f64,
    pub renewable_dispatched_mwh: f64,
    /// Share of available renewable energy left unused (%)
    pub curtailment_pct: f64,
    /// Energy served over nameplate energy of the successful steps (%)
    pub capacity_utilization_pct: f64,
    /// Energy per technology label (MWh)
    pub energy_by_technology_mwh: BTreeMap<String, f64>,
    /// Energy per fuel label (MWh)
    pub energy_by_fuel_mwh: BTreeMap<String, f64>,
    pub successful_steps: usize,
    pub failed_steps: usize,
}

impl SystemCostSummary {
    /// Summarize `result`, produced from `steps`, with each step lasting `step_hours`.
    pub fn from_run(
        fleet: &Fleet,
        steps: &[DispatchStepInput],
        result: &TimeSeriesResult,
        step_hours: f64,
    ) -> DispatchResult<Self> {
        if !(step_hours > 0.0) || !step_hours.is_finite() {
            return Err(DispatchError::Config(format!(
                "step_hours must be positive, got {}",
                step_hours
            )));
        }
        if steps.len() != result.len() {
            return Err(DispatchError::Validation(format!(
                "{} step inputs for a result of {} steps",
                steps.len(),
                result.len()
            )));
        }
        if result.generator_dispatches.len() != fleet.len() {
            return Err(DispatchError::Validation(format!(
                "result has {} generator series for a fleet of {}",
                result.generator_dispatches.len(),
                fleet.len()
            )));
        }

        let renewable_dispatch: Vec<Vec<f64>> = GeneratorCategory::ALL
            .iter()
            .filter(|c| c.is_renewable())
            .map(|&c| result.dispatch_series(c))
            .collect();

        let mut summary = Self {
            total_cost: 0.0,
            energy_served_mwh: 0.0,
            average_cost_per_mwh: 0.0,
            renewable_available_mwh: 0.0,
            renewable_dispatched_mwh: 0.0,
            curtailment_pct: 0.0,
            capacity_utilization_pct: 0.0,
            energy_by_technology_mwh: fleet.technologies().into_iter().map(|t| (t, 0.0)).collect(),
            energy_by_fuel_mwh: fleet.fuels().into_iter().map(|f| (f, 0.0)).collect(),
            successful_steps: result.success_count(),
            failed_steps: result.failure_count(),
        };

        for (i, step) in steps.iter().enumerate() {
            if !result.success[i] {
                continue;
            }
            summary.total_cost += result.total_costs[i] * step_hours;
            summary.energy_served_mwh += step.load_mw * step_hours;
            summary.renewable_available_mwh += fleet
                .iter()
                .filter(|g| g.is_renewable())
                .map(|g| DispatchLpBuilder::available_mw(g, step))
                .sum::<f64>()
                * step_hours;
            summary.renewable_dispatched_mwh +=
                renewable_dispatch.iter().map(|s| s[i]).sum::<f64>() * step_hours;

            for (gen, series) in fleet.iter().zip(&result.generator_dispatches) {
                let energy = series[i] * step_hours;
                *summary
                    .energy_by_technology_mwh
                    .entry(gen.technology_label().to_string())
                    .or_insert(0.0) += energy;
                *summary
                    .energy_by_fuel_mwh
                    .entry(gen.fuel_label().to_string())
                    .or_insert(0.0) += energy;
            }
        }

        if summary.energy_served_mwh > 0.0 {
            summary.average_cost_per_mwh = summary.total_cost / summary.energy_served_mwh;
        }
        let nameplate_mwh =
            fleet.total_capacity_mw() * summary.successful_steps as f64 * step_hours;
        if nameplate_mwh > 0.0 {
            summary.capacity_utilization_pct = summary.energy_served_mwh / nameplate_mwh * 100.0;
        }
        if summary.renewable_available_mwh > 0.0 {
            let unused = (summary.renewable_available_mwh - summary.renewable_dispatched_mwh).max(0.0);
            summary.curtailment_pct = unused / summary.renewable_available_mwh * 100.0;
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::ResultAggregator;
    use merit_algo::{DispatchPolicy, DispatchStepResult, FailureReason, StepOutcome};
    use merit_core::{Generator, GeneratorId};

    fn fleet() -> Fleet {
        Fleet::new(vec![
            Generator::new(GeneratorId::new(0), "Gas", GeneratorCategory::Dispatchable, 100.0)
                .with_technology("GasTurbinesPlants")
                .with_fuel("NaturalGas"),
            Generator::new(GeneratorId::new(1), "Solar", GeneratorCategory::SolarPV, 40.0),
        ])
        .unwrap()
    }

    fn step_result(fleet: &Fleet, cost: f64, gas: f64, solar: f64) -> StepOutcome {
        let mut r = DispatchStepResult::failed(fleet);
        r.success = true;
        r.total_cost = cost;
        r.dispatch_by_type.insert(GeneratorCategory::Dispatchable, gas);
        r.dispatch_by_type.insert(GeneratorCategory::SolarPV, solar);
        r.generator_dispatch_mw = vec![gas, solar];
        StepOutcome::Dispatched(r)
    }

    #[test]
    fn totals_skip_failed_steps() {
        let fleet = fleet();
        let policy = DispatchPolicy::default();
        let steps = vec![
            DispatchStepInput::new(50.0, &policy).with_renewable_cap(GeneratorId::new(1), 0.5),
            DispatchStepInput::new(60.0, &policy).with_renewable_cap(GeneratorId::new(1), 0.5),
            DispatchStepInput::new(500.0, &policy),
        ];
        let mut agg = ResultAggregator::new(&fleet, steps.iter().map(|s| s.load_mw).collect());
        // solar fully used in step 0, half curtailed in step 1
        agg.record(0, step_result(&fleet, 600.0, 30.0, 20.0)).unwrap();
        agg.record(1, step_result(&fleet, 1000.0, 50.0, 10.0)).unwrap();
        agg.record(2, StepOutcome::Failed(FailureReason::Infeasible)).unwrap();
        let result = agg.finish().unwrap();

        let summary = SystemCostSummary::from_run(&fleet, &steps, &result, 0.5).unwrap();
        assert!((summary.total_cost - 800.0).abs() < 1e-9);
        assert!((summary.energy_served_mwh - 55.0).abs() < 1e-9);
        assert!((summary.average_cost_per_mwh - 800.0 / 55.0).abs() < 1e-9);
        assert!((summary.renewable_available_mwh - 20.0).abs() < 1e-9);
        assert!((summary.renewable_dispatched_mwh - 15.0).abs() < 1e-9);
        assert!((summary.curtailment_pct - 25.0).abs() < 1e-9);
        // 55 MWh over 140 MW for two half-hour steps
        assert!((summary.capacity_utilization_pct - 55.0 / 140.0 * 100.0).abs() < 1e-9);
        assert!((summary.energy_by_technology_mwh["GasTurbinesPlants"] - 40.0).abs() < 1e-9);
        assert!((summary.energy_by_technology_mwh["SolarPV"] - 15.0).abs() < 1e-9);
        assert!((summary.energy_by_fuel_mwh["NaturalGas"] - 40.0).abs() < 1e-9);
        assert!((summary.energy_by_fuel_mwh["SolarPV"] - 15.0).abs() < 1e-9);
        assert_eq!(summary.successful_steps, 2);
        assert_eq!(summary.failed_steps, 1);
    }

    #[test]
    fn rejects_mismatched_inputs() {
        let fleet = fleet();
        let result = ResultAggregator::new(&fleet, vec![]).finish().unwrap();
        let steps = vec![DispatchStepInput::new(1.0, &DispatchPolicy::default())];
        assert!(SystemCostSummary::from_run(&fleet, &steps, &result, 1.0).is_err());
        assert!(SystemCostSummary::from_run(&fleet, &[], &result, 0.0).is_err());

        let empty = SystemCostSummary::from_run(&fleet, &[], &result, 1.0).unwrap();
        assert_eq!(empty.average_cost_per_mwh, 0.0);
        assert_eq!(empty.curtailment_pct, 0.0);
        assert_eq!(empty.capacity_utilization_pct, 0.0);
        assert_eq!(empty.energy_by_fuel_mwh["NaturalGas"], 0.0);
    }

    #[test]
    fn fuel_energy_merges_technologies() {
        let fleet = Fleet::new(vec![
            Generator::new(GeneratorId::new(0), "GT", GeneratorCategory::Dispatchable, 50.0)
                .with_technology("GasTurbinesPlants")
                .with_fuel("NaturalGas"),
            Generator::new(GeneratorId::new(1), "CC", GeneratorCategory::Dispatchable, 50.0)
                .with_technology("CombinedCyclePlants")
                .with_fuel("NaturalGas"),
            Generator::new(GeneratorId::new(2), "ST", GeneratorCategory::Dispatchable, 100.0)
                .with_technology("SteamPlants")
                .with_fuel("CrudeOil"),
        ])
        .unwrap();
        let policy = DispatchPolicy::default();
        let steps = vec![
            DispatchStepInput::new(60.0, &policy),
            DispatchStepInput::new(100.0, &policy),
        ];
        let mut agg = ResultAggregator::new(&fleet, vec![60.0, 100.0]);
        for (i, dispatch) in [[10.0, 50.0, 0.0], [20.0, 50.0, 30.0]].into_iter().enumerate() {
            let mut r = DispatchStepResult::failed(&fleet);
            r.success = true;
            r.total_cost = 0.0;
            r.generator_dispatch_mw = dispatch.to_vec();
            agg.record(i, StepOutcome::Dispatched(r)).unwrap();
        }
        let result = agg.finish().unwrap();

        let summary = SystemCostSummary::from_run(&fleet, &steps, &result, 2.0).unwrap();
        assert_eq!(summary.energy_by_fuel_mwh.len(), 2);
        assert!((summary.energy_by_fuel_mwh["NaturalGas"] - 260.0).abs() < 1e-9);
        assert!((summary.energy_by_fuel_mwh["CrudeOil"] - 60.0).abs() < 1e-9);
        assert!((summary.energy_by_technology_mwh["GasTurbinesPlants"] - 60.0).abs() < 1e-9);
        assert!((summary.energy_by_technology_mwh["CombinedCyclePlants"] - 200.0).abs() < 1e-9);
        // 320 MWh served out of 200 MW over 4 hours
        assert!((summary.capacity_utilization_pct - 40.0).abs() < 1e-9);
    }
}
