//! Index-aligned collection of step results.

use std::collections::BTreeMap;

use merit_algo::{DispatchStepResult, FailureReason, StepOutcome};
use merit_core::{DispatchError, DispatchResult, Fleet, GeneratorCategory};
use serde::{Deserialize, Serialize};

/// A failed step and why it failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailure {
    pub index: usize,
    pub reason: FailureReason,
}

/// Per-step series, all of the same length as the load profile.
///
/// Failed steps hold sentinels: NaN cost, zero dispatch, reserve, flexible
/// load and price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesResult {
    pub load_profile: Vec<f64>,
    pub total_costs: Vec<f64>,
    pub marginal_costs: Vec<f64>,
    pub dispatches: BTreeMap<GeneratorCategory, Vec<f64>>,
    pub reserves: BTreeMap<GeneratorCategory, Vec<f64>>,
    /// Dispatch per technology label
    pub dispatches_by_technology: BTreeMap<String, Vec<f64>>,
    pub reserves_by_technology: BTreeMap<String, Vec<f64>>,
    /// Dispatch series per generator, in fleet order
    pub generator_dispatches: Vec<Vec<f64>>,
    pub flexible_loads: Vec<f64>,
    pub success: Vec<bool>,
    pub failures: Vec<StepFailure>,
}

impl TimeSeriesResult {
    pub fn len(&self) -> usize {
        self.load_profile.len()
    }

    pub fn is_empty(&self) -> bool {
        self.load_profile.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.success.iter().filter(|&&ok| ok).count()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Total dispatch of a category at each step; zeros if the fleet has none.
    pub fn dispatch_series(&self, category: GeneratorCategory) -> Vec<f64> {
        self.dispatches
            .get(&category)
            .cloned()
            .unwrap_or_else(|| vec![0.0; self.len()])
    }

    /// Total dispatch of a technology at each step; zeros if the fleet has none.
    pub fn technology_series(&self, technology: &str) -> Vec<f64> {
        self.dispatches_by_technology
            .get(technology)
            .cloned()
            .unwrap_or_else(|| vec![0.0; self.len()])
    }
}

/// Write-once slots, one per step.
#[derive(Debug)]
pub struct ResultAggregator {
    load_profile: Vec<f64>,
    slots: Vec<Option<DispatchStepResult>>,
    failures: Vec<StepFailure>,
    sentinel: DispatchStepResult,
}

impl ResultAggregator {
    pub fn new(fleet: &Fleet, load_profile: Vec<f64>) -> Self {
        let slots = vec![None; load_profile.len()];
        Self {
            load_profile,
            slots,
            failures: Vec::new(),
            sentinel: DispatchStepResult::failed(fleet),
        }
    }

    /// Store the outcome of step `index`. Each index may be written once.
    pub fn record(&mut self, index: usize, outcome: StepOutcome) -> DispatchResult<()> {
        let len = self.slots.len();
        let slot = self.slots.get_mut(index).ok_or_else(|| {
            DispatchError::Aggregation(format!("step index {} out of range 0..{}", index, len))
        })?;
        if slot.is_some() {
            return Err(DispatchError::Aggregation(format!(
                "step {} written twice",
                index
            )));
        }
        match outcome {
            StepOutcome::Dispatched(result) => *slot = Some(result),
            StepOutcome::Failed(reason) => {
                *slot = Some(self.sentinel.clone());
                self.failures.push(StepFailure { index, reason });
            }
        }
        Ok(())
    }

    /// Build the series. Every slot must have been written.
    pub fn finish(mut self) -> DispatchResult<TimeSeriesResult> {
        let n = self.slots.len();
        let mut total_costs = Vec::with_capacity(n);
        let mut marginal_costs = Vec::with_capacity(n);
        let mut flexible_loads = Vec::with_capacity(n);
        let mut success = Vec::with_capacity(n);
        let mut dispatches: BTreeMap<GeneratorCategory, Vec<f64>> = self
            .sentinel
            .dispatch_by_type
            .keys()
            .map(|&c| (c, Vec::with_capacity(n)))
            .collect();
        let mut reserves = dispatches.clone();
        let mut dispatches_by_technology: BTreeMap<String, Vec<f64>> = self
            .sentinel
            .dispatch_by_technology
            .keys()
            .map(|t| (t.clone(), Vec::with_capacity(n)))
            .collect();
        let mut reserves_by_technology = dispatches_by_technology.clone();
        let mut generator_dispatches =
            vec![Vec::with_capacity(n); self.sentinel.generator_dispatch_mw.len()];

        for (index, slot) in self.slots.into_iter().enumerate() {
            let record = slot.ok_or_else(|| {
                DispatchError::Aggregation(format!("step {} never written", index))
            })?;
            total_costs.push(record.total_cost);
            marginal_costs.push(record.marginal_price);
            flexible_loads.push(record.flexible_load_mw);
            success.push(record.success);
            for (category, series) in dispatches.iter_mut() {
                series.push(record.dispatch_by_type.get(category).copied().unwrap_or(0.0));
            }
            for (category, series) in reserves.iter_mut() {
                series.push(record.reserves_by_type.get(category).copied().unwrap_or(0.0));
            }
            for (technology, series) in dispatches_by_technology.iter_mut() {
                series.push(
                    record
                        .dispatch_by_technology
                        .get(technology)
                        .copied()
                        .unwrap_or(0.0),
                );
            }
            for (g, series) in generator_dispatches.iter_mut().enumerate() {
                series.push(record.generator_dispatch_mw.get(g).copied().unwrap_or(0.0));
            }
            for (technology, series) in reserves_by_technology.iter_mut() {
                series.push(
                    record
                        .reserves_by_technology
                        .get(technology)
                        .copied()
                        .unwrap_or(0.0),
                );
            }
        }

        self.failures.sort_by_key(|f| f.index);
        Ok(TimeSeriesResult {
            load_profile: self.load_profile,
            total_costs,
            marginal_costs,
            dispatches,
            reserves,
            dispatches_by_technology,
            reserves_by_technology,
            generator_dispatches,
            flexible_loads,
            success,
            failures: self.failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use merit_core::{Generator, GeneratorId};

    fn fleet() -> Fleet {
        Fleet::new(vec![
            Generator::new(GeneratorId::new(0), "Gas", GeneratorCategory::Dispatchable, 100.0)
                .with_technology("GasTurbinesPlants"),
            Generator::new(GeneratorId::new(1), "Wind", GeneratorCategory::WindFarm, 50.0),
        ])
        .unwrap()
    }

    fn dispatched(gas: f64, wind: f64) -> StepOutcome {
        let mut result = DispatchStepResult::failed(&fleet());
        result.success = true;
        result.total_cost = gas * 20.0;
        result.marginal_price = 20.0;
        result.dispatch_by_type.insert(GeneratorCategory::Dispatchable, gas);
        result.dispatch_by_type.insert(GeneratorCategory::WindFarm, wind);
        result.reserves_by_type.insert(GeneratorCategory::Dispatchable, 5.0);
        result.dispatch_by_technology.insert("GasTurbinesPlants".into(), gas);
        result.dispatch_by_technology.insert("WindFarm".into(), wind);
        result.reserves_by_technology.insert("GasTurbinesPlants".into(), 5.0);
        result.generator_dispatch_mw = vec![gas, wind];
        StepOutcome::Dispatched(result)
    }

    #[test]
    fn aligns_results_by_index_in_any_order() {
        let fleet = fleet();
        let mut agg = ResultAggregator::new(&fleet, vec![10.0, 20.0, 30.0]);
        agg.record(2, dispatched(30.0, 0.0)).unwrap();
        agg.record(0, dispatched(5.0, 5.0)).unwrap();
        agg.record(1, StepOutcome::Failed(FailureReason::TimedOut)).unwrap();
        let series = agg.finish().unwrap();

        assert_eq!(series.len(), 3);
        assert_eq!(series.success, vec![true, false, true]);
        assert_eq!(series.dispatch_series(GeneratorCategory::Dispatchable), vec![5.0, 0.0, 30.0]);
        assert_eq!(series.dispatch_series(GeneratorCategory::WindFarm), vec![5.0, 0.0, 0.0]);
        assert_eq!(series.dispatch_series(GeneratorCategory::SolarPV), vec![0.0; 3]);
        assert_eq!(series.reserves[&GeneratorCategory::Dispatchable], vec![5.0, 0.0, 5.0]);
        assert!(series.total_costs[1].is_nan());
        assert_eq!(series.marginal_costs, vec![20.0, 0.0, 20.0]);
        assert_eq!(
            series.failures,
            vec![StepFailure {
                index: 1,
                reason: FailureReason::TimedOut
            }]
        );
        assert_eq!(series.success_count(), 2);
        assert_eq!(series.failure_count(), 1);
    }

    #[test]
    fn technology_series_align_with_sentinels() {
        let fleet = fleet();
        let mut agg = ResultAggregator::new(&fleet, vec![10.0, 20.0, 30.0]);
        agg.record(1, StepOutcome::Failed(FailureReason::Infeasible)).unwrap();
        agg.record(0, dispatched(4.0, 6.0)).unwrap();
        agg.record(2, dispatched(30.0, 0.0)).unwrap();
        let series = agg.finish().unwrap();

        let keys: Vec<_> = series.dispatches_by_technology.keys().cloned().collect();
        assert_eq!(keys, vec!["GasTurbinesPlants", "WindFarm"]);
        assert_eq!(series.technology_series("GasTurbinesPlants"), vec![4.0, 0.0, 30.0]);
        assert_eq!(series.technology_series("WindFarm"), vec![6.0, 0.0, 0.0]);
        assert_eq!(series.technology_series("SteamPlants"), vec![0.0; 3]);
        assert_eq!(
            series.reserves_by_technology["GasTurbinesPlants"],
            vec![5.0, 0.0, 5.0]
        );
        assert_eq!(series.reserves_by_technology["WindFarm"], vec![0.0; 3]);
        assert_eq!(
            series.generator_dispatches,
            vec![vec![4.0, 0.0, 30.0], vec![6.0, 0.0, 0.0]]
        );
    }

    #[test]
    fn double_write_is_a_consistency_error() {
        let mut agg = ResultAggregator::new(&fleet(), vec![1.0]);
        agg.record(0, dispatched(1.0, 0.0)).unwrap();
        let err = agg.record(0, dispatched(1.0, 0.0)).unwrap_err();
        assert!(matches!(err, DispatchError::Aggregation(_)));
    }

    #[test]
    fn out_of_range_index_is_a_consistency_error() {
        let mut agg = ResultAggregator::new(&fleet(), vec![1.0]);
        assert!(matches!(
            agg.record(3, dispatched(1.0, 0.0)),
            Err(DispatchError::Aggregation(_))
        ));
    }

    #[test]
    fn unfilled_slot_is_a_consistency_error() {
        let mut agg = ResultAggregator::new(&fleet(), vec![1.0, 2.0]);
        agg.record(0, dispatched(1.0, 0.0)).unwrap();
        assert!(matches!(agg.finish(), Err(DispatchError::Aggregation(_))));
    }

    #[test]
    fn series_serialize_for_the_shell() {
        let fleet = fleet();
        let mut agg = ResultAggregator::new(&fleet, vec![10.0, 20.0]);
        agg.record(0, dispatched(10.0, 0.0)).unwrap();
        agg.record(1, StepOutcome::Failed(FailureReason::Solver("MaxIterations".into())))
            .unwrap();
        let series = agg.finish().unwrap();

        let value = serde_json::to_value(&series).unwrap();
        assert_eq!(value["load_profile"], serde_json::json!([10.0, 20.0]));
        assert_eq!(value["success"], serde_json::json!([true, false]));
        assert_eq!(value["failures"][0]["index"], 1);
        assert_eq!(
            value["failures"][0]["reason"]["Solver"],
            "MaxIterations"
        );
        // NaN sentinel has no JSON number form
        assert!(value["total_costs"][1].is_null());
    }

    #[test]
    fn empty_profile_gives_empty_series() {
        let series = ResultAggregator::new(&fleet(), vec![]).finish().unwrap();
        assert!(series.is_empty());
        assert!(series.dispatches.values().all(|s| s.is_empty()));
    }
}
