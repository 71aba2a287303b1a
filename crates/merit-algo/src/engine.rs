//! Single-step dispatch: build, solve, extract.
//!
//! [`DispatchEngine::dispatch`] never fails with an error. Infeasibility,
//! solver breakdowns and time limits come back as [`StepOutcome::Failed`]
//! so that a batch can carry on around them.

use std::collections::BTreeMap;
use std::sync::Arc;

use merit_core::{DispatchResult, Fleet};
use tracing::{debug, warn};
use web_time::Instant;

use crate::linearize::{CostCurveLinearizer, LinearizedFleet};
use crate::lp::{
    ClarabelBackend, DispatchLp, DispatchLpBuilder, LpBackend, LpSolution, LpStatus, SolveOptions,
};
use crate::policy::DispatchPolicy;
use crate::step::{DispatchStepInput, DispatchStepResult, FailureReason, StepOutcome};

/// Relative slack on the capacity pre-check, to stay clear of solver tolerance.
const CAPACITY_CHECK_TOLERANCE: f64 = 1e-9;

/// Relative slack when deciding whether a segment is in use or still has room.
const ACTIVITY_TOLERANCE: f64 = 1e-6;

/// Solves one dispatch step against a cached, linearized fleet.
///
/// Cheap to clone; the fleet, segments and backend are shared.
#[derive(Clone)]
pub struct DispatchEngine {
    linearized: Arc<LinearizedFleet>,
    backend: Arc<dyn LpBackend>,
    options: SolveOptions,
}

impl std::fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("generators", &self.linearized.fleet().len())
            .field("segment_count", &self.linearized.segment_count())
            .field("backend", &self.backend.id())
            .field("options", &self.options)
            .finish()
    }
}

impl DispatchEngine {
    /// Linearize `fleet` with `segment_count` segments and use the Clarabel backend.
    pub fn new(fleet: Arc<Fleet>, segment_count: usize) -> DispatchResult<Self> {
        let linearized = CostCurveLinearizer::new(segment_count)?.linearize_fleet(fleet)?;
        Ok(Self {
            linearized: Arc::new(linearized),
            backend: Arc::new(ClarabelBackend::new()),
            options: SolveOptions::default(),
        })
    }

    /// Engine configured from a validated policy.
    pub fn from_policy(fleet: Arc<Fleet>, policy: &DispatchPolicy) -> DispatchResult<Self> {
        policy.validate()?;
        Ok(Self::new(fleet, policy.segment_count)?.with_time_limit(policy.step_time_limit_secs))
    }

    pub fn with_backend(mut self, backend: Arc<dyn LpBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_time_limit(mut self, time_limit_secs: Option<f64>) -> Self {
        self.options.time_limit_secs = time_limit_secs;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.options.max_iterations = max_iterations;
        self
    }

    pub fn fleet(&self) -> &Fleet {
        self.linearized.fleet()
    }

    pub fn linearized(&self) -> &LinearizedFleet {
        &self.linearized
    }

    pub fn backend_id(&self) -> &str {
        self.backend.id()
    }

    pub fn options(&self) -> &SolveOptions {
        &self.options
    }

    /// Dispatch one step.
    pub fn dispatch(&self, step: &DispatchStepInput) -> StepOutcome {
        let fleet = self.linearized.fleet();
        if let Err(e) = step.validate(fleet) {
            let reason = FailureReason::Solver(format!("rejected step input: {}", e));
            warn!(load_mw = step.load_mw, %reason, "step input rejected");
            return StepOutcome::Failed(reason);
        }

        let builder = DispatchLpBuilder::new(&self.linearized);
        let available = builder.available_capacity_mw(step);
        if step.load_mw > available * (1.0 + CAPACITY_CHECK_TOLERANCE) + CAPACITY_CHECK_TOLERANCE {
            warn!(
                load_mw = step.load_mw,
                available_mw = available,
                "step infeasible: load exceeds available capacity"
            );
            return StepOutcome::Failed(FailureReason::Infeasible);
        }

        let start = Instant::now();
        let built = builder.build(step);
        let solution = self.backend.solve(&built.program, &self.options);
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        match solution.status {
            LpStatus::Optimal => {}
            LpStatus::Infeasible => {
                warn!(load_mw = step.load_mw, elapsed_ms, "step infeasible");
                return StepOutcome::Failed(FailureReason::Infeasible);
            }
            LpStatus::TimedOut => {
                warn!(
                    load_mw = step.load_mw,
                    limit_secs = ?self.options.time_limit_secs,
                    "step solve hit time limit"
                );
                return StepOutcome::Failed(FailureReason::TimedOut);
            }
            LpStatus::Error => {
                let message = solution
                    .message
                    .clone()
                    .unwrap_or_else(|| "unknown solver failure".to_string());
                warn!(
                    load_mw = step.load_mw,
                    backend = self.backend.id(),
                    error = %message,
                    "step solver failure"
                );
                return StepOutcome::Failed(FailureReason::Solver(message));
            }
        }

        let vars = &built.variables;
        let mut generator_dispatch_mw = Vec::with_capacity(fleet.len());
        let mut generator_reserve_mw = Vec::with_capacity(fleet.len());
        let mut dispatch_by_type = BTreeMap::new();
        let mut reserves_by_type = BTreeMap::new();
        let mut dispatch_by_technology = BTreeMap::new();
        let mut reserves_by_technology = BTreeMap::new();
        let mut total_cost = 0.0;

        for (index, gen) in fleet.iter().enumerate() {
            let upper = DispatchLpBuilder::available_mw(gen, step).min(gen.capacity_mw);
            let raw: f64 = vars.segments[index]
                .iter()
                .map(|&v| solution.value(v).max(0.0))
                .sum();
            let p = raw.clamp(0.0, upper.max(0.0));
            let reserve = vars.reserves[index]
                .map(|v| solution.value(v).clamp(0.0, gen.capacity_mw))
                .unwrap_or(0.0);

            total_cost += gen.cost(p);
            *dispatch_by_type.entry(gen.category).or_insert(0.0) += p;
            *reserves_by_type.entry(gen.category).or_insert(0.0) += reserve;
            *dispatch_by_technology
                .entry(gen.technology_label().to_string())
                .or_insert(0.0) += p;
            *reserves_by_technology
                .entry(gen.technology_label().to_string())
                .or_insert(0.0) += reserve;
            generator_dispatch_mw.push(p);
            generator_reserve_mw.push(reserve);
        }

        let flexible_load_mw = vars
            .flexible_load
            .map(|v| solution.value(v).clamp(0.0, step.flexible_load_cap_mw))
            .unwrap_or(0.0);
        let marginal_price = settle_price(
            solution.dual(vars.load_balance),
            &built,
            &solution,
            fleet,
            step,
            &generator_dispatch_mw,
        );

        debug!(
            load_mw = step.load_mw,
            total_cost,
            marginal_price,
            flexible_load_mw,
            iterations = solution.iterations,
            elapsed_ms,
            "step dispatched"
        );

        StepOutcome::Dispatched(DispatchStepResult {
            success: true,
            total_cost,
            dispatch_by_type,
            reserves_by_type,
            dispatch_by_technology,
            reserves_by_technology,
            flexible_load_mw,
            marginal_price,
            generator_dispatch_mw,
            generator_reserve_mw,
        })
    }
}

#[inline]
fn activity_tolerance(scale: f64) -> f64 {
    ACTIVITY_TOLERANCE * scale.abs().max(1.0)
}

/// Price one more MW of load at a degenerate dispatch point.
///
/// An interior-point dual is only pinned down when some segment is in use
/// and some segment still has room. With nothing in use (zero load) the
/// price is the slope of the cheapest segment with room; with nothing left
/// (full capacity) it is the slope of the dearest segment in use. Flexible
/// load counts on both sides at its benefit. Otherwise the dual stands.
fn settle_price(
    dual: f64,
    built: &DispatchLp,
    solution: &LpSolution,
    fleet: &Fleet,
    step: &DispatchStepInput,
    dispatch_mw: &[f64],
) -> f64 {
    let variables = built.program.variables();
    let vars = &built.variables;
    let mut dearest_in_use = f64::NEG_INFINITY;
    let mut cheapest_with_room = f64::INFINITY;

    for (index, gen) in fleet.iter().enumerate() {
        let mut limit = DispatchLpBuilder::available_mw(gen, step).min(gen.capacity_mw);
        if vars.reserves[index].is_some() {
            limit -= step.unit_reserve_pct / 100.0 * gen.capacity_mw;
        }
        let unit_has_room = dispatch_mw[index] < limit - activity_tolerance(limit);
        for &v in &vars.segments[index] {
            let segment = &variables[v.index()];
            let value = solution.value(v);
            if value > activity_tolerance(segment.upper) {
                dearest_in_use = dearest_in_use.max(segment.cost);
            }
            if unit_has_room && value < segment.upper - activity_tolerance(segment.upper) {
                cheapest_with_room = cheapest_with_room.min(segment.cost);
            }
        }
    }

    if let Some(flex) = vars.flexible_load {
        let bound = &variables[flex.index()];
        let benefit = -bound.cost;
        let value = solution.value(flex);
        // shedding served flexible load frees a MW, serving more absorbs one
        if value > activity_tolerance(bound.upper) {
            cheapest_with_room = cheapest_with_room.min(benefit);
        }
        if value < bound.upper - activity_tolerance(bound.upper) {
            dearest_in_use = dearest_in_use.max(benefit);
        }
    }

    match (dearest_in_use.is_finite(), cheapest_with_room.is_finite()) {
        (false, true) => cheapest_with_room,
        (true, false) => dearest_in_use,
        _ => dual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lp::{LinearProgram, LpSolution};
    use merit_core::{Generator, GeneratorCategory, GeneratorId};

    struct FixedStatus(LpStatus);

    impl LpBackend for FixedStatus {
        fn id(&self) -> &str {
            "fixed"
        }

        fn solve(&self, _program: &LinearProgram, _options: &SolveOptions) -> LpSolution {
            LpSolution::failed(self.0, "forced")
        }
    }

    fn gas_only() -> Arc<Fleet> {
        Arc::new(
            Fleet::new(vec![Generator::new(
                GeneratorId::new(0),
                "Gas",
                GeneratorCategory::Dispatchable,
                100.0,
            )
            .with_cost(0.0, 20.0, 0.0)])
            .unwrap(),
        )
    }

    #[test]
    fn capacity_precheck_skips_solver() {
        let engine = DispatchEngine::new(gas_only(), 10)
            .unwrap()
            .with_backend(Arc::new(FixedStatus(LpStatus::Error)));
        let step = DispatchStepInput::new(500.0, &DispatchPolicy::default());
        assert_eq!(
            engine.dispatch(&step),
            StepOutcome::Failed(FailureReason::Infeasible)
        );
    }

    #[test]
    fn backend_status_maps_to_failure_reason() {
        let step = DispatchStepInput::new(50.0, &DispatchPolicy::default());
        let cases = [
            (LpStatus::Infeasible, FailureReason::Infeasible),
            (LpStatus::TimedOut, FailureReason::TimedOut),
            (LpStatus::Error, FailureReason::Solver("forced".into())),
        ];
        for (status, expected) in cases {
            let engine = DispatchEngine::new(gas_only(), 10)
                .unwrap()
                .with_backend(Arc::new(FixedStatus(status)));
            assert_eq!(engine.dispatch(&step).failure(), Some(&expected));
        }
    }

    #[test]
    fn invalid_step_is_a_failed_outcome() {
        let engine = DispatchEngine::new(gas_only(), 10).unwrap();
        let step = DispatchStepInput::new(f64::NAN, &DispatchPolicy::default());
        assert!(matches!(
            engine.dispatch(&step),
            StepOutcome::Failed(FailureReason::Solver(_))
        ));
    }

    #[test]
    fn from_policy_validates_and_sets_limit() {
        let bad = DispatchPolicy {
            segment_count: 0,
            ..Default::default()
        };
        assert!(DispatchEngine::from_policy(gas_only(), &bad).is_err());

        let policy = DispatchPolicy {
            step_time_limit_secs: Some(2.5),
            ..Default::default()
        };
        let engine = DispatchEngine::from_policy(gas_only(), &policy).unwrap();
        assert_eq!(engine.options().time_limit_secs, Some(2.5));
        assert_eq!(engine.backend_id(), "clarabel");
        assert_eq!(engine.linearized().segment_count(), 10);
    }

    #[test]
    fn linear_unit_cost_and_price() {
        let engine = DispatchEngine::new(gas_only(), 10).unwrap();
        let step = DispatchStepInput::new(40.0, &DispatchPolicy::default());
        match engine.dispatch(&step) {
            StepOutcome::Dispatched(result) => {
                assert!((result.generator_dispatch_mw[0] - 40.0).abs() < 1e-4);
                assert!((result.total_cost - 800.0).abs() < 1e-2);
                assert!((result.marginal_price - 20.0).abs() < 1e-4);
            }
            other => panic!("expected dispatch, got {:?}", other),
        }
    }

    #[test]
    fn price_at_zero_and_full_load_uses_segment_slope() {
        let engine = DispatchEngine::new(gas_only(), 10).unwrap();
        let policy = DispatchPolicy::default();
        for load in [0.0, 100.0] {
            match engine.dispatch(&DispatchStepInput::new(load, &policy)) {
                StepOutcome::Dispatched(result) => {
                    assert!(
                        (result.marginal_price - 20.0).abs() < 1e-9,
                        "load {}: price {}",
                        load,
                        result.marginal_price
                    );
                }
                other => panic!("expected dispatch at load {}, got {:?}", load, other),
            }
        }
    }

    #[test]
    fn results_group_by_technology_label() {
        let fleet = Arc::new(
            Fleet::new(vec![
                Generator::new(GeneratorId::new(0), "GT1", GeneratorCategory::Dispatchable, 50.0)
                    .with_cost(0.0, 20.0, 0.0)
                    .with_technology("GasTurbinesPlants"),
                Generator::new(GeneratorId::new(1), "GT2", GeneratorCategory::Dispatchable, 50.0)
                    .with_cost(0.0, 21.0, 0.0)
                    .with_technology("GasTurbinesPlants"),
                Generator::new(GeneratorId::new(2), "Steam", GeneratorCategory::Dispatchable, 50.0)
                    .with_cost(0.0, 30.0, 0.0)
                    .with_technology("SteamPlants"),
                Generator::new(GeneratorId::new(3), "PV", GeneratorCategory::SolarPV, 20.0),
            ])
            .unwrap(),
        );
        let engine = DispatchEngine::new(fleet, 4).unwrap();
        let policy = DispatchPolicy {
            unit_reserve_pct: 10.0,
            ..Default::default()
        };
        let result = match engine.dispatch(&DispatchStepInput::new(110.0, &policy)) {
            StepOutcome::Dispatched(result) => result,
            other => panic!("expected dispatch, got {:?}", other),
        };

        // PV 20, both turbines to their 45 MW headroom, steam none
        let gas = result.dispatch_by_technology["GasTurbinesPlants"];
        assert!((gas - 90.0).abs() < 1e-3, "gas turbines {}", gas);
        assert!(result.dispatch_by_technology["SteamPlants"].abs() < 1e-3);
        // unlabelled units fall back to their category
        assert!((result.dispatch_by_technology["SolarPV"] - 20.0).abs() < 1e-3);
        assert!(result.reserves_by_technology["GasTurbinesPlants"] >= 10.0 - 1e-6);
        assert!(result.reserves_by_technology["SteamPlants"] >= 5.0 - 1e-6);
        assert_eq!(result.reserves_by_technology["SolarPV"], 0.0);
        let by_technology: f64 = result.dispatch_by_technology.values().sum();
        assert!((by_technology - result.total_dispatch_mw()).abs() < 1e-9);
    }
}
