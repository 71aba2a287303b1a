use merit_algo::{DispatchEngine, DispatchStepInput, StepOutcome};
use merit_core::{DispatchError, DispatchResult};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use tracing::info;
use web_time::Instant;

use crate::aggregate::{ResultAggregator, TimeSeriesResult};
use crate::plan::StepPlan;

/// Worker pool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Pool size; `0` picks one by calibration before the run
    pub workers: usize,
    /// Calibrate on at most this many leading steps; `None` uses the whole batch
    pub calibration_steps: Option<usize>,
    /// Largest pool size tried; `None` means twice the available parallelism
    pub max_calibration_workers: Option<usize>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            calibration_steps: None,
            max_calibration_workers: None,
        }
    }
}

impl SchedulerConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn validate(&self) -> DispatchResult<()> {
        if self.calibration_steps == Some(0) {
            return Err(DispatchError::Config(
                "calibration_steps must be at least 1".into(),
            ));
        }
        if self.max_calibration_workers == Some(0) {
            return Err(DispatchError::Config(
                "max_calibration_workers must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Wall-clock time of one calibration trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationTrial {
    pub workers: usize,
    pub elapsed_secs: f64,
}

/// Outcome of the calibration phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub trials: Vec<CalibrationTrial>,
    pub best_workers: usize,
}

/// A finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledRun {
    pub result: TimeSeriesResult,
    pub workers: usize,
    pub calibration: Option<Calibration>,
    pub elapsed_secs: f64,
}

/// Runs a [`DispatchEngine`] over a [`StepPlan`] on a bounded rayon pool.
///
/// Steps are independent; outcomes are collected with an indexed parallel
/// iterator so the result order is the plan order regardless of which
/// worker finished first.
#[derive(Debug, Clone)]
pub struct ParallelScheduler {
    engine: DispatchEngine,
    config: SchedulerConfig,
}

impl ParallelScheduler {
    pub fn new(engine: DispatchEngine, config: SchedulerConfig) -> Self {
        Self { engine, config }
    }

    pub fn engine(&self) -> &DispatchEngine {
        &self.engine
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Validate the plan, calibrate if asked to, then run it.
    ///
    /// Configuration errors are returned before any worker starts. Step
    /// failures are part of the result, never an error.
    pub fn run(&self, plan: &StepPlan) -> DispatchResult<ScheduledRun> {
        self.config.validate()?;
        let fleet = self.engine.fleet();
        for (index, step) in plan.steps().iter().enumerate() {
            step.validate(fleet).map_err(|e| {
                DispatchError::Validation(format!("step {}: {}", index, e))
            })?;
        }

        let calibration = if self.config.workers == 0 {
            Some(self.calibrate(plan.steps())?)
        } else {
            None
        };
        let workers = calibration
            .as_ref()
            .map(|c| c.best_workers)
            .unwrap_or(self.config.workers);

        info!(
            steps = plan.len(),
            workers,
            backend = self.engine.backend_id(),
            "starting dispatch batch"
        );
        let start = Instant::now();
        let result = self.run_with_workers(plan.steps(), workers)?;
        let elapsed_secs = start.elapsed().as_secs_f64();
        info!(
            steps = result.len(),
            success = result.success_count(),
            failure = result.failure_count(),
            elapsed_secs,
            "dispatch batch finished"
        );

        Ok(ScheduledRun {
            result,
            workers,
            calibration,
            elapsed_secs,
        })
    }

    /// Run `steps` on a pool of exactly `workers` threads.
    pub fn run_with_workers(
        &self,
        steps: &[DispatchStepInput],
        workers: usize,
    ) -> DispatchResult<TimeSeriesResult> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .build()
            .map_err(|e| DispatchError::ThreadPool(format!("building rayon pool: {}", e)))?;

        let outcomes: Vec<StepOutcome> =
            pool.install(|| steps.par_iter().map(|step| self.engine.dispatch(step)).collect());

        let loads = steps.iter().map(|s| s.load_mw).collect();
        let mut aggregator = ResultAggregator::new(self.engine.fleet(), loads);
        for (index, outcome) in outcomes.into_iter().enumerate() {
            aggregator.record(index, outcome)?;
        }
        aggregator.finish()
    }

    /// Time the batch, or its leading `calibration_steps`, at every pool
    /// size from 1 up to the configured maximum, one trial after another,
    /// and pick the fastest.
    pub fn calibrate(&self, steps: &[DispatchStepInput]) -> DispatchResult<Calibration> {
        let sample = match self.config.calibration_steps {
            Some(limit) => &steps[..limit.min(steps.len())],
            None => steps,
        };
        let max_workers = self
            .config
            .max_calibration_workers
            .unwrap_or_else(|| 2 * num_cpus::get())
            .max(1);

        if sample.is_empty() {
            return Ok(Calibration {
                trials: Vec::new(),
                best_workers: 1,
            });
        }

        info!(
            sample_steps = sample.len(),
            max_workers, "calibrating worker pool size"
        );
        let mut trials = Vec::with_capacity(max_workers);
        for workers in 1..=max_workers {
            let start = Instant::now();
            self.run_with_workers(sample, workers)?;
            let elapsed_secs = start.elapsed().as_secs_f64();
            info!(workers, elapsed_secs, "calibration trial");
            trials.push(CalibrationTrial {
                workers,
                elapsed_secs,
            });
        }

        let best_workers = trials
            .iter()
            .min_by(|a, b| a.elapsed_secs.total_cmp(&b.elapsed_secs))
            .map(|t| t.workers)
            .unwrap_or(1);
        info!(best_workers, "calibration selected pool size");

        Ok(Calibration {
            trials,
            best_workers,
        })
    }
}
