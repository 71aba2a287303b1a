//! Time-series dispatch runs.
//!
//! A [`StepPlan`] (merit-order sweep or load profile) is fanned out over a
//! [`ParallelScheduler`] pool, collected by a [`ResultAggregator`] into a
//! [`TimeSeriesResult`] and optionally reduced to a [`SystemCostSummary`].

pub mod aggregate;
pub mod config;
pub mod plan;
pub mod profile;
pub mod runner;
pub mod summary;

pub use aggregate::{ResultAggregator, StepFailure, TimeSeriesResult};
pub use config::{DispatchConfig, PlanConfig};
pub use plan::{StepPlan, DEFAULT_SWEEP_STEPS};
pub use profile::{downsample_mean, AvailabilityProfile, FIVE_MINUTE_SAMPLES_PER_HOUR};
pub use runner::{Calibration, CalibrationTrial, ParallelScheduler, ScheduledRun, SchedulerConfig};
pub use summary::SystemCostSummary;
