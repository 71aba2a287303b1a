//! # merit-algo: Economic Dispatch Algorithms
//!
//! Least-cost dispatch of a generator fleet for a single demand value.
//!
//! ## Pipeline
//!
//! 1. [`CostCurveLinearizer`] turns each quadratic cost curve into ordered
//!    linear segments, once per run ([`LinearizedFleet`]).
//! 2. [`lp::DispatchLpBuilder`] assembles the step's linear program from the
//!    segments and a [`DispatchStepInput`].
//! 3. An [`lp::LpBackend`] solves it ([`lp::ClarabelBackend`] by default) and
//!    reports the load-balance dual.
//! 4. [`DispatchEngine`] reads the solution back, re-prices the dispatch on
//!    the true quadratic curves and returns a [`StepOutcome`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use merit_algo::{DispatchEngine, DispatchPolicy, DispatchStepInput, StepOutcome};
//! use merit_core::{Fleet, Generator, GeneratorCategory, GeneratorId};
//!
//! let fleet = Fleet::new(vec![
//!     Generator::new(GeneratorId::new(0), "Gas", GeneratorCategory::Dispatchable, 100.0)
//!         .with_cost(0.0, 20.0, 0.0),
//! ])?;
//! let policy = DispatchPolicy::default();
//! let engine = DispatchEngine::from_policy(Arc::new(fleet), &policy)?;
//!
//! if let StepOutcome::Dispatched(result) = engine.dispatch(&DispatchStepInput::new(60.0, &policy)) {
//!     println!("cost {} $/h at {} $/MWh", result.total_cost, result.marginal_price);
//! }
//! # Ok::<(), merit_core::DispatchError>(())
//! ```

pub mod engine;
pub mod linearize;
pub mod lp;
pub mod policy;
pub mod step;

pub use engine::DispatchEngine;
pub use linearize::{CostCurveLinearizer, LinearSegment, LinearizedFleet, DEFAULT_SEGMENT_COUNT};
pub use lp::{LpBackend, LpSolution, LpStatus, SolveOptions};
pub use policy::DispatchPolicy;
pub use step::{DispatchStepInput, DispatchStepResult, FailureReason, StepOutcome};
