//! Backend-neutral linear program model and solver contract.
//!
//! A [`LinearProgram`] is a minimization over bounded continuous variables
//! with `=`, `≤` and `≥` rows. Backends implement [`LpBackend`] and report
//! status as data: a solve never panics and never returns `Err`.
//!
//! Duals follow the sensitivity convention `∂objective/∂rhs` for every row
//! as written, so the dual of a balance row `Σ supply = demand` is the cost
//! of serving one more unit of demand.

pub mod builder;
pub mod clarabel;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use self::builder::{DispatchLp, DispatchLpBuilder, DispatchVariables};
pub use self::clarabel::ClarabelBackend;

/// Handle to a variable in a [`LinearProgram`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(usize);

impl VarId {
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Handle to a constraint row in a [`LinearProgram`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowId(usize);

impl RowId {
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Eq,
    Leq,
    Geq,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub cost: f64,
    pub lower: f64,
    /// `f64::INFINITY` when unbounded above
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub coeffs: Vec<(VarId, f64)>,
    pub kind: RowKind,
    pub rhs: f64,
}

/// `min Σ cost·x` subject to bounded variables and linear rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearProgram {
    variables: Vec<Variable>,
    rows: Vec<Row>,
}

impl LinearProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, cost: f64, lower: f64, upper: f64) -> VarId {
        self.variables.push(Variable { cost, lower, upper });
        VarId(self.variables.len() - 1)
    }

    pub fn add_eq(&mut self, coeffs: &[(VarId, f64)], rhs: f64) -> RowId {
        self.add_row(coeffs, RowKind::Eq, rhs)
    }

    pub fn add_leq(&mut self, coeffs: &[(VarId, f64)], rhs: f64) -> RowId {
        self.add_row(coeffs, RowKind::Leq, rhs)
    }

    pub fn add_geq(&mut self, coeffs: &[(VarId, f64)], rhs: f64) -> RowId {
        self.add_row(coeffs, RowKind::Geq, rhs)
    }

    fn add_row(&mut self, coeffs: &[(VarId, f64)], kind: RowKind, rhs: f64) -> RowId {
        // merge repeated variables so each column sees one entry per row
        let mut merged: Vec<(VarId, f64)> = Vec::with_capacity(coeffs.len());
        for &(var, value) in coeffs {
            match merged.iter_mut().find(|(v, _)| *v == var) {
                Some((_, acc)) => *acc += value,
                None => merged.push((var, value)),
            }
        }
        self.rows.push(Row {
            coeffs: merged,
            kind,
            rhs,
        });
        RowId(self.rows.len() - 1)
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }
}

/// Solve outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LpStatus {
    Optimal,
    Infeasible,
    TimedOut,
    Error,
}

impl fmt::Display for LpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LpStatus::Optimal => "OPTIMAL",
            LpStatus::Infeasible => "INFEASIBLE",
            LpStatus::TimedOut => "TIMED_OUT",
            LpStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Primal and dual values of a solve. Vectors are empty unless `Optimal`.
#[derive(Debug, Clone, PartialEq)]
pub struct LpSolution {
    pub status: LpStatus,
    pub primal: Vec<f64>,
    /// One entry per row, `∂objective/∂rhs`
    pub duals: Vec<f64>,
    pub objective: f64,
    pub iterations: usize,
    /// Backend-specific detail for non-optimal outcomes
    pub message: Option<String>,
}

impl LpSolution {
    pub fn failed(status: LpStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            primal: Vec::new(),
            duals: Vec::new(),
            objective: f64::NAN,
            iterations: 0,
            message: Some(message.into()),
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == LpStatus::Optimal
    }

    pub fn value(&self, var: VarId) -> f64 {
        self.primal.get(var.0).copied().unwrap_or(0.0)
    }

    pub fn dual(&self, row: RowId) -> f64 {
        self.duals.get(row.0).copied().unwrap_or(0.0)
    }
}

/// Per-solve limits.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOptions {
    /// Wall-clock limit; `None` means unlimited
    pub time_limit_secs: Option<f64>,
    pub max_iterations: u32,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            time_limit_secs: None,
            max_iterations: 200,
        }
    }
}

/// A linear-programming backend.
///
/// Implementations must be shareable across worker threads.
pub trait LpBackend: Send + Sync {
    /// Unique identifier (e.g., "clarabel")
    fn id(&self) -> &str;

    fn solve(&self, program: &LinearProgram, options: &SolveOptions) -> LpSolution;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_is_object_safe_and_send_sync() {
        fn _accepts_backend(_b: &dyn LpBackend) {}
        fn _assert_send<T: Send>() {}
        fn _assert_sync<T: Sync>() {}
        _assert_send::<Box<dyn LpBackend>>();
        _assert_sync::<Box<dyn LpBackend>>();
    }

    #[test]
    fn repeated_coefficients_are_merged() {
        let mut lp = LinearProgram::new();
        let x = lp.add_variable(1.0, 0.0, 10.0);
        let y = lp.add_variable(2.0, 0.0, f64::INFINITY);
        let row = lp.add_leq(&[(x, 1.0), (y, 1.0), (x, 2.0)], 5.0);
        let r = &lp.rows()[row.index()];
        assert_eq!(r.coeffs, vec![(x, 3.0), (y, 1.0)]);
        assert_eq!(r.kind, RowKind::Leq);
        assert_eq!(lp.num_variables(), 2);
        assert_eq!(lp.num_rows(), 1);
    }

    #[test]
    fn failed_solution_reads_as_zero() {
        let sol = LpSolution::failed(LpStatus::Error, "boom");
        assert!(!sol.is_optimal());
        assert_eq!(sol.value(VarId(3)), 0.0);
        assert_eq!(sol.dual(RowId(0)), 0.0);
        assert_eq!(sol.message.as_deref(), Some("boom"));
    }

    #[test]
    fn default_options() {
        let options = SolveOptions::default();
        assert_eq!(options.time_limit_secs, None);
        assert_eq!(options.max_iterations, 200);
        assert_eq!(LpStatus::TimedOut.to_string(), "TIMED_OUT");
    }
}
