//! Clarabel interior-point backend.
//!
//! Clarabel solves
//!
//! ```text
//! minimize    ½x'Px + q'x
//! subject to  Ax + s = b,  s ∈ K
//! ```
//!
//! An LP maps onto it with `P = 0`, equality rows in the zero cone and `≤`
//! rows in the nonnegative cone. `≥` rows and variable lower bounds are
//! negated into `≤` form. Variable bounds become ordinary rows appended
//! after the program's own rows.
//!
//! With this form the dual `z` satisfies `∂V/∂b = -z`, so a row stored with
//! orientation `σ` (`+1` as written, `-1` when negated) reports
//! `∂V/∂rhs = -σ·z`.

use ::clarabel::{
    algebra::CscMatrix,
    solver::{DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT},
};

use super::{LinearProgram, LpBackend, LpSolution, LpStatus, RowKind, SolveOptions};

/// Pure-Rust interior-point LP backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClarabelBackend;

impl ClarabelBackend {
    pub fn new() -> Self {
        Self
    }
}

/// Problem data in Clarabel's conic form.
struct ConicForm {
    a: CscMatrix<f64>,
    b: Vec<f64>,
    q: Vec<f64>,
    cones: Vec<SupportedConeT<f64>>,
    /// Sign applied to each program row when stored
    orientation: Vec<f64>,
}

fn assemble(program: &LinearProgram) -> ConicForm {
    let n_var = program.num_variables();
    let mut columns: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n_var];
    let mut b: Vec<f64> = Vec::new();
    let mut cones: Vec<SupportedConeT<f64>> = Vec::new();

    let mut push_row = |coeffs: &mut dyn Iterator<Item = (usize, f64)>,
                        rhs: f64,
                        equality: bool,
                        b: &mut Vec<f64>,
                        cones: &mut Vec<SupportedConeT<f64>>| {
        let row = b.len();
        for (col, value) in coeffs {
            columns[col].push((row, value));
        }
        b.push(rhs);
        // merge consecutive rows of the same kind into one cone
        if equality {
            match cones.last_mut() {
                Some(SupportedConeT::ZeroConeT(n)) => *n += 1,
                _ => cones.push(SupportedConeT::ZeroConeT(1)),
            }
        } else {
            match cones.last_mut() {
                Some(SupportedConeT::NonnegativeConeT(n)) => *n += 1,
                _ => cones.push(SupportedConeT::NonnegativeConeT(1)),
            }
        }
    };

    let mut orientation = Vec::with_capacity(program.num_rows());
    for row in program.rows() {
        let sign = match row.kind {
            RowKind::Geq => -1.0,
            RowKind::Eq | RowKind::Leq => 1.0,
        };
        let mut coeffs = row.coeffs.iter().map(|(v, c)| (v.index(), sign * c));
        push_row(
            &mut coeffs,
            sign * row.rhs,
            row.kind == RowKind::Eq,
            &mut b,
            &mut cones,
        );
        orientation.push(sign);
    }

    for (col, var) in program.variables().iter().enumerate() {
        if var.lower.is_finite() {
            // -x ≤ -lower
            push_row(
                &mut std::iter::once((col, -1.0)),
                -var.lower,
                false,
                &mut b,
                &mut cones,
            );
        }
        if var.upper.is_finite() {
            push_row(
                &mut std::iter::once((col, 1.0)),
                var.upper,
                false,
                &mut b,
                &mut cones,
            );
        }
    }

    // CSC: each column sorted by row index
    let mut col_ptr = Vec::with_capacity(n_var + 1);
    let mut row_idx = Vec::new();
    let mut values = Vec::new();
    for column in columns.iter_mut() {
        col_ptr.push(row_idx.len());
        column.sort_by_key(|(r, _)| *r);
        for &(r, v) in column.iter() {
            row_idx.push(r);
            values.push(v);
        }
    }
    col_ptr.push(row_idx.len());

    let a = CscMatrix::new(b.len(), n_var, col_ptr, row_idx, values);
    let q = program.variables().iter().map(|v| v.cost).collect();

    ConicForm {
        a,
        b,
        q,
        cones,
        orientation,
    }
}

fn classify(status: &SolverStatus) -> LpStatus {
    match *status {
        SolverStatus::Solved | SolverStatus::AlmostSolved => LpStatus::Optimal,
        SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
            LpStatus::Infeasible
        }
        SolverStatus::MaxTime => LpStatus::TimedOut,
        _ => LpStatus::Error,
    }
}

impl LpBackend for ClarabelBackend {
    fn id(&self) -> &str {
        "clarabel"
    }

    fn solve(&self, program: &LinearProgram, options: &SolveOptions) -> LpSolution {
        let n_var = program.num_variables();
        let form = assemble(program);
        let p = CscMatrix::new(n_var, n_var, vec![0; n_var + 1], vec![], vec![]);

        let settings = match DefaultSettingsBuilder::default()
            .verbose(false)
            .max_iter(options.max_iterations)
            .time_limit(options.time_limit_secs.unwrap_or(f64::INFINITY))
            .build()
        {
            Ok(settings) => settings,
            Err(e) => {
                return LpSolution::failed(
                    LpStatus::Error,
                    format!("Clarabel settings error: {:?}", e),
                )
            }
        };

        let mut solver = match DefaultSolver::new(&p, &form.q, &form.a, &form.b, &form.cones, settings)
        {
            Ok(solver) => solver,
            Err(e) => {
                return LpSolution::failed(
                    LpStatus::Error,
                    format!("Clarabel initialization failed: {:?}", e),
                )
            }
        };

        solver.solve();

        let sol = &solver.solution;
        let status = classify(&sol.status);
        if status != LpStatus::Optimal {
            let mut failed =
                LpSolution::failed(status, format!("Clarabel returned status {:?}", sol.status));
            failed.iterations = sol.iterations as usize;
            return failed;
        }

        let duals = form
            .orientation
            .iter()
            .zip(sol.z.iter())
            .map(|(sign, z)| -sign * z)
            .collect();

        LpSolution {
            status,
            primal: sol.x.clone(),
            duals,
            objective: sol.obj_val,
            iterations: sol.iterations as usize,
            message: None,
        }
    }
}
