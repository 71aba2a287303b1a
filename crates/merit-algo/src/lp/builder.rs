//! Per-step dispatch LP assembly.
//!
//! Variables:
//! - `gen[g][k] ∈ [0, width(g,k)]`, one per cost segment, priced at the segment slope
//! - `reserve[g] ∈ [0, ∞)` for non-renewable units
//! - `flexible_load ∈ [0, flexible_load_cap_mw]`, priced at `-flexible_load_unit_cost`
//!
//! Rows:
//! - load balance: `Σ gen − flexible_load = load`
//! - system reserve: `Σ reserve + flexible_load ≥ system_reserve_pct/100 · load`
//! - capacity: `Σ_k gen[g][k] ≤ capacity(g)`
//! - renewable availability: `Σ_k gen[g][k] ≤ fraction(g) · capacity(g)`
//! - unit reserve floor: `reserve[g] ≥ unit_reserve_pct/100 · capacity(g)`
//! - unit headroom: `reserve[g] + Σ_k gen[g][k] ≤ capacity(g)`
//! - minimum output: `Σ_k gen[g][k] ≥ min_nonrenewable_pct/100 · capacity(g)`
//!
//! Variables that could only ever be zero (zero-width segments, renewables
//! with no availability, zero-capacity units) are left out of the program
//! and read back as zero. Rows whose right-hand side is zero and which are
//! implied by variable bounds are left out too.

use merit_core::Generator;

use super::{LinearProgram, RowId, VarId};
use crate::linearize::LinearizedFleet;
use crate::step::DispatchStepInput;

/// Variable and row handles for reading a solution back.
#[derive(Debug, Clone)]
pub struct DispatchVariables {
    /// Segment variables per generator in fleet order
    pub segments: Vec<Vec<VarId>>,
    /// Reserve variable per generator; `None` for renewables and zero-capacity units
    pub reserves: Vec<Option<VarId>>,
    pub flexible_load: Option<VarId>,
    pub load_balance: RowId,
}

/// A built program plus its handle map.
#[derive(Debug, Clone)]
pub struct DispatchLp {
    pub program: LinearProgram,
    pub variables: DispatchVariables,
}

/// Assembles one LP per step from the cached segments.
#[derive(Debug, Clone, Copy)]
pub struct DispatchLpBuilder<'a> {
    linearized: &'a LinearizedFleet,
}

impl<'a> DispatchLpBuilder<'a> {
    pub fn new(linearized: &'a LinearizedFleet) -> Self {
        Self { linearized }
    }

    /// Upper limit on a generator's output at this step.
    pub fn available_mw(gen: &Generator, step: &DispatchStepInput) -> f64 {
        if gen.is_renewable() {
            match step.renewable_cap(gen.id, gen.renewable_cap_fraction) {
                Some(fraction) => fraction * gen.capacity_mw,
                None => gen.capacity_mw,
            }
        } else {
            gen.capacity_mw
        }
    }

    /// Total output the fleet can deliver at this step.
    pub fn available_capacity_mw(&self, step: &DispatchStepInput) -> f64 {
        self.linearized
            .fleet()
            .iter()
            .map(|g| Self::available_mw(g, step))
            .sum()
    }

    pub fn build(&self, step: &DispatchStepInput) -> DispatchLp {
        let fleet = self.linearized.fleet();
        let mut lp = LinearProgram::new();

        let mut segments = Vec::with_capacity(fleet.len());
        let mut reserves = Vec::with_capacity(fleet.len());
        for (index, gen) in fleet.iter().enumerate() {
            let vars: Vec<VarId> = if Self::available_mw(gen, step) > 0.0 {
                self.linearized
                    .segments(index)
                    .iter()
                    .filter(|s| s.width() > 0.0)
                    .map(|s| lp.add_variable(s.slope, 0.0, s.width()))
                    .collect()
            } else {
                Vec::new()
            };
            segments.push(vars);

            let reserve = if !gen.is_renewable() && gen.capacity_mw > 0.0 {
                Some(lp.add_variable(0.0, 0.0, f64::INFINITY))
            } else {
                None
            };
            reserves.push(reserve);
        }

        let flexible_load = if step.flexible_load_cap_mw > 0.0 {
            Some(lp.add_variable(
                -step.flexible_load_unit_cost,
                0.0,
                step.flexible_load_cap_mw,
            ))
        } else {
            None
        };

        // Load balance
        let mut balance: Vec<(VarId, f64)> = segments
            .iter()
            .flatten()
            .map(|&v| (v, 1.0))
            .collect();
        if let Some(flex) = flexible_load {
            balance.push((flex, -1.0));
        }
        let load_balance = lp.add_eq(&balance, step.load_mw);

        // System reserve
        let requirement = step.system_reserve_pct / 100.0 * step.load_mw;
        if requirement > 0.0 {
            let mut coeffs: Vec<(VarId, f64)> =
                reserves.iter().flatten().map(|&v| (v, 1.0)).collect();
            if let Some(flex) = flexible_load {
                coeffs.push((flex, 1.0));
            }
            lp.add_geq(&coeffs, requirement);
        }

        // Per-unit rows
        for (index, gen) in fleet.iter().enumerate() {
            let output: Vec<(VarId, f64)> = segments[index].iter().map(|&v| (v, 1.0)).collect();

            if !output.is_empty() {
                lp.add_leq(&output, gen.capacity_mw);
                let available = Self::available_mw(gen, step);
                if gen.is_renewable() && available < gen.capacity_mw {
                    lp.add_leq(&output, available);
                }
            }

            if let Some(reserve) = reserves[index] {
                let floor = step.unit_reserve_pct / 100.0 * gen.capacity_mw;
                if floor > 0.0 {
                    lp.add_geq(&[(reserve, 1.0)], floor);
                }

                let mut headroom = output.clone();
                headroom.push((reserve, 1.0));
                lp.add_leq(&headroom, gen.capacity_mw);

                let minimum = step.min_nonrenewable_pct / 100.0 * gen.capacity_mw;
                if minimum > 0.0 {
                    lp.add_geq(&output, minimum);
                }
            }
        }

        DispatchLp {
            program: lp,
            variables: DispatchVariables {
                segments,
                reserves,
                flexible_load,
                load_balance,
            },
        }
    }
}
