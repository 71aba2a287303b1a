//! Piecewise linearization of quadratic cost curves.
//!
//! Each generator's curve `a·x² + b·x + c·x` is sampled at `N + 1` evenly
//! spaced breakpoints over `[0, capacity]` and replaced by the `N` chords
//! between them. For a convex curve the chord slopes are non-decreasing, so
//! an LP that fills segments by cost will fill them left to right without
//! needing ordering constraints.

use std::sync::Arc;

use merit_core::{DispatchError, DispatchResult, Fleet, Generator};
use serde::{Deserialize, Serialize};

/// Default number of segments per generator.
pub const DEFAULT_SEGMENT_COUNT: usize = 10;

/// One chord of a linearized cost curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearSegment {
    pub x_start: f64,
    pub x_end: f64,
    pub slope: f64,
    pub intercept: f64,
}

impl LinearSegment {
    #[inline]
    pub fn width(&self) -> f64 {
        self.x_end - self.x_start
    }

    /// Value of the chord at `x`.
    #[inline]
    pub fn evaluate(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Converts cost curves into `segment_count` linear segments.
#[derive(Debug, Clone, Copy)]
pub struct CostCurveLinearizer {
    segment_count: usize,
}

impl Default for CostCurveLinearizer {
    fn default() -> Self {
        Self {
            segment_count: DEFAULT_SEGMENT_COUNT,
        }
    }
}

impl CostCurveLinearizer {
    pub fn new(segment_count: usize) -> DispatchResult<Self> {
        if segment_count == 0 {
            return Err(DispatchError::Config(
                "segment_count must be at least 1".into(),
            ));
        }
        Ok(Self { segment_count })
    }

    pub fn segment_count(&self) -> usize {
        self.segment_count
    }

    /// Linearize one generator. Segments are returned in increasing `x`.
    pub fn linearize(&self, gen: &Generator) -> DispatchResult<Vec<LinearSegment>> {
        if gen.cost_a < 0.0 {
            return Err(DispatchError::Config(format!(
                "{} '{}': cost_a = {} gives a non-convex cost curve",
                gen.id, gen.name, gen.cost_a
            )));
        }

        let n = self.segment_count;
        let capacity = gen.capacity_mw;
        let breakpoint = |k: usize| capacity * k as f64 / n as f64;

        let mut segments = Vec::with_capacity(n);
        for k in 0..n {
            let x1 = breakpoint(k);
            let x2 = breakpoint(k + 1);
            let (slope, intercept) = if x2 > x1 {
                let (f1, f2) = (gen.cost(x1), gen.cost(x2));
                let slope = (f2 - f1) / (x2 - x1);
                (slope, f1 - slope * x1)
            } else {
                // zero capacity: degenerate segments
                (0.0, 0.0)
            };
            segments.push(LinearSegment {
                x_start: x1,
                x_end: x2,
                slope,
                intercept,
            });
        }
        Ok(segments)
    }

    /// Linearize every generator in the fleet once for a run.
    pub fn linearize_fleet(&self, fleet: Arc<Fleet>) -> DispatchResult<LinearizedFleet> {
        let segments = fleet
            .iter()
            .map(|g| self.linearize(g))
            .collect::<DispatchResult<Vec<_>>>()?;
        Ok(LinearizedFleet {
            fleet,
            segments,
            segment_count: self.segment_count,
        })
    }
}

/// Fleet together with its cached segments, shared read-only across steps.
#[derive(Debug, Clone)]
pub struct LinearizedFleet {
    fleet: Arc<Fleet>,
    segments: Vec<Vec<LinearSegment>>,
    segment_count: usize,
}

impl LinearizedFleet {
    pub fn fleet(&self) -> &Fleet {
        &self.fleet
    }

    pub fn shared_fleet(&self) -> Arc<Fleet> {
        Arc::clone(&self.fleet)
    }

    /// Segments of the generator at fleet position `index`.
    pub fn segments(&self, index: usize) -> &[LinearSegment] {
        &self.segments[index]
    }

    pub fn segment_count(&self) -> usize {
        self.segment_count
    }
}
