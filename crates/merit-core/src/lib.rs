//! # merit-core: Generator Fleet Model
//!
//! Data model shared by the dispatch crates: generator identities and
//! categories, quadratic cost curves, the validated [`Fleet`] container,
//! fuel-price conversion and the unified [`DispatchError`].
//!
//! ## Quick Start
//!
//! ```rust
//! use merit_core::*;
//!
//! let fleet = Fleet::new(vec![
//!     Generator::new(GeneratorId::new(0), "Gas", GeneratorCategory::Dispatchable, 100.0)
//!         .with_cost(0.0, 20.0, 0.0),
//!     Generator::new(GeneratorId::new(1), "Solar", GeneratorCategory::SolarPV, 50.0)
//!         .with_renewable_cap(0.0),
//! ])
//! .unwrap();
//!
//! assert_eq!(fleet.total_capacity_mw(), 150.0);
//! assert_eq!(fleet.generators()[0].cost(60.0), 1200.0);
//! ```
//!
//! ## Cost convention
//!
//! Every cost evaluation in the workspace uses
//! `cost(x) = a·x² + b·x + c·x`. The `c` coefficient is a per-MW term like
//! `b`, not a fixed no-load cost. Fleets built from heat-rate data rely on
//! this, so it must not be "corrected" locally.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod error;
pub mod fuel;

pub use error::{DispatchError, DispatchResult};
pub use fuel::{FuelPriceTable, HeatRateCoefficients};

/// Stable generator identity, unique within a fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneratorId(usize);

impl GeneratorId {
    #[inline]
    pub fn new(value: usize) -> Self {
        GeneratorId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl fmt::Display for GeneratorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gen#{}", self.0)
    }
}

/// Generator category. Results are aggregated per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GeneratorCategory {
    Dispatchable,
    SolarPV,
    WindFarm,
}

impl GeneratorCategory {
    pub const ALL: [GeneratorCategory; 3] = [
        GeneratorCategory::Dispatchable,
        GeneratorCategory::SolarPV,
        GeneratorCategory::WindFarm,
    ];

    /// Solar and wind units: capped by availability, hold no reserve.
    pub fn is_renewable(&self) -> bool {
        matches!(self, GeneratorCategory::SolarPV | GeneratorCategory::WindFarm)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GeneratorCategory::Dispatchable => "Dispatchable",
            GeneratorCategory::SolarPV => "SolarPV",
            GeneratorCategory::WindFarm => "WindFarm",
        }
    }
}

impl fmt::Display for GeneratorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeneratorCategory {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dispatchable" => Ok(GeneratorCategory::Dispatchable),
            "solarpv" | "solar" => Ok(GeneratorCategory::SolarPV),
            "windfarm" | "wind" => Ok(GeneratorCategory::WindFarm),
            other => Err(DispatchError::Parse(format!(
                "unknown generator category '{}'",
                other
            ))),
        }
    }
}

/// A generator with a quadratic cost curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generator {
    pub id: GeneratorId,
    pub name: String,
    pub category: GeneratorCategory,
    /// Free-text technology label used for fuel-price lookup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technology: Option<String>,
    /// Fuel burned, for energy-by-fuel reporting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel: Option<String>,
    /// Nameplate capacity (MW)
    pub capacity_mw: f64,
    /// Quadratic cost coefficient ($/MW²h)
    pub cost_a: f64,
    /// Linear cost coefficient ($/MWh)
    pub cost_b: f64,
    /// Second linear cost coefficient ($/MWh), see the crate-level cost convention
    pub cost_c: f64,
    /// Default availability fraction for renewables, used when a step supplies none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renewable_cap_fraction: Option<f64>,
}

impl Generator {
    /// Create a zero-cost generator with the given capacity.
    pub fn new(
        id: GeneratorId,
        name: impl Into<String>,
        category: GeneratorCategory,
        capacity_mw: f64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            category,
            technology: None,
            fuel: None,
            capacity_mw,
            cost_a: 0.0,
            cost_b: 0.0,
            cost_c: 0.0,
            renewable_cap_fraction: None,
        }
    }

    /// Set cost coefficients
    pub fn with_cost(mut self, a: f64, b: f64, c: f64) -> Self {
        self.cost_a = a;
        self.cost_b = b;
        self.cost_c = c;
        self
    }

    /// Set default renewable availability fraction
    pub fn with_renewable_cap(mut self, fraction: f64) -> Self {
        self.renewable_cap_fraction = Some(fraction);
        self
    }

    /// Set technology label
    pub fn with_technology(mut self, technology: impl Into<String>) -> Self {
        self.technology = Some(technology.into());
        self
    }

    /// Set fuel label
    pub fn with_fuel(mut self, fuel: impl Into<String>) -> Self {
        self.fuel = Some(fuel.into());
        self
    }

    pub fn is_renewable(&self) -> bool {
        self.category.is_renewable()
    }

    /// Key for per-technology results: the technology, else the category name.
    pub fn technology_label(&self) -> &str {
        self.technology.as_deref().unwrap_or(self.category.as_str())
    }

    /// Key for per-fuel results: the fuel, else [`Generator::technology_label`].
    pub fn fuel_label(&self) -> &str {
        self.fuel.as_deref().unwrap_or_else(|| self.technology_label())
    }

    /// Cost at output `p_mw` ($/h).
    #[inline]
    pub fn cost(&self, p_mw: f64) -> f64 {
        self.cost_a * p_mw * p_mw + self.cost_b * p_mw + self.cost_c * p_mw
    }

    /// Derivative of [`Generator::cost`] at `p_mw` ($/MWh).
    #[inline]
    pub fn marginal_cost(&self, p_mw: f64) -> f64 {
        2.0 * self.cost_a * p_mw + self.cost_b + self.cost_c
    }

    /// Check data ranges. Negative `cost_a` makes the curve non-convex and is rejected.
    pub fn validate(&self) -> DispatchResult<()> {
        if !self.capacity_mw.is_finite() || self.capacity_mw < 0.0 {
            return Err(DispatchError::Validation(format!(
                "{} '{}': capacity_mw must be finite and non-negative, got {}",
                self.id, self.name, self.capacity_mw
            )));
        }
        for (label, value) in [
            ("cost_a", self.cost_a),
            ("cost_b", self.cost_b),
            ("cost_c", self.cost_c),
        ] {
            if !value.is_finite() {
                return Err(DispatchError::Validation(format!(
                    "{} '{}': {} must be finite, got {}",
                    self.id, self.name, label, value
                )));
            }
        }
        if self.cost_a < 0.0 {
            return Err(DispatchError::Config(format!(
                "{} '{}': cost_a = {} gives a non-convex cost curve",
                self.id, self.name, self.cost_a
            )));
        }
        if let Some(fraction) = self.renewable_cap_fraction {
            if !(0.0..=1.0).contains(&fraction) {
                return Err(DispatchError::Validation(format!(
                    "{} '{}': renewable_cap_fraction must be in [0, 1], got {}",
                    self.id, self.name, fraction
                )));
            }
        }
        Ok(())
    }
}

/// Validated, immutable generator fleet.
///
/// Non-empty, ids unique, every generator valid. Order is preserved and is
/// the order of the per-generator vectors in step results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Generator>", into = "Vec<Generator>")]
pub struct Fleet {
    generators: Vec<Generator>,
}

impl Fleet {
    pub fn new(generators: Vec<Generator>) -> DispatchResult<Self> {
        if generators.is_empty() {
            return Err(DispatchError::Validation("fleet has no generators".into()));
        }
        let mut seen = BTreeSet::new();
        for gen in &generators {
            gen.validate()?;
            if !seen.insert(gen.id) {
                return Err(DispatchError::Validation(format!(
                    "duplicate generator id {}",
                    gen.id
                )));
            }
        }
        Ok(Self { generators })
    }

    pub fn generators(&self) -> &[Generator] {
        &self.generators
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Generator> {
        self.generators.iter()
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    /// Index of a generator in fleet order
    pub fn position(&self, id: GeneratorId) -> Option<usize> {
        self.generators.iter().position(|g| g.id == id)
    }

    pub fn get(&self, id: GeneratorId) -> Option<&Generator> {
        self.generators.iter().find(|g| g.id == id)
    }

    pub fn total_capacity_mw(&self) -> f64 {
        self.generators.iter().map(|g| g.capacity_mw).sum()
    }

    /// Categories present in the fleet, in [`GeneratorCategory`] order.
    pub fn categories(&self) -> BTreeSet<GeneratorCategory> {
        self.generators.iter().map(|g| g.category).collect()
    }

    /// Technology labels present in the fleet, sorted.
    pub fn technologies(&self) -> BTreeSet<String> {
        self.generators
            .iter()
            .map(|g| g.technology_label().to_string())
            .collect()
    }

    /// Fuel labels present in the fleet, sorted.
    pub fn fuels(&self) -> BTreeSet<String> {
        self.generators
            .iter()
            .map(|g| g.fuel_label().to_string())
            .collect()
    }
}

impl TryFrom<Vec<Generator>> for Fleet {
    type Error = DispatchError;

    fn try_from(generators: Vec<Generator>) -> Result<Self, Self::Error> {
        Fleet::new(generators)
    }
}

impl From<Fleet> for Vec<Generator> {
    fn from(fleet: Fleet) -> Self {
        fleet.generators
    }
}

impl<'a> IntoIterator for &'a Fleet {
    type Item = &'a Generator;
    type IntoIter = std::slice::Iter<'a, Generator>;

    fn into_iter(self) -> Self::IntoIter {
        self.generators.iter()
    }
}
