//! Fuel-price conversion for heat-rate cost curves.
//!
//! Heat-rate polynomials are given in BTU terms. With a fuel price in
//! $/MMBTU each coefficient converts to $/MWh as
//! `coef · (price / 1e6) · 1000`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{DispatchError, DispatchResult, Generator};

const BTU_PER_MMBTU: f64 = 1e6;
const KW_PER_MW: f64 = 1000.0;

/// Heat-rate polynomial coefficients in BTU terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatRateCoefficients {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

/// Fuel price per technology label ($/MMBTU).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FuelPriceTable {
    prices: BTreeMap<String, f64>,
}

impl FuelPriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, technology: impl Into<String>, price: f64) -> Self {
        self.prices.insert(technology.into(), price);
        self
    }

    pub fn price(&self, technology: &str) -> Option<f64> {
        self.prices.get(technology).copied()
    }

    /// Convert heat-rate coefficients to cost coefficients `(a, b, c)` in $/MWh terms.
    pub fn cost_coefficients(
        &self,
        technology: &str,
        heat_rate: HeatRateCoefficients,
    ) -> DispatchResult<(f64, f64, f64)> {
        let price = self.price(technology).ok_or_else(|| {
            DispatchError::Config(format!("no fuel price for technology '{}'", technology))
        })?;
        if !price.is_finite() || price < 0.0 {
            return Err(DispatchError::Config(format!(
                "fuel price for '{}' must be finite and non-negative, got {}",
                technology, price
            )));
        }
        let scale = price / BTU_PER_MMBTU * KW_PER_MW;
        Ok((heat_rate.a * scale, heat_rate.b * scale, heat_rate.c * scale))
    }

    /// Return `generator` with cost coefficients derived from its technology's fuel price.
    pub fn apply(
        &self,
        generator: Generator,
        heat_rate: HeatRateCoefficients,
    ) -> DispatchResult<Generator> {
        let technology = generator.technology.clone().ok_or_else(|| {
            DispatchError::Config(format!(
                "{} '{}' has no technology label",
                generator.id, generator.name
            ))
        })?;
        let (a, b, c) = self.cost_coefficients(&technology, heat_rate)?;
        Ok(generator.with_cost(a, b, c))
    }
}
