//! Representative firm with a polynomial total cost, facing the market price.

use crate::curves::{sample_curve, ChartPoint, Diagnostics, SampleGrid};
use crate::numerics::{find_all_roots, safe, DEFAULT_ROOT_SCAN_SAMPLES};
use crate::traits::{Calculation, CalculationOutput};
use serde::{Deserialize, Serialize};
use tracing::debug;

const SAMPLE_COUNT: usize = 120;
const SHUTDOWN_SCAN_SAMPLES: usize = 200;

/// Average costs are evaluated at this quantity when asked about anything smaller.
pub const MIN_QUANTITY: f64 = 0.05;

pub const DEFAULT_MAX_QUANTITY: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketCostFunctionType {
    #[default]
    Quadratic,
    Cubic,
}

/// Coefficients of `CT(q) = fixed + linear·q + quadratic·q² (+ cubic·q³)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketCostParameters {
    pub kind: MarketCostFunctionType,
    pub fixed_cost: f64,
    pub linear_cost: f64,
    pub quadratic_cost: f64,
    /// Ignored unless `kind` is `Cubic`.
    pub cubic_cost: f64,
}

impl MarketCostParameters {
    fn effective_cubic(&self) -> f64 {
        match self.kind {
            MarketCostFunctionType::Quadratic => 0.0,
            MarketCostFunctionType::Cubic => self.cubic_cost,
        }
    }

    pub fn total_cost(&self, q: f64) -> f64 {
        safe(self.fixed_cost
            + self.linear_cost * q
            + self.quadratic_cost * q * q
            + self.effective_cubic() * q * q * q)
    }

    pub fn marginal_cost(&self, q: f64) -> f64 {
        safe(self.linear_cost + 2.0 * self.quadratic_cost * q + 3.0 * self.effective_cubic() * q * q)
    }

    pub fn average_cost(&self, q: f64) -> f64 {
        let q = q.max(MIN_QUANTITY);
        safe(self.total_cost(q) / q)
    }

    pub fn average_variable_cost(&self, q: f64) -> f64 {
        let q = q.max(MIN_QUANTITY);
        safe((self.total_cost(q) - self.fixed_cost) / q)
    }

    /// The quantity minimizing average variable cost, with that cost.
    ///
    /// Closed form for a convex quadratic (AVC is increasing from its
    /// intercept) and for a cubic with a positive leading term (AVC' = 0 at
    /// `-b / 2c`); any other shape is sampled.
    pub fn shutdown_point(&self, max_quantity: f64) -> Option<(f64, f64)> {
        match self.kind {
            MarketCostFunctionType::Quadratic if self.quadratic_cost >= 0.0 => {
                Some((MIN_QUANTITY, safe(self.linear_cost)))
            }
            MarketCostFunctionType::Cubic if self.cubic_cost > 0.0 => {
                let mut q = -self.quadratic_cost / (2.0 * self.cubic_cost);
                if q.is_nan() || q < MIN_QUANTITY {
                    q = MIN_QUANTITY;
                }
                let q = q.min(max_quantity);
                Some((q, safe(self.average_variable_cost(q))))
            }
            _ => self.sampled_shutdown_point(max_quantity),
        }
    }

    fn sampled_shutdown_point(&self, max_quantity: f64) -> Option<(f64, f64)> {
        let step = max_quantity / SHUTDOWN_SCAN_SAMPLES as f64;
        let mut best: Option<(f64, f64)> = None;
        for i in 1..=SHUTDOWN_SCAN_SAMPLES {
            let q = i as f64 * step;
            let value = self.average_variable_cost(q);
            if value.is_nan() {
                continue;
            }
            if best.map_or(true, |(_, min)| value < min) {
                best = Some((q, value));
            }
        }
        best.map(|(q, value)| (q, safe(value)))
    }
}

impl Default for MarketCostParameters {
    fn default() -> Self {
        Self {
            kind: MarketCostFunctionType::Quadratic,
            fixed_cost: 50.0,
            linear_cost: 8.0,
            quadratic_cost: 0.4,
            cubic_cost: 0.01,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketFirmParameters {
    pub cost: MarketCostParameters,
    pub price: f64,
    pub max_quantity: f64,
}

impl MarketFirmParameters {
    pub fn new(cost: MarketCostParameters, price: f64) -> Self {
        Self {
            cost,
            price,
            max_quantity: DEFAULT_MAX_QUANTITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketFirmResult {
    pub marginal_cost: Vec<ChartPoint>,
    pub average_cost: Vec<ChartPoint>,
    pub average_variable_cost: Vec<ChartPoint>,
    pub optimal_quantity: Option<f64>,
    pub marginal_cost_at_optimal: Option<f64>,
    pub average_cost_at_optimal: Option<f64>,
    pub average_variable_cost_at_optimal: Option<f64>,
    pub profit_at_optimal: Option<f64>,
    pub shutdown_quantity: Option<f64>,
    pub shutdown_price: Option<f64>,
    /// Quantities where total cost equals revenue, ascending.
    pub break_even_quantities: Vec<f64>,
    pub errors: Vec<String>,
}

impl CalculationOutput for MarketFirmResult {
    fn errors(&self) -> &[String] {
        &self.errors
    }
}

impl Calculation for MarketFirmParameters {
    type Output = MarketFirmResult;

    fn calculate(&self) -> MarketFirmResult {
        calculate(self)
    }
}

pub fn calculate(params: &MarketFirmParameters) -> MarketFirmResult {
    let mut diagnostics = Diagnostics::new("market_firm");
    let cost = &params.cost;
    let price = params.price;
    let max_quantity = params.max_quantity;
    let grid = SampleGrid::spanning(0.0, max_quantity, SAMPLE_COUNT);

    let shutdown = cost.shutdown_point(max_quantity);
    let optimal_quantity = match shutdown {
        Some((_, shutdown_price)) if price >= shutdown_price => {
            let roots = find_all_roots(
                |q| cost.marginal_cost(q) - price,
                0.0,
                max_quantity,
                DEFAULT_ROOT_SCAN_SAMPLES,
            );
            let best = roots
                .into_iter()
                .filter(|q| *q >= 0.0)
                .map(|q| (q, price * q - cost.total_cost(q)))
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(q, _)| q);
            if best.is_none() {
                diagnostics.push("Could not find q* where marginal cost equals price.");
            }
            best
        }
        _ => Some(0.0),
    };

    let break_even_quantities = find_all_roots(
        |q| cost.total_cost(q) - price * q,
        MIN_QUANTITY,
        max_quantity,
        DEFAULT_ROOT_SCAN_SAMPLES,
    );

    debug!(
        target: "econ.market_firm",
        price,
        optimal_quantity = ?optimal_quantity,
        shutdown = ?shutdown,
        "market firm calculated"
    );

    MarketFirmResult {
        marginal_cost: sample_curve(|q| cost.marginal_cost(q), grid),
        average_cost: sample_curve(|q| cost.average_cost(q), grid),
        average_variable_cost: sample_curve(|q| cost.average_variable_cost(q), grid),
        optimal_quantity,
        marginal_cost_at_optimal: optimal_quantity.map(|q| cost.marginal_cost(q)),
        average_cost_at_optimal: optimal_quantity.map(|q| cost.average_cost(q)),
        average_variable_cost_at_optimal: optimal_quantity.map(|q| cost.average_variable_cost(q)),
        profit_at_optimal: optimal_quantity.map(|q| safe(price * q - cost.total_cost(q))),
        shutdown_quantity: shutdown.map(|(q, _)| q),
        shutdown_price: shutdown.map(|(_, p)| p),
        break_even_quantities,
        errors: diagnostics.into_vec(),
    }
}
