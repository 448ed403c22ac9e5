//! Price-taking firm in the short run (`MC = P`) or long run (`MC = AC`).

use crate::curves::{locate_root, sample_curve, ChartPoint, Diagnostics, SampleGrid};
use crate::equation_engine::CompiledExpression;
use crate::numerics::{derivative, safe};
use crate::traits::{Calculation, CalculationOutput};
use serde::{Deserialize, Serialize};
use tracing::debug;

const GRID: SampleGrid = SampleGrid::new(0.0, 0.6, 100);
const SHORT_RUN_BRACKET: (f64, f64) = (0.0, 300.0);
const LONG_RUN_BRACKET: (f64, f64) = (0.1, 500.0);

/// Average costs are evaluated at this quantity when asked about anything smaller.
pub const MIN_AVERAGE_QUANTITY: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirmMode {
    #[default]
    ShortRun,
    LongRun,
}

#[derive(Debug, Clone)]
pub struct FirmParameters {
    pub total_cost: CompiledExpression,
    pub price: f64,
    pub mode: FirmMode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FirmResult {
    pub marginal_cost: Vec<ChartPoint>,
    pub average_cost: Vec<ChartPoint>,
    pub average_variable_cost: Vec<ChartPoint>,
    /// The input price in the short run, minimum average cost in the long run.
    pub price_line: f64,
    pub quantity_point: Option<ChartPoint>,
    pub profit: Option<f64>,
    pub errors: Vec<String>,
}

impl CalculationOutput for FirmResult {
    fn errors(&self) -> &[String] {
        &self.errors
    }
}

impl Calculation for FirmParameters {
    type Output = FirmResult;

    fn calculate(&self) -> FirmResult {
        calculate(self)
    }
}

pub fn calculate(params: &FirmParameters) -> FirmResult {
    let mut diagnostics = Diagnostics::new("firm");
    let cost = |q: f64| safe(params.total_cost.evaluate(q));
    let fixed_cost = cost(0.0);
    let marginal_cost = |q: f64| derivative(cost, q);
    let average_cost = |q: f64| {
        let q = q.max(MIN_AVERAGE_QUANTITY);
        safe(cost(q) / q)
    };
    let average_variable_cost = |q: f64| {
        let q = q.max(MIN_AVERAGE_QUANTITY);
        safe((cost(q) - fixed_cost) / q)
    };

    let (price_line, quantity) = match params.mode {
        FirmMode::ShortRun => {
            let (low, high) = SHORT_RUN_BRACKET;
            let quantity = locate_root(|q| marginal_cost(q) - params.price, low, high);
            if quantity.is_none() {
                diagnostics.push("Could not find q* where marginal cost equals price.");
            }
            (params.price, quantity)
        }
        FirmMode::LongRun => {
            let (low, high) = LONG_RUN_BRACKET;
            match locate_root(|q| marginal_cost(q) - average_cost(q), low, high) {
                Some(quantity) => (average_cost(quantity), Some(quantity)),
                None => {
                    diagnostics.push("Could not find the minimum of average cost.");
                    (params.price, None)
                }
            }
        }
    };

    let quantity_point = quantity.map(|q| ChartPoint::new(q, price_line));
    let profit = quantity.map(|q| safe(price_line * q - cost(q)));

    debug!(
        target: "econ.firm",
        mode = ?params.mode,
        price_line,
        quantity = ?quantity,
        "firm calculated"
    );

    FirmResult {
        marginal_cost: sample_curve(marginal_cost, GRID),
        average_cost: sample_curve(average_cost, GRID),
        average_variable_cost: sample_curve(average_variable_cost, GRID),
        price_line,
        quantity_point,
        profit,
        errors: diagnostics.into_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::{calculate, FirmMode, FirmParameters};
    use crate::equation_engine::parse;

    fn params(cost: &str, price: f64, mode: FirmMode) -> FirmParameters {
        FirmParameters {
            total_cost: parse(cost).expect("cost parses"),
            price,
            mode,
        }
    }

    #[test]
    fn short_run_sets_marginal_cost_to_price() {
        let result = calculate(&params("200 + 10q + 0.5q^2", 40.0, FirmMode::ShortRun));
        let point = result.quantity_point.expect("quantity");
        // 10 + q = 40
        assert!((point.x - 30.0).abs() < 0.01);
        assert_eq!(point.y, 40.0);
        assert_eq!(result.price_line, 40.0);
        // 40 * 30 - (200 + 300 + 450)
        let profit = result.profit.expect("profit");
        assert!((profit - 250.0).abs() < 0.5, "profit = {profit}");
        assert!(result.errors.is_empty());
    }

    #[test]
    fn long_run_prices_at_minimum_average_cost() {
        let result = calculate(&params("200 + 10q + 0.5q^2", 40.0, FirmMode::LongRun));
        let point = result.quantity_point.expect("quantity");
        // AC = 200/q + 10 + 0.5q is minimal at q = 20, where AC = 30.
        assert!((point.x - 20.0).abs() < 0.05, "q = {}", point.x);
        assert!((result.price_line - 30.0).abs() < 0.01);
        assert!(result.profit.expect("profit").abs() < 0.05);
    }

    #[test]
    fn average_costs_guard_small_quantities() {
        let result = calculate(&params("200 + 10q + 0.5q^2", 40.0, FirmMode::ShortRun));
        assert_eq!(result.average_cost.len(), 100);
        // At q = 0 both averages are evaluated at 0.01.
        assert!((result.average_cost[0].y - (200.0 / 0.01 + 10.0 + 0.005)).abs() < 1e-6);
        assert!((result.average_variable_cost[0].y - 10.005).abs() < 1e-6);
        assert!((result.marginal_cost[1].x - 0.6).abs() < 1e-12);
    }
}
