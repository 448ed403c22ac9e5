//! Single-price monopoly against a competitive reference point.

use crate::curves::{gap_area, locate_root, sample_curve, ChartPoint, Diagnostics, SampleGrid};
use crate::equation_engine::CompiledExpression;
use crate::numerics::{derivative, safe};
use crate::traits::{Calculation, CalculationOutput};
use serde::Serialize;
use tracing::debug;

const GRID: SampleGrid = SampleGrid::new(0.0, 1.0, 100);
const ROOT_BRACKET: (f64, f64) = (0.0, 300.0);

#[derive(Debug, Clone)]
pub struct MonopolyParameters {
    pub demand_inverse: CompiledExpression,
    pub total_cost: CompiledExpression,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonopolyResult {
    pub demand: Vec<ChartPoint>,
    pub marginal_revenue: Vec<ChartPoint>,
    pub marginal_cost: Vec<ChartPoint>,
    /// Where marginal revenue meets marginal cost, priced off the demand curve.
    pub monopoly_point: Option<ChartPoint>,
    /// Where demand meets marginal cost.
    pub competitive_point: Option<ChartPoint>,
    pub profit: Option<f64>,
    pub deadweight_loss: Option<f64>,
    pub errors: Vec<String>,
}

impl CalculationOutput for MonopolyResult {
    fn errors(&self) -> &[String] {
        &self.errors
    }
}

impl Calculation for MonopolyParameters {
    type Output = MonopolyResult;

    fn calculate(&self) -> MonopolyResult {
        calculate(self)
    }
}

pub fn calculate(params: &MonopolyParameters) -> MonopolyResult {
    let mut diagnostics = Diagnostics::new("monopoly");
    let demand = |q: f64| safe(params.demand_inverse.evaluate(q));
    let cost = |q: f64| safe(params.total_cost.evaluate(q));
    let revenue = |q: f64| safe(demand(q) * q);
    let marginal_revenue = |q: f64| derivative(revenue, q);
    let marginal_cost = |q: f64| derivative(cost, q);
    let (low, high) = ROOT_BRACKET;

    let mut profit = None;
    let monopoly_point = match locate_root(|q| marginal_revenue(q) - marginal_cost(q), low, high) {
        Some(quantity) => {
            profit = Some(safe(revenue(quantity) - cost(quantity)));
            Some(ChartPoint::new(quantity, demand(quantity)))
        }
        None => {
            diagnostics.push("Could not find a quantity where marginal revenue equals marginal cost.");
            None
        }
    };

    let competitive_point = match locate_root(|q| demand(q) - marginal_cost(q), low, high) {
        Some(quantity) => Some(ChartPoint::new(quantity, demand(quantity))),
        None => {
            diagnostics.push("Could not find the competitive reference equilibrium.");
            None
        }
    };

    let deadweight_loss = match (monopoly_point, competitive_point) {
        (Some(monopoly), Some(competitive)) => Some(gap_area(
            demand,
            marginal_cost,
            monopoly.x,
            competitive.x,
        )),
        _ => None,
    };

    debug!(
        target: "econ.monopoly",
        monopoly_point = ?monopoly_point,
        profit = ?profit,
        "monopoly calculated"
    );

    MonopolyResult {
        demand: sample_curve(demand, GRID),
        marginal_revenue: sample_curve(marginal_revenue, GRID),
        marginal_cost: sample_curve(marginal_cost, GRID),
        monopoly_point,
        competitive_point,
        profit,
        deadweight_loss,
        errors: diagnostics.into_vec(),
    }
}
