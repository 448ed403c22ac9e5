//! Point price elasticity of demand at a chosen price.

use crate::curves::{locate_root, sample_curve, ChartPoint, Diagnostics, SampleGrid};
use crate::equation_engine::CompiledExpression;
use crate::numerics::{derivative, safe};
use crate::traits::{Calculation, CalculationOutput};
use serde::Serialize;
use tracing::debug;

const GRID: SampleGrid = SampleGrid::new(0.0, 1.0, 150);
const ROOT_BRACKET: (f64, f64) = (0.0, 500.0);
const FLAT_SLOPE_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct ElasticityParameters {
    pub demand_inverse: CompiledExpression,
    pub demand_shock: f64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElasticityResult {
    pub demand: Vec<ChartPoint>,
    /// `(q, price)` on the demand curve.
    pub point: Option<ChartPoint>,
    /// Absolute value of the point elasticity.
    pub elasticity: Option<f64>,
    pub errors: Vec<String>,
}

impl CalculationOutput for ElasticityResult {
    fn errors(&self) -> &[String] {
        &self.errors
    }
}

impl Calculation for ElasticityParameters {
    type Output = ElasticityResult;

    fn calculate(&self) -> ElasticityResult {
        calculate(self)
    }
}

pub fn calculate(params: &ElasticityParameters) -> ElasticityResult {
    let mut diagnostics = Diagnostics::new("elasticity");
    let price = params.price;
    let demand = |q: f64| safe(params.demand_inverse.evaluate(q) + params.demand_shock);
    let (low, high) = ROOT_BRACKET;

    let mut point = None;
    let mut elasticity = None;
    match locate_root(|q| demand(q) - price, low, high).filter(|q| *q > 0.0) {
        None => diagnostics.push("Could not find the quantity demanded at the selected price."),
        Some(quantity) => {
            point = Some(ChartPoint::new(quantity, price));
            let slope = derivative(demand, quantity);
            if slope.is_nan() || slope.abs() < FLAT_SLOPE_TOLERANCE {
                diagnostics.push("Elasticity is not computable (demand slope is close to zero).");
            } else {
                elasticity = Some(safe(((1.0 / slope) * (price / quantity)).abs()));
            }
        }
    }

    debug!(
        target: "econ.elasticity",
        price,
        elasticity = ?elasticity,
        "elasticity calculated"
    );

    ElasticityResult {
        demand: sample_curve(demand, GRID),
        point,
        elasticity,
        errors: diagnostics.into_vec(),
    }
}
