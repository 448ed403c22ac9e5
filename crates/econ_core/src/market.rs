//! Competitive market equilibrium with demand/supply shocks and a per-unit tax.

use crate::curves::{
    area_samples, gap_area, locate_root, sample_curve, AreaSamplePoint, ChartPoint, Diagnostics,
    SampleGrid, COINCIDENT_QUANTITY_TOLERANCE,
};
use crate::equation_engine::CompiledExpression;
use crate::numerics::{integrate, safe, DEFAULT_ROOT_BRACKET};
use crate::traits::{Calculation, CalculationOutput};
use serde::Serialize;
use tracing::debug;

const GRID: SampleGrid = SampleGrid::new(0.0, 2.0, 100);

#[derive(Debug, Clone)]
pub struct MarketParameters {
    pub demand_inverse: CompiledExpression,
    pub supply_inverse: CompiledExpression,
    /// Added to the demand price.
    pub demand_shock: f64,
    /// Subtracted from the supply price, so a positive shock lowers supply costs.
    pub supply_shock: f64,
    pub tax: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketResult {
    pub demand_base: Vec<ChartPoint>,
    pub supply_base: Vec<ChartPoint>,
    pub demand_shifted: Vec<ChartPoint>,
    pub supply_shifted: Vec<ChartPoint>,
    /// Taxed equilibrium; `y` is the price paid by consumers.
    pub equilibrium: Option<ChartPoint>,
    pub no_tax_equilibrium: Option<ChartPoint>,
    pub producer_price: Option<f64>,
    pub consumer_surplus: Option<f64>,
    pub producer_surplus: Option<f64>,
    pub tax_revenue: Option<f64>,
    pub deadweight_loss: Option<f64>,
    pub consumer_area: Vec<AreaSamplePoint>,
    pub producer_area: Vec<AreaSamplePoint>,
    pub deadweight_area: Vec<AreaSamplePoint>,
    pub errors: Vec<String>,
}

impl CalculationOutput for MarketResult {
    fn errors(&self) -> &[String] {
        &self.errors
    }
}

impl Calculation for MarketParameters {
    type Output = MarketResult;

    fn calculate(&self) -> MarketResult {
        calculate(self)
    }
}

pub fn calculate(params: &MarketParameters) -> MarketResult {
    let mut diagnostics = Diagnostics::new("market");
    let demand_base = |q: f64| safe(params.demand_inverse.evaluate(q));
    let supply_base = |q: f64| safe(params.supply_inverse.evaluate(q));
    let demand_shifted = |q: f64| safe(demand_base(q) + params.demand_shock);
    let supply_shifted = |q: f64| safe(supply_base(q) - params.supply_shock);

    let (low, high) = DEFAULT_ROOT_BRACKET;

    let mut equilibrium = None;
    let mut producer_price = None;
    let mut consumer_surplus = None;
    let mut producer_surplus = None;
    let mut tax_revenue = None;
    let mut consumer_area = Vec::new();
    let mut producer_area = Vec::new();

    match locate_root(
        |q| demand_shifted(q) - (supply_shifted(q) + params.tax),
        low,
        high,
    ) {
        Some(quantity) => {
            let consumer_price = safe(demand_shifted(quantity));
            let seller_price = safe(consumer_price - params.tax);
            equilibrium = Some(ChartPoint::new(quantity, consumer_price));
            producer_price = Some(seller_price);
            consumer_surplus = Some(integrate(
                |q| (demand_shifted(q) - consumer_price).max(0.0),
                0.0,
                quantity,
            ));
            producer_surplus = Some(integrate(
                |q| (seller_price - supply_shifted(q)).max(0.0),
                0.0,
                quantity,
            ));
            tax_revenue = Some(safe(params.tax * quantity));
            consumer_area = area_samples(0.0, quantity, |_| consumer_price, demand_shifted);
            producer_area = area_samples(0.0, quantity, supply_shifted, |_| seller_price);
        }
        None => diagnostics.push("Could not find the equilibrium with tax."),
    }

    let no_tax_equilibrium = match locate_root(|q| demand_shifted(q) - supply_shifted(q), low, high)
    {
        Some(quantity) => Some(ChartPoint::new(quantity, demand_shifted(quantity))),
        None => {
            diagnostics.push("Could not find the equilibrium without tax.");
            None
        }
    };

    let mut deadweight_loss = None;
    let mut deadweight_area = Vec::new();
    if let (Some(taxed), Some(untaxed)) = (equilibrium, no_tax_equilibrium) {
        deadweight_loss = Some(gap_area(demand_shifted, supply_shifted, taxed.x, untaxed.x));
        if (taxed.x - untaxed.x).abs() > COINCIDENT_QUANTITY_TOLERANCE {
            deadweight_area = area_samples(taxed.x, untaxed.x, supply_shifted, demand_shifted);
        }
    }

    debug!(
        target: "econ.market",
        equilibrium = ?equilibrium,
        deadweight_loss = ?deadweight_loss,
        "market calculated"
    );

    MarketResult {
        demand_base: sample_curve(demand_base, GRID),
        supply_base: sample_curve(supply_base, GRID),
        demand_shifted: sample_curve(demand_shifted, GRID),
        supply_shifted: sample_curve(supply_shifted, GRID),
        equilibrium,
        no_tax_equilibrium,
        producer_price,
        consumer_surplus,
        producer_surplus,
        tax_revenue,
        deadweight_loss,
        consumer_area,
        producer_area,
        deadweight_area,
        errors: diagnostics.into_vec(),
    }
}
