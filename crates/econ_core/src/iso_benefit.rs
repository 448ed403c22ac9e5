//! Iso-profit curves for several price-taking firms and for the pooled market.
//!
//! A reference competitive price is found first by solving
//! `demand(aggregate_supply(p)) = p`, where each firm supplies its `MC = p`
//! quantity unless the price is below its average variable cost there. Each
//! firm's iso-profit curves are then intersected with that price, and the
//! market's curves (costs pooled with `q_i = Q / N`) with the demand curve.

use crate::curves::{locate_root, sample_range, ChartPoint, Diagnostics};
use crate::equation_engine::CompiledExpression;
use crate::numerics::{derivative, find_root, safe};
use crate::traits::{Calculation, CalculationOutput};
use serde::{Deserialize, Serialize};
use tracing::debug;

const FIRM_QUANTITY_MIN: f64 = 1.0;
const FIRM_QUANTITY_MAX: f64 = 150.0;
const MARKET_QUANTITY_MIN: f64 = 5.0;
const MARKET_QUANTITY_MAX: f64 = 220.0;
const QUANTITY_STEP: f64 = 1.0;
const PRICE_LOW: f64 = 5.0;
const PRICE_HIGH: f64 = 150.0;
const PROFIT_EPSILON: f64 = 1.0;
const SHUTDOWN_TOLERANCE: f64 = 1e-3;
const MIN_ISO_QUANTITY: f64 = 0.001;

/// Used when no reference price can be located.
pub const DEFAULT_REFERENCE_PRICE: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsoProfitStatus {
    Negative,
    Zero,
    Positive,
}

impl IsoProfitStatus {
    fn from_profit(profit: f64) -> Self {
        if profit > PROFIT_EPSILON {
            IsoProfitStatus::Positive
        } else if profit < -PROFIT_EPSILON {
            IsoProfitStatus::Negative
        } else {
            IsoProfitStatus::Zero
        }
    }
}

#[derive(Debug, Clone)]
pub struct IsoBenefitFirmParameters {
    pub name: String,
    pub total_cost: CompiledExpression,
}

#[derive(Debug, Clone)]
pub struct IsoBenefitParameters {
    pub demand_inverse: CompiledExpression,
    pub demand_shock: f64,
    pub firms: Vec<IsoBenefitFirmParameters>,
    pub firm_profit_levels: Vec<f64>,
    pub market_profit_levels: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IsoProfitCurve {
    pub target_profit: f64,
    pub points: Vec<ChartPoint>,
    pub intersection: Option<ChartPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IsoFirmResult {
    pub name: String,
    pub curves: Vec<IsoProfitCurve>,
    pub optimal_point: Option<ChartPoint>,
    pub optimal_quantity: f64,
    pub optimal_profit: f64,
    pub status: IsoProfitStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IsoMarketResult {
    pub demand: Vec<ChartPoint>,
    pub curves: Vec<IsoProfitCurve>,
    pub reference_point: Option<ChartPoint>,
    pub reference_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IsoBenefitResult {
    pub reference_price: f64,
    pub reference_quantity: f64,
    pub market: IsoMarketResult,
    pub firms: Vec<IsoFirmResult>,
    pub used_fallback_price: bool,
    pub errors: Vec<String>,
}

impl CalculationOutput for IsoBenefitResult {
    fn errors(&self) -> &[String] {
        &self.errors
    }
}

impl Calculation for IsoBenefitParameters {
    type Output = IsoBenefitResult;

    fn calculate(&self) -> IsoBenefitResult {
        calculate(self)
    }
}

/// One firm's cost function with the derived quantities the calculator needs.
struct FirmContext<'a> {
    name: String,
    total_cost: &'a CompiledExpression,
    fixed_cost: f64,
}

impl<'a> FirmContext<'a> {
    fn new(index: usize, firm: &'a IsoBenefitFirmParameters) -> Self {
        let name = if firm.name.trim().is_empty() {
            default_firm_name(index)
        } else {
            firm.name.clone()
        };
        Self {
            name,
            total_cost: &firm.total_cost,
            fixed_cost: safe(firm.total_cost.evaluate(0.0)),
        }
    }

    fn cost(&self, q: f64) -> f64 {
        safe(self.total_cost.evaluate(q))
    }

    fn marginal_cost(&self, q: f64) -> f64 {
        derivative(|x| self.cost(x), q)
    }

    fn average_variable_cost(&self, q: f64) -> f64 {
        if q <= MIN_ISO_QUANTITY {
            return f64::INFINITY;
        }
        safe((self.cost(q) - self.fixed_cost) / q)
    }

    /// Profit-maximizing output at `price`, or zero when the firm shuts down.
    fn quantity_at_price(&self, price: f64) -> f64 {
        if price <= 0.0 {
            return 0.0;
        }
        let root = find_root(|q| self.marginal_cost(q) - price, 0.0, FIRM_QUANTITY_MAX);
        if root.is_nan() || root <= 0.0 {
            return 0.0;
        }
        let avc = self.average_variable_cost(root);
        if !avc.is_nan() && price < avc - SHUTDOWN_TOLERANCE {
            return 0.0;
        }
        safe(root)
    }

    fn iso_price(&self, quantity: f64, target_profit: f64) -> f64 {
        let quantity = quantity.max(MIN_ISO_QUANTITY);
        safe((self.cost(quantity) + target_profit) / quantity)
    }
}

/// `Firm A`, `Firm B`, … by position.
pub fn default_firm_name(index: usize) -> String {
    match u8::try_from(index).ok().filter(|i| *i < 26) {
        Some(i) => format!("Firm {}", char::from(b'A' + i)),
        None => format!("Firm {}", index + 1),
    }
}

fn total_supply(firms: &[FirmContext<'_>], price: f64) -> f64 {
    safe(firms.iter().map(|firm| firm.quantity_at_price(price)).sum())
}

/// Pooled market cost with output split evenly across firms.
fn market_cost(firms: &[FirmContext<'_>], quantity: f64) -> f64 {
    if quantity <= 0.0 || firms.is_empty() {
        return 0.0;
    }
    let per_firm = quantity / firms.len() as f64;
    safe(firms.iter().map(|firm| firm.cost(per_firm)).sum())
}

fn market_iso_price(firms: &[FirmContext<'_>], quantity: f64, target_profit: f64) -> f64 {
    let quantity = quantity.max(MIN_ISO_QUANTITY);
    safe((market_cost(firms, quantity) + target_profit) / quantity)
}

pub fn calculate(params: &IsoBenefitParameters) -> IsoBenefitResult {
    let mut diagnostics = Diagnostics::new("iso_benefit");
    if params.firms.is_empty() {
        diagnostics.push("At least one firm is required to compute iso-profit curves.");
    }

    let firms: Vec<FirmContext<'_>> = params
        .firms
        .iter()
        .enumerate()
        .map(|(index, firm)| FirmContext::new(index, firm))
        .collect();
    let demand = |q: f64| safe(params.demand_inverse.evaluate(q) + params.demand_shock);

    let root = find_root(
        |price| demand(total_supply(&firms, price).max(0.0)) - price,
        PRICE_LOW,
        PRICE_HIGH,
    );
    let used_fallback_price = root.is_nan();
    let reference_price = if used_fallback_price {
        diagnostics.push(format!(
            "Could not find a reference price; using {DEFAULT_REFERENCE_PRICE}."
        ));
        DEFAULT_REFERENCE_PRICE
    } else {
        root
    };
    let reference_quantity = total_supply(&firms, reference_price);

    let market = IsoMarketResult {
        demand: sample_range(0.0, MARKET_QUANTITY_MAX, QUANTITY_STEP)
            .map(|q| ChartPoint::new(q, demand(q)))
            .collect(),
        curves: params
            .market_profit_levels
            .iter()
            .map(|&level| market_curve(&firms, demand, level))
            .collect(),
        reference_point: (reference_quantity > 0.0)
            .then(|| ChartPoint::new(reference_quantity, reference_price)),
        reference_price,
    };

    let firm_results = firms
        .iter()
        .map(|firm| firm_result(firm, &params.firm_profit_levels, reference_price))
        .collect();

    debug!(
        target: "econ.iso_benefit",
        reference_price,
        reference_quantity,
        used_fallback_price,
        firms = firms.len(),
        "iso-benefit calculated"
    );

    IsoBenefitResult {
        reference_price,
        reference_quantity,
        market,
        firms: firm_results,
        used_fallback_price,
        errors: diagnostics.into_vec(),
    }
}

fn market_curve<D: Fn(f64) -> f64>(
    firms: &[FirmContext<'_>],
    demand: D,
    target_profit: f64,
) -> IsoProfitCurve {
    let points = sample_range(MARKET_QUANTITY_MIN, MARKET_QUANTITY_MAX, QUANTITY_STEP)
        .map(|q| ChartPoint::new(q, market_iso_price(firms, q, target_profit)))
        .collect();
    let intersection = locate_root(
        |q| market_iso_price(firms, q, target_profit) - demand(q),
        MARKET_QUANTITY_MIN,
        MARKET_QUANTITY_MAX,
    )
    .filter(|q| *q > 0.0)
    .map(|q| ChartPoint::new(q, demand(q)));

    IsoProfitCurve {
        target_profit,
        points,
        intersection,
    }
}

fn firm_curve(firm: &FirmContext<'_>, target_profit: f64, reference_price: f64) -> IsoProfitCurve {
    let points = sample_range(FIRM_QUANTITY_MIN, FIRM_QUANTITY_MAX, QUANTITY_STEP)
        .map(|q| ChartPoint::new(q, firm.iso_price(q, target_profit)))
        .collect();
    let intersection = locate_root(
        |q| firm.iso_price(q, target_profit) - reference_price,
        FIRM_QUANTITY_MIN,
        FIRM_QUANTITY_MAX,
    )
    .filter(|q| *q > 0.0)
    .map(|q| ChartPoint::new(q, reference_price));

    IsoProfitCurve {
        target_profit,
        points,
        intersection,
    }
}

fn firm_result(firm: &FirmContext<'_>, profit_levels: &[f64], reference_price: f64) -> IsoFirmResult {
    let curves = profit_levels
        .iter()
        .map(|&level| firm_curve(firm, level, reference_price))
        .collect();
    let optimal_quantity = firm.quantity_at_price(reference_price);
    let (optimal_point, optimal_profit) = if optimal_quantity > 0.0 {
        (
            Some(ChartPoint::new(optimal_quantity, reference_price)),
            safe(reference_price * optimal_quantity - firm.cost(optimal_quantity)),
        )
    } else {
        (None, -firm.fixed_cost)
    };

    IsoFirmResult {
        name: firm.name.clone(),
        curves,
        optimal_point,
        optimal_quantity,
        optimal_profit,
        status: IsoProfitStatus::from_profit(optimal_profit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equation_engine::parse;

    fn firm(name: &str, cost: &str) -> IsoBenefitFirmParameters {
        IsoBenefitFirmParameters {
            name: name.to_string(),
            total_cost: parse(cost).expect("cost parses"),
        }
    }

    fn three_firm_params() -> IsoBenefitParameters {
        IsoBenefitParameters {
            demand_inverse: parse("100 - 0.5q").expect("demand parses"),
            demand_shock: 0.0,
            firms: vec![
                firm("Firm A", "200 + 10q + 0.5q^2"),
                firm("Firm B", "120 + 12q + 0.3q^2"),
                firm("Firm C", "80 + 8q + 0.8q^2"),
            ],
            firm_profit_levels: vec![-200.0, 0.0, 200.0],
            market_profit_levels: vec![-500.0, 0.0, 500.0],
        }
    }

    #[test]
    fn three_firms_produce_one_curve_per_profit_level() {
        let result = calculate(&three_firm_params());
        assert!(result.reference_price > 0.0);
        assert!(!result.used_fallback_price);
        assert_eq!(result.firms.len(), 3);
        for firm in &result.firms {
            assert_eq!(firm.curves.len(), 3);
            let levels: Vec<f64> = firm.curves.iter().map(|c| c.target_profit).collect();
            assert_eq!(levels, vec![-200.0, 0.0, 200.0]);
            assert_eq!(firm.curves[0].points.len(), 150);
        }
        assert_eq!(result.market.curves.len(), 3);
        assert_eq!(result.market.curves[0].points.len(), 216);
        assert_eq!(result.market.demand.len(), 221);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn reference_price_clears_the_market() {
        let result = calculate(&three_firm_params());
        let p = result.reference_price;
        // Supplies: A: 10 + q = p, B: 12 + 0.6q = p, C: 8 + 1.6q = p.
        let expected_supply = (p - 10.0) + (p - 12.0) / 0.6 + (p - 8.0) / 1.6;
        assert!((result.reference_quantity - expected_supply).abs() < 0.05);
        let demand_price = 100.0 - 0.5 * result.reference_quantity;
        assert!((demand_price - p).abs() < 0.05, "p = {p}, demand = {demand_price}");
        let point = result.market.reference_point.expect("reference point");
        assert_eq!(point.y, p);
    }

    #[test]
    fn firm_optimum_and_status_follow_reference_price() {
        let result = calculate(&three_firm_params());
        let p = result.reference_price;
        let a = &result.firms[0];
        assert_eq!(a.name, "Firm A");
        assert!((a.optimal_quantity - (p - 10.0)).abs() < 0.01);
        let q = a.optimal_quantity;
        let expected_profit = p * q - (200.0 + 10.0 * q + 0.5 * q * q);
        assert!((a.optimal_profit - expected_profit).abs() < 1e-6);
        assert_eq!(a.status, IsoProfitStatus::from_profit(a.optimal_profit));
        assert_eq!(a.optimal_point.map(|pt| pt.y), Some(p));
    }

    #[test]
    fn firm_intersections_lie_on_the_reference_price() {
        let result = calculate(&three_firm_params());
        for firm in &result.firms {
            for curve in &firm.curves {
                if let Some(point) = curve.intersection {
                    assert_eq!(point.y, result.reference_price);
                    assert!(point.x > 0.0);
                }
            }
        }
    }

    #[test]
    fn iso_price_covers_cost_plus_target() {
        let params = three_firm_params();
        let context = FirmContext::new(0, &params.firms[0]);
        // (200 + 100 + 50 + 150) / 10
        assert!((context.iso_price(10.0, 150.0) - 50.0).abs() < 1e-9);
        assert!(context.iso_price(0.0, 0.0) > 1.0e5);
    }

    #[test]
    fn shutdown_rule_drops_unprofitable_firms() {
        let params = three_firm_params();
        let context = FirmContext::new(0, &params.firms[0]);
        // AVC = 10 + 0.5q, MC = 10 + q: below 10 the firm cannot cover variable cost.
        assert_eq!(context.quantity_at_price(5.0), 0.0);
        assert_eq!(context.quantity_at_price(-1.0), 0.0);
        assert!((context.quantity_at_price(30.0) - 20.0).abs() < 0.01);
    }

    #[test]
    fn market_cost_splits_output_evenly() {
        let params = three_firm_params();
        let firms: Vec<_> = params
            .firms
            .iter()
            .enumerate()
            .map(|(i, f)| FirmContext::new(i, f))
            .collect();
        let expected = (200.0 + 100.0 + 50.0) + (120.0 + 120.0 + 30.0) + (80.0 + 80.0 + 80.0);
        assert!((market_cost(&firms, 30.0) - expected).abs() < 1e-9);
        assert_eq!(market_cost(&firms, 0.0), 0.0);
    }

    #[test]
    fn blank_names_get_letters() {
        let mut params = three_firm_params();
        params.firms[1].name = "  ".to_string();
        let result = calculate(&params);
        assert_eq!(result.firms[1].name, "Firm B");
        assert_eq!(default_firm_name(27), "Firm 28");
    }

    #[test]
    fn empty_firm_list_is_a_diagnostic_not_a_panic() {
        let mut params = three_firm_params();
        params.firms.clear();
        let result = calculate(&params);
        assert!(result.firms.is_empty());
        assert_eq!(result.market.curves.len(), 3);
        assert_eq!(result.reference_quantity, 0.0);
        assert!(result.market.reference_point.is_none());
        assert!(!result.errors.is_empty());
    }
}
