//! One entry point per calculator.

use crate::{compile, serialize, to_js_error};
use anyhow::{anyhow, bail};
use econ_core::elasticity::{self, ElasticityParameters};
use econ_core::firm::{self, FirmMode, FirmParameters};
use econ_core::iso_benefit::{self, IsoBenefitFirmParameters, IsoBenefitParameters};
use econ_core::market::{self, MarketParameters};
use econ_core::market_firm::{
    self, MarketCostFunctionType, MarketCostParameters, MarketFirmParameters,
};
use econ_core::monopoly::{self, MonopolyParameters};
use tracing::debug;
use wasm_bindgen::prelude::*;

pub(crate) fn parse_firm_mode(mode: &str) -> anyhow::Result<FirmMode> {
    match mode {
        "short_run" => Ok(FirmMode::ShortRun),
        "long_run" => Ok(FirmMode::LongRun),
        other => Err(anyhow!("Unknown firm mode '{other}'")),
    }
}

pub(crate) fn parse_cost_kind(kind: &str) -> anyhow::Result<MarketCostFunctionType> {
    match kind {
        "quadratic" => Ok(MarketCostFunctionType::Quadratic),
        "cubic" => Ok(MarketCostFunctionType::Cubic),
        other => Err(anyhow!("Unknown cost function type '{other}'")),
    }
}

pub(crate) fn iso_benefit_parameters(
    demand: &str,
    demand_shock: f64,
    firm_names: &[String],
    firm_costs: &[String],
    firm_profit_levels: Vec<f64>,
    market_profit_levels: Vec<f64>,
) -> anyhow::Result<IsoBenefitParameters> {
    if firm_names.len() != firm_costs.len() {
        bail!(
            "Expected one cost per firm, got {} names and {} costs",
            firm_names.len(),
            firm_costs.len()
        );
    }
    let firms = firm_names
        .iter()
        .zip(firm_costs)
        .enumerate()
        .map(|(index, (name, cost))| {
            Ok(IsoBenefitFirmParameters {
                name: name.clone(),
                total_cost: compile(&format!("firms[{index}]"), cost)?,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(IsoBenefitParameters {
        demand_inverse: compile("demand", demand)?,
        demand_shock,
        firms,
        firm_profit_levels,
        market_profit_levels,
    })
}

#[wasm_bindgen]
pub fn calculate_market(
    demand: &str,
    supply: &str,
    demand_shock: f64,
    supply_shock: f64,
    tax: f64,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let params = MarketParameters {
        demand_inverse: compile("demand", demand).map_err(to_js_error)?,
        supply_inverse: compile("supply", supply).map_err(to_js_error)?,
        demand_shock,
        supply_shock,
        tax,
    };
    serialize(&market::calculate(&params))
}

#[wasm_bindgen]
pub fn calculate_monopoly(demand: &str, cost: &str) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let params = MonopolyParameters {
        demand_inverse: compile("demand", demand).map_err(to_js_error)?,
        total_cost: compile("cost", cost).map_err(to_js_error)?,
    };
    serialize(&monopoly::calculate(&params))
}

/// `mode` is `"short_run"` or `"long_run"`.
#[wasm_bindgen]
pub fn calculate_firm(cost: &str, price: f64, mode: &str) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let params = FirmParameters {
        total_cost: compile("cost", cost).map_err(to_js_error)?,
        price,
        mode: parse_firm_mode(mode).map_err(to_js_error)?,
    };
    serialize(&firm::calculate(&params))
}

/// `kind` is `"quadratic"` or `"cubic"`.
#[wasm_bindgen]
pub fn calculate_market_firm(
    kind: &str,
    fixed_cost: f64,
    linear_cost: f64,
    quadratic_cost: f64,
    cubic_cost: f64,
    price: f64,
    max_quantity: f64,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let cost = MarketCostParameters {
        kind: parse_cost_kind(kind).map_err(to_js_error)?,
        fixed_cost,
        linear_cost,
        quadratic_cost,
        cubic_cost,
    };
    let params = MarketFirmParameters {
        cost,
        price,
        max_quantity,
    };
    serialize(&market_firm::calculate(&params))
}

#[wasm_bindgen]
pub fn calculate_elasticity(demand: &str, demand_shock: f64, price: f64) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let params = ElasticityParameters {
        demand_inverse: compile("demand", demand).map_err(to_js_error)?,
        demand_shock,
        price,
    };
    serialize(&elasticity::calculate(&params))
}

/// Firms are given as parallel name and cost lists.
#[wasm_bindgen]
pub fn calculate_iso_benefit(
    demand: &str,
    demand_shock: f64,
    firm_names: Vec<String>,
    firm_costs: Vec<String>,
    firm_profit_levels: Vec<f64>,
    market_profit_levels: Vec<f64>,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let params = iso_benefit_parameters(
        demand,
        demand_shock,
        &firm_names,
        &firm_costs,
        firm_profit_levels,
        market_profit_levels,
    )
    .map_err(to_js_error)?;
    debug!(target: "econ.wasm", firms = params.firms.len(), "iso-benefit requested");
    serialize(&iso_benefit::calculate(&params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe;

    #[test]
    fn modes_and_kinds_use_snake_case_names() {
        assert_eq!(parse_firm_mode("long_run").unwrap(), FirmMode::LongRun);
        assert_eq!(parse_cost_kind("cubic").unwrap(), MarketCostFunctionType::Cubic);
        let err = parse_firm_mode("medium_run").unwrap_err();
        assert_eq!(describe(&err), "Unknown firm mode 'medium_run'");
    }

    #[test]
    fn iso_benefit_inputs_are_labelled_by_firm() {
        let names = vec!["A".to_string(), "B".to_string()];
        let costs = vec!["10 + q^2".to_string(), "5q +".to_string()];
        let err = iso_benefit_parameters("100 - q", 0.0, &names, &costs, vec![0.0], vec![0.0])
            .unwrap_err();
        assert!(describe(&err).starts_with("firms[1]: "));
    }

    #[test]
    fn iso_benefit_inputs_must_pair_up() {
        let names = vec!["A".to_string()];
        let err = iso_benefit_parameters("100 - q", 0.0, &names, &[], vec![], vec![]).unwrap_err();
        assert!(describe(&err).contains("1 names and 0 costs"));
    }

    #[test]
    fn iso_benefit_parameters_keep_levels() {
        let names = vec!["A".to_string()];
        let costs = vec!["10 + q^2".to_string()];
        let params =
            iso_benefit_parameters("100 - q", 5.0, &names, &costs, vec![-1.0, 1.0], vec![2.0])
                .unwrap();
        assert_eq!(params.firms.len(), 1);
        assert_eq!(params.demand_shock, 5.0);
        assert_eq!(params.firm_profit_levels, vec![-1.0, 1.0]);
        assert_eq!(params.market_profit_levels, vec![2.0]);
    }
}
