//! Settings snapshots and the cost formula label.

use crate::calculators::parse_cost_kind;
use crate::{serialize, to_js_error};
use econ_core::formula::{cost_formula as build_cost_formula, DecimalSeparator};
use econ_core::market_firm::MarketCostParameters;
use econ_core::Settings;
use serde_wasm_bindgen::from_value;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub fn default_settings() -> Result<JsValue, JsValue> {
    serialize(&Settings::default())
}

/// Normalizes the given settings and runs every calculator on them.
#[wasm_bindgen]
pub fn calculate_all(settings: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let settings: Settings = from_value(settings)
        .map_err(|e| JsValue::from_str(&format!("Invalid settings: {}", e)))?;
    let report = settings
        .normalized()
        .calculate_all()
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    serialize(&report)
}

/// `CT(q)=…` label; `comma` selects `,` as the decimal separator.
#[wasm_bindgen]
pub fn cost_formula(
    kind: &str,
    fixed_cost: f64,
    linear_cost: f64,
    quadratic_cost: f64,
    cubic_cost: f64,
    comma: bool,
) -> Result<String, JsValue> {
    let cost = MarketCostParameters {
        kind: parse_cost_kind(kind).map_err(to_js_error)?,
        fixed_cost,
        linear_cost,
        quadratic_cost,
        cubic_cost,
    };
    let separator = if comma {
        DecimalSeparator::Comma
    } else {
        DecimalSeparator::Point
    };
    Ok(build_cost_formula(&cost, separator))
}
