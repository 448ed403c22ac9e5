//! JavaScript bindings for `econ_core`.
//!
//! Every entry point takes raw strings and numbers from the UI, returns the
//! serialized calculator result, and rejects with a plain string such as
//! `demand: Unexpected character 'x' (pos 6)` when an input does not parse.

mod calculators;
mod expression;
mod settings;

pub use calculators::*;
pub use expression::*;
pub use settings::*;

use anyhow::Context;
use econ_core::{parse, CompiledExpression};
use serde::Serialize;
use serde_wasm_bindgen::to_value;
use wasm_bindgen::JsValue;

/// Compiles `raw`, labelling a failure with the input field it came from.
pub(crate) fn compile(field: &str, raw: &str) -> anyhow::Result<CompiledExpression> {
    parse(raw).with_context(|| field.to_string())
}

/// Renders the whole context chain, outermost label first.
pub(crate) fn describe(err: &anyhow::Error) -> String {
    format!("{err:#}")
}

pub(crate) fn to_js_error(err: anyhow::Error) -> JsValue {
    JsValue::from_str(&describe(&err))
}

pub(crate) fn serialize<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    to_value(value).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::{compile, describe};

    #[test]
    fn compile_errors_carry_the_field_label() {
        let err = compile("demand", "100 - x").unwrap_err();
        assert_eq!(describe(&err), "demand: Unexpected character 'x' (pos 6)");
    }

    #[test]
    fn compile_accepts_valid_input() {
        let expression = compile("supply", "20 + 0.5q").unwrap();
        assert_eq!(expression.evaluate(10.0), 25.0);
    }
}
