//! Expression wrapper for live validation and plotting of user input.

use crate::{compile, serialize, to_js_error};
use econ_core::curves::SampleGrid;
use econ_core::numerics::safe;
use econ_core::{parse, CompiledExpression};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmExpression {
    expression: CompiledExpression,
    stack: Vec<f64>,
}

#[wasm_bindgen]
impl WasmExpression {
    #[wasm_bindgen(constructor)]
    pub fn new(raw: &str) -> Result<WasmExpression, JsValue> {
        console_error_panic_hook::set_once();

        let expression = compile("expression", raw).map_err(to_js_error)?;
        Ok(Self::from_compiled(expression))
    }

    pub fn evaluate(&mut self, q: f64) -> f64 {
        econ_core::equation_engine::VM::execute(&self.expression, q, &mut self.stack)
    }

    /// `count` clamped values at `start, start + step, …`.
    pub fn sample(&mut self, start: f64, step: f64, count: usize) -> Vec<f64> {
        let grid = SampleGrid::new(start, step, count);
        grid.points().map(|q| safe(self.evaluate(q))).collect()
    }

    /// Space-separated postfix listing.
    pub fn postfix(&self) -> String {
        self.expression.to_string()
    }
}

impl WasmExpression {
    fn from_compiled(expression: CompiledExpression) -> Self {
        Self {
            expression,
            stack: Vec::new(),
        }
    }
}

/// `null` when `raw` parses, otherwise `{ kind, message, position }`.
#[wasm_bindgen]
pub fn validate_expression(raw: &str) -> Result<JsValue, JsValue> {
    match parse(raw) {
        Ok(_) => Ok(JsValue::NULL),
        Err(err) => serialize(&err),
    }
}
