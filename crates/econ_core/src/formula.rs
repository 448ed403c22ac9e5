//! Human-readable total cost formulas for [`MarketCostParameters`].

use crate::market_firm::{MarketCostFunctionType, MarketCostParameters};
use serde::{Deserialize, Serialize};

const FORMULA_PREFIX: &str = "CT(q)=";
const MAX_DECIMALS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecimalSeparator {
    #[default]
    Point,
    Comma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sign {
    Plus,
    Minus,
}

struct Term {
    sign: Sign,
    text: String,
}

/// How coefficients are rendered inside a term.
trait NumberFormat {
    fn format(&self, value: f64) -> String;
}

/// Up to three decimals with trailing zeros trimmed.
struct Rounded(DecimalSeparator);

/// Every significant digit, `.` as the separator.
struct Exact;

impl NumberFormat for Rounded {
    fn format(&self, value: f64) -> String {
        let fixed = format!("{:.*}", MAX_DECIMALS, value);
        let trimmed = if fixed.contains('.') {
            fixed.trim_end_matches('0').trim_end_matches('.')
        } else {
            fixed.as_str()
        };
        match self.0 {
            DecimalSeparator::Point => trimmed.to_string(),
            DecimalSeparator::Comma => trimmed.replace('.', ","),
        }
    }
}

impl NumberFormat for Exact {
    fn format(&self, value: f64) -> String {
        format!("{value}")
    }
}

/// Renders `CT(q)=…` for the given cost parameters, e.g. `CT(q)=50 + 8q + 0.4q^2`.
pub fn cost_formula(cost: &MarketCostParameters, separator: DecimalSeparator) -> String {
    format!("{FORMULA_PREFIX}{}", polynomial(cost, &Rounded(separator)))
}

impl MarketCostParameters {
    /// The total cost polynomial in the expression language, accepted by
    /// [`crate::equation_engine::parse`].
    pub fn expression(&self) -> String {
        polynomial(self, &Exact)
    }
}

fn polynomial(cost: &MarketCostParameters, format: &dyn NumberFormat) -> String {
    let mut variable_terms = Vec::new();
    push_variable_term(&mut variable_terms, cost.linear_cost, "q", format);
    push_variable_term(&mut variable_terms, cost.quadratic_cost, "q^2", format);
    if cost.kind == MarketCostFunctionType::Cubic {
        push_variable_term(&mut variable_terms, cost.cubic_cost, "q^3", format);
    }

    let mut terms = Vec::with_capacity(variable_terms.len() + 1);
    if cost.fixed_cost != 0.0 || variable_terms.is_empty() {
        terms.push(Term {
            sign: sign_of(cost.fixed_cost),
            text: format.format(cost.fixed_cost.abs()),
        });
    }
    terms.extend(variable_terms);

    terms
        .iter()
        .enumerate()
        .map(|(i, term)| match (i, term.sign) {
            (0, Sign::Plus) => term.text.clone(),
            (0, Sign::Minus) => format!("-{}", term.text),
            (_, Sign::Plus) => format!("+ {}", term.text),
            (_, Sign::Minus) => format!("- {}", term.text),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn push_variable_term(terms: &mut Vec<Term>, coefficient: f64, variable: &str, format: &dyn NumberFormat) {
    if coefficient == 0.0 {
        return;
    }
    let magnitude = coefficient.abs();
    let coefficient_text = if magnitude == 1.0 {
        String::new()
    } else {
        format.format(magnitude)
    };
    terms.push(Term {
        sign: sign_of(coefficient),
        text: format!("{coefficient_text}{variable}"),
    });
}

fn sign_of(value: f64) -> Sign {
    if value < 0.0 {
        Sign::Minus
    } else {
        Sign::Plus
    }
}
