//! Error types for the econ_core crate.
//!
//! Only two things can fail with an error value: turning a raw string into a
//! [`CompiledExpression`](crate::equation_engine::CompiledExpression), and
//! turning stored [`Settings`](crate::config::Settings) into calculator
//! parameters. Everything downstream of a successful parse reports problems
//! through the result records' `errors` lists instead.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// The category of a parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorKind {
    /// The input was empty or contained only whitespace.
    EmptyExpression,
    /// A numeric literal could not be read as a 64-bit float.
    InvalidNumber,
    /// A character outside the expression alphabet.
    UnexpectedCharacter,
    /// A `)` without a matching `(`, or a `(` that is never closed.
    UnbalancedParenthesis,
    /// An operator without two operands, or a group with no operand at all.
    MissingOperand,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParseErrorKind::EmptyExpression => "EmptyExpression",
            ParseErrorKind::InvalidNumber => "InvalidNumber",
            ParseErrorKind::UnexpectedCharacter => "UnexpectedCharacter",
            ParseErrorKind::UnbalancedParenthesis => "UnbalancedParenthesis",
            ParseErrorKind::MissingOperand => "MissingOperand",
        };
        f.write_str(name)
    }
}

/// A failure to parse an expression.
///
/// `position` is a 0-based character offset into the raw input when the
/// failure can be pinned to a location.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{}", self.render())]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub position: Option<usize>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            position: None,
        }
    }

    pub fn at(kind: ParseErrorKind, message: impl Into<String>, position: usize) -> Self {
        Self {
            kind,
            message: message.into(),
            position: Some(position),
        }
    }

    fn render(&self) -> String {
        match self.position {
            Some(position) => format!("{} (pos {})", self.message, position),
            None => self.message.clone(),
        }
    }
}

/// A stored settings field that could not be turned into calculator input.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{field}: {source}")]
pub struct SettingsError {
    pub field: String,
    #[source]
    pub source: ParseError,
}

impl SettingsError {
    pub fn new(field: impl Into<String>, source: ParseError) -> Self {
        Self {
            field: field.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ParseError, ParseErrorKind, SettingsError};

    #[test]
    fn display_appends_position_when_known() {
        let err = ParseError::at(ParseErrorKind::UnexpectedCharacter, "Unexpected character 'x'", 4);
        assert_eq!(err.to_string(), "Unexpected character 'x' (pos 4)");

        let err = ParseError::new(ParseErrorKind::EmptyExpression, "Expression is empty");
        assert_eq!(err.to_string(), "Expression is empty");
    }

    #[test]
    fn settings_error_names_the_field() {
        let err = SettingsError::new(
            "market.demand",
            ParseError::at(ParseErrorKind::UnbalancedParenthesis, "Unclosed parenthesis", 0),
        );
        assert_eq!(err.to_string(), "market.demand: Unclosed parenthesis (pos 0)");
    }
}
