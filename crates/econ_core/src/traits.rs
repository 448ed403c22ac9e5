use serde::Serialize;

/// A calculator result record.
/// Must be serializable for the presentation layer and expose its diagnostics.
pub trait CalculationOutput: Serialize {
    /// Human-readable diagnostics, in the order they were recorded.
    fn errors(&self) -> &[String];
}

/// A parameter record that can be run through its calculator.
///
/// Implementations are pure: calling `calculate` twice on the same parameters
/// yields identical results, and a missing answer shows up in
/// [`CalculationOutput::errors`] rather than as a panic or an `Err`.
pub trait Calculation {
    type Output: CalculationOutput;

    fn calculate(&self) -> Self::Output;
}
