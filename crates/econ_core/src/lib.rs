//! The `econ_core` crate is the computational engine behind the supply and
//! demand explorer.
//!
//! Key components:
//! - **Equation Engine**: a small bytecode VM for user-typed expressions in `q`.
//! - **Numerics**: overflow-safe evaluation, finite differences, trapezoidal
//!   integration and a bracketing root finder that never fails loudly.
//! - **Calculators**: market, monopoly, firm, market firm, elasticity and
//!   iso-benefit models, each turning a parameter record into chart-ready
//!   series plus human-readable diagnostics.
//! - **Config**: serializable [`Settings`] with the default scenarios.
pub mod config;
pub mod curves;
pub mod elasticity;
pub mod equation_engine;
pub mod error;
pub mod firm;
pub mod formula;
pub mod iso_benefit;
pub mod market;
pub mod market_firm;
pub mod monopoly;
pub mod numerics;
pub mod traits;

pub use config::{CalculationReport, Settings};
pub use curves::{AreaSamplePoint, ChartPoint};
pub use equation_engine::{parse, CompiledExpression};
pub use error::{ParseError, ParseErrorKind, SettingsError};
pub use traits::{Calculation, CalculationOutput};
