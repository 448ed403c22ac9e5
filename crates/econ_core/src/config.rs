//! User-editable inputs for every calculator, with the defaults the
//! application starts from.
//!
//! Expressions are stored as raw strings and only compiled when a
//! parameter record is requested, so a settings file with a typo still
//! loads and the failing field can be reported by name.

use crate::elasticity::{self, ElasticityParameters, ElasticityResult};
use crate::equation_engine::{parse, CompiledExpression};
use crate::error::SettingsError;
use crate::firm::{self, FirmMode, FirmParameters, FirmResult};
use crate::iso_benefit::{
    self, default_firm_name, IsoBenefitFirmParameters, IsoBenefitParameters, IsoBenefitResult,
};
use crate::market::{self, MarketParameters, MarketResult};
use crate::market_firm::{self, MarketCostParameters, MarketFirmParameters, MarketFirmResult};
use crate::monopoly::{self, MonopolyParameters, MonopolyResult};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const DEFAULT_MARKET_DEMAND: &str = "100 - 0.5q";
pub const DEFAULT_MARKET_SUPPLY: &str = "20 + 0.5q";
pub const DEFAULT_FIRM_COST: &str = "200 + 10q + 0.5q^2";
pub const DEFAULT_FIRM_PRICE: f64 = 40.0;
pub const DEFAULT_MONOPOLY_DEMAND: &str = "120 - q";
pub const DEFAULT_MONOPOLY_COST: &str = "100 + 10q + 0.2q^2";
pub const DEFAULT_ELASTICITY_PRICE: f64 = 50.0;

const DEFAULT_ISO_FIRMS: [(&str, &str); 3] = [
    ("Firm A", "200 + 10q + 0.5q^2"),
    ("Firm B", "120 + 12q + 0.3q^2"),
    ("Firm C", "80 + 8q + 0.8q^2"),
];
const DEFAULT_FIRM_PROFIT_LEVELS: [f64; 3] = [-200.0, 0.0, 200.0];
const DEFAULT_MARKET_PROFIT_LEVELS: [f64; 3] = [-500.0, 0.0, 500.0];

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub market: MarketSettings,
    pub firm: FirmSettings,
    pub monopoly: MonopolySettings,
    pub elasticity: ElasticitySettings,
    pub iso_benefit: IsoBenefitSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketSettings {
    pub demand_expression: String,
    pub supply_expression: String,
    pub demand_shock: f64,
    pub supply_shock: f64,
    pub tax: f64,
    /// Representative firm overlaid on the market at the equilibrium price.
    pub cost: MarketCostParameters,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            demand_expression: DEFAULT_MARKET_DEMAND.to_string(),
            supply_expression: DEFAULT_MARKET_SUPPLY.to_string(),
            demand_shock: 0.0,
            supply_shock: 0.0,
            tax: 0.0,
            cost: MarketCostParameters::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirmSettings {
    pub cost_expression: String,
    pub price: f64,
    pub mode: FirmMode,
}

impl Default for FirmSettings {
    fn default() -> Self {
        Self {
            cost_expression: DEFAULT_FIRM_COST.to_string(),
            price: DEFAULT_FIRM_PRICE,
            mode: FirmMode::ShortRun,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonopolySettings {
    pub demand_expression: String,
    pub cost_expression: String,
}

impl Default for MonopolySettings {
    fn default() -> Self {
        Self {
            demand_expression: DEFAULT_MONOPOLY_DEMAND.to_string(),
            cost_expression: DEFAULT_MONOPOLY_COST.to_string(),
        }
    }
}

/// Demand and shock come from [`MarketSettings`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElasticitySettings {
    pub price: f64,
}

impl Default for ElasticitySettings {
    fn default() -> Self {
        Self {
            price: DEFAULT_ELASTICITY_PRICE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsoBenefitFirmSetting {
    #[serde(default)]
    pub name: String,
    pub cost_expression: String,
}

impl IsoBenefitFirmSetting {
    pub fn new(name: impl Into<String>, cost_expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cost_expression: cost_expression.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsoBenefitSettings {
    pub demand_expression: String,
    pub demand_shock: f64,
    pub firms: Vec<IsoBenefitFirmSetting>,
    pub firm_profit_levels: Vec<f64>,
    pub market_profit_levels: Vec<f64>,
}

impl Default for IsoBenefitSettings {
    fn default() -> Self {
        Self {
            demand_expression: DEFAULT_MARKET_DEMAND.to_string(),
            demand_shock: 0.0,
            firms: default_iso_firms(),
            firm_profit_levels: DEFAULT_FIRM_PROFIT_LEVELS.to_vec(),
            market_profit_levels: DEFAULT_MARKET_PROFIT_LEVELS.to_vec(),
        }
    }
}

fn default_iso_firms() -> Vec<IsoBenefitFirmSetting> {
    DEFAULT_ISO_FIRMS
        .iter()
        .map(|(name, cost)| IsoBenefitFirmSetting::new(*name, *cost))
        .collect()
}

/// Results of every calculator for one [`Settings`] snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculationReport {
    pub market: MarketResult,
    /// Present when the market has an equilibrium price to face.
    pub market_firm: Option<MarketFirmResult>,
    pub firm: FirmResult,
    pub monopoly: MonopolyResult,
    pub elasticity: ElasticityResult,
    pub iso_benefit: IsoBenefitResult,
}

fn or_default(value: &str, default: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}

fn compile(field: &str, raw: &str) -> Result<CompiledExpression, SettingsError> {
    parse(raw).map_err(|source| SettingsError::new(field, source))
}

impl Settings {
    /// Blank expressions fall back to their defaults. Iso-benefit firms
    /// without a cost expression are dropped, the survivors are renamed
    /// `Firm <letter>` by position when their name is blank, and an empty
    /// firm list is replaced by the default firms.
    pub fn normalized(&self) -> Settings {
        let mut settings = self.clone();

        let market = &mut settings.market;
        market.demand_expression = or_default(&market.demand_expression, DEFAULT_MARKET_DEMAND);
        market.supply_expression = or_default(&market.supply_expression, DEFAULT_MARKET_SUPPLY);

        let firm = &mut settings.firm;
        firm.cost_expression = or_default(&firm.cost_expression, DEFAULT_FIRM_COST);

        let monopoly = &mut settings.monopoly;
        monopoly.demand_expression = or_default(&monopoly.demand_expression, DEFAULT_MONOPOLY_DEMAND);
        monopoly.cost_expression = or_default(&monopoly.cost_expression, DEFAULT_MONOPOLY_COST);

        let iso = &mut settings.iso_benefit;
        iso.demand_expression = or_default(&iso.demand_expression, DEFAULT_MARKET_DEMAND);
        let firms = if iso.firms.is_empty() {
            default_iso_firms()
        } else {
            std::mem::take(&mut iso.firms)
        };
        iso.firms = firms
            .into_iter()
            .filter(|firm| !firm.cost_expression.trim().is_empty())
            .enumerate()
            .map(|(index, firm)| {
                let name = match firm.name.trim() {
                    "" => default_firm_name(index),
                    name => name.to_string(),
                };
                IsoBenefitFirmSetting::new(name, firm.cost_expression.trim())
            })
            .collect();

        settings
    }

    pub fn market_parameters(&self) -> Result<MarketParameters, SettingsError> {
        let market = &self.market;
        Ok(MarketParameters {
            demand_inverse: compile("market.demand_expression", &market.demand_expression)?,
            supply_inverse: compile("market.supply_expression", &market.supply_expression)?,
            demand_shock: market.demand_shock,
            supply_shock: market.supply_shock,
            tax: market.tax,
        })
    }

    pub fn firm_parameters(&self) -> Result<FirmParameters, SettingsError> {
        Ok(FirmParameters {
            total_cost: compile("firm.cost_expression", &self.firm.cost_expression)?,
            price: self.firm.price,
            mode: self.firm.mode,
        })
    }

    pub fn monopoly_parameters(&self) -> Result<MonopolyParameters, SettingsError> {
        Ok(MonopolyParameters {
            demand_inverse: compile("monopoly.demand_expression", &self.monopoly.demand_expression)?,
            total_cost: compile("monopoly.cost_expression", &self.monopoly.cost_expression)?,
        })
    }

    pub fn elasticity_parameters(&self) -> Result<ElasticityParameters, SettingsError> {
        Ok(ElasticityParameters {
            demand_inverse: compile("market.demand_expression", &self.market.demand_expression)?,
            demand_shock: self.market.demand_shock,
            price: self.elasticity.price,
        })
    }

    /// The market's representative firm facing `price`.
    pub fn market_firm_parameters(&self, price: f64) -> MarketFirmParameters {
        MarketFirmParameters::new(self.market.cost, price)
    }

    pub fn iso_benefit_parameters(&self) -> Result<IsoBenefitParameters, SettingsError> {
        let iso = &self.iso_benefit;
        let firms = iso
            .firms
            .iter()
            .enumerate()
            .map(|(index, firm)| {
                let field = format!("iso_benefit.firms[{index}].cost_expression");
                Ok(IsoBenefitFirmParameters {
                    name: firm.name.clone(),
                    total_cost: compile(&field, &firm.cost_expression)?,
                })
            })
            .collect::<Result<Vec<_>, SettingsError>>()?;

        Ok(IsoBenefitParameters {
            demand_inverse: compile("iso_benefit.demand_expression", &iso.demand_expression)?,
            demand_shock: iso.demand_shock,
            firms,
            firm_profit_levels: iso.firm_profit_levels.clone(),
            market_profit_levels: iso.market_profit_levels.clone(),
        })
    }

    /// Runs every calculator. The market firm faces the consumer price of
    /// the market equilibrium and is skipped when there is none.
    pub fn calculate_all(&self) -> Result<CalculationReport, SettingsError> {
        let market = market::calculate(&self.market_parameters()?);
        let market_firm = market
            .equilibrium
            .map(|point| market_firm::calculate(&self.market_firm_parameters(point.y)));
        let report = CalculationReport {
            market,
            market_firm,
            firm: firm::calculate(&self.firm_parameters()?),
            monopoly: monopoly::calculate(&self.monopoly_parameters()?),
            elasticity: elasticity::calculate(&self.elasticity_parameters()?),
            iso_benefit: iso_benefit::calculate(&self.iso_benefit_parameters()?),
        };

        info!(
            target: "econ.config",
            market_errors = report.market.errors.len(),
            iso_firms = report.iso_benefit.firms.len(),
            "all calculators ran"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseErrorKind;
    use crate::market_firm::MarketCostFunctionType;

    #[test]
    fn defaults_match_the_starting_scenarios() {
        let settings = Settings::default();
        assert_eq!(settings.market.demand_expression, "100 - 0.5q");
        assert_eq!(settings.market.cost.fixed_cost, 50.0);
        assert_eq!(settings.market.cost.kind, MarketCostFunctionType::Quadratic);
        assert_eq!(settings.firm.price, 40.0);
        assert_eq!(settings.firm.mode, FirmMode::ShortRun);
        assert_eq!(settings.monopoly.demand_expression, "120 - q");
        assert_eq!(settings.elasticity.price, 50.0);
        assert_eq!(settings.iso_benefit.firms.len(), 3);
        assert_eq!(settings.iso_benefit.firms[2].name, "Firm C");
        assert_eq!(settings.iso_benefit.market_profit_levels, vec![-500.0, 0.0, 500.0]);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{ "firm": { "price": 55 }, "market": { "cost": { "kind": "cubic" } } }"#;
        let settings: Settings = serde_json::from_str(json).expect("settings deserialize");
        assert_eq!(settings.firm.price, 55.0);
        assert_eq!(settings.firm.cost_expression, DEFAULT_FIRM_COST);
        assert_eq!(settings.market.cost.kind, MarketCostFunctionType::Cubic);
        assert_eq!(settings.market.cost.cubic_cost, 0.01);
        assert_eq!(settings.monopoly, MonopolySettings::default());
    }

    #[test]
    fn settings_round_trip_through_json() {
        let settings = Settings::default();
        let json = serde_json::to_string(&settings).expect("serialize");
        let back: Settings = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, settings);
    }

    #[test]
    fn normalized_fills_blanks() {
        let mut settings = Settings::default();
        settings.market.demand_expression = "   ".to_string();
        settings.monopoly.cost_expression = String::new();
        settings.iso_benefit.firms = vec![
            IsoBenefitFirmSetting::new("", " 10 + q^2 "),
            IsoBenefitFirmSetting::new("Dropped", "  "),
            IsoBenefitFirmSetting::new(" Named ", "5q"),
            IsoBenefitFirmSetting::new("", "q"),
        ];

        let normalized = settings.normalized();
        assert_eq!(normalized.market.demand_expression, DEFAULT_MARKET_DEMAND);
        assert_eq!(normalized.monopoly.cost_expression, DEFAULT_MONOPOLY_COST);
        let names: Vec<&str> = normalized.iso_benefit.firms.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Firm A", "Named", "Firm C"]);
        assert_eq!(normalized.iso_benefit.firms[0].cost_expression, "10 + q^2");
    }

    #[test]
    fn normalized_restores_default_firms() {
        let mut settings = Settings::default();
        settings.iso_benefit.firms.clear();
        assert_eq!(settings.normalized().iso_benefit.firms, default_iso_firms());
    }

    #[test]
    fn parse_failures_name_the_field() {
        let mut settings = Settings::default();
        settings.monopoly.cost_expression = "100 + * q".to_string();
        let err = settings.monopoly_parameters().expect_err("cost is invalid");
        assert_eq!(err.field, "monopoly.cost_expression");
        assert_eq!(err.source.kind, ParseErrorKind::MissingOperand);
        assert!(err.to_string().starts_with("monopoly.cost_expression: "));

        settings = Settings::default();
        settings.iso_benefit.firms[1].cost_expression = "10 + x".to_string();
        let err = settings.iso_benefit_parameters().expect_err("firm cost is invalid");
        assert_eq!(err.field, "iso_benefit.firms[1].cost_expression");
        assert!(settings.calculate_all().is_err());
    }

    #[test]
    fn elasticity_shares_market_demand() {
        let mut settings = Settings::default();
        settings.market.demand_shock = 10.0;
        let params = settings.elasticity_parameters().expect("parameters");
        assert_eq!(params.demand_shock, 10.0);
        assert_eq!(params.demand_inverse.evaluate(0.0), 100.0);
        assert_eq!(params.price, 50.0);
    }

    #[test]
    fn calculate_all_runs_every_calculator() {
        let report = Settings::default().calculate_all().expect("defaults are valid");
        let equilibrium = report.market.equilibrium.expect("equilibrium");
        assert!((equilibrium.y - 60.0).abs() < 0.01);
        let market_firm = report.market_firm.expect("market firm");
        // MC = 8 + 0.8q = 60
        let q = market_firm.optimal_quantity.expect("optimal quantity");
        assert!((q - 65.0).abs() < 0.05, "q = {q}");
        assert!(report.firm.quantity_point.is_some());
        assert!(report.monopoly.monopoly_point.is_some());
        assert!(report.elasticity.elasticity.is_some());
        assert_eq!(report.iso_benefit.firms.len(), 3);
    }
}
