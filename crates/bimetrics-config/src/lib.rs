//! Configuration management for bimetrics
//!
//! This module handles loading, validation, and management of
//! bimetrics configuration from YAML files. Besides the server and
//! formatting settings, the configuration declares every report the
//! engine knows about as a list of field specs.

pub mod error;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

pub use error::{ConfigError, ConfigErrorCode, ConfigErrorDetails, ConfigResult};

// ==================== Configuration Types ====================

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Currency and number formatting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyConfig {
    /// Currency symbol placed before amounts
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Decimal places for percent displays
    #[serde(default = "default_percent_decimals")]
    pub percent_decimals: u32,
    /// Decimal places for plain number displays
    #[serde(default)]
    pub number_decimals: u32,
    /// Render currency in compact form ("$1.2k")
    #[serde(default)]
    pub dense: bool,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            percent_decimals: default_percent_decimals(),
            number_decimals: 0,
            dense: false,
        }
    }
}

fn default_symbol() -> String {
    "$".to_string()
}

fn default_percent_decimals() -> u32 {
    2
}

/// Engine-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Dataset used when a request does not name one
    #[serde(default = "default_dataset")]
    pub default_dataset: String,
    /// Zero-denominator sentinel for reports that do not set their own
    #[serde(default)]
    pub zero_denominator: ZeroDenominatorPolicy,
    /// Deepest id-addressed tree accepted for rollup
    #[serde(default = "default_max_tree_depth")]
    pub max_tree_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_dataset: default_dataset(),
            zero_denominator: ZeroDenominatorPolicy::Zero,
            max_tree_depth: default_max_tree_depth(),
        }
    }
}

fn default_dataset() -> String {
    "jobs".to_string()
}

/// Default limit on rollup tree depth
pub const DEFAULT_MAX_TREE_DEPTH: usize = 256;

fn default_max_tree_depth() -> usize {
    DEFAULT_MAX_TREE_DEPTH
}

// ==================== Field Specs ====================

/// Role of a field inside a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Summed into totals and rolled up from children
    Sum,
    /// Computed as numerator / denominator
    Ratio,
    /// Carried through untouched (labels, ids)
    Passthrough,
    /// Computed as minuend - subtrahend
    Difference,
}

impl Default for FieldKind {
    fn default() -> Self {
        FieldKind::Passthrough
    }
}

impl std::str::FromStr for FieldKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sum" => Ok(FieldKind::Sum),
            "ratio" => Ok(FieldKind::Ratio),
            "passthrough" => Ok(FieldKind::Passthrough),
            "difference" => Ok(FieldKind::Difference),
            _ => Err(format!("Invalid field kind: {}", s)),
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKind::Sum => write!(f, "sum"),
            FieldKind::Ratio => write!(f, "ratio"),
            FieldKind::Passthrough => write!(f, "passthrough"),
            FieldKind::Difference => write!(f, "difference"),
        }
    }
}

/// Scaling applied to a ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatioScale {
    /// numerator / denominator * 100
    Percent,
    /// numerator / denominator
    Plain,
}

impl Default for RatioScale {
    fn default() -> Self {
        RatioScale::Percent
    }
}

/// What a ratio evaluates to when its denominator is zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroDenominatorPolicy {
    /// Resolve to 0
    Zero,
    /// Resolve to null ("not applicable")
    NotApplicable,
}

impl Default for ZeroDenominatorPolicy {
    fn default() -> Self {
        ZeroDenominatorPolicy::Zero
    }
}

/// How the view layer should display a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayFormat {
    Currency,
    Percent,
    Number,
    Text,
}

/// Declaration of one report field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default)]
    pub kind: FieldKind,
    /// (numerator, denominator) for ratio fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio_of: Option<(String, String)>,
    /// (minuend, subtrahend) for difference fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difference_of: Option<(String, String)>,
    #[serde(default)]
    pub scale: RatioScale,
    /// Display override; defaults depend on the kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<DisplayFormat>,
}

impl FieldSpec {
    /// A summed field
    pub fn sum(name: &str) -> Self {
        Self::with_kind(name, FieldKind::Sum)
    }

    /// A label or identifier carried through untouched
    pub fn passthrough(name: &str) -> Self {
        Self::with_kind(name, FieldKind::Passthrough)
    }

    /// A percent-scaled ratio
    pub fn ratio(name: &str, numerator: &str, denominator: &str) -> Self {
        let mut spec = Self::with_kind(name, FieldKind::Ratio);
        spec.ratio_of = Some((numerator.to_string(), denominator.to_string()));
        spec
    }

    /// An unscaled ratio such as an average per unit
    pub fn quotient(name: &str, numerator: &str, denominator: &str) -> Self {
        let mut spec = Self::ratio(name, numerator, denominator);
        spec.scale = RatioScale::Plain;
        spec
    }

    pub fn difference(name: &str, minuend: &str, subtrahend: &str) -> Self {
        let mut spec = Self::with_kind(name, FieldKind::Difference);
        spec.difference_of = Some((minuend.to_string(), subtrahend.to_string()));
        spec
    }

    /// Set the display format
    pub fn display_as(mut self, display: DisplayFormat) -> Self {
        self.display = Some(display);
        self
    }

    fn with_kind(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            ratio_of: None,
            difference_of: None,
            scale: RatioScale::Percent,
            display: None,
        }
    }

    /// Whether the field is computed rather than received
    pub fn is_derived(&self) -> bool {
        matches!(self.kind, FieldKind::Ratio | FieldKind::Difference)
    }

    /// Effective display format
    pub fn display_format(&self) -> DisplayFormat {
        if let Some(display) = self.display {
            return display;
        }
        match (self.kind, self.scale) {
            (FieldKind::Ratio, RatioScale::Percent) => DisplayFormat::Percent,
            (FieldKind::Ratio, RatioScale::Plain) => DisplayFormat::Number,
            (FieldKind::Sum, _) | (FieldKind::Difference, _) => DisplayFormat::Number,
            (FieldKind::Passthrough, _) => DisplayFormat::Text,
        }
    }
}

// ==================== Report Definitions ====================

/// Declarative description of one report table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDefinition {
    /// Unique report name used in routes and on the CLI
    pub name: String,
    #[serde(default)]
    pub title: String,
    pub fields: Vec<FieldSpec>,
    /// Field holding the period key for time-ordered reports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_field: Option<String>,
    /// Fields that get running totals
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cumulative: Vec<String>,
    /// Fields that get a percentage-of-total column
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub share_of_total: Vec<String>,
    /// Segment fields from outermost to innermost for tree reports
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hierarchy: Vec<String>,
    /// Overrides the engine-wide zero-denominator policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zero_denominator: Option<ZeroDenominatorPolicy>,
}

impl ReportDefinition {
    /// Look up a field spec by name
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of the summed fields, in declaration order
    pub fn sum_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.kind == FieldKind::Sum)
            .map(|f| f.name.as_str())
            .collect()
    }

    /// Check that every field spec is complete and every referenced field is declared
    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "reports[].name".to_string(),
            });
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for spec in &self.fields {
            if !seen.insert(spec.name.as_str()) {
                return Err(self.spec_error(&spec.name, "field declared twice"));
            }
            match spec.kind {
                FieldKind::Ratio if spec.ratio_of.is_none() => {
                    return Err(self.spec_error(&spec.name, "ratio field without ratio_of"));
                }
                FieldKind::Difference if spec.difference_of.is_none() => {
                    return Err(self.spec_error(&spec.name, "difference field without difference_of"));
                }
                _ => {}
            }
        }

        for name in self.cumulative.iter().chain(self.share_of_total.iter()) {
            match self.field(name) {
                Some(spec) if spec.kind == FieldKind::Sum => {}
                Some(_) => return Err(self.spec_error(name, "running totals and shares need a sum field")),
                None => return Err(self.spec_error(name, "field is not declared")),
            }
        }

        Ok(())
    }

    fn spec_error(&self, field: &str, reason: &str) -> ConfigError {
        ConfigError::InvalidFieldSpec {
            report: self.name.clone(),
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Reports shipped with the default configuration
pub fn builtin_reports() -> Vec<ReportDefinition> {
    vec![
        ReportDefinition {
            name: "monthly-detail".to_string(),
            title: "Detailed Monthly".to_string(),
            fields: vec![
                FieldSpec::passthrough("month"),
                FieldSpec::sum("est").display_as(DisplayFormat::Currency),
                FieldSpec::sum("act").display_as(DisplayFormat::Currency),
                FieldSpec::difference("variance", "act", "est").display_as(DisplayFormat::Currency),
                FieldSpec::ratio("variancePercent", "variance", "est"),
            ],
            period_field: Some("month".to_string()),
            cumulative: vec!["est".to_string(), "act".to_string()],
            share_of_total: vec![],
            hierarchy: vec![],
            zero_denominator: None,
        },
        ReportDefinition {
            name: "salesperson".to_string(),
            title: "Revenue by Salesperson".to_string(),
            fields: vec![
                FieldSpec::passthrough("Salesperson"),
                FieldSpec::sum("JobCount"),
                FieldSpec::sum("JobRevenue").display_as(DisplayFormat::Currency),
                FieldSpec::sum("Profit").display_as(DisplayFormat::Currency),
                FieldSpec::ratio("profitPercent", "Profit", "JobRevenue"),
                FieldSpec::quotient("avgPerJob", "JobRevenue", "JobCount")
                    .display_as(DisplayFormat::Currency),
            ],
            period_field: None,
            cumulative: vec![],
            share_of_total: vec!["JobRevenue".to_string()],
            hierarchy: vec![],
            zero_denominator: None,
        },
        ReportDefinition {
            name: "forecast".to_string(),
            title: "Forecast vs Goal".to_string(),
            fields: vec![
                FieldSpec::passthrough("period"),
                FieldSpec::sum("Goal").display_as(DisplayFormat::Currency),
                FieldSpec::sum("Actual").display_as(DisplayFormat::Currency),
                FieldSpec::difference("variance", "Actual", "Goal").display_as(DisplayFormat::Currency),
                FieldSpec::ratio("variancePercent", "variance", "Goal"),
            ],
            period_field: Some("period".to_string()),
            cumulative: vec!["Goal".to_string(), "Actual".to_string()],
            share_of_total: vec![],
            hierarchy: vec![],
            zero_denominator: Some(ZeroDenominatorPolicy::NotApplicable),
        },
        ReportDefinition {
            name: "quote-margin".to_string(),
            title: "Quote Margin by Salesperson".to_string(),
            fields: vec![
                FieldSpec::passthrough("Salesperson"),
                FieldSpec::passthrough("Customer"),
                FieldSpec::passthrough("QuoteNumber"),
                FieldSpec::sum("Estimated").display_as(DisplayFormat::Currency),
                FieldSpec::sum("NetProfit").display_as(DisplayFormat::Currency),
                FieldSpec::ratio("marginPercent", "NetProfit", "Estimated"),
            ],
            period_field: None,
            cumulative: vec![],
            share_of_total: vec![],
            hierarchy: vec![
                "Salesperson".to_string(),
                "Customer".to_string(),
                "QuoteNumber".to_string(),
            ],
            zero_denominator: None,
        },
    ]
}

fn default_reports() -> Vec<ReportDefinition> {
    builtin_reports()
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Currency and number display settings
    #[serde(default)]
    pub currency: CurrencyConfig,
    /// Engine settings
    #[serde(default)]
    pub engine: EngineConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Report definitions
    #[serde(default = "default_reports")]
    pub reports: Vec<ReportDefinition>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            currency: CurrencyConfig::default(),
            engine: EngineConfig::default(),
            logging: LoggingConfig::default(),
            reports: default_reports(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: PathBuf) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_string_lossy().to_string(),
            });
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|_| ConfigError::IoError)?;

        Self::from_yaml_str(&content)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::InvalidYaml { message: e.to_string() })?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                reason: "Port must be greater than 0".to_string(),
            });
        }

        if self.currency.percent_decimals > 10 || self.currency.number_decimals > 10 {
            return Err(ConfigError::InvalidValue {
                field: "currency".to_string(),
                reason: "Decimal places must be between 0 and 10".to_string(),
            });
        }

        if self.engine.max_tree_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "engine.max_tree_depth".to_string(),
                reason: "Tree depth limit must be greater than 0".to_string(),
            });
        }

        let mut names: HashSet<&str> = HashSet::new();
        for report in &self.reports {
            report.validate()?;
            if !names.insert(report.name.as_str()) {
                return Err(ConfigError::DuplicateReport {
                    name: report.name.clone(),
                });
            }
        }

        Ok(())
    }

    /// Generate a default configuration file
    pub fn generate_default() -> &'static str {
        include_str!("../templates/default_config.yaml")
    }

    /// Find a report definition by name
    pub fn report(&self, name: &str) -> Option<&ReportDefinition> {
        self.reports.iter().find(|r| r.name == name)
    }

    /// Address the server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.report("salesperson").is_some());
        assert_eq!(config.bind_address(), "0.0.0.0:8082");
    }

    #[test]
    fn test_default_template_parses() {
        let config = Config::from_yaml_str(Config::generate_default()).unwrap();
        assert_eq!(config.reports.len(), builtin_reports().len());
        assert_eq!(config.report("quote-margin"), builtin_reports().iter().find(|r| r.name == "quote-margin"));
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = Config::from_yaml_str("server:\n  port: 9000\n").unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.currency.symbol, "$");
        assert_eq!(config.engine.zero_denominator, ZeroDenominatorPolicy::Zero);
        assert_eq!(config.engine.max_tree_depth, DEFAULT_MAX_TREE_DEPTH);
        assert!(!config.reports.is_empty());
    }

    #[test]
    fn test_ratio_without_operands_rejected() {
        let yaml = r#"
reports:
  - name: broken
    fields:
      - name: Profit
        kind: sum
      - name: profitPercent
        kind: ratio
"#;
        let err = Config::from_yaml_str(yaml).unwrap_err();
        assert_eq!(err.code(), ConfigErrorCode::InvalidFieldSpec);
    }

    #[test]
    fn test_field_spec_from_yaml() {
        let yaml = r#"
reports:
  - name: custom
    fields:
      - name: Revenue
        kind: sum
      - name: Units
        kind: sum
      - name: avgPerUnit
        kind: ratio
        ratio_of: [Revenue, Units]
        scale: plain
    cumulative: [Revenue]
    zero_denominator: not_applicable
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        let report = config.report("custom").unwrap();
        let spec = report.field("avgPerUnit").unwrap();
        assert_eq!(spec.ratio_of, Some(("Revenue".to_string(), "Units".to_string())));
        assert_eq!(spec.scale, RatioScale::Plain);
        assert_eq!(spec.display_format(), DisplayFormat::Number);
        assert_eq!(report.zero_denominator, Some(ZeroDenominatorPolicy::NotApplicable));
        assert_eq!(report.sum_fields(), vec!["Revenue", "Units"]);
    }

    #[test]
    fn test_cumulative_must_name_sum_field() {
        let mut report = builtin_reports().remove(0);
        report.cumulative.push("variance".to_string());
        assert!(report.validate().is_err());

        report.cumulative = vec!["missing".to_string()];
        assert!(report.validate().is_err());
    }

    #[test]
    fn test_duplicate_report_rejected() {
        let mut config = Config::default();
        let first = config.reports[0].clone();
        config.reports.push(first);
        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), ConfigErrorCode::DuplicateReport);
    }

    #[test]
    fn test_invalid_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_tree_depth_rejected() {
        let mut config = Config::default();
        config.engine.max_tree_depth = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_field_kind_from_str() {
        assert_eq!("SUM".parse::<FieldKind>().unwrap(), FieldKind::Sum);
        assert_eq!("difference".parse::<FieldKind>().unwrap(), FieldKind::Difference);
        assert!("average".parse::<FieldKind>().is_err());
        assert_eq!(FieldKind::Ratio.to_string(), "ratio");
    }
}
