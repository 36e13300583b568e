//! Error types for bimetrics-config

use thiserror::Error;
use serde::{Deserialize, Serialize};

/// Error codes for configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigErrorCode {
    /// File not found
    FileNotFound,
    /// Invalid YAML format
    InvalidYaml,
    /// Missing required field
    MissingField,
    /// Invalid field value
    InvalidValue,
    /// IO error
    IoError,
    /// Report field declaration is inconsistent
    InvalidFieldSpec,
    /// Two reports share a name
    DuplicateReport,
}

impl std::fmt::Display for ConfigErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigErrorCode::FileNotFound => write!(f, "FILE_NOT_FOUND"),
            ConfigErrorCode::InvalidYaml => write!(f, "INVALID_YAML"),
            ConfigErrorCode::MissingField => write!(f, "MISSING_FIELD"),
            ConfigErrorCode::InvalidValue => write!(f, "INVALID_VALUE"),
            ConfigErrorCode::IoError => write!(f, "IO_ERROR"),
            ConfigErrorCode::InvalidFieldSpec => write!(f, "INVALID_FIELD_SPEC"),
            ConfigErrorCode::DuplicateReport => write!(f, "DUPLICATE_REPORT"),
        }
    }
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigErrorDetails {
    /// Error code
    pub code: ConfigErrorCode,
    /// Human-readable message
    pub message: String,
    /// Field path (for field-specific errors)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Suggestions for resolution
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl ConfigErrorDetails {
    pub fn new(code: ConfigErrorCode, message: String) -> Self {
        Self {
            code,
            message,
            field: None,
            suggestions: vec![],
        }
    }

    pub fn with_field(mut self, field: String) -> Self {
        self.field = Some(field);
        self
    }

    pub fn with_suggestion(mut self, suggestion: String) -> Self {
        self.suggestions.push(suggestion);
        self
    }
}

impl std::fmt::Display for ConfigErrorDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(ref field) = self.field {
            write!(f, "\nField: {}", field)?;
        }
        if !self.suggestions.is_empty() {
            write!(f, "\nSuggestions:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n  - {}", suggestion)?;
            }
        }
        Ok(())
    }
}

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid YAML format: {message}")]
    InvalidYaml { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field value: {field} - {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("IO error occurred")]
    IoError,

    #[error("Invalid field spec in report '{report}': {field} - {reason}")]
    InvalidFieldSpec {
        report: String,
        field: String,
        reason: String,
    },

    #[error("Duplicate report name: {name}")]
    DuplicateReport { name: String },
}

impl ConfigError {
    /// Get the error code
    pub fn code(&self) -> ConfigErrorCode {
        match self {
            ConfigError::FileNotFound { .. } => ConfigErrorCode::FileNotFound,
            ConfigError::InvalidYaml { .. } => ConfigErrorCode::InvalidYaml,
            ConfigError::MissingField { .. } => ConfigErrorCode::MissingField,
            ConfigError::InvalidValue { .. } => ConfigErrorCode::InvalidValue,
            ConfigError::IoError => ConfigErrorCode::IoError,
            ConfigError::InvalidFieldSpec { .. } => ConfigErrorCode::InvalidFieldSpec,
            ConfigError::DuplicateReport { .. } => ConfigErrorCode::DuplicateReport,
        }
    }

    /// Convert to detailed error info
    pub fn to_details(&self) -> ConfigErrorDetails {
        let mut details = ConfigErrorDetails::new(self.code(), self.to_string());

        match self {
            ConfigError::FileNotFound { .. } => {
                details = details.with_suggestion(
                    "Use --config flag to specify the config file path.".to_string()
                );
                details = details.with_suggestion(
                    "Run `bimetrics init-config` to print a default configuration.".to_string()
                );
            }
            ConfigError::MissingField { field } => {
                details = details.with_field(field.clone());
                details = details.with_suggestion(
                    format!("Add the '{}' field to your config file.", field)
                );
            }
            ConfigError::InvalidValue { field, reason } => {
                details = details.with_field(field.clone());
                details = details.with_suggestion(reason.clone());
            }
            ConfigError::InvalidFieldSpec { report, field, reason } => {
                details = details.with_field(format!("reports.{}.fields.{}", report, field));
                details = details.with_suggestion(reason.clone());
                details = details.with_suggestion(
                    "Ratio fields need `ratio_of: [numerator, denominator]`, difference fields need `difference_of: [minuend, subtrahend]`.".to_string()
                );
            }
            ConfigError::DuplicateReport { name } => {
                details = details.with_suggestion(
                    format!("Rename one of the reports called '{}'.", name)
                );
            }
            _ => {}
        }

        details
    }
}

/// Result type with ConfigError
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_code_display() {
        assert_eq!(ConfigErrorCode::InvalidYaml.to_string(), "INVALID_YAML");
        assert_eq!(ConfigErrorCode::InvalidFieldSpec.to_string(), "INVALID_FIELD_SPEC");
    }

    #[test]
    fn test_field_spec_error_details() {
        let error = ConfigError::InvalidFieldSpec {
            report: "salesperson".to_string(),
            field: "profitPercent".to_string(),
            reason: "ratio field without ratio_of".to_string(),
        };
        let details = error.to_details();

        assert_eq!(details.code, ConfigErrorCode::InvalidFieldSpec);
        assert_eq!(details.field.as_deref(), Some("reports.salesperson.fields.profitPercent"));
        assert_eq!(details.suggestions.len(), 2);
        assert!(details.to_string().contains("profitPercent"));
    }
}
