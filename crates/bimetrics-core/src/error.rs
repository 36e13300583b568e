//! Error types for bimetrics-core
//!
//! The engine never fails on ordinary bad data: missing fields and
//! non-numeric values read as zero, and zero denominators resolve to the
//! report's sentinel. Errors are reserved for structural problems (cycles in
//! hierarchical input), unknown reports and invalid configuration.

use thiserror::Error;
use serde::{Deserialize, Serialize};

use bimetrics_ingest::IngestError;

/// Error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No report with the requested name
    ReportNotFound,
    /// Report has no hierarchy declared
    NotHierarchical,
    /// Tree input revisits a node or names an unknown child
    StructuralError,
    /// Field spec is incomplete
    InvalidFieldSpec,
    /// Period key could not be parsed
    InvalidPeriod,
    /// Response envelope or request body was not recognized
    InputShape,
    /// Row source could not be read
    IoError,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::ReportNotFound => write!(f, "REPORT_NOT_FOUND"),
            ErrorCode::NotHierarchical => write!(f, "NOT_HIERARCHICAL"),
            ErrorCode::StructuralError => write!(f, "STRUCTURAL_ERROR"),
            ErrorCode::InvalidFieldSpec => write!(f, "INVALID_FIELD_SPEC"),
            ErrorCode::InvalidPeriod => write!(f, "INVALID_PERIOD"),
            ErrorCode::InputShape => write!(f, "INPUT_SHAPE"),
            ErrorCode::IoError => write!(f, "IO_ERROR"),
        }
    }
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Additional details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Suggestions for resolution
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl ErrorDetails {
    /// Create a new error detail
    pub fn new(code: ErrorCode, message: String) -> Self {
        Self {
            code,
            message,
            details: None,
            suggestions: vec![],
        }
    }

    /// Add detail information
    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.details = Some(detail);
        self
    }

    /// Add a suggestion
    pub fn with_suggestion(mut self, suggestion: String) -> Self {
        self.suggestions.push(suggestion);
        self
    }
}

impl std::fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, "\nDetails: {}", details)?;
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

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Debug information
    Debug,
    /// Informational
    Info,
    /// Warning - operation may be affected
    Warning,
    /// Error - operation failed
    Error,
    /// Critical - application may be unstable
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Debug => write!(f, "debug"),
            ErrorSeverity::Info => write!(f, "info"),
            ErrorSeverity::Warning => write!(f, "warning"),
            ErrorSeverity::Error => write!(f, "error"),
            ErrorSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// Main error type for bimetrics-core
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Report not found: {name}")]
    ReportNotFound { name: String },

    #[error("Report '{name}' declares no hierarchy")]
    NotHierarchical { name: String },

    #[error("Structural error at node '{node}': {reason}")]
    Structural { node: String, reason: String },

    #[error("Invalid field spec '{field}': {reason}")]
    InvalidFieldSpec { field: String, reason: String },

    #[error("Invalid period key: {value}")]
    InvalidPeriod { value: String },

    #[error("Input shape error: {message}")]
    InputShape { message: String },

    #[error("IO error: {message}")]
    IoError { message: String },
}

impl CoreError {
    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            CoreError::ReportNotFound { .. } => ErrorCode::ReportNotFound,
            CoreError::NotHierarchical { .. } => ErrorCode::NotHierarchical,
            CoreError::Structural { .. } => ErrorCode::StructuralError,
            CoreError::InvalidFieldSpec { .. } => ErrorCode::InvalidFieldSpec,
            CoreError::InvalidPeriod { .. } => ErrorCode::InvalidPeriod,
            CoreError::InputShape { .. } => ErrorCode::InputShape,
            CoreError::IoError { .. } => ErrorCode::IoError,
        }
    }

    /// Get the severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CoreError::ReportNotFound { .. } => ErrorSeverity::Info,
            CoreError::NotHierarchical { .. } => ErrorSeverity::Info,
            CoreError::Structural { .. } => ErrorSeverity::Error,
            CoreError::InvalidFieldSpec { .. } => ErrorSeverity::Error,
            CoreError::InvalidPeriod { .. } => ErrorSeverity::Warning,
            CoreError::InputShape { .. } => ErrorSeverity::Warning,
            CoreError::IoError { .. } => ErrorSeverity::Error,
        }
    }

    /// Whether this error means the input violated a structural precondition
    pub fn is_structural(&self) -> bool {
        matches!(self, CoreError::Structural { .. })
    }

    /// Convert to detailed error info
    pub fn to_details(&self) -> ErrorDetails {
        let mut details = ErrorDetails::new(self.code(), self.to_string());

        match self {
            CoreError::ReportNotFound { name } => {
                details = details.with_suggestion(format!(
                    "Check that a report named '{}' is declared in the configuration.", name
                ));
                details = details.with_suggestion(
                    "Use the /api/reports endpoint to list all reports.".to_string()
                );
            }
            CoreError::NotHierarchical { .. } => {
                details = details.with_suggestion(
                    "Declare `hierarchy: [..]` on the report to build a tree.".to_string()
                );
            }
            CoreError::Structural { node, reason } => {
                details = details.with_detail(serde_json::json!({ "node": node, "reason": reason }));
                details = details.with_suggestion(
                    "Every node must appear under exactly one parent and trees must not contain cycles.".to_string()
                );
            }
            CoreError::InvalidPeriod { .. } => {
                details = details.with_suggestion(
                    "Use ISO year-month keys such as 2024-03.".to_string()
                );
            }
            CoreError::InputShape { message } => {
                details = details.with_detail(serde_json::json!({ "shape": message }));
            }
            _ => {}
        }

        details
    }
}

/// Result type with CoreError
pub type CoreResult<T> = Result<T, CoreError>;

impl From<IngestError> for CoreError {
    fn from(error: IngestError) -> Self {
        match error {
            IngestError::IoError(e) => CoreError::IoError { message: e.to_string() },
            other => CoreError::InputShape { message: other.to_string() },
        }
    }
}

/// Error context for reporting
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Request ID for tracing
    pub request_id: Option<String>,
    /// Dataset the request was made against
    pub dataset: Option<String>,
    /// Operation being performed
    pub operation: String,
}

impl ErrorContext {
    /// Create a new error context
    pub fn new(operation: String) -> Self {
        Self {
            request_id: None,
            dataset: None,
            operation,
        }
    }

    /// Add request ID
    pub fn with_request_id(mut self, request_id: String) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Add dataset
    pub fn with_dataset(mut self, dataset: String) -> Self {
        self.dataset = Some(dataset);
        self
    }
}

/// Error logger trait
pub trait ErrorLogger {
    /// Log an error
    fn log_error(&self, error: &CoreError, context: &ErrorContext);
    /// Log a warning
    fn log_warning(&self, message: &str, context: &ErrorContext);
}

/// Default error logger using log crate
#[derive(Default)]
pub struct DefaultErrorLogger;

impl ErrorLogger for DefaultErrorLogger {
    fn log_error(&self, error: &CoreError, context: &ErrorContext) {
        match error.severity() {
            ErrorSeverity::Debug | ErrorSeverity::Info => log::info!(
                target: "bimetrics::error",
                "[{}] {} - Operation: {} - Dataset: {:?}",
                error.code(),
                error,
                context.operation,
                context.dataset
            ),
            _ => log::error!(
                target: "bimetrics::error",
                "ERROR [{}] {} - Operation: {} - Dataset: {:?} - Request: {:?}",
                error.code(),
                error.to_details(),
                context.operation,
                context.dataset,
                context.request_id
            ),
        }
    }

    fn log_warning(&self, message: &str, context: &ErrorContext) {
        log::warn!(
            target: "bimetrics::error",
            "WARNING: {} - Operation: {} - Dataset: {:?}",
            message,
            context.operation,
            context.dataset
        );
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::ReportNotFound.to_string(), "REPORT_NOT_FOUND");
        assert_eq!(ErrorCode::StructuralError.to_string(), "STRUCTURAL_ERROR");
        assert_eq!(ErrorCode::InputShape.to_string(), "INPUT_SHAPE");
    }

    #[test]
    fn test_error_severity_display() {
        assert_eq!(ErrorSeverity::Debug.to_string(), "debug");
        assert_eq!(ErrorSeverity::Warning.to_string(), "warning");
        assert_eq!(ErrorSeverity::Critical.to_string(), "critical");
    }

    #[test]
    fn test_structural_error_details() {
        let error = CoreError::Structural {
            node: "customer-7".to_string(),
            reason: "node reached twice".to_string(),
        };
        assert!(error.is_structural());
        assert_eq!(error.severity(), ErrorSeverity::Error);

        let details = error.to_details();
        assert_eq!(details.code, ErrorCode::StructuralError);
        assert_eq!(details.details.unwrap()["node"], "customer-7");
        assert!(!details.suggestions.is_empty());
    }

    #[test]
    fn test_report_not_found_details() {
        let error = CoreError::ReportNotFound { name: "yard".to_string() };
        let details = error.to_details();
        assert_eq!(details.code, ErrorCode::ReportNotFound);
        assert!(details.message.contains("yard"));
        assert_eq!(details.suggestions.len(), 2);
    }

    #[test]
    fn test_ingest_error_conversion() {
        let error: CoreError = IngestError::UnrecognizedEnvelope { shape: "body is a string".to_string() }.into();
        assert_eq!(error.code(), ErrorCode::InputShape);

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let error: CoreError = IngestError::IoError(io).into();
        assert_eq!(error.code(), ErrorCode::IoError);
        assert!(error.to_string().contains("gone"));
    }

    #[test]
    fn test_error_context() {
        let context = ErrorContext::new("rollup".to_string())
            .with_request_id("req-1".to_string())
            .with_dataset("quotes".to_string());
        assert_eq!(context.operation, "rollup");
        assert_eq!(context.request_id.as_deref(), Some("req-1"));
        assert_eq!(context.dataset.as_deref(), Some("quotes"));
    }

    #[test]
    fn test_error_details_display() {
        let details = ErrorDetails::new(ErrorCode::InvalidPeriod, "Invalid period key: 13/2024".to_string())
            .with_suggestion("Use ISO keys".to_string());
        let text = details.to_string();
        assert!(text.starts_with("[INVALID_PERIOD]"));
        assert!(text.contains("Use ISO keys"));
    }
}
