//! Report routes - configured report tables and trees

pub mod api;

pub use api::{api_report, api_report_tree, api_reports, ReportQuery, ReportSummary};
