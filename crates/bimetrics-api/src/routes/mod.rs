//! Route modules

pub mod engine;
pub mod reports;
