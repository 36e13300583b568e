//! Utility functions and helpers
//!
//! Display formatting shared by the engine and the API.

pub mod format;

pub use format::{
    as_currency, as_percent, as_percent_default, as_phone, group_thousands, with_commas,
    Commas, Formatter,
};
