//! Display formatting for currency, percent, grouped numbers and phone numbers
//!
//! All functions are total: non-finite input produces a fixed fallback
//! string instead of panicking. Rounding is half away from zero.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Serialize, Serializer};

static PHONE_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{10}$").unwrap());

/// Result of [`with_commas`]: either the bare number zero or a grouped string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Commas {
    /// Zero and NaN short-circuit to the number 0, not the string "0"
    Zero,
    Text(String),
}

impl Commas {
    /// True for the numeric-zero branch
    pub fn is_number(&self) -> bool {
        matches!(self, Commas::Zero)
    }
}

impl std::fmt::Display for Commas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Commas::Zero => write!(f, "0"),
            Commas::Text(text) => write!(f, "{}", text),
        }
    }
}

impl Serialize for Commas {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Commas::Zero => serializer.serialize_u8(0),
            Commas::Text(text) => serializer.serialize_str(text),
        }
    }
}

/// Configurable formatter; the free functions use the dollar defaults
#[derive(Debug, Clone)]
pub struct Formatter {
    pub symbol: String,
    pub percent_decimals: u32,
    pub number_decimals: u32,
}

impl Default for Formatter {
    fn default() -> Self {
        Self {
            symbol: "$".to_string(),
            percent_decimals: 2,
            number_decimals: 0,
        }
    }
}

impl Formatter {
    pub fn new(symbol: &str, percent_decimals: u32, number_decimals: u32) -> Self {
        Self {
            symbol: symbol.to_string(),
            percent_decimals,
            number_decimals,
        }
    }

    /// Currency string, standard ("$1,234.56") or dense ("$1.2k")
    pub fn currency(&self, value: f64, dense: bool) -> String {
        let amount = match to_decimal(value) {
            Some(amount) => amount,
            None if dense => return format!("{}0", self.symbol),
            None => return format!("{}0.00", self.symbol),
        };

        if !dense {
            let text = fixed(amount, 2);
            return match text.strip_prefix('-') {
                Some(unsigned) => format!("-{}{}", self.symbol, group_fixed(unsigned)),
                None => format!("{}{}", self.symbol, group_fixed(&text)),
            };
        }

        let magnitude = amount.abs();
        let (scaled, suffix) = if magnitude < Decimal::from(1_000) {
            (round_half_up(magnitude, 0), "")
        } else if magnitude < Decimal::from(1_000_000) {
            (round_half_up(magnitude / Decimal::from(1_000), 1), "k")
        } else {
            (round_half_up(magnitude / Decimal::from(1_000_000), 1), "m")
        };
        let sign = if amount.is_sign_negative() && !scaled.is_zero() { "-" } else { "" };
        format!("{}{}{}{}", sign, self.symbol, scaled.normalize(), suffix)
    }

    /// Percent string with the configured decimals
    pub fn percent(&self, value: f64) -> String {
        as_percent(value, self.percent_decimals)
    }

    /// Comma-grouped number; the numeric-zero branch renders as "0"
    pub fn number(&self, value: f64) -> String {
        with_commas(value, self.number_decimals).to_string()
    }
}

/// Format a value as dollars
pub fn as_currency(value: f64, dense: bool) -> String {
    Formatter::default().currency(value, dense)
}

/// Group the integer part with commas, fixed to `decimals` places.
///
/// Zero and NaN return [`Commas::Zero`]; callers rendering JSON get the
/// number `0` for those, a string otherwise. Infinite values also take the
/// zero branch.
pub fn with_commas(value: f64, decimals: u32) -> Commas {
    if value == 0.0 {
        return Commas::Zero;
    }
    match to_decimal(value) {
        Some(amount) => Commas::Text(group_fixed(&fixed(amount, decimals))),
        None => Commas::Zero,
    }
}

/// Fixed-decimal percent of an already-scaled value (25.0 -> "25.00%")
pub fn as_percent(value: f64, decimals: u32) -> String {
    match to_decimal(value) {
        Some(amount) => format!("{}%", fixed(amount, decimals)),
        None => "0%".to_string(),
    }
}

/// [`as_percent`] with two decimals
pub fn as_percent_default(value: f64) -> String {
    as_percent(value, 2)
}

/// Format a 10-digit string as NNN-NNN-NNNN; anything else is returned as-is
pub fn as_phone(value: &str) -> String {
    if !PHONE_DIGITS.is_match(value) {
        return value.to_string();
    }
    format!("{}-{}-{}", &value[..3], &value[3..6], &value[6..])
}

/// Insert comma separators into a run of integer digits
pub fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut result = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

fn to_decimal(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64(value)
}

fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

// "-1234.5" at 2 places -> "-1234.50"; negative zero prints unsigned
fn fixed(value: Decimal, decimals: u32) -> String {
    let rounded = round_half_up(value, decimals);
    let rounded = if rounded.is_zero() { Decimal::ZERO } else { rounded };
    format!("{:.*}", decimals as usize, rounded)
}

// "-1234.50" -> "-1,234.50"
fn group_fixed(text: &str) -> String {
    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text),
    };
    match unsigned.split_once('.') {
        Some((int, frac)) => format!("{}{}.{}", sign, group_thousands(int), frac),
        None => format!("{}{}", sign, group_thousands(unsigned)),
    }
}
