use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DealEngineError;
use crate::DealEngineResult;

/// Monetary amounts as entered (line items, proposal fields). Kept exact.
pub type Money = Decimal;

/// Rates as recorded in the variable log (0.12 = 12%). Never as percentages.
pub type Rate = Decimal;

/// Engine-side value in the reporting currency. All cash-flow arithmetic is f64.
pub type Flow = f64;

/// Whole months; period offsets and contract terms.
pub type Months = i32;

/// Currency code. Unknown codes parse into `Other` and are rejected by the
/// normalizer unless the deployment lists them as supported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Currency {
    #[default]
    PEN,
    USD,
    Other(String),
}

impl Currency {
    pub fn code(&self) -> &str {
        match self {
            Currency::PEN => "PEN",
            Currency::USD => "USD",
            Currency::Other(code) => code.as_str(),
        }
    }
}

impl From<String> for Currency {
    fn from(code: String) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "PEN" => Currency::PEN,
            "USD" => Currency::USD,
            other => Currency::Other(other.to_string()),
        }
    }
}

impl From<Currency> for String {
    fn from(c: Currency) -> Self {
        c.code().to_string()
    }
}

impl FromStr for Currency {
    type Err = DealEngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DealEngineError::InvalidCurrencyCode(s.to_string()));
        }
        Ok(Currency::from(trimmed.to_string()))
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// An amount in its original currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyAmount {
    pub amount: Money,
    pub currency: String,
}

impl CurrencyAmount {
    pub fn new(amount: Money, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }
}

/// Convert an exact amount into engine precision.
pub fn to_flow(value: Decimal, field: &str) -> DealEngineResult<Flow> {
    value.to_f64().ok_or_else(|| DealEngineError::InvalidInput {
        field: field.into(),
        reason: format!("{value} is not representable as f64"),
    })
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "f64_ieee754".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_currency_parse_is_case_insensitive() {
        assert_eq!("usd".parse::<Currency>().unwrap(), Currency::USD);
        assert_eq!(" PEN ".parse::<Currency>().unwrap(), Currency::PEN);
        assert_eq!(
            "eur".parse::<Currency>().unwrap(),
            Currency::Other("EUR".into())
        );
    }

    #[test]
    fn test_currency_parse_rejects_malformed_codes() {
        assert!("US".parse::<Currency>().is_err());
        assert!("U$D".parse::<Currency>().is_err());
        assert!("".parse::<Currency>().is_err());
    }

    #[test]
    fn test_currency_serializes_as_code() {
        let json = serde_json::to_string(&Currency::USD).unwrap();
        assert_eq!(json, "\"USD\"");
        let back: Currency = serde_json::from_str("\"pen\"").unwrap();
        assert_eq!(back, Currency::PEN);
    }

    #[test]
    fn test_to_flow() {
        assert_eq!(to_flow(dec!(1234.5), "amount").unwrap(), 1234.5);
    }
}
