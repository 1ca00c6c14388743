//! Conversion of foreign-currency amounts into the reporting currency.
//!
//! The exchange rate is always supplied by the caller, taken from the
//! proposal's frozen variable snapshot. Nothing here fetches a live rate.

use rust_decimal::Decimal;

use crate::error::DealEngineError;
use crate::types::{to_flow, Currency, Flow};
use crate::DealEngineResult;

/// Reporting currency plus the closed set of currencies a deployment accepts.
#[derive(Debug, Clone)]
pub struct CurrencyNormalizer {
    reporting: Currency,
    supported: Vec<Currency>,
}

impl Default for CurrencyNormalizer {
    fn default() -> Self {
        Self {
            reporting: Currency::PEN,
            supported: vec![Currency::PEN, Currency::USD],
        }
    }
}

impl CurrencyNormalizer {
    pub fn new(reporting: Currency, supported: Vec<Currency>) -> Self {
        Self {
            reporting,
            supported,
        }
    }

    pub fn reporting_currency(&self) -> &Currency {
        &self.reporting
    }

    /// Parse and validate a currency code against the supported set.
    pub fn resolve(&self, currency_code: &str) -> DealEngineResult<Currency> {
        let currency: Currency = currency_code.parse()?;
        if !self.supported.contains(&currency) {
            return Err(DealEngineError::InvalidCurrencyCode(
                currency_code.to_string(),
            ));
        }
        Ok(currency)
    }

    /// `amount` unchanged when already in the reporting currency, otherwise
    /// `amount * exchange_rate`.
    pub fn normalize(
        &self,
        amount: Flow,
        currency_code: &str,
        exchange_rate: Flow,
    ) -> DealEngineResult<Flow> {
        let currency = self.resolve(currency_code)?;
        if currency == self.reporting {
            return Ok(amount);
        }
        Ok(amount * exchange_rate)
    }

    /// Same as [`normalize`](Self::normalize) for an exact entered amount.
    pub fn normalize_money(
        &self,
        amount: Decimal,
        currency_code: &str,
        exchange_rate: Flow,
    ) -> DealEngineResult<Flow> {
        self.normalize(to_flow(amount, "amount")?, currency_code, exchange_rate)
    }
}

/// Normalize with the default PEN/USD deployment.
pub fn normalize(amount: Flow, currency_code: &str, exchange_rate: Flow) -> DealEngineResult<Flow> {
    CurrencyNormalizer::default().normalize(amount, currency_code, exchange_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reporting_currency_passes_through() {
        assert_eq!(normalize(1500.0, "PEN", 3.75).unwrap(), 1500.0);
    }

    #[test]
    fn test_foreign_currency_multiplied() {
        assert_eq!(normalize(100.0, "USD", 3.75).unwrap(), 375.0);
        assert_eq!(normalize(100.0, "usd", 3.75).unwrap(), 375.0);
    }

    #[test]
    fn test_unsupported_code_rejected() {
        let err = normalize(100.0, "EUR", 4.1).unwrap_err();
        assert!(matches!(err, DealEngineError::InvalidCurrencyCode(ref c) if c == "EUR"));
        assert!(normalize(100.0, "DOLLARS", 4.1).is_err());
    }

    #[test]
    fn test_custom_supported_set() {
        let n = CurrencyNormalizer::new(
            Currency::USD,
            vec![Currency::USD, Currency::Other("EUR".into())],
        );
        assert_eq!(n.normalize(10.0, "USD", 1.08).unwrap(), 10.0);
        assert!((n.normalize(10.0, "EUR", 1.08).unwrap() - 10.8).abs() < 1e-12);
        assert!(n.normalize(10.0, "PEN", 0.27).is_err());
    }

    #[test]
    fn test_normalize_money() {
        let n = CurrencyNormalizer::default();
        assert_eq!(n.normalize_money(dec!(20.5), "USD", 2.0).unwrap(), 41.0);
    }
}
