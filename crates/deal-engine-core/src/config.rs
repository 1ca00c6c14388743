use serde::{Deserialize, Serialize};

use crate::cash_flow::{CommissionPolicy, OverflowPolicy};
use crate::currency::CurrencyNormalizer;
use crate::error::DealEngineError;
use crate::time_value::IrrSettings;
use crate::types::Currency;
use crate::variables::{default_registry, VariableDefinition};
use crate::DealEngineResult;

/// Deployment-level engine settings. Every field has a default, so an empty
/// document deserializes to the stock configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub reporting_currency: Currency,
    pub supported_currencies: Vec<Currency>,
    pub commission_policy: CommissionPolicy,
    pub overflow_policy: OverflowPolicy,
    pub irr: IrrSettings,
    /// Quiet window of the recalculation session, in milliseconds
    pub recalc_debounce_ms: u64,
    pub max_rejection_note_len: usize,
    pub variables: Vec<VariableDefinition>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reporting_currency: Currency::PEN,
            supported_currencies: vec![Currency::PEN, Currency::USD],
            commission_policy: CommissionPolicy::SinglePeriod,
            overflow_policy: OverflowPolicy::Drop,
            irr: IrrSettings::default(),
            recalc_debounce_ms: 1000,
            max_rejection_note_len: 500,
            variables: default_registry(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> DealEngineResult<()> {
        let invalid = |field: &str, reason: &str| DealEngineError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        };

        if self.supported_currencies.is_empty() {
            return Err(invalid("supported_currencies", "must not be empty"));
        }
        if !self.supported_currencies.contains(&self.reporting_currency) {
            return Err(invalid(
                "reporting_currency",
                "must be one of the supported currencies",
            ));
        }
        if !(self.irr.lower_bound > -1.0 && self.irr.lower_bound < self.irr.upper_bound) {
            return Err(invalid(
                "irr",
                "bounds must satisfy -1 < lower_bound < upper_bound",
            ));
        }
        if self.irr.max_iterations == 0 || !(self.irr.tolerance > 0.0) {
            return Err(invalid(
                "irr",
                "max_iterations and tolerance must be positive",
            ));
        }
        if self.recalc_debounce_ms == 0 {
            return Err(invalid("recalc_debounce_ms", "must be > 0"));
        }
        if self.max_rejection_note_len == 0 {
            return Err(invalid("max_rejection_note_len", "must be > 0"));
        }
        Ok(())
    }

    pub fn normalizer(&self) -> CurrencyNormalizer {
        CurrencyNormalizer::new(
            self.reporting_currency.clone(),
            self.supported_currencies.clone(),
        )
    }

    pub fn debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.recalc_debounce_ms)
    }
}
