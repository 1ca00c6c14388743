//! Sales commission by business unit.
//!
//! Rules are evaluated on pre-commission figures: revenue, gross-margin ratio
//! and payback of the timeline built without any commission expense.

pub mod rules;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Flow, Months};

pub use rules::calculate_commission;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BusinessUnit {
    Estado,
    Gigalan,
    Corporativo,
    Other(String),
}

impl From<String> for BusinessUnit {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "ESTADO" => BusinessUnit::Estado,
            "GIGALAN" => BusinessUnit::Gigalan,
            "CORPORATIVO" => BusinessUnit::Corporativo,
            other => BusinessUnit::Other(other.to_string()),
        }
    }
}

impl From<BusinessUnit> for String {
    fn from(u: BusinessUnit) -> Self {
        u.to_string()
    }
}

impl fmt::Display for BusinessUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusinessUnit::Estado => f.write_str("ESTADO"),
            BusinessUnit::Gigalan => f.write_str("GIGALAN"),
            BusinessUnit::Corporativo => f.write_str("CORPORATIVO"),
            BusinessUnit::Other(s) => f.write_str(s),
        }
    }
}

/// GIGALAN-specific deal attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GigalanTerms {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// NUEVO or EXISTENTE
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale_type: Option<String>,
    /// Monthly charge of the contract being replaced, reporting currency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_mrc: Option<Flow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionInput {
    pub business_unit: BusinessUnit,
    pub contract_term_months: Months,
    pub total_revenue: Flow,
    pub gross_margin_ratio: f64,
    /// Index of the period in which cumulative flow turns non-negative
    pub payback: Option<f64>,
    /// Monthly recurring charge, reporting currency
    pub mrc: Flow,
    #[serde(default)]
    pub gigalan: GigalanTerms,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commission {
    pub amount: Flow,
    /// Rate applied by the matching band (0 when none matched)
    pub rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cap: Option<Flow>,
    /// Which rule produced the amount
    pub rule: String,
}

impl Commission {
    pub(crate) fn none(rule: impl Into<String>) -> Self {
        Self {
            amount: 0.0,
            rate: 0.0,
            cap: None,
            rule: rule.into(),
        }
    }
}
