use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::access::Role;
use crate::types::Rate;

pub const EXCHANGE_RATE: &str = "exchange_rate";
pub const COST_OF_CAPITAL: &str = "cost_of_capital";
pub const GUARANTEE_LETTER_RATE: &str = "guarantee_letter_rate";

/// The variables every proposal freezes at creation.
pub const REQUIRED_VARIABLES: [&str; 3] = [EXCHANGE_RATE, COST_OF_CAPITAL, GUARANTEE_LETTER_RATE];

pub const FINANCIAL: &str = "FINANCIAL";

/// One immutable row of the variable log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterVariable {
    pub id: u64,
    pub variable_name: String,
    pub value: Rate,
    pub category: String,
    pub recorded_at: DateTime<Utc>,
    pub recorded_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Registry entry: which names may be recorded, under which category, and
/// which role may write them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub name: String,
    pub category: String,
    pub write_role: Role,
}

impl VariableDefinition {
    pub fn new(name: &str, category: &str, write_role: Role) -> Self {
        Self {
            name: name.to_string(),
            category: category.to_string(),
            write_role,
        }
    }
}

/// The stock registry: the three financial variables, written by FINANCE.
pub fn default_registry() -> Vec<VariableDefinition> {
    REQUIRED_VARIABLES
        .iter()
        .map(|name| VariableDefinition::new(name, FINANCIAL, Role::Finance))
        .collect()
}
