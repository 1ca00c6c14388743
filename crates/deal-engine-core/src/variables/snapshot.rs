use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::model::{COST_OF_CAPITAL, EXCHANGE_RATE, GUARANTEE_LETTER_RATE};
use super::store::MasterVariableLog;
use crate::error::DealEngineError;
use crate::proposal::model::{Proposal, ProposalDraft};
use crate::types::{to_flow, Flow, Rate};
use crate::DealEngineResult;

/// Current value of each requested name; `None` where nothing was ever recorded.
pub fn resolve_current(
    log: &dyn MasterVariableLog,
    names: &[&str],
) -> DealEngineResult<BTreeMap<String, Option<Rate>>> {
    names
        .iter()
        .map(|name| Ok((name.to_string(), log.latest(name)?.map(|row| row.value))))
        .collect()
}

/// The economic parameters a proposal was created under.
///
/// Fields are private and there are no setters: once built, a snapshot can
/// only be read or replaced wholesale by building a new proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterVariableSnapshot {
    exchange_rate: Rate,
    /// Annual
    cost_of_capital: Rate,
    guarantee_letter_rate: Rate,
    #[serde(default = "Utc::now")]
    resolved_at: DateTime<Utc>,
}

impl MasterVariableSnapshot {
    pub fn new(
        exchange_rate: Rate,
        cost_of_capital: Rate,
        guarantee_letter_rate: Rate,
        resolved_at: DateTime<Utc>,
    ) -> Self {
        Self {
            exchange_rate,
            cost_of_capital,
            guarantee_letter_rate,
            resolved_at,
        }
    }

    /// Build from a [`resolve_current`] result; any absent required value
    /// fails with `MissingMasterVariable`.
    pub fn from_resolved(
        resolved: &BTreeMap<String, Option<Rate>>,
        resolved_at: DateTime<Utc>,
    ) -> DealEngineResult<Self> {
        let take = |name: &str| -> DealEngineResult<Rate> {
            resolved
                .get(name)
                .copied()
                .flatten()
                .ok_or_else(|| DealEngineError::MissingMasterVariable(name.to_string()))
        };
        Ok(Self {
            exchange_rate: take(EXCHANGE_RATE)?,
            cost_of_capital: take(COST_OF_CAPITAL)?,
            guarantee_letter_rate: take(GUARANTEE_LETTER_RATE)?,
            resolved_at,
        })
    }

    pub fn exchange_rate(&self) -> Rate {
        self.exchange_rate
    }

    pub fn cost_of_capital(&self) -> Rate {
        self.cost_of_capital
    }

    pub fn guarantee_letter_rate(&self) -> Rate {
        self.guarantee_letter_rate
    }

    pub fn resolved_at(&self) -> DateTime<Utc> {
        self.resolved_at
    }

    /// (exchange rate, annual cost of capital, guarantee-letter rate) in
    /// engine precision.
    pub fn as_flows(&self) -> DealEngineResult<(Flow, f64, f64)> {
        Ok((
            to_flow(self.exchange_rate, EXCHANGE_RATE)?,
            to_flow(self.cost_of_capital, COST_OF_CAPITAL)?,
            to_flow(self.guarantee_letter_rate, GUARANTEE_LETTER_RATE)?,
        ))
    }
}

/// Turn a draft into a proposal bound to `resolved`. The draft is consumed, so
/// a given draft can be frozen at most once.
pub fn freeze(
    draft: ProposalDraft,
    resolved: &BTreeMap<String, Option<Rate>>,
    resolved_at: DateTime<Utc>,
) -> DealEngineResult<Proposal> {
    let snapshot = MasterVariableSnapshot::from_resolved(resolved, resolved_at)?;
    Ok(Proposal::from_draft(draft, snapshot))
}
