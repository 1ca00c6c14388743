use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use super::calculator::{FinancialCache, FinancialSummary};
use crate::cash_flow::MAX_CONTRACT_TERM_MONTHS;
use crate::error::DealEngineError;
use crate::line_items::LineItem;
use crate::types::{CurrencyAmount, Money, Months};
use crate::variables::MasterVariableSnapshot;
use crate::DealEngineResult;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ApprovalStatus::Pending => "PENDING",
            ApprovalStatus::Approved => "APPROVED",
            ApprovalStatus::Rejected => "REJECTED",
        })
    }
}

/// The two terminal outcomes a reviewer can pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Approved,
    Rejected,
}

impl From<Outcome> for ApprovalStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Approved => ApprovalStatus::Approved,
            Outcome::Rejected => ApprovalStatus::Rejected,
        }
    }
}

// ---------------------------------------------------------------------------
// Editable fields
// ---------------------------------------------------------------------------

fn default_pen() -> String {
    "PEN".into()
}

/// Proposal header: everything a reviewer may edit besides the line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessFields {
    pub business_unit: String,
    pub client_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salesman: Option<String>,
    pub contract_term_months: Months,
    #[serde(default = "default_pen")]
    pub mrc_currency: String,
    /// Replaces the recurring items' revenue when positive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mrc_override: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nrc: Option<CurrencyAmount>,
    #[serde(default)]
    pub applies_guarantee_letter: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gigalan_region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gigalan_sale_type: Option<String>,
    /// Previous monthly charge, reporting currency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gigalan_previous_mrc: Option<Money>,
}

impl BusinessFields {
    pub fn new(business_unit: &str, client_name: &str, contract_term_months: Months) -> Self {
        Self {
            business_unit: business_unit.to_string(),
            client_name: client_name.to_string(),
            company_id: None,
            order_id: None,
            salesman: None,
            contract_term_months,
            mrc_currency: default_pen(),
            mrc_override: None,
            nrc: None,
            applies_guarantee_letter: false,
            gigalan_region: None,
            gigalan_sale_type: None,
            gigalan_previous_mrc: None,
        }
    }

    pub fn validate(&self) -> DealEngineResult<()> {
        if self.business_unit.trim().is_empty() {
            return Err(DealEngineError::InvalidInput {
                field: "business_unit".into(),
                reason: "a business unit is required".into(),
            });
        }
        if !(1..=MAX_CONTRACT_TERM_MONTHS).contains(&self.contract_term_months) {
            return Err(DealEngineError::InvalidContractTerm(
                self.contract_term_months,
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

/// A proposal before its variable snapshot is bound. Only
/// [`freeze`](crate::variables::freeze) turns it into a [`Proposal`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalDraft {
    pub owner: String,
    pub business: BusinessFields,
    pub line_items: Vec<LineItem>,
}

/// Aggregate root. State changes go through the methods in `state.rs`;
/// the snapshot has no mutation path at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Proposal {
    id: String,
    owner: String,
    business: BusinessFields,
    line_items: Vec<LineItem>,
    snapshot: MasterVariableSnapshot,
    pub(crate) status: ApprovalStatus,
    pub(crate) version: u64,
    submitted_at: DateTime<Utc>,
    pub(crate) decided_at: Option<DateTime<Utc>>,
    pub(crate) rejection_note: Option<String>,
    /// Live figures, re-derived on every edit while pending
    pub(crate) summary: Option<FinancialSummary>,
    /// Figures frozen by the decision; absent while pending
    pub(crate) financial_cache: Option<FinancialCache>,
}

impl Proposal {
    pub(crate) fn from_draft(draft: ProposalDraft, snapshot: MasterVariableSnapshot) -> Self {
        let submitted_at = Utc::now();
        Self {
            id: generate_id(submitted_at),
            owner: draft.owner,
            business: draft.business,
            line_items: draft.line_items,
            snapshot,
            status: ApprovalStatus::Pending,
            version: 1,
            submitted_at,
            decided_at: None,
            rejection_note: None,
            summary: None,
            financial_cache: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn business(&self) -> &BusinessFields {
        &self.business
    }

    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    pub fn snapshot(&self) -> &MasterVariableSnapshot {
        &self.snapshot
    }

    pub fn status(&self) -> ApprovalStatus {
        self.status
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn decided_at(&self) -> Option<DateTime<Utc>> {
        self.decided_at
    }

    pub fn rejection_note(&self) -> Option<&str> {
        self.rejection_note.as_deref()
    }

    pub fn summary(&self) -> Option<&FinancialSummary> {
        self.summary.as_ref()
    }

    pub fn financial_cache(&self) -> Option<&FinancialCache> {
        self.financial_cache.as_ref()
    }

    pub(crate) fn set_content(&mut self, business: BusinessFields, line_items: Vec<LineItem>) {
        self.business = business;
        self.line_items = line_items;
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Last timestamp handed out, in microseconds since the epoch.
static LAST_ID_MICROS: AtomicI64 = AtomicI64::new(0);

/// `FLX<yy>-<MMddHHmmss><micros>`. Timestamps are bumped by a microsecond
/// when two proposals are created within the same one, so ids stay unique
/// within a process.
pub fn generate_id(now: DateTime<Utc>) -> String {
    let wanted = now.timestamp_micros();
    let previous = LAST_ID_MICROS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(wanted.max(last + 1))
        })
        .unwrap_or(wanted);
    let micros = wanted.max(previous + 1);
    format_id(Utc.timestamp_micros(micros).single().unwrap_or(now))
}

fn format_id(at: DateTime<Utc>) -> String {
    format!("FLX{}-{}", at.format("%y"), at.format("%m%d%H%M%S%6f"))
}
