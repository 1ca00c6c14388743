//! Lifecycle transitions. `PENDING` is the only state that accepts changes;
//! `APPROVED` and `REJECTED` are final.

use chrono::{DateTime, Utc};

use super::calculator::{FinancialCache, FinancialSummary};
use super::model::{ApprovalStatus, BusinessFields, Outcome, Proposal};
use crate::error::DealEngineError;
use crate::line_items::LineItem;
use crate::DealEngineResult;

impl ApprovalStatus {
    pub fn can_transition_to(&self, next: ApprovalStatus) -> bool {
        matches!(
            (self, next),
            (ApprovalStatus::Pending, ApprovalStatus::Approved)
                | (ApprovalStatus::Pending, ApprovalStatus::Rejected)
        )
    }
}

/// Trim the note and enforce the rejection rules: mandatory when rejecting,
/// bounded in length, dropped when approving.
pub fn validate_rejection_note(
    outcome: Outcome,
    note: Option<&str>,
    max_len: usize,
) -> DealEngineResult<Option<String>> {
    let note = note.map(str::trim).filter(|n| !n.is_empty());
    match (outcome, note) {
        (Outcome::Approved, _) => Ok(None),
        (Outcome::Rejected, None) => Err(DealEngineError::MissingRejectionNote),
        (Outcome::Rejected, Some(n)) if n.chars().count() > max_len => {
            Err(DealEngineError::InvalidInput {
                field: "rejection_note".into(),
                reason: format!("must be at most {max_len} characters"),
            })
        }
        (Outcome::Rejected, Some(n)) => Ok(Some(n.to_string())),
    }
}

impl Proposal {
    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }

    pub(crate) fn ensure_pending(&self) -> DealEngineResult<()> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(DealEngineError::state_conflict(
                self.id(),
                "PENDING",
                self.status,
            ))
        }
    }

    /// Replace the editable content and its live summary. Fails when the
    /// proposal is decided or `expected_version` is stale.
    pub(crate) fn apply_content(
        &mut self,
        expected_version: u64,
        business: BusinessFields,
        line_items: Vec<LineItem>,
        summary: FinancialSummary,
    ) -> DealEngineResult<()> {
        self.ensure_pending()?;
        if self.version != expected_version {
            return Err(DealEngineError::StateConflict {
                proposal_id: self.id().to_string(),
                expected: format!("version {expected_version}"),
                actual: format!("version {}", self.version),
            });
        }
        self.set_content(business, line_items);
        self.summary = Some(summary);
        self.version += 1;
        Ok(())
    }

    /// Refresh the live summary without touching content or the cache.
    pub(crate) fn apply_summary(&mut self, summary: FinancialSummary) -> DealEngineResult<()> {
        self.ensure_pending()?;
        self.summary = Some(summary);
        Ok(())
    }

    /// The one and only transition out of `PENDING`. Status, decision time,
    /// final content and the financial cache are written together.
    pub(crate) fn apply_decision(
        &mut self,
        outcome: Outcome,
        rejection_note: Option<String>,
        business: BusinessFields,
        line_items: Vec<LineItem>,
        summary: FinancialSummary,
        decided_at: DateTime<Utc>,
    ) -> DealEngineResult<()> {
        let next = ApprovalStatus::from(outcome);
        if !self.status.can_transition_to(next) || self.financial_cache.is_some() {
            return Err(DealEngineError::state_conflict(
                self.id(),
                "PENDING",
                self.status,
            ));
        }
        self.set_content(business, line_items);
        self.financial_cache = Some(FinancialCache::new(summary.clone(), decided_at));
        self.summary = Some(summary);
        self.status = next;
        self.decided_at = Some(decided_at);
        self.rejection_note = rejection_note;
        self.version += 1;
        Ok(())
    }
}
