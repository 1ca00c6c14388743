//! Dashboard figures over the proposals a principal can see.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::access::{is_allowed, Operation, Principal};
use crate::proposal::{ApprovalStatus, FinancialSummary, Proposal};
use crate::types::Flow;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiFilter {
    /// Restricts the margin average to one status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ApprovalStatus>,
    /// Restricts the margin average to proposals submitted in the last N
    /// months (30-day months)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub months_back: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSummary {
    pub total_pending_mrc: Flow,
    pub pending_count: usize,
    pub total_pending_commissions: Flow,
    pub average_gross_margin_ratio: f64,
}

/// Frozen figures when decided, live ones otherwise.
fn figures(proposal: &Proposal) -> Option<&FinancialSummary> {
    proposal
        .financial_cache()
        .map(|c| &c.summary)
        .or_else(|| proposal.summary())
}

/// Pending totals ignore `filter`; the margin average honours it.
pub fn kpi_summary(
    proposals: &[Proposal],
    principal: &Principal,
    filter: &KpiFilter,
    now: DateTime<Utc>,
) -> KpiSummary {
    let visible: Vec<&Proposal> = proposals
        .iter()
        .filter(|p| is_allowed(principal, Operation::ViewProposal { owner: p.owner() }))
        .collect();

    let pending: Vec<&Proposal> = visible
        .iter()
        .copied()
        .filter(|p| p.status() == ApprovalStatus::Pending)
        .collect();
    let total_pending_mrc = pending.iter().filter_map(|p| figures(p)).map(|s| s.mrc).sum();
    let total_pending_commissions = pending
        .iter()
        .filter_map(|p| figures(p))
        .map(|s| s.commission)
        .sum();

    let cutoff = filter
        .months_back
        .map(|months| now - Duration::days(30 * i64::from(months)));
    let margins: Vec<f64> = visible
        .iter()
        .filter(|p| filter.status.map_or(true, |s| p.status() == s))
        .filter(|p| cutoff.map_or(true, |c| p.submitted_at() >= c))
        .filter_map(|p| figures(p))
        .map(|s| s.metrics.gross_margin_ratio)
        .collect();
    let average_gross_margin_ratio = if margins.is_empty() {
        0.0
    } else {
        margins.iter().sum::<f64>() / margins.len() as f64
    };

    KpiSummary {
        total_pending_mrc,
        pending_count: pending.len(),
        total_pending_commissions,
        average_gross_margin_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_set_is_all_zero() {
        let k = kpi_summary(
            &[],
            &Principal::finance("fin"),
            &KpiFilter::default(),
            Utc::now(),
        );
        assert_eq!(
            k,
            KpiSummary {
                total_pending_mrc: 0.0,
                pending_count: 0,
                total_pending_commissions: 0.0,
                average_gross_margin_ratio: 0.0,
            }
        );
    }
}
