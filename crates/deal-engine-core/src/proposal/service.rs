use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use super::calculator::{calculate_proposal, FinancialSummary};
use super::model::{BusinessFields, Outcome, Proposal, ProposalDraft};
use super::notify::{NotificationEvent, NotificationQueue};
use super::state::validate_rejection_note;
use super::store::ProposalRepository;
use crate::access::{authorize, is_allowed, Operation, Principal};
use crate::config::EngineConfig;
use crate::kpi::{kpi_summary, KpiFilter, KpiSummary};
use crate::line_items::LineItem;
use crate::types::{ComputationOutput, Rate};
use crate::variables::{
    freeze, resolve_current, MasterVariable, MasterVariableLog, MasterVariableService,
    REQUIRED_VARIABLES,
};
use crate::DealEngineResult;

/// Entry point for every proposal operation: creation, preview, editing,
/// decision and commission refresh, plus master-variable upkeep.
pub struct DealService {
    config: EngineConfig,
    proposals: Arc<dyn ProposalRepository>,
    variables: MasterVariableService,
    notifications: NotificationQueue,
}

impl DealService {
    pub fn new(
        config: EngineConfig,
        proposals: Arc<dyn ProposalRepository>,
        variable_log: Arc<dyn MasterVariableLog>,
        notifications: NotificationQueue,
    ) -> DealEngineResult<Self> {
        config.validate()?;
        let variables = MasterVariableService::new(variable_log, config.variables.clone());
        Ok(Self {
            config,
            proposals,
            variables,
            notifications,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn variables(&self) -> &MasterVariableService {
        &self.variables
    }

    pub fn record_variable(
        &self,
        principal: &Principal,
        name: &str,
        value: Rate,
        comment: Option<String>,
    ) -> DealEngineResult<MasterVariable> {
        self.variables.record(principal, name, value, comment)
    }

    /// Create a `PENDING` proposal bound to the variables current right now.
    pub fn create_proposal(
        &self,
        principal: &Principal,
        business: BusinessFields,
        line_items: Vec<LineItem>,
    ) -> DealEngineResult<Proposal> {
        authorize(principal, Operation::CreateProposal)?;
        business.validate()?;

        let resolved = resolve_current(self.variables.log(), &REQUIRED_VARIABLES)?;
        let draft = ProposalDraft {
            owner: principal.id.clone(),
            business,
            line_items,
        };
        let mut proposal = freeze(draft, &resolved, Utc::now())?;

        let mut items = proposal.line_items().to_vec();
        let summary =
            calculate_proposal(proposal.business(), &mut items, proposal.snapshot(), &self.config)?
                .result;
        let business = proposal.business().clone();
        proposal.set_content(business, items);
        proposal.summary = Some(summary);

        let proposal = self.proposals.insert(proposal)?;
        info!(
            proposal = proposal.id(),
            owner = proposal.owner(),
            unit = %proposal.business().business_unit,
            "proposal created"
        );
        self.notifications.publish(NotificationEvent::ProposalSubmitted {
            proposal_id: proposal.id().to_string(),
            owner: proposal.owner().to_string(),
            client_name: proposal.business().client_name.clone(),
        });
        Ok(proposal)
    }

    pub fn get(&self, principal: &Principal, id: &str) -> DealEngineResult<Proposal> {
        let proposal = self.proposals.get(id)?;
        authorize(
            principal,
            Operation::ViewProposal {
                owner: proposal.owner(),
            },
        )?;
        Ok(proposal)
    }

    /// Proposals the principal may see, oldest first.
    pub fn list(&self, principal: &Principal) -> DealEngineResult<Vec<Proposal>> {
        Ok(self
            .proposals
            .list()?
            .into_iter()
            .filter(|p| is_allowed(principal, Operation::ViewProposal { owner: p.owner() }))
            .collect())
    }

    /// Side-effect-free preview of candidate content against the proposal's
    /// frozen variables. Fails with `StateConflict` once the proposal is decided.
    pub fn recalculate(
        &self,
        principal: &Principal,
        id: &str,
        mut candidate_items: Vec<LineItem>,
        candidate_fields: &BusinessFields,
    ) -> DealEngineResult<ComputationOutput<FinancialSummary>> {
        let proposal = self.proposals.get(id)?;
        authorize(
            principal,
            Operation::PreviewProposal {
                owner: proposal.owner(),
            },
        )?;
        proposal.ensure_pending()?;
        debug!(proposal = id, "preview recalculation");
        calculate_proposal(
            candidate_fields,
            &mut candidate_items,
            proposal.snapshot(),
            &self.config,
        )
    }

    /// Persist new content on a pending proposal. `expected_version` must match
    /// the stored version.
    pub fn update_content(
        &self,
        principal: &Principal,
        id: &str,
        expected_version: u64,
        business: BusinessFields,
        mut line_items: Vec<LineItem>,
    ) -> DealEngineResult<Proposal> {
        let current = self.proposals.get(id)?;
        authorize(
            principal,
            Operation::EditProposal {
                owner: current.owner(),
            },
        )?;
        current.ensure_pending()?;
        let summary =
            calculate_proposal(&business, &mut line_items, current.snapshot(), &self.config)?
                .result;

        let updated = self.proposals.update(id, &mut |p| {
            p.apply_content(
                expected_version,
                business.clone(),
                line_items.clone(),
                summary.clone(),
            )
        })?;
        info!(proposal = id, version = updated.version(), "proposal content updated");
        Ok(updated)
    }

    /// Approve or reject. Metrics are derived from the final content before
    /// the status check-and-set, which then commits status, decision time and
    /// financial cache together. Of two racing decisions exactly one commits.
    pub fn decide(
        &self,
        principal: &Principal,
        id: &str,
        outcome: Outcome,
        mut final_items: Vec<LineItem>,
        final_fields: BusinessFields,
        rejection_note: Option<&str>,
    ) -> DealEngineResult<Proposal> {
        authorize(principal, Operation::Decide)?;
        let note =
            validate_rejection_note(outcome, rejection_note, self.config.max_rejection_note_len)?;

        let current = self.proposals.get(id)?;
        current.ensure_pending()?;
        let summary =
            calculate_proposal(&final_fields, &mut final_items, current.snapshot(), &self.config)?
                .result;
        let decided_at = Utc::now();

        let decided = self.proposals.update(id, &mut |p| {
            p.apply_decision(
                outcome,
                note.clone(),
                final_fields.clone(),
                final_items.clone(),
                summary.clone(),
                decided_at,
            )
        })?;
        info!(
            proposal = id,
            status = %decided.status(),
            by = %principal.id,
            "proposal decided"
        );
        self.notifications.publish(NotificationEvent::ProposalDecided {
            proposal_id: decided.id().to_string(),
            owner: decided.owner().to_string(),
            status: decided.status(),
            rejection_note: decided.rejection_note().map(str::to_string),
        });
        Ok(decided)
    }

    /// Re-derive the stored content's figures (commission included) into the
    /// live summary. The financial cache is never touched.
    pub fn recalculate_commission(
        &self,
        principal: &Principal,
        id: &str,
    ) -> DealEngineResult<Proposal> {
        authorize(principal, Operation::RecalculateCommission)?;
        let current = self.proposals.get(id)?;
        current.ensure_pending()?;

        let mut items = current.line_items().to_vec();
        let summary =
            calculate_proposal(current.business(), &mut items, current.snapshot(), &self.config)?
                .result;
        let updated = self
            .proposals
            .update(id, &mut |p| p.apply_summary(summary.clone()))?;
        info!(
            proposal = id,
            commission = updated.summary().map(|s| s.commission).unwrap_or_default(),
            "commission recalculated"
        );
        Ok(updated)
    }

    pub fn kpi(&self, principal: &Principal, filter: &KpiFilter) -> DealEngineResult<KpiSummary> {
        authorize(principal, Operation::ViewKpi)?;
        let proposals = self.proposals.list()?;
        Ok(kpi_summary(&proposals, principal, filter, Utc::now()))
    }
}
