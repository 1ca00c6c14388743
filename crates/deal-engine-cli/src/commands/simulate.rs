use clap::Args;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use deal_engine_core::access::Principal;
use deal_engine_core::kpi::{KpiFilter, KpiSummary};
use deal_engine_core::line_items::LineItem;
use deal_engine_core::proposal::{
    spawn_notification_worker, BusinessFields, DealService, InMemoryProposalRepository,
    LoggingNotifier, Outcome, Proposal,
};
use deal_engine_core::session::{Candidate, ProposalPreview, RecalculationSession, SessionView};
use deal_engine_core::variables::InMemoryVariableLog;
use deal_engine_core::EngineConfig;

use crate::input;

/// Arguments for an approval scenario replay
#[derive(Args)]
pub struct SimulateArgs {
    /// Path to JSON scenario file (variables, proposals, kpi)
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Scenario {
    #[serde(default)]
    variables: Vec<VariableEntry>,
    proposals: Vec<ScenarioProposal>,
    #[serde(default)]
    kpi: Option<KpiRequest>,
}

#[derive(Debug, Deserialize)]
struct VariableEntry {
    name: String,
    value: Decimal,
    recorded_by: Principal,
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScenarioProposal {
    owner: String,
    business: BusinessFields,
    line_items: Vec<LineItem>,
    /// Variable changes recorded right after this proposal is created; they
    /// affect later proposals only
    #[serde(default)]
    variables_after: Vec<VariableEntry>,
    /// Reviewer edits replayed through a recalculation session before the
    /// decision; the last one becomes the final content
    #[serde(default)]
    review_edits: Vec<Candidate>,
    #[serde(default)]
    decision: Option<Decision>,
}

#[derive(Debug, Deserialize)]
struct Decision {
    by: Principal,
    outcome: Outcome,
    #[serde(default)]
    rejection_note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KpiRequest {
    viewer: Principal,
    #[serde(default)]
    filter: KpiFilter,
}

#[derive(Debug, Serialize)]
struct ProposalReport {
    proposal: Proposal,
    #[serde(skip_serializing_if = "Option::is_none")]
    review: Option<SessionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    decision_error: Option<String>,
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    proposals: Vec<ProposalReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kpi: Option<KpiSummary>,
}

pub fn run_simulate(
    args: SimulateArgs,
    config: EngineConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let scenario: Scenario = input::stdin::read_input(args.input.as_deref(), "simulate")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(replay(scenario, config))?;
    Ok(serde_json::to_value(report)?)
}

async fn replay(
    scenario: Scenario,
    config: EngineConfig,
) -> Result<SimulationReport, Box<dyn std::error::Error>> {
    let debounce = config.debounce();
    let (queue, notifier) = spawn_notification_worker(Arc::new(LoggingNotifier));
    let service = Arc::new(DealService::new(
        config,
        Arc::new(InMemoryProposalRepository::new()),
        Arc::new(InMemoryVariableLog::new()),
        queue,
    )?);

    for entry in scenario.variables {
        service.record_variable(&entry.recorded_by, &entry.name, entry.value, entry.comment)?;
    }

    let mut reports = Vec::with_capacity(scenario.proposals.len());
    for step in scenario.proposals {
        let owner = Principal::sales(step.owner);
        let created =
            service.create_proposal(&owner, step.business.clone(), step.line_items.clone())?;
        let id = created.id().to_string();
        info!(proposal = %id, "scenario proposal created");
        for entry in step.variables_after {
            service.record_variable(&entry.recorded_by, &entry.name, entry.value, entry.comment)?;
        }

        let Some(decision) = step.decision else {
            reports.push(ProposalReport {
                proposal: created,
                review: None,
                decision_error: None,
            });
            continue;
        };

        let mut review = None;
        let mut final_content = Candidate {
            business: step.business,
            line_items: step.line_items,
        };
        if let Some(last) = step.review_edits.last() {
            let preview = ProposalPreview::new(service.clone(), decision.by.clone(), &id);
            let session = RecalculationSession::start(Arc::new(preview), debounce);
            let view = session.subscribe();
            for edit in &step.review_edits {
                session.edit(edit.clone());
            }
            session.close().await;
            review = Some(view.borrow().clone());
            final_content = last.clone();
        }

        let decision_error = service
            .decide(
                &decision.by,
                &id,
                decision.outcome,
                final_content.line_items,
                final_content.business,
                decision.rejection_note.as_deref(),
            )
            .err()
            .map(|e| e.to_string());

        reports.push(ProposalReport {
            proposal: service.get(&owner, &id)?,
            review,
            decision_error,
        });
    }

    let kpi = match scenario.kpi {
        Some(request) => Some(service.kpi(&request.viewer, &request.filter)?),
        None => None,
    };

    // Closing the last queue handle lets the worker drain and exit
    drop(service);
    let _ = notifier.await;

    Ok(SimulationReport {
        proposals: reports,
        kpi,
    })
}
