use clap::Args;
use serde::Serialize;
use serde_json::Value;

use deal_engine_core::proposal::{calculate_proposal, FinancialSummary};
use deal_engine_core::time_value;
use deal_engine_core::EngineConfig;

use super::ProposalInput;
use crate::input;

/// Arguments for the cash-flow timeline
#[derive(Args)]
pub struct TimelineArgs {
    /// Path to JSON proposal file (business, line_items, variables)
    #[arg(long)]
    pub input: Option<String>,
}

/// One row per month, flattened for table and CSV output.
#[derive(Serialize)]
struct TimelineRow {
    period: i32,
    revenue: f64,
    recurring_expense: f64,
    one_time_cost: f64,
    commission: f64,
    guarantee_letter: f64,
    net: f64,
    cumulative: f64,
}

pub fn run_timeline(
    args: TimelineArgs,
    config: &EngineConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut proposal: ProposalInput = input::stdin::read_input(args.input.as_deref(), "timeline")?;

    let summary = calculate_proposal(
        &proposal.business,
        &mut proposal.line_items,
        &proposal.variables,
        config,
    )?
    .result;

    Ok(serde_json::to_value(timeline_rows(&summary))?)
}

fn timeline_rows(summary: &FinancialSummary) -> Vec<TimelineRow> {
    let cumulative = time_value::cumulative(&summary.timeline.net_cash_flows());
    summary
        .timeline
        .periods
        .iter()
        .zip(cumulative)
        .map(|(p, cumulative)| TimelineRow {
            period: p.period,
            revenue: p.revenue(),
            recurring_expense: p.recurring_expense,
            one_time_cost: p.one_time_cost,
            commission: p.commission,
            guarantee_letter: p.guarantee_letter,
            net: p.net,
            cumulative,
        })
        .collect()
}
