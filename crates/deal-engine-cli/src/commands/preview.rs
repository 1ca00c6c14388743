use clap::Args;
use serde_json::Value;

use deal_engine_core::proposal::calculate_proposal;
use deal_engine_core::EngineConfig;

use super::ProposalInput;
use crate::input;

/// Arguments for a proposal preview
#[derive(Args)]
pub struct PreviewArgs {
    /// Path to JSON proposal file (business, line_items, variables)
    #[arg(long)]
    pub input: Option<String>,

    /// Leave the per-period timeline out of the output
    #[arg(long)]
    pub no_timeline: bool,
}

pub fn run_preview(
    args: PreviewArgs,
    config: &EngineConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut proposal: ProposalInput = input::stdin::read_input(args.input.as_deref(), "preview")?;

    let output = calculate_proposal(
        &proposal.business,
        &mut proposal.line_items,
        &proposal.variables,
        config,
    )?;

    let mut value = serde_json::to_value(output)?;
    if args.no_timeline {
        if let Some(Value::Object(result)) = value.get_mut("result") {
            result.remove("timeline");
        }
    }
    Ok(value)
}
