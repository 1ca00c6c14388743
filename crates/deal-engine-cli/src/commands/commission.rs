use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use deal_engine_core::commission::{
    calculate_commission, BusinessUnit, CommissionInput, GigalanTerms,
};
use deal_engine_core::types::to_flow;

use crate::input;

/// Arguments for a stand-alone commission lookup
#[derive(Args)]
pub struct CommissionArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// ESTADO, GIGALAN, CORPORATIVO, or any other unit (no commission)
    #[arg(long)]
    pub business_unit: Option<String>,

    /// Contract term in months
    #[arg(long)]
    pub term: Option<i32>,

    /// Total revenue over the term, reporting currency
    #[arg(long)]
    pub total_revenue: Option<Decimal>,

    /// Gross margin over total revenue, before commission
    #[arg(long)]
    pub gross_margin_ratio: Option<Decimal>,

    /// Payback period index, before commission
    #[arg(long)]
    pub payback: Option<Decimal>,

    /// Monthly recurring charge, reporting currency
    #[arg(long)]
    pub mrc: Option<Decimal>,

    /// GIGALAN region (LIMA, PROVINCIAS CON CACHING, PROVINCIAS CON INTERNEXA, PROVINCIAS CON TDP)
    #[arg(long)]
    pub region: Option<String>,

    /// GIGALAN sale type (NUEVO or EXISTENTE)
    #[arg(long)]
    pub sale_type: Option<String>,

    /// GIGALAN previous monthly charge, reporting currency
    #[arg(long)]
    pub previous_mrc: Option<Decimal>,
}

pub fn run_commission(args: CommissionArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let commission_input: CommissionInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        data
    } else {
        CommissionInput {
            business_unit: BusinessUnit::from(
                args.business_unit
                    .ok_or("--business-unit is required (or provide --input)")?,
            ),
            contract_term_months: args.term.ok_or("--term is required (or provide --input)")?,
            total_revenue: to_flow(
                args.total_revenue
                    .ok_or("--total-revenue is required (or provide --input)")?,
                "total_revenue",
            )?,
            gross_margin_ratio: to_flow(
                args.gross_margin_ratio
                    .ok_or("--gross-margin-ratio is required (or provide --input)")?,
                "gross_margin_ratio",
            )?,
            payback: args.payback.map(|p| to_flow(p, "payback")).transpose()?,
            mrc: to_flow(
                args.mrc.ok_or("--mrc is required (or provide --input)")?,
                "mrc",
            )?,
            gigalan: GigalanTerms {
                region: args.region,
                sale_type: args.sale_type,
                previous_mrc: args
                    .previous_mrc
                    .map(|p| to_flow(p, "previous_mrc"))
                    .transpose()?,
            },
        }
    };

    let result = calculate_commission(&commission_input);
    Ok(serde_json::to_value(result)?)
}
