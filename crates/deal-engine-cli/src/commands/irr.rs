use clap::Args;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

use deal_engine_core::time_value;
use deal_engine_core::types::{to_flow, with_metadata, Flow};
use deal_engine_core::EngineConfig;

use crate::input;

/// Arguments for raw-series investment metrics
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct IrrArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Monthly net cash flows, period 0 first (e.g. "-1000,400,400,400")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub flows: Option<Vec<Decimal>>,

    /// Annual discount rate as a decimal (0.12 = 12%)
    #[arg(long)]
    pub annual_rate: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SeriesInput {
    cash_flows: Vec<Decimal>,
    annual_discount_rate: Decimal,
}

#[derive(Debug, Serialize)]
struct SeriesMetrics {
    van: Flow,
    tir: Option<f64>,
    annual_tir: Option<f64>,
    payback: Option<f64>,
    monthly_discount_rate: f64,
}

pub fn run_irr(args: IrrArgs, config: &EngineConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let series: SeriesInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        data
    } else {
        SeriesInput {
            cash_flows: args.flows.ok_or("--flows is required (or provide --input)")?,
            annual_discount_rate: args
                .annual_rate
                .ok_or("--annual-rate is required (or provide --input)")?,
        }
    };

    let flows = series
        .cash_flows
        .iter()
        .map(|cf| to_flow(*cf, "cash_flows"))
        .collect::<Result<Vec<_>, _>>()?;
    let annual_rate = to_flow(series.annual_discount_rate, "annual_discount_rate")?;

    let monthly = time_value::monthly_rate(annual_rate)?;
    let van = time_value::npv(monthly, &flows)?;
    let mut warnings = Vec::new();
    let tir = match time_value::irr(&flows, &config.irr) {
        Ok(rate) => Some(rate),
        Err(e) => {
            warnings.push(format!("IRR unavailable: {e}"));
            None
        }
    };
    let payback = time_value::payback_period(&flows);
    if payback.is_none() {
        warnings.push("Cumulative cash flow never turns non-negative".into());
    }

    let result = SeriesMetrics {
        van,
        tir,
        annual_tir: tir.map(time_value::annualize),
        payback,
        monthly_discount_rate: monthly,
    };
    let output = with_metadata(
        "Monthly NPV at (1 + annual)^(1/12) - 1; \
         IRR by bracketing and bisection; interpolated payback",
        &series,
        warnings,
        start.elapsed().as_micros() as u64,
        result,
    );
    Ok(serde_json::to_value(output)?)
}
