use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::time_value::{self, IrrSettings};
use crate::types::{with_metadata, ComputationOutput, Flow};
use crate::DealEngineResult;

use super::timeline::CashFlowTimeline;

/// Investment-appraisal metrics over one timeline, in the reporting currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Net present value at the monthly equivalent of the annual rate
    pub van: Flow,
    /// Monthly internal rate of return; absent when it cannot be computed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tir: Option<f64>,
    /// Why `tir` is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tir_unavailable: Option<String>,
    /// Fractional period of payback; `None` when the cumulative flow never
    /// turns non-negative within the term
    pub payback: Option<f64>,
    pub total_revenue: Flow,
    pub total_expense: Flow,
    pub gross_margin: Flow,
    pub gross_margin_ratio: f64,
    pub installation_cost_ratio: f64,
}

/// `numerator / total_revenue`, or 0 when there is no revenue.
pub fn revenue_ratio(numerator: Flow, total_revenue: Flow) -> f64 {
    if total_revenue == 0.0 {
        0.0
    } else {
        numerator / total_revenue
    }
}

/// NPV, IRR, payback, totals and margin ratios for a timeline.
///
/// An IRR that cannot be solved is reported as absent with a warning; it is
/// never substituted with zero.
pub fn calculate_metrics(
    timeline: &CashFlowTimeline,
    annual_discount_rate: f64,
    irr_settings: &IrrSettings,
) -> DealEngineResult<ComputationOutput<Metrics>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let flows = timeline.net_cash_flows();
    let monthly_rate = time_value::monthly_rate(annual_discount_rate)?;
    let van = time_value::npv(monthly_rate, &flows)?;

    let (tir, tir_unavailable) = match time_value::irr(&flows, irr_settings) {
        Ok(rate) => (Some(rate), None),
        Err(e) => {
            warnings.push(format!("IRR unavailable: {e}"));
            (None, Some(e.to_string()))
        }
    };

    let payback = time_value::payback_period(&flows);
    if payback.is_none() {
        warnings.push("Cumulative cash flow never turns non-negative within the term".into());
    }

    let total_revenue = timeline.total_revenue();
    let total_expense = timeline.total_expense();
    let gross_margin = total_revenue - total_expense;
    if total_revenue == 0.0 {
        warnings.push("Total revenue is zero; ratios reported as 0".into());
    }

    let output = Metrics {
        van,
        tir,
        tir_unavailable,
        payback,
        total_revenue,
        total_expense,
        gross_margin,
        gross_margin_ratio: revenue_ratio(gross_margin, total_revenue),
        installation_cost_ratio: revenue_ratio(timeline.installation_cost(), total_revenue),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Monthly DCF: NPV at (1+r)^(1/12)-1, IRR by bisection, interpolated payback",
        &serde_json::json!({
            "annual_discount_rate": annual_discount_rate,
            "monthly_discount_rate": monthly_rate,
            "periods": flows.len(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cash_flow::timeline::{build_timeline, TimelineInput};
    use crate::line_items::NormalizedItem;

    fn recurring(revenue: Flow, expense: Flow) -> NormalizedItem {
        NormalizedItem::Recurring {
            label: "MRC".into(),
            monthly_revenue: revenue,
            monthly_expense: expense,
            monthly_revenue_original: revenue,
        }
    }

    #[test]
    fn test_pure_recurring_revenue() {
        let items = vec![recurring(1000.0, 0.0)];
        let timeline = build_timeline(&TimelineInput::new(&items, 12)).unwrap();
        let m = calculate_metrics(&timeline, 0.12, &IrrSettings::default())
            .unwrap()
            .result;
        assert_eq!(m.total_revenue, 12000.0);
        assert_eq!(m.total_expense, 0.0);
        assert_eq!(m.gross_margin_ratio, 1.0);
        assert_eq!(m.payback, Some(0.0));
        assert!(m.van > 0.0 && m.van < 12000.0);
        assert!(m.tir.is_none());
        assert!(m.tir_unavailable.is_some());
    }

    #[test]
    fn test_van_discounts_from_period_zero() {
        let items = vec![recurring(100.0, 0.0)];
        let timeline = build_timeline(&TimelineInput::new(&items, 2)).unwrap();
        let m = calculate_metrics(&timeline, 0.12, &IrrSettings::default())
            .unwrap()
            .result;
        let monthly = 1.12f64.powf(1.0 / 12.0) - 1.0;
        assert!((m.van - (100.0 + 100.0 / (1.0 + monthly))).abs() < 1e-9);
    }

    #[test]
    fn test_absent_tir_is_not_serialized() {
        let items = vec![recurring(10.0, 0.0)];
        let timeline = build_timeline(&TimelineInput::new(&items, 3)).unwrap();
        let out = calculate_metrics(&timeline, 0.1, &IrrSettings::default()).unwrap();
        let json = serde_json::to_value(&out.result).unwrap();
        assert!(json.get("tir").is_none());
        assert!(!out.warnings.is_empty());
    }

    #[test]
    fn test_zero_revenue_ratios_are_zero() {
        let items = vec![NormalizedItem::OneTimeCost {
            label: "Obra civil".into(),
            total: 600.0,
            start_period: 0,
            duration_months: 1,
        }];
        let timeline = build_timeline(&TimelineInput::new(&items, 2)).unwrap();
        let m = calculate_metrics(&timeline, 0.1, &IrrSettings::default())
            .unwrap()
            .result;
        assert_eq!(m.gross_margin_ratio, 0.0);
        assert_eq!(m.installation_cost_ratio, 0.0);
        assert_eq!(m.gross_margin, -600.0);
    }
}
