use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use super::model::BusinessFields;
use crate::cash_flow::{
    build_timeline, calculate_metrics, revenue_ratio, CashFlowTimeline, Metrics, TimelineInput,
};
use crate::config::EngineConfig;
use crate::currency::CurrencyNormalizer;
use crate::line_items::{normalize_line_items, LineItem, NormalizedItem};
use crate::time_value::annualize;
use crate::types::{to_flow, with_metadata, ComputationOutput, Flow};
use crate::variables::MasterVariableSnapshot;
use crate::DealEngineResult;

/// Share of the contract value the guarantee letter covers.
const GUARANTEE_LETTER_COVERAGE: f64 = 0.10;
/// Sales tax applied on top of the covered amount.
const GUARANTEE_LETTER_TAX: f64 = 1.18;

/// Every figure derived for one proposal, in the reporting currency unless a
/// field says otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSummary {
    #[serde(flatten)]
    pub metrics: Metrics,
    pub reporting_currency: String,
    pub commission: Flow,
    pub commission_rate: f64,
    /// One-time costs booked inside the term
    pub installation_cost: Flow,
    pub guarantee_letter_cost: Flow,
    /// In `mrc_currency`
    pub guarantee_letter_cost_original: Flow,
    pub mrc: Flow,
    pub mrc_original: Flow,
    pub mrc_currency: String,
    pub nrc: Flow,
    pub nrc_original: Flow,
    pub nrc_currency: String,
    /// `(1 + tir)^12 - 1`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual_tir: Option<f64>,
    pub timeline: CashFlowTimeline,
}

/// A summary frozen at decision time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialCache {
    pub summary: FinancialSummary,
    pub computed_at: DateTime<Utc>,
}

impl FinancialCache {
    pub fn new(summary: FinancialSummary, computed_at: DateTime<Utc>) -> Self {
        Self {
            summary,
            computed_at,
        }
    }
}

struct RevenueInputs {
    mrc: Flow,
    mrc_original: Flow,
    recurring_override: Option<Flow>,
    nrc: Flow,
    nrc_original: Flow,
    nrc_currency: String,
}

/// Full derivation for a proposal: normalize items, resolve MRC and NRC,
/// price the guarantee letter, evaluate commission on the commission-free
/// timeline, then build the final timeline and its metrics.
///
/// Normalized unit values are written back onto `items`. No other state is
/// read or written, so equal inputs always give equal outputs.
pub fn calculate_proposal(
    business: &BusinessFields,
    items: &mut [LineItem],
    snapshot: &MasterVariableSnapshot,
    config: &EngineConfig,
) -> DealEngineResult<ComputationOutput<FinancialSummary>> {
    let start = Instant::now();
    business.validate()?;

    let normalizer = config.normalizer();
    let (exchange_rate, cost_of_capital, guarantee_letter_rate) = snapshot.as_flows()?;
    let term = business.contract_term_months;

    let normalized = normalize_line_items(items, &normalizer, exchange_rate)?;
    let revenue = resolve_revenue(business, &normalized, &normalizer, exchange_rate)?;

    let (guarantee_letter_cost_original, guarantee_letter_cost) =
        if business.applies_guarantee_letter {
            let original = GUARANTEE_LETTER_COVERAGE
                * term as f64
                * revenue.mrc_original
                * GUARANTEE_LETTER_TAX
                * guarantee_letter_rate;
            let reporting = normalizer.normalize(original, &business.mrc_currency, exchange_rate)?;
            (original, reporting)
        } else {
            (0.0, 0.0)
        };

    let mut input = TimelineInput::new(&normalized, term);
    input.one_time_revenue = revenue.nrc;
    input.recurring_revenue_override = revenue.recurring_override;
    input.guarantee_letter_cost = guarantee_letter_cost;
    input.commission_policy = config.commission_policy;
    input.overflow_policy = config.overflow_policy;

    let pre_timeline = build_timeline(&input)?;
    let pre_metrics = calculate_metrics(&pre_timeline, cost_of_capital, &config.irr)?.result;
    let commission = commission_for(business, &pre_metrics, revenue.mrc)?;
    debug!(
        commission,
        pre_margin_ratio = pre_metrics.gross_margin_ratio,
        "commission evaluated on pre-commission timeline"
    );

    input.commission = commission;
    let timeline = build_timeline(&input)?;
    let metrics_output = calculate_metrics(&timeline, cost_of_capital, &config.irr)?;
    let metrics = metrics_output.result;

    let mut warnings = metrics_output.warnings;
    let dropped: Flow = timeline.one_time_costs.iter().map(|s| s.dropped).sum();
    if dropped > 0.0 {
        warnings.push(format!(
            "{dropped:.2} of one-time cost falls after month {term} and was dropped"
        ));
    }

    let summary = FinancialSummary {
        reporting_currency: normalizer.reporting_currency().to_string(),
        commission,
        commission_rate: revenue_ratio(commission, metrics.total_revenue),
        installation_cost: timeline.installation_cost(),
        guarantee_letter_cost,
        guarantee_letter_cost_original,
        mrc: revenue.mrc,
        mrc_original: revenue.mrc_original,
        mrc_currency: business.mrc_currency.clone(),
        nrc: revenue.nrc,
        nrc_original: revenue.nrc_original,
        nrc_currency: revenue.nrc_currency,
        annual_tir: metrics.tir.map(annualize),
        metrics,
        timeline,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Proposal cash flow: normalized items, MRC/NRC, guarantee letter, \
         commission on pre-commission figures",
        &serde_json::json!({
            "exchange_rate": exchange_rate,
            "cost_of_capital": cost_of_capital,
            "guarantee_letter_rate": guarantee_letter_rate,
            "commission_policy": config.commission_policy,
            "overflow_policy": config.overflow_policy,
        }),
        warnings,
        elapsed,
        summary,
    ))
}

/// MRC: a positive override in `mrc_currency` wins over the items' sum.
/// NRC: booked once in period 0.
fn resolve_revenue(
    business: &BusinessFields,
    normalized: &[NormalizedItem],
    normalizer: &CurrencyNormalizer,
    exchange_rate: Flow,
) -> DealEngineResult<RevenueInputs> {
    let (sum_reporting, sum_original) =
        normalized
            .iter()
            .fold((0.0, 0.0), |(rep, orig), item| match item {
                NormalizedItem::Recurring {
                    monthly_revenue,
                    monthly_revenue_original,
                    ..
                } => (rep + monthly_revenue, orig + monthly_revenue_original),
                NormalizedItem::OneTimeCost { .. } => (rep, orig),
            });

    let override_original = match business.mrc_override {
        Some(amount) => Some(to_flow(amount, "mrc_override")?).filter(|v| *v > 0.0),
        None => None,
    };
    let (mrc_original, mrc, recurring_override) = match override_original {
        Some(original) => {
            let reporting = normalizer.normalize(original, &business.mrc_currency, exchange_rate)?;
            (original, reporting, Some(reporting))
        }
        None => {
            normalizer.resolve(&business.mrc_currency)?;
            (sum_original, sum_reporting, None)
        }
    };

    let (nrc_original, nrc, nrc_currency) = match &business.nrc {
        Some(amount) => {
            let original = to_flow(amount.amount, "nrc")?;
            let reporting = normalizer.normalize(original, &amount.currency, exchange_rate)?;
            (original, reporting, amount.currency.clone())
        }
        None => (0.0, 0.0, normalizer.reporting_currency().to_string()),
    };

    Ok(RevenueInputs {
        mrc,
        mrc_original,
        recurring_override,
        nrc,
        nrc_original,
        nrc_currency,
    })
}

#[cfg(feature = "commission")]
fn commission_for(
    business: &BusinessFields,
    pre: &Metrics,
    mrc: Flow,
) -> DealEngineResult<Flow> {
    use crate::commission::{calculate_commission, BusinessUnit, CommissionInput, GigalanTerms};

    let previous_mrc = match business.gigalan_previous_mrc {
        Some(amount) => Some(to_flow(amount, "gigalan_previous_mrc")?),
        None => None,
    };
    let input = CommissionInput {
        business_unit: BusinessUnit::from(business.business_unit.clone()),
        contract_term_months: business.contract_term_months,
        total_revenue: pre.total_revenue,
        gross_margin_ratio: pre.gross_margin_ratio,
        // Commission bands are keyed on the whole period at which payback
        // occurs, not the interpolated fraction
        payback: pre.payback.map(f64::ceil),
        mrc,
        gigalan: GigalanTerms {
            region: business.gigalan_region.clone(),
            sale_type: business.gigalan_sale_type.clone(),
            previous_mrc,
        },
    };
    Ok(calculate_commission(&input).amount)
}

#[cfg(not(feature = "commission"))]
fn commission_for(
    _business: &BusinessFields,
    _pre: &Metrics,
    _mrc: Flow,
) -> DealEngineResult<Flow> {
    Ok(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line_items::{OneTimeCost, RecurringItem};
    use crate::types::CurrencyAmount;
    use rust_decimal_macros::dec;

    fn snapshot() -> MasterVariableSnapshot {
        MasterVariableSnapshot::new(dec!(4), dec!(0.12), dec!(0.02), Utc::now())
    }

    fn service_row(price: rust_decimal::Decimal, cost: rust_decimal::Decimal) -> LineItem {
        LineItem::Recurring(RecurringItem {
            service_type: "Internet dedicado".into(),
            note: None,
            location: None,
            quantity: dec!(1),
            unit_price: price,
            price_currency: "PEN".into(),
            unit_price_normalized: None,
            unit_cost_1: cost,
            unit_cost_2: dec!(0),
            cost_currency: "PEN".into(),
            unit_cost_1_normalized: None,
            unit_cost_2_normalized: None,
            supplier: None,
        })
    }

    fn installation(total_usd: rust_decimal::Decimal) -> LineItem {
        LineItem::OneTimeCost(OneTimeCost {
            category: "Instalación".into(),
            service_type: "Fibra".into(),
            ticket: None,
            location: None,
            quantity: dec!(1),
            unit_cost: total_usd,
            unit_cost_currency: "USD".into(),
            unit_cost_normalized: None,
            start_period: 0,
            duration_months: 1,
        })
    }

    #[test]
    fn test_summary_for_simple_deal() {
        let business = BusinessFields::new("MAYORISTA", "ACME", 12);
        let mut items = vec![service_row(dec!(1000), dec!(200)), installation(dec!(500))];
        let out = calculate_proposal(&business, &mut items, &snapshot(), &EngineConfig::default())
            .unwrap();
        let s = out.result;
        assert_eq!(s.mrc, 1000.0);
        assert_eq!(s.metrics.total_revenue, 12_000.0);
        assert_eq!(s.installation_cost, 2_000.0);
        assert_eq!(s.metrics.total_expense, 12.0 * 200.0 + 2_000.0);
        assert_eq!(s.commission, 0.0);
        assert_eq!(s.reporting_currency, "PEN");
        match &items[1] {
            LineItem::OneTimeCost(c) => assert_eq!(c.unit_cost_normalized, Some(2_000.0)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_mrc_override_and_nrc() {
        let mut business = BusinessFields::new("MAYORISTA", "ACME", 6);
        business.mrc_currency = "USD".into();
        business.mrc_override = Some(dec!(300));
        business.nrc = Some(CurrencyAmount::new(dec!(100), "USD"));
        let mut items = vec![service_row(dec!(1000), dec!(0))];
        let s = calculate_proposal(&business, &mut items, &snapshot(), &EngineConfig::default())
            .unwrap()
            .result;
        assert_eq!(s.mrc_original, 300.0);
        assert_eq!(s.mrc, 1_200.0);
        assert_eq!(s.nrc, 400.0);
        assert_eq!(s.timeline.periods[0].revenue(), 1_600.0);
        assert_eq!(s.metrics.total_revenue, 6.0 * 1_200.0 + 400.0);
    }

    #[test]
    fn test_zero_override_falls_back_to_items() {
        let mut business = BusinessFields::new("MAYORISTA", "ACME", 3);
        business.mrc_override = Some(dec!(0));
        let mut items = vec![service_row(dec!(250), dec!(0))];
        let s = calculate_proposal(&business, &mut items, &snapshot(), &EngineConfig::default())
            .unwrap()
            .result;
        assert_eq!(s.mrc, 250.0);
    }

    #[test]
    fn test_guarantee_letter_in_period_zero() {
        let mut business = BusinessFields::new("MAYORISTA", "ACME", 12);
        business.applies_guarantee_letter = true;
        let mut items = vec![service_row(dec!(1000), dec!(0))];
        let s = calculate_proposal(&business, &mut items, &snapshot(), &EngineConfig::default())
            .unwrap()
            .result;
        let expected = 0.10 * 12.0 * 1000.0 * 1.18 * 0.02;
        assert!((s.guarantee_letter_cost - expected).abs() < 1e-9);
        assert_eq!(s.timeline.periods[0].guarantee_letter, s.guarantee_letter_cost);
        assert_eq!(s.timeline.periods[1].guarantee_letter, 0.0);
    }

    #[cfg(feature = "commission")]
    #[test]
    fn test_commission_lands_on_timeline() {
        // 12-month ESTADO deal, 45% margin, paid back immediately
        let business = BusinessFields::new("ESTADO", "Ministerio", 12);
        let mut items = vec![service_row(dec!(10000), dec!(5500))];
        let s = calculate_proposal(&business, &mut items, &snapshot(), &EngineConfig::default())
            .unwrap()
            .result;
        // min(3.5% of 120k, 1.0 × 10k)
        assert!((s.commission - 4_200.0).abs() < 1e-6);
        assert_eq!(s.timeline.periods[0].commission, s.commission);
        assert!((s.commission_rate - 0.035).abs() < 1e-12);
    }

    #[cfg(feature = "commission")]
    #[test]
    fn test_gigalan_payback_counts_whole_periods() {
        let mut business = BusinessFields::new("GIGALAN", "Clínica", 12);
        business.gigalan_region = Some("LIMA".into());
        business.gigalan_sale_type = Some("NUEVO".into());
        let setup = LineItem::OneTimeCost(OneTimeCost {
            category: "Instalación".into(),
            service_type: "Fibra".into(),
            ticket: None,
            location: None,
            quantity: dec!(1),
            unit_cost: dec!(1500),
            unit_cost_currency: "PEN".into(),
            unit_cost_normalized: None,
            start_period: 0,
            duration_months: 1,
        });

        // Cumulative flow: -800, -100, +600. Paid back inside period 2.
        let mut items = vec![service_row(dec!(1000), dec!(300)), setup];
        let slow = calculate_proposal(&business, &mut items, &snapshot(), &EngineConfig::default())
            .unwrap()
            .result;
        let payback = slow.metrics.payback.unwrap();
        assert!(payback > 1.0 && payback < 2.0, "payback = {payback}");
        assert_eq!(slow.commission, 0.0);

        let mut items = vec![service_row(dec!(1000), dec!(300))];
        let fast = calculate_proposal(&business, &mut items, &snapshot(), &EngineConfig::default())
            .unwrap()
            .result;
        assert_eq!(fast.metrics.payback, Some(0.0));
        assert!((fast.commission - 0.014 * 1000.0 * 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_business_unit_rejected() {
        let business = BusinessFields::new("", "ACME", 12);
        let mut items = vec![service_row(dec!(1000), dec!(0))];
        assert!(
            calculate_proposal(&business, &mut items, &snapshot(), &EngineConfig::default())
                .is_err()
        );
    }
}
