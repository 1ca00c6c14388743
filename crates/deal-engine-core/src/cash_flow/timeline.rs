use serde::{Deserialize, Serialize};

use crate::error::DealEngineError;
use crate::line_items::NormalizedItem;
use crate::types::{Flow, Months};
use crate::DealEngineResult;

/// Longest contract the timeline accepts (fifty years).
pub const MAX_CONTRACT_TERM_MONTHS: Months = 600;

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// Where the commission expense lands on the timeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionPolicy {
    /// Whole commission booked in period 0
    #[default]
    SinglePeriod,
    /// Spread evenly across every period of the term
    Amortized,
}

/// What happens to the share of a one-time cost whose window runs past the
/// end of the contract term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Shares falling after the last period are discarded
    #[default]
    Drop,
    /// Shares falling after the last period are added to the first in-term
    /// period of the window (the last period of the term when the window
    /// starts after it)
    FrontLoad,
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Everything the builder places on the timeline, already in the reporting
/// currency.
#[derive(Debug, Clone)]
pub struct TimelineInput<'a> {
    pub contract_term_months: Months,
    pub items: &'a [NormalizedItem],
    /// Non-recurring revenue, booked in period 0
    pub one_time_revenue: Flow,
    /// Replaces the sum of recurring item revenue when set
    pub recurring_revenue_override: Option<Flow>,
    pub commission: Flow,
    /// Guarantee-letter cost, booked in period 0
    pub guarantee_letter_cost: Flow,
    pub commission_policy: CommissionPolicy,
    pub overflow_policy: OverflowPolicy,
}

impl<'a> TimelineInput<'a> {
    pub fn new(items: &'a [NormalizedItem], contract_term_months: Months) -> Self {
        Self {
            contract_term_months,
            items,
            one_time_revenue: 0.0,
            recurring_revenue_override: None,
            commission: 0.0,
            guarantee_letter_cost: 0.0,
            commission_policy: CommissionPolicy::default(),
            overflow_policy: OverflowPolicy::default(),
        }
    }
}

/// One month of the timeline. Expenses are stored as positive magnitudes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelinePeriod {
    pub period: Months,
    pub one_time_revenue: Flow,
    pub recurring_revenue: Flow,
    pub commission: Flow,
    pub guarantee_letter: Flow,
    pub recurring_expense: Flow,
    pub one_time_cost: Flow,
    pub net: Flow,
}

impl TimelinePeriod {
    pub fn revenue(&self) -> Flow {
        self.one_time_revenue + self.recurring_revenue
    }

    pub fn expense(&self) -> Flow {
        self.commission + self.guarantee_letter + self.recurring_expense + self.one_time_cost
    }
}

/// How a single one-time cost was exploded across its window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneTimeCostSchedule {
    pub label: String,
    pub total: Flow,
    pub start_period: Months,
    pub duration_months: Months,
    /// Per-period amounts, one entry per period of the term
    pub values: Vec<Flow>,
    /// Portion that landed inside the term
    pub applied: Flow,
    /// Portion that fell past the term (zero under `FrontLoad`)
    pub dropped: Flow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowTimeline {
    pub contract_term_months: Months,
    pub periods: Vec<TimelinePeriod>,
    pub one_time_costs: Vec<OneTimeCostSchedule>,
}

impl CashFlowTimeline {
    pub fn net_cash_flows(&self) -> Vec<Flow> {
        self.periods.iter().map(|p| p.net).collect()
    }

    pub fn total_revenue(&self) -> Flow {
        self.periods.iter().map(TimelinePeriod::revenue).sum()
    }

    pub fn total_expense(&self) -> Flow {
        self.periods.iter().map(TimelinePeriod::expense).sum()
    }

    /// One-time costs actually booked inside the term.
    pub fn installation_cost(&self) -> Flow {
        self.periods.iter().map(|p| p.one_time_cost).sum()
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Assemble the per-period cash-flow timeline over `[0, contract_term_months)`.
pub fn build_timeline(input: &TimelineInput<'_>) -> DealEngineResult<CashFlowTimeline> {
    let term = input.contract_term_months;
    if !(1..=MAX_CONTRACT_TERM_MONTHS).contains(&term) {
        return Err(DealEngineError::InvalidContractTerm(term));
    }
    let n = term as usize;

    let mut periods: Vec<TimelinePeriod> = (0..term)
        .map(|period| TimelinePeriod {
            period,
            ..TimelinePeriod::default()
        })
        .collect();

    // A. Revenues
    let (recurring_revenue_sum, recurring_expense) =
        input
            .items
            .iter()
            .fold((0.0, 0.0), |(rev, exp), item| match item {
                NormalizedItem::Recurring {
                    monthly_revenue,
                    monthly_expense,
                    ..
                } => (rev + monthly_revenue, exp + monthly_expense),
                NormalizedItem::OneTimeCost { .. } => (rev, exp),
            });
    let recurring_revenue = input
        .recurring_revenue_override
        .unwrap_or(recurring_revenue_sum);

    periods[0].one_time_revenue = input.one_time_revenue;
    for p in periods.iter_mut() {
        p.recurring_revenue = recurring_revenue;
        p.recurring_expense = recurring_expense;
    }

    // B. Commission and guarantee letter
    match input.commission_policy {
        CommissionPolicy::SinglePeriod => periods[0].commission = input.commission,
        CommissionPolicy::Amortized => {
            let share = input.commission / n as f64;
            for p in periods.iter_mut() {
                p.commission = share;
            }
        }
    }
    periods[0].guarantee_letter = input.guarantee_letter_cost;

    // C. One-time costs
    let mut schedules = Vec::new();
    for (index, item) in input.items.iter().enumerate() {
        if let NormalizedItem::OneTimeCost {
            label,
            total,
            start_period,
            duration_months,
        } = item
        {
            let schedule = explode_one_time_cost(
                index,
                label,
                *total,
                *start_period,
                *duration_months,
                term,
                input.overflow_policy,
            )?;
            for (p, value) in periods.iter_mut().zip(&schedule.values) {
                p.one_time_cost += value;
            }
            schedules.push(schedule);
        }
    }

    // D. Net cash flow
    for p in periods.iter_mut() {
        p.net = p.revenue() - p.expense();
    }

    Ok(CashFlowTimeline {
        contract_term_months: term,
        periods,
        one_time_costs: schedules,
    })
}

fn explode_one_time_cost(
    index: usize,
    label: &str,
    total: Flow,
    start_period: Months,
    duration_months: Months,
    term: Months,
    overflow_policy: OverflowPolicy,
) -> DealEngineResult<OneTimeCostSchedule> {
    if duration_months <= 0 {
        return Err(DealEngineError::InvalidLineItem {
            index,
            reason: format!("duration_months must be > 0, got {duration_months}"),
        });
    }
    if start_period < 0 {
        return Err(DealEngineError::InvalidLineItem {
            index,
            reason: format!("start_period must be >= 0, got {start_period}"),
        });
    }

    let share = total / duration_months as f64;
    let in_term = (term - start_period).clamp(0, duration_months);
    let overflow_periods = duration_months - in_term;

    let mut values = vec![0.0; term as usize];
    for offset in 0..in_term {
        values[(start_period + offset) as usize] += share;
    }
    let mut applied = share * in_term as f64;
    let mut dropped = share * overflow_periods as f64;

    if overflow_periods > 0 && overflow_policy == OverflowPolicy::FrontLoad {
        let target = start_period.min(term - 1) as usize;
        values[target] += dropped;
        applied += dropped;
        dropped = 0.0;
    }

    Ok(OneTimeCostSchedule {
        label: label.to_string(),
        total,
        start_period,
        duration_months,
        values,
        applied,
        dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn one_time(total: Flow, start: Months, duration: Months) -> NormalizedItem {
        NormalizedItem::OneTimeCost {
            label: "Instalación".into(),
            total,
            start_period: start,
            duration_months: duration,
        }
    }

    fn recurring(revenue: Flow, expense: Flow) -> NormalizedItem {
        NormalizedItem::Recurring {
            label: "Enlace".into(),
            monthly_revenue: revenue,
            monthly_expense: expense,
            monthly_revenue_original: revenue,
        }
    }

    #[test]
    fn test_recurring_fills_every_period() {
        let items = vec![recurring(1000.0, 300.0)];
        let t = build_timeline(&TimelineInput::new(&items, 12)).unwrap();
        assert_eq!(t.periods.len(), 12);
        assert!(t.periods.iter().all(|p| p.net == 700.0));
        assert_eq!(t.total_revenue(), 12000.0);
        assert_eq!(t.total_expense(), 3600.0);
    }

    #[test]
    fn test_one_time_cost_spread_over_window() {
        let items = vec![one_time(6000.0, 0, 6)];
        let t = build_timeline(&TimelineInput::new(&items, 12)).unwrap();
        let net = t.net_cash_flows();
        assert_eq!(&net[..6], &[-1000.0; 6]);
        assert_eq!(&net[6..], &[0.0; 6]);
        assert_eq!(t.installation_cost(), 6000.0);
    }

    #[test]
    fn test_overflow_dropped_by_default() {
        let items = vec![one_time(1200.0, 10, 4)];
        let t = build_timeline(&TimelineInput::new(&items, 12)).unwrap();
        let schedule = &t.one_time_costs[0];
        assert_eq!(schedule.applied, 600.0);
        assert_eq!(schedule.dropped, 600.0);
        assert_eq!(t.periods[10].one_time_cost, 300.0);
        assert_eq!(t.periods[11].one_time_cost, 300.0);
        assert_eq!(t.installation_cost(), 600.0);
    }

    #[test]
    fn test_overflow_front_loaded() {
        let items = vec![one_time(1200.0, 10, 4)];
        let mut input = TimelineInput::new(&items, 12);
        input.overflow_policy = OverflowPolicy::FrontLoad;
        let t = build_timeline(&input).unwrap();
        assert_eq!(t.periods[10].one_time_cost, 900.0);
        assert_eq!(t.periods[11].one_time_cost, 300.0);
        assert_eq!(t.one_time_costs[0].dropped, 0.0);
        assert_eq!(t.installation_cost(), 1200.0);
    }

    #[test]
    fn test_window_past_term_front_loads_into_last_period() {
        let items = vec![one_time(500.0, 20, 2)];
        let mut input = TimelineInput::new(&items, 12);
        input.overflow_policy = OverflowPolicy::FrontLoad;
        let t = build_timeline(&input).unwrap();
        assert_eq!(t.periods[11].one_time_cost, 500.0);

        input.overflow_policy = OverflowPolicy::Drop;
        let t = build_timeline(&input).unwrap();
        assert_eq!(t.installation_cost(), 0.0);
    }

    #[test]
    fn test_commission_single_period_and_amortized() {
        let items = vec![recurring(1000.0, 0.0)];
        let mut input = TimelineInput::new(&items, 10);
        input.commission = 500.0;
        let single = build_timeline(&input).unwrap();
        assert_eq!(single.periods[0].commission, 500.0);
        assert_eq!(single.periods[1].commission, 0.0);

        input.commission_policy = CommissionPolicy::Amortized;
        let amortized = build_timeline(&input).unwrap();
        assert!(amortized.periods.iter().all(|p| p.commission == 50.0));
        assert_eq!(single.total_expense(), amortized.total_expense());
    }

    #[test]
    fn test_nrc_and_guarantee_letter_in_period_zero() {
        let items = vec![recurring(100.0, 0.0)];
        let mut input = TimelineInput::new(&items, 3);
        input.one_time_revenue = 900.0;
        input.guarantee_letter_cost = 50.0;
        input.recurring_revenue_override = Some(200.0);
        let t = build_timeline(&input).unwrap();
        assert_eq!(t.periods[0].net, 900.0 + 200.0 - 50.0);
        assert_eq!(t.periods[1].net, 200.0);
    }

    #[test]
    fn test_invalid_contract_term() {
        let err = build_timeline(&TimelineInput::new(&[], 0)).unwrap_err();
        assert!(matches!(err, DealEngineError::InvalidContractTerm(0)));
        let err = build_timeline(&TimelineInput::new(&[], -3)).unwrap_err();
        assert!(matches!(err, DealEngineError::InvalidContractTerm(-3)));
        let err = build_timeline(&TimelineInput::new(&[], i32::MAX)).unwrap_err();
        assert!(matches!(err, DealEngineError::InvalidContractTerm(i32::MAX)));
        let t = build_timeline(&TimelineInput::new(&[], MAX_CONTRACT_TERM_MONTHS)).unwrap();
        assert_eq!(t.periods.len(), 600);
    }

    #[test]
    fn test_invalid_duration() {
        let items = vec![recurring(1.0, 0.0), one_time(100.0, 0, 0)];
        let err = build_timeline(&TimelineInput::new(&items, 12)).unwrap_err();
        assert!(matches!(err, DealEngineError::InvalidLineItem { index: 1, .. }));
    }
}
