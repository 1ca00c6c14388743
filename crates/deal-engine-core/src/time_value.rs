use serde::{Deserialize, Serialize};

use crate::error::DealEngineError;
use crate::types::Flow;
use crate::DealEngineResult;

/// Candidate monthly rates probed for a sign change before bisecting.
const BRACKET_GRID: [f64; 19] = [
    -0.9, -0.75, -0.5, -0.25, -0.1, -0.05, -0.02, -0.01, 0.0, 0.005, 0.01, 0.02, 0.05, 0.1,
    0.25, 0.5, 1.0, 2.5, 5.0,
];

/// Search interval and iteration budget for the IRR solver. Rates are per
/// period (monthly).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IrrSettings {
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub max_iterations: u32,
    pub tolerance: f64,
}

impl Default for IrrSettings {
    fn default() -> Self {
        Self {
            lower_bound: -0.99,
            upper_bound: 10.0,
            max_iterations: 200,
            tolerance: 1e-9,
        }
    }
}

/// Monthly equivalent of an annual rate: (1 + annual)^(1/12) - 1
pub fn monthly_rate(annual_rate: f64) -> DealEngineResult<f64> {
    if !annual_rate.is_finite() || annual_rate <= -1.0 {
        return Err(DealEngineError::InvalidInput {
            field: "annual_discount_rate".into(),
            reason: "Discount rate must be finite and greater than -100%".into(),
        });
    }
    Ok((1.0 + annual_rate).powf(1.0 / 12.0) - 1.0)
}

/// Annual equivalent of a monthly rate: (1 + monthly)^12 - 1
pub fn annualize(monthly: f64) -> f64 {
    (1.0 + monthly).powi(12) - 1.0
}

/// Net Present Value of a series of cash flows; period 0 is undiscounted.
pub fn npv(rate: f64, cash_flows: &[Flow]) -> DealEngineResult<Flow> {
    if !rate.is_finite() || rate <= -1.0 {
        return Err(DealEngineError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be finite and greater than -100%".into(),
        });
    }
    Ok(discounted_sum(rate, cash_flows))
}

fn discounted_sum(rate: f64, cash_flows: &[Flow]) -> f64 {
    let one_plus_r = 1.0 + rate;
    cash_flows
        .iter()
        .enumerate()
        .map(|(t, cf)| cf / one_plus_r.powi(t as i32))
        .sum()
}

/// Internal Rate of Return (per period) by bracketing then bisection.
///
/// Fails with `IrrNotConvergent` when the series never changes sign, when no
/// sign change of the NPV is found inside the search interval, or when the
/// iteration budget runs out. Never defaults to zero.
pub fn irr(cash_flows: &[Flow], settings: &IrrSettings) -> DealEngineResult<f64> {
    let undiscounted: f64 = cash_flows.iter().sum();
    let has_positive = cash_flows.iter().any(|cf| *cf > 0.0);
    let has_negative = cash_flows.iter().any(|cf| *cf < 0.0);
    if cash_flows.len() < 2 || !(has_positive && has_negative) {
        return Err(DealEngineError::IrrNotConvergent {
            iterations: 0,
            last_delta: undiscounted,
        });
    }

    let (lower, upper) = (settings.lower_bound, settings.upper_bound);
    let probes = std::iter::once(lower)
        .chain(BRACKET_GRID.iter().copied().filter(|r| *r > lower && *r < upper))
        .chain(std::iter::once(upper));

    let mut previous: Option<(f64, f64)> = None;
    for rate in probes {
        let value = discounted_sum(rate, cash_flows);
        if !value.is_finite() {
            continue;
        }
        if value == 0.0 {
            return Ok(rate);
        }
        if let Some((prev_rate, prev_value)) = previous {
            if prev_value.signum() != value.signum() {
                return bisect(cash_flows, prev_rate, prev_value, rate, settings);
            }
        }
        previous = Some((rate, value));
    }

    Err(DealEngineError::IrrNotConvergent {
        iterations: 0,
        last_delta: previous.map(|(_, v)| v).unwrap_or(undiscounted),
    })
}

fn bisect(
    cash_flows: &[Flow],
    mut lo: f64,
    mut f_lo: f64,
    mut hi: f64,
    settings: &IrrSettings,
) -> DealEngineResult<f64> {
    let mut f_mid = f_lo;
    for _ in 0..settings.max_iterations {
        let mid = 0.5 * (lo + hi);
        f_mid = discounted_sum(mid, cash_flows);
        if f_mid.abs() < settings.tolerance || 0.5 * (hi - lo) < settings.tolerance {
            return Ok(mid);
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }

    Err(DealEngineError::IrrNotConvergent {
        iterations: settings.max_iterations,
        last_delta: f_mid,
    })
}

/// Running total of a cash-flow series.
pub fn cumulative(cash_flows: &[Flow]) -> Vec<Flow> {
    cash_flows
        .iter()
        .scan(0.0, |acc, cf| {
            *acc += cf;
            Some(*acc)
        })
        .collect()
}

/// First period at which the cumulative (undiscounted) flow turns
/// non-negative, linearly interpolated inside that period. `None` when it
/// never does.
pub fn payback_period(cash_flows: &[Flow]) -> Option<f64> {
    let mut running = 0.0;
    for (t, cf) in cash_flows.iter().enumerate() {
        let before = running;
        running += cf;
        if running >= 0.0 {
            if t == 0 || before >= 0.0 {
                return Some(t as f64);
            }
            // before < 0 <= running, so cf > 0 and the fraction lies in (0, 1]
            return Some((t - 1) as f64 + (-before / cf));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_npv_basic() {
        let cfs = vec![-1000.0, 300.0, 400.0, 500.0];
        let result = npv(0.10, &cfs).unwrap();
        // -1000 + 300/1.1 + 400/1.21 + 500/1.331 ≈ -21.04
        assert!((result + 21.04).abs() < 0.01);
    }

    #[test]
    fn test_npv_zero_rate() {
        let cfs = vec![-100.0, 50.0, 50.0, 50.0];
        assert_eq!(npv(0.0, &cfs).unwrap(), 50.0);
    }

    #[test]
    fn test_npv_rejects_rate_at_minus_one() {
        assert!(npv(-1.0, &[1.0]).is_err());
    }

    #[test]
    fn test_monthly_rate_compounds_back() {
        let m = monthly_rate(0.12).unwrap();
        assert!((annualize(m) - 0.12).abs() < 1e-12);
        assert!(m < 0.01);
    }

    #[test]
    fn test_irr_basic() {
        let cfs = vec![-1000.0, 400.0, 400.0, 400.0];
        let result = irr(&cfs, &IrrSettings::default()).unwrap();
        // ~9.7%
        assert!((result - 0.097).abs() < 0.001);
        assert!(npv(result, &cfs).unwrap().abs() < 1e-4);
    }

    #[test]
    fn test_irr_all_positive_not_convergent() {
        let err = irr(&[100.0, 100.0, 100.0], &IrrSettings::default()).unwrap_err();
        assert!(matches!(err, DealEngineError::IrrNotConvergent { .. }));
    }

    #[test]
    fn test_irr_all_negative_not_convergent() {
        let err = irr(&[-100.0, -1.0, 0.0], &IrrSettings::default()).unwrap_err();
        assert!(matches!(err, DealEngineError::IrrNotConvergent { .. }));
    }

    #[test]
    fn test_irr_no_root_in_interval() {
        // Root sits below the interval's lower bound.
        let settings = IrrSettings {
            lower_bound: 0.0,
            upper_bound: 1.0,
            ..IrrSettings::default()
        };
        let err = irr(&[-1000.0, 100.0, 100.0], &settings).unwrap_err();
        assert!(matches!(err, DealEngineError::IrrNotConvergent { .. }));
    }

    #[test]
    fn test_payback_immediate() {
        assert_eq!(payback_period(&[1000.0, 1000.0]), Some(0.0));
    }

    #[test]
    fn test_payback_interpolates() {
        // cumulative: -1000, -400, 200 -> crosses 2/3 of the way through period 2
        let p = payback_period(&[-1000.0, 600.0, 600.0]).unwrap();
        assert!((p - (1.0 + 400.0 / 600.0)).abs() < 1e-12);
    }

    #[test]
    fn test_payback_exact_zero_lands_on_period() {
        assert_eq!(payback_period(&[-500.0, 250.0, 250.0]), Some(2.0));
    }

    #[test]
    fn test_payback_never() {
        assert_eq!(payback_period(&[-1000.0, 100.0, 100.0]), None);
        assert_eq!(payback_period(&[]), None);
    }

    #[test]
    fn test_cumulative() {
        assert_eq!(cumulative(&[-3.0, 1.0, 5.0]), vec![-3.0, -2.0, 3.0]);
    }
}
