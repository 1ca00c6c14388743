use tracing::debug;

use super::{BusinessUnit, Commission, CommissionInput, GigalanTerms};
use crate::types::{Flow, Months};

// ---------------------------------------------------------------------------
// ESTADO tables
// ---------------------------------------------------------------------------

/// Single-payment bands: (lower margin, lower inclusive, upper margin, rate, cap).
/// The upper bound is inclusive; `f64::INFINITY` marks the open top band.
const ESTADO_SINGLE_PAYMENT: [(f64, bool, f64, f64, Flow); 5] = [
    (0.30, true, 0.35, 0.01, 11_000.0),
    (0.35, false, 0.39, 0.02, 12_000.0),
    (0.39, false, 0.49, 0.03, 13_000.0),
    (0.49, false, 0.59, 0.04, 14_000.0),
    (0.59, false, f64::INFINITY, 0.05, 15_000.0),
];

/// Recurring deals, per term: payback ceilings for the low/mid bands and the
/// high band, then the three band rates.
struct EstadoTerm {
    term: Months,
    payback_low_mid: f64,
    payback_high: f64,
    rates: [f64; 3],
}

const ESTADO_RECURRING: [EstadoTerm; 4] = [
    EstadoTerm {
        term: 12,
        payback_low_mid: 7.0,
        payback_high: 6.0,
        rates: [0.025, 0.03, 0.035],
    },
    EstadoTerm {
        term: 24,
        payback_low_mid: 11.0,
        payback_high: 10.0,
        rates: [0.025, 0.03, 0.035],
    },
    EstadoTerm {
        term: 36,
        payback_low_mid: 19.0,
        payback_high: 18.0,
        rates: [0.025, 0.03, 0.035],
    },
    EstadoTerm {
        term: 48,
        payback_low_mid: 26.0,
        payback_high: 25.0,
        rates: [0.02, 0.025, 0.03],
    },
];

/// MRC multiples capping the low/mid/high recurring bands.
const ESTADO_MRC_CAPS: [f64; 3] = [0.8, 0.9, 1.0];

// ---------------------------------------------------------------------------
// GIGALAN tables
// ---------------------------------------------------------------------------

/// (lower margin inclusive, rate); the band runs up to the next entry's lower bound.
const GIGALAN_LIMA_NUEVO: [(f64, f64); 4] =
    [(0.40, 0.009), (0.50, 0.014), (0.60, 0.019), (0.70, 0.024)];
const GIGALAN_LIMA_EXISTENTE: [(f64, f64); 4] =
    [(0.40, 0.01), (0.50, 0.015), (0.60, 0.02), (0.70, 0.025)];
const GIGALAN_PROVINCIAS_CACHING: [(f64, f64); 2] = [(0.40, 0.03), (0.45, 0.035)];
const GIGALAN_PROVINCIAS_CARRIER: [(f64, f64); 2] = [(0.17, 0.02), (0.20, 0.03)];

/// Payback period index at or beyond which the GIGALAN commission is forfeited.
const GIGALAN_MAX_PAYBACK: f64 = 2.0;

const CORPORATIVO_MRC_CAP: f64 = 1.2;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Commission owed for a deal, routed by business unit. All amounts are in the
/// reporting currency.
pub fn calculate_commission(input: &CommissionInput) -> Commission {
    let commission = match &input.business_unit {
        BusinessUnit::Estado => estado(input),
        BusinessUnit::Gigalan => gigalan(input),
        BusinessUnit::Corporativo => corporativo(input),
        BusinessUnit::Other(unit) => Commission::none(format!("{unit}: no commission rules")),
    };
    debug!(
        unit = %input.business_unit,
        amount = commission.amount,
        rule = %commission.rule,
        "commission evaluated"
    );
    commission
}

// ---------------------------------------------------------------------------
// ESTADO
// ---------------------------------------------------------------------------

fn estado(input: &CommissionInput) -> Commission {
    if input.total_revenue == 0.0 {
        return Commission::none("ESTADO: no revenue");
    }
    if input.contract_term_months <= 1 {
        estado_single_payment(input)
    } else {
        estado_recurring(input)
    }
}

fn estado_single_payment(input: &CommissionInput) -> Commission {
    let margin = input.gross_margin_ratio;
    let band = ESTADO_SINGLE_PAYMENT
        .iter()
        .find(|(lower, inclusive, upper, _, _)| {
            let above = if *inclusive {
                margin >= *lower
            } else {
                margin > *lower
            };
            above && margin <= *upper
        });

    match band {
        Some(&(_, _, _, rate, cap)) => Commission {
            amount: (input.total_revenue * rate).min(cap),
            rate,
            cap: Some(cap),
            rule: "ESTADO single payment".into(),
        },
        None => Commission::none("ESTADO single payment: margin below 30%"),
    }
}

fn estado_recurring(input: &CommissionInput) -> Commission {
    let Some(table) = ESTADO_RECURRING
        .iter()
        .find(|t| t.term == input.contract_term_months)
    else {
        return Commission::none(format!(
            "ESTADO: no table for a {}-month term",
            input.contract_term_months
        ));
    };
    let Some(payback) = input.payback else {
        return Commission::none("ESTADO: no payback within the term");
    };

    let margin = input.gross_margin_ratio;
    let band = if (0.30..=0.35).contains(&margin) && payback <= table.payback_low_mid {
        Some(0)
    } else if margin > 0.35 && margin <= 0.39 && payback <= table.payback_low_mid {
        Some(1)
    } else if margin > 0.39 && payback <= table.payback_high {
        Some(2)
    } else {
        None
    };

    match band {
        Some(i) => {
            let rate = table.rates[i];
            let cap = input.mrc * ESTADO_MRC_CAPS[i];
            Commission {
                amount: (input.total_revenue * rate).min(cap),
                rate,
                cap: Some(cap),
                rule: format!("ESTADO recurring {}m", table.term),
            }
        }
        None => Commission::none(format!(
            "ESTADO recurring {}m: margin or payback out of band",
            table.term
        )),
    }
}

// ---------------------------------------------------------------------------
// GIGALAN
// ---------------------------------------------------------------------------

fn gigalan(input: &CommissionInput) -> Commission {
    let GigalanTerms {
        region,
        sale_type,
        previous_mrc,
    } = &input.gigalan;
    let (Some(region), Some(sale_type)) = (non_blank(region), non_blank(sale_type)) else {
        return Commission::none("GIGALAN: region and sale type required");
    };
    if matches!(input.payback, Some(p) if p >= GIGALAN_MAX_PAYBACK) {
        return Commission::none("GIGALAN: payback of 2 months or more");
    }

    let region = region.to_ascii_uppercase();
    let sale_type = sale_type.to_ascii_uppercase();
    let table: &[(f64, f64)] = match (region.as_str(), sale_type.as_str()) {
        ("LIMA", "NUEVO") => &GIGALAN_LIMA_NUEVO,
        ("LIMA", "EXISTENTE") => &GIGALAN_LIMA_EXISTENTE,
        ("LIMA", _) => &[],
        ("PROVINCIAS CON CACHING", _) => &GIGALAN_PROVINCIAS_CACHING,
        ("PROVINCIAS CON INTERNEXA", _) | ("PROVINCIAS CON TDP", _) => {
            &GIGALAN_PROVINCIAS_CARRIER
        }
        _ => &[],
    };
    let rate = step_rate(table, input.gross_margin_ratio);
    let term = input.contract_term_months as f64;

    let amount = match sale_type.as_str() {
        "NUEVO" => rate * input.mrc * term,
        "EXISTENTE" => rate * term * (input.mrc - previous_mrc.unwrap_or(0.0)),
        _ => 0.0,
    };

    Commission {
        amount,
        rate,
        cap: None,
        rule: format!("GIGALAN {region} {sale_type}"),
    }
}

/// Rate of the highest band whose lower bound the margin reaches; 0 below the
/// first band.
fn step_rate(table: &[(f64, f64)], margin: f64) -> f64 {
    table
        .iter()
        .rev()
        .find(|(lower, _)| margin >= *lower)
        .map(|(_, rate)| *rate)
        .unwrap_or(0.0)
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// CORPORATIVO
// ---------------------------------------------------------------------------

/// No bands are defined for this unit: the amount is zero, bounded by
/// 1.2 × MRC (which only bites for a negative MRC).
fn corporativo(input: &CommissionInput) -> Commission {
    let cap = CORPORATIVO_MRC_CAP * input.mrc;
    Commission {
        amount: 0.0_f64.min(cap),
        rate: 0.0,
        cap: Some(cap),
        rule: "CORPORATIVO".into(),
    }
}
