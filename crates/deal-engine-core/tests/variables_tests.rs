use deal_engine_core::access::Principal;
use deal_engine_core::error::ErrorKind;
use deal_engine_core::line_items::{LineItem, RecurringItem};
use deal_engine_core::proposal::{
    BusinessFields, DealService, InMemoryProposalRepository, NotificationQueue, Outcome,
};
use deal_engine_core::variables::{
    InMemoryVariableLog, COST_OF_CAPITAL, EXCHANGE_RATE, GUARANTEE_LETTER_RATE,
};
use deal_engine_core::{DealEngineError, EngineConfig};
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn empty_service() -> DealService {
    DealService::new(
        EngineConfig::default(),
        Arc::new(InMemoryProposalRepository::new()),
        Arc::new(InMemoryVariableLog::new()),
        NotificationQueue::disconnected(),
    )
    .unwrap()
}

/// Priced in USD so the exchange rate drives every figure.
fn usd_items() -> Vec<LineItem> {
    vec![LineItem::Recurring(RecurringItem {
        service_type: "Tránsito IP".into(),
        note: None,
        location: None,
        quantity: dec!(1),
        unit_price: dec!(1000),
        price_currency: "USD".into(),
        unit_price_normalized: None,
        unit_cost_1: dec!(300),
        unit_cost_2: dec!(0),
        cost_currency: "USD".into(),
        unit_cost_1_normalized: None,
        unit_cost_2_normalized: None,
        supplier: None,
    })]
}

#[test]
fn test_creation_blocked_until_every_variable_is_set() {
    let svc = empty_service();
    let ana = Principal::sales("ana");
    let fin = Principal::finance("carla");
    let fields = BusinessFields::new("GIGALAN", "ACME", 12);

    let err = svc
        .create_proposal(&ana, fields.clone(), usd_items())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PrerequisiteMissing);

    svc.record_variable(&fin, EXCHANGE_RATE, dec!(3.8), None).unwrap();
    svc.record_variable(&fin, COST_OF_CAPITAL, dec!(0.1), None).unwrap();
    let err = svc
        .create_proposal(&ana, fields.clone(), usd_items())
        .unwrap_err();
    match err {
        DealEngineError::MissingMasterVariable(name) => assert_eq!(name, GUARANTEE_LETTER_RATE),
        other => panic!("unexpected error: {other}"),
    }

    svc.record_variable(&fin, GUARANTEE_LETTER_RATE, dec!(0.01), None)
        .unwrap();
    assert!(svc.create_proposal(&ana, fields, usd_items()).is_ok());
}

#[test]
fn test_snapshot_ignores_later_variable_changes() {
    let svc = empty_service();
    let ana = Principal::sales("ana");
    let fin = Principal::finance("carla");
    svc.record_variable(&fin, EXCHANGE_RATE, dec!(3.5), None).unwrap();
    svc.record_variable(&fin, COST_OF_CAPITAL, dec!(0.12), None).unwrap();
    svc.record_variable(&fin, GUARANTEE_LETTER_RATE, dec!(0.01), None)
        .unwrap();

    let fields = BusinessFields::new("MAYORISTA", "ACME", 12);
    let old = svc
        .create_proposal(&ana, fields.clone(), usd_items())
        .unwrap();
    let old_preview = svc
        .recalculate(&ana, old.id(), usd_items(), &fields)
        .unwrap()
        .result;
    assert_eq!(old_preview.mrc, 3500.0);

    // Exchange rate moves after the proposal was created
    svc.record_variable(&fin, EXCHANGE_RATE, dec!(4.0), Some("devaluación".into()))
        .unwrap();
    svc.record_variable(&fin, COST_OF_CAPITAL, dec!(0.20), None).unwrap();

    let stored = svc.get(&ana, old.id()).unwrap();
    assert_eq!(stored.snapshot().exchange_rate(), dec!(3.5));
    assert_eq!(stored.snapshot().cost_of_capital(), dec!(0.12));

    let preview_after = svc
        .recalculate(&ana, old.id(), usd_items(), &fields)
        .unwrap()
        .result;
    assert_eq!(preview_after, old_preview);

    let decided = svc
        .decide(&fin, old.id(), Outcome::Approved, usd_items(), fields.clone(), None)
        .unwrap();
    assert_eq!(decided.financial_cache().unwrap().summary, old_preview);

    // A new proposal picks up the new rate
    let new = svc.create_proposal(&ana, fields, usd_items()).unwrap();
    assert_eq!(new.snapshot().exchange_rate(), dec!(4.0));
    assert_eq!(new.summary().unwrap().mrc, 4000.0);
}

#[test]
fn test_variable_history_is_append_only() {
    let svc = empty_service();
    let fin = Principal::finance("carla");
    for value in [dec!(3.70), dec!(3.72), dec!(3.69)] {
        svc.record_variable(&fin, EXCHANGE_RATE, value, None).unwrap();
    }
    let history = svc
        .variables()
        .history(&Principal::sales("ana"), Some("FINANCIAL"))
        .unwrap();
    let values: Vec<_> = history.iter().map(|v| v.value).collect();
    assert_eq!(values, vec![dec!(3.69), dec!(3.72), dec!(3.70)]);
    assert!(history.iter().all(|v| v.recorded_by == "carla"));
}
