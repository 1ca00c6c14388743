use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::currency::CurrencyNormalizer;
use crate::error::DealEngineError;
use crate::types::{to_flow, Flow, Money, Months};
use crate::DealEngineResult;

fn default_pen() -> String {
    "PEN".into()
}

fn default_usd() -> String {
    "USD".into()
}

fn default_duration() -> Months {
    1
}

/// One-time (installation) cost spread over its own window of months.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneTimeCost {
    pub category: String,
    pub service_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub quantity: Decimal,
    pub unit_cost: Money,
    #[serde(default = "default_usd")]
    pub unit_cost_currency: String,
    /// Reporting-currency unit cost, written when the item is normalized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_cost_normalized: Option<Flow>,
    /// Month offset from contract start
    #[serde(default)]
    pub start_period: Months,
    #[serde(default = "default_duration")]
    pub duration_months: Months,
}

/// Monthly recurring service row: revenue from the unit price, expense from
/// up to two unit costs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringItem {
    pub service_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Money,
    #[serde(default = "default_pen")]
    pub price_currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price_normalized: Option<Flow>,
    #[serde(default)]
    pub unit_cost_1: Money,
    #[serde(default)]
    pub unit_cost_2: Money,
    #[serde(default = "default_usd")]
    pub cost_currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_cost_1_normalized: Option<Flow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_cost_2_normalized: Option<Flow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineItem {
    OneTimeCost(OneTimeCost),
    Recurring(RecurringItem),
}

/// A line item reduced to reporting-currency figures, ready for the
/// timeline builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizedItem {
    OneTimeCost {
        label: String,
        total: Flow,
        start_period: Months,
        duration_months: Months,
    },
    Recurring {
        label: String,
        monthly_revenue: Flow,
        monthly_expense: Flow,
        /// quantity × unit price in the price's own currency
        monthly_revenue_original: Flow,
    },
}

impl LineItem {
    pub fn label(&self) -> &str {
        match self {
            LineItem::OneTimeCost(c) => &c.service_type,
            LineItem::Recurring(r) => &r.service_type,
        }
    }

    /// Multiply every monetary amount by `factor`, leaving currencies intact.
    pub fn scaled(&self, factor: Decimal) -> LineItem {
        match self {
            LineItem::OneTimeCost(c) => LineItem::OneTimeCost(OneTimeCost {
                unit_cost: c.unit_cost * factor,
                unit_cost_normalized: None,
                ..c.clone()
            }),
            LineItem::Recurring(r) => LineItem::Recurring(RecurringItem {
                unit_price: r.unit_price * factor,
                unit_cost_1: r.unit_cost_1 * factor,
                unit_cost_2: r.unit_cost_2 * factor,
                unit_price_normalized: None,
                unit_cost_1_normalized: None,
                unit_cost_2_normalized: None,
                ..r.clone()
            }),
        }
    }
}

/// Normalize every item into the reporting currency, recording the normalized
/// unit values on the items themselves.
pub fn normalize_line_items(
    items: &mut [LineItem],
    normalizer: &CurrencyNormalizer,
    exchange_rate: Flow,
) -> DealEngineResult<Vec<NormalizedItem>> {
    items
        .iter_mut()
        .enumerate()
        .map(|(index, item)| normalize_item(index, item, normalizer, exchange_rate))
        .collect()
}

fn normalize_item(
    index: usize,
    item: &mut LineItem,
    normalizer: &CurrencyNormalizer,
    exchange_rate: Flow,
) -> DealEngineResult<NormalizedItem> {
    let invalid = |reason: String| DealEngineError::InvalidLineItem { index, reason };
    let convert = |amount: Money, currency: &str| {
        normalizer
            .normalize_money(amount, currency, exchange_rate)
            .map_err(|e| invalid(e.to_string()))
    };

    match item {
        LineItem::OneTimeCost(cost) => {
            let quantity = to_flow(cost.quantity, "quantity")?;
            let unit = convert(cost.unit_cost, &cost.unit_cost_currency)?;
            cost.unit_cost_normalized = Some(unit);
            Ok(NormalizedItem::OneTimeCost {
                label: cost.service_type.clone(),
                total: quantity * unit,
                start_period: cost.start_period,
                duration_months: cost.duration_months,
            })
        }
        LineItem::Recurring(row) => {
            let quantity = to_flow(row.quantity, "quantity")?;
            let price = convert(row.unit_price, &row.price_currency)?;
            let cost_1 = convert(row.unit_cost_1, &row.cost_currency)?;
            let cost_2 = convert(row.unit_cost_2, &row.cost_currency)?;
            row.unit_price_normalized = Some(price);
            row.unit_cost_1_normalized = Some(cost_1);
            row.unit_cost_2_normalized = Some(cost_2);
            Ok(NormalizedItem::Recurring {
                label: row.service_type.clone(),
                monthly_revenue: quantity * price,
                monthly_expense: quantity * (cost_1 + cost_2),
                monthly_revenue_original: quantity * to_flow(row.unit_price, "unit_price")?,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn recurring() -> LineItem {
        LineItem::Recurring(RecurringItem {
            service_type: "Internet 100Mbps".into(),
            note: None,
            location: Some("Lima".into()),
            quantity: dec!(2),
            unit_price: dec!(500),
            price_currency: "PEN".into(),
            unit_price_normalized: None,
            unit_cost_1: dec!(40),
            unit_cost_2: dec!(10),
            cost_currency: "USD".into(),
            unit_cost_1_normalized: None,
            unit_cost_2_normalized: None,
            supplier: Some("Carrier SA".into()),
        })
    }

    #[test]
    fn test_recurring_normalization_writes_back() {
        let mut items = vec![recurring()];
        let normalized =
            normalize_line_items(&mut items, &CurrencyNormalizer::default(), 3.5).unwrap();
        assert_eq!(
            normalized[0],
            NormalizedItem::Recurring {
                label: "Internet 100Mbps".into(),
                monthly_revenue: 1000.0,
                monthly_expense: 2.0 * (140.0 + 35.0),
                monthly_revenue_original: 1000.0,
            }
        );
        match &items[0] {
            LineItem::Recurring(r) => assert_eq!(r.unit_cost_1_normalized, Some(140.0)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_bad_currency_reports_item_index() {
        let mut items = vec![
            recurring(),
            LineItem::OneTimeCost(OneTimeCost {
                category: "Equipos".into(),
                service_type: "Router".into(),
                ticket: None,
                location: None,
                quantity: dec!(1),
                unit_cost: dec!(100),
                unit_cost_currency: "GBP".into(),
                unit_cost_normalized: None,
                start_period: 0,
                duration_months: 1,
            }),
        ];
        let err =
            normalize_line_items(&mut items, &CurrencyNormalizer::default(), 3.5).unwrap_err();
        assert!(matches!(err, DealEngineError::InvalidLineItem { index: 1, .. }));
    }

    #[test]
    fn test_line_item_json_shape() {
        let json = r#"{
            "kind": "one_time_cost",
            "category": "Instalación",
            "service_type": "Fibra",
            "quantity": "3",
            "unit_cost": "200"
        }"#;
        let item: LineItem = serde_json::from_str(json).unwrap();
        match item {
            LineItem::OneTimeCost(c) => {
                assert_eq!(c.unit_cost_currency, "USD");
                assert_eq!(c.duration_months, 1);
                assert_eq!(c.start_period, 0);
            }
            _ => panic!("expected one-time cost"),
        }
    }
}
