//! Seat line items of configurable family plans.
//!
//! When the payer chooses how many seats of which plan to buy, the purchase
//! carries one `family_subscription` line item per chosen plan. The
//! generator later hands out one request per unit of these items.

use common::error::{AppError, Res};
use db::dtos::payment::PaymentItemCreateRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::provisioning::ITEM_TYPE_FAMILY;

/// One chosen seat plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentItemConfig {
    /// Plan the redeemer of these seats receives.
    pub plan_id: Uuid,
    pub count: i32,
    /// Net price per seat in minor units; free seats when absent.
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub vat: Option<i64>,
    #[serde(default)]
    pub no_vat: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub meta: JsonValue,
}

impl PaymentItemConfig {
    pub fn new(plan_id: Uuid, count: i32) -> Self {
        PaymentItemConfig {
            plan_id,
            count,
            price: None,
            vat: None,
            no_vat: false,
            name: None,
            meta: JsonValue::Null,
        }
    }

    pub fn with_price(mut self, price: i64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_vat(mut self, vat: i64) -> Self {
        self.vat = Some(vat);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_meta(mut self, meta: JsonValue) -> Self {
        self.meta = meta;
        self
    }

    fn validate(&self) -> Res<()> {
        if self.count <= 0 {
            return Err(AppError::BadRequest(format!(
                "Seat count for plan {} must be positive, got {}",
                self.plan_id, self.count
            )));
        }
        if self.price.is_some_and(|price| price < 0) {
            return Err(AppError::BadRequest(format!(
                "Seat price for plan {} cannot be negative",
                self.plan_id
            )));
        }
        if self.vat.is_some() && self.no_vat {
            return Err(AppError::BadRequest(format!(
                "Seats of plan {} cannot carry VAT and be VAT exempt",
                self.plan_id
            )));
        }
        if self.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(AppError::BadRequest(format!(
                "Seat name for plan {} is empty",
                self.plan_id
            )));
        }
        if self.net_total().is_none() {
            return Err(AppError::BadRequest(format!(
                "Seat total for plan {} is too large",
                self.plan_id
            )));
        }
        if !(self.meta.is_null() || self.meta.is_object()) {
            return Err(AppError::BadRequest(format!(
                "Seat meta for plan {} must be an object",
                self.plan_id
            )));
        }
        Ok(())
    }

    fn net_total(&self) -> Option<i64> {
        self.price.unwrap_or(0).checked_mul(i64::from(self.count))
    }
}

/// The seat selection of one purchase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentItemsConfig {
    pub items: Vec<PaymentItemConfig>,
}

impl PaymentItemsConfig {
    pub fn new(items: Vec<PaymentItemConfig>) -> Self {
        PaymentItemsConfig { items }
    }

    pub fn push(&mut self, item: PaymentItemConfig) {
        self.items.push(item);
    }

    pub fn validate(&self) -> Res<()> {
        if self.items.is_empty() {
            return Err(AppError::BadRequest(
                "At least one seat plan must be chosen".to_string(),
            ));
        }
        self.items.iter().try_for_each(PaymentItemConfig::validate)?;
        self.net_total().map(|_| ())
    }

    pub fn seat_count(&self) -> usize {
        self.items
            .iter()
            .map(|item| item.count.max(0) as usize)
            .sum()
    }

    /// Sum of price times count. VAT is passed through, never computed here.
    pub fn net_total(&self) -> Res<i64> {
        self.items
            .iter()
            .try_fold(0i64, |total, item| {
                item.net_total().and_then(|line| total.checked_add(line))
            })
            .ok_or_else(|| AppError::BadRequest("Total of the chosen seats is too large".to_string()))
    }

    pub fn to_line_items(&self, payment_id: Uuid) -> Res<Vec<PaymentItemCreateRequest>> {
        self.validate()?;
        Ok(self
            .items
            .iter()
            .map(|item| PaymentItemCreateRequest {
                payment_id,
                item_type: ITEM_TYPE_FAMILY.to_string(),
                plan_id: Some(item.plan_id),
                unit_count: item.count,
                unit_price: item.price.unwrap_or(0),
                vat: item.vat,
                no_vat: item.no_vat,
                name: item.name.clone(),
                meta: match &item.meta {
                    JsonValue::Null => serde_json::json!({}),
                    meta => meta.clone(),
                },
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Uuid, Uuid, PaymentItemsConfig) {
        let (kids, adults) = (Uuid::new_v4(), Uuid::new_v4());
        let config = PaymentItemsConfig::new(vec![
            PaymentItemConfig::new(kids, 3).with_price(400).with_vat(84),
            PaymentItemConfig::new(adults, 2)
                .with_price(900)
                .with_name("Adult seat")
                .with_meta(serde_json::json!({ "tier": "adult" })),
        ]);
        (kids, adults, config)
    }

    #[test]
    fn totals() {
        let (_, _, config) = sample();
        assert!(config.validate().is_ok());
        assert_eq!(config.seat_count(), 5);
        assert_eq!(config.net_total().unwrap(), 3 * 400 + 2 * 900);
    }

    #[test]
    fn line_items_carry_seat_type_and_vat() {
        let (kids, adults, config) = sample();
        let payment_id = Uuid::new_v4();
        let items = config.to_line_items(payment_id).unwrap();

        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.item_type == ITEM_TYPE_FAMILY && i.payment_id == payment_id));
        assert_eq!(items[0].plan_id, Some(kids));
        assert_eq!(items[0].vat, Some(84));
        assert_eq!(items[0].meta, serde_json::json!({}));
        assert_eq!(items[1].plan_id, Some(adults));
        assert_eq!(items[1].name.as_deref(), Some("Adult seat"));
        assert_eq!(items[1].meta["tier"], "adult");
    }

    #[test]
    fn rejects_bad_selections() {
        let plan = Uuid::new_v4();
        let cases = [
            PaymentItemsConfig::default(),
            PaymentItemsConfig::new(vec![PaymentItemConfig::new(plan, 0)]),
            PaymentItemsConfig::new(vec![PaymentItemConfig::new(plan, 1).with_price(-1)]),
            PaymentItemsConfig::new(vec![PaymentItemConfig::new(plan, 1).with_name("  ")]),
            PaymentItemsConfig::new(vec![
                PaymentItemConfig::new(plan, 1).with_meta(serde_json::json!([1, 2])),
            ]),
            PaymentItemsConfig::new(vec![PaymentItemConfig {
                no_vat: true,
                ..PaymentItemConfig::new(plan, 1).with_vat(10)
            }]),
        ];
        for config in cases {
            assert!(
                matches!(config.to_line_items(Uuid::new_v4()), Err(AppError::BadRequest(_))),
                "{:?} should be rejected",
                config
            );
        }
    }

    #[test]
    fn oversized_totals_are_rejected() {
        let plan = Uuid::new_v4();
        let line = PaymentItemsConfig::new(vec![PaymentItemConfig::new(plan, 3).with_price(i64::MAX / 2)]);
        assert!(matches!(line.net_total(), Err(AppError::BadRequest(_))));
        assert!(matches!(line.to_line_items(Uuid::new_v4()), Err(AppError::BadRequest(_))));

        let sum = PaymentItemsConfig::new(vec![
            PaymentItemConfig::new(plan, 1).with_price(i64::MAX),
            PaymentItemConfig::new(Uuid::new_v4(), 1).with_price(1),
        ]);
        assert!(matches!(sum.validate(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn deserializes_with_defaults() {
        let plan = Uuid::new_v4();
        let config: PaymentItemsConfig = serde_json::from_value(serde_json::json!({
            "items": [{ "plan_id": plan, "count": 2 }]
        }))
        .unwrap();
        assert_eq!(config.items[0], PaymentItemConfig::new(plan, 2));
        assert_eq!(config.net_total().unwrap(), 0);
    }
}
