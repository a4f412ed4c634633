#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use common::{clock::FixedClock, env_config::FamilyConfig, misc::ProvisioningMethod};
use db::{
    dtos::{payment::PaymentItemCreateRequest, subscription::SubscriptionCreateRequest},
    models::subscription::Subscription,
};
use family::{FamilyService, MemoryBackend, MemoryEventBus, provisioning::ITEM_TYPE_SUBSCRIPTION};
use uuid::Uuid;

/// Midnight of the given day of January 2025 (later days roll over).
pub fn day(n: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::days(n - 1)
}

pub struct Harness {
    pub backend: MemoryBackend,
    pub clock: Arc<FixedClock>,
    pub events: Arc<MemoryEventBus>,
    pub service: FamilyService<MemoryBackend>,
    pub payer: Uuid,
}

impl Harness {
    /// Empty store, clock on the 15th of January.
    pub fn new() -> Self {
        let backend = MemoryBackend::new();
        let clock = Arc::new(FixedClock::new(day(15)));
        let events = Arc::new(MemoryEventBus::new());
        let service = FamilyService::new(backend.clone(), FamilyConfig::default())
            .with_clock(clock.clone())
            .with_event_bus(events.clone());
        Harness {
            backend,
            clock,
            events,
            service,
            payer: Uuid::new_v4(),
        }
    }

    /// Links a fresh payer plan to a fresh dependent plan.
    pub async fn plan(&self, method: ProvisioningMethod, seats: i32) -> (Uuid, Uuid) {
        let (master_plan, slave_plan) = (Uuid::new_v4(), Uuid::new_v4());
        self.backend
            .link_plan(master_plan, Some(slave_plan), method, seats, true)
            .await;
        (master_plan, slave_plan)
    }

    pub async fn subscription(&self, plan_id: Uuid, from: i64, to: i64) -> Subscription {
        self.backend
            .add_subscription(SubscriptionCreateRequest {
                user_id: self.payer,
                plan_id,
                start_time: day(from),
                end_time: day(to),
                is_paid: true,
                origin: "purchase".to_string(),
            })
            .await
    }

    /// Records a purchase of `quantity` units of `plan_id` for `subscription`.
    pub async fn purchase(&self, subscription: &Subscription, plan_id: Uuid, quantity: i32) -> Uuid {
        let payment = self
            .backend
            .add_payment(subscription.user_id, Some(subscription.id), None)
            .await;
        self.backend
            .add_payment_item(PaymentItemCreateRequest {
                payment_id: payment.id,
                item_type: ITEM_TYPE_SUBSCRIPTION.to_string(),
                plan_id: Some(plan_id),
                unit_count: quantity,
                unit_price: 1000,
                vat: None,
                no_vat: false,
                name: None,
                meta: serde_json::json!({}),
            })
            .await;
        payment.id
    }
}
