//! In-memory backend.
//!
//! A transaction holds the state lock from `begin` until it is committed or
//! dropped and works on a private copy, so transactions are serialized and
//! a dropped transaction leaves no trace. Used by the test suites and handy
//! for local tooling.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use common::{
    error::{AppError, Res},
    misc::{ProvisioningMethod, RequestStatus},
};
use db::{
    dtos::{
        payment::PaymentItemCreateRequest,
        request::{RequestAcceptRequest, RequestCreateRequest},
        subscription::{LineageFilter, SubscriptionCreateRequest, SubscriptionRangeUpdate},
    },
    models::{
        payment::{Payment, PaymentItem},
        plan_link::PlanLink,
        request::FamilyRequest,
        subscription::Subscription,
    },
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::store::{
    Backend, Payments, PlanRegistry, RequestStore, SubscriptionMeta, Subscriptions,
};

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub requests: Vec<FamilyRequest>,
    pub plan_links: Vec<PlanLink>,
    pub subscriptions: Vec<Subscription>,
    pub subscription_meta: HashMap<(Uuid, String), String>,
    pub payments: Vec<Payment>,
    pub payment_items: Vec<PaymentItem>,
    pub payment_meta: HashMap<(Uuid, String), String>,
}

impl MemoryState {
    pub fn request(&self, request_id: Uuid) -> Option<&FamilyRequest> {
        self.requests.iter().find(|r| r.id == request_id)
    }

    pub fn requests_of(&self, master_subscription_id: Uuid) -> Vec<FamilyRequest> {
        self.requests
            .iter()
            .filter(|r| r.master_subscription_id == master_subscription_id)
            .cloned()
            .collect()
    }

    pub fn subscription(&self, subscription_id: Uuid) -> Option<&Subscription> {
        self.subscriptions.iter().find(|s| s.id == subscription_id)
    }

    pub fn subscriptions_of(&self, user_id: Uuid) -> Vec<Subscription> {
        self.subscriptions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn meta(&self, subscription_id: Uuid, key: &str) -> Option<&String> {
        self.subscription_meta.get(&(subscription_id, key.to_string()))
    }

    fn request_mut(&mut self, request_id: Uuid) -> Res<&mut FamilyRequest> {
        self.requests
            .iter_mut()
            .find(|r| r.id == request_id)
            .ok_or_else(|| AppError::NotFound(format!("Family request {}", request_id)))
    }

    fn subscription_mut(&mut self, subscription_id: Uuid) -> Res<&mut Subscription> {
        self.subscriptions
            .iter_mut()
            .find(|s| s.id == subscription_id)
            .ok_or_else(|| AppError::NotFound(format!("Subscription {}", subscription_id)))
    }

    fn insert_subscription(&mut self, data: SubscriptionCreateRequest) -> Subscription {
        let now = Utc::now().naive_utc();
        let subscription = Subscription {
            id: Uuid::new_v4(),
            user_id: data.user_id,
            plan_id: data.plan_id,
            start_time: data.start_time,
            end_time: data.end_time,
            is_paid: data.is_paid,
            origin: data.origin,
            created_at: now,
            updated_at: now,
        };
        self.subscriptions.push(subscription.clone());
        subscription
    }

    fn insert_payment_item(&mut self, data: PaymentItemCreateRequest) -> PaymentItem {
        let item = PaymentItem {
            id: Uuid::new_v4(),
            payment_id: data.payment_id,
            item_type: data.item_type,
            plan_id: data.plan_id,
            unit_count: data.unit_count,
            unit_price: data.unit_price,
            vat: data.vat,
            no_vat: data.no_vat,
            name: data.name,
            meta: data.meta,
        };
        self.payment_items.push(item.clone());
        item
    }
}

/// Shared in-memory store; clones see the same state.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend::default()
    }

    /// Copy of the committed state.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    pub async fn link_plan(
        &self,
        master_plan_id: Uuid,
        slave_plan_id: Option<Uuid>,
        provisioning_method: ProvisioningMethod,
        seat_count: i32,
        is_paid: bool,
    ) -> PlanLink {
        let link = PlanLink {
            id: Uuid::new_v4(),
            master_plan_id,
            slave_plan_id,
            provisioning_method,
            seat_count,
            is_paid,
        };
        let mut state = self.state.lock().await;
        state.plan_links.retain(|l| l.master_plan_id != master_plan_id);
        state.plan_links.push(link.clone());
        link
    }

    pub async fn add_subscription(&self, data: SubscriptionCreateRequest) -> Subscription {
        self.state.lock().await.insert_subscription(data)
    }

    /// Edits a subscription the way an external admin tool would.
    pub async fn set_subscription_range(
        &self,
        subscription_id: Uuid,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
    ) -> Res<Subscription> {
        let mut state = self.state.lock().await;
        let subscription = state.subscription_mut(subscription_id)?;
        subscription.start_time = start_time;
        subscription.end_time = end_time;
        Ok(subscription.clone())
    }

    pub async fn add_payment(
        &self,
        user_id: Uuid,
        subscription_id: Option<Uuid>,
        recurring_parent_id: Option<Uuid>,
    ) -> Payment {
        let payment = Payment {
            id: Uuid::new_v4(),
            user_id,
            subscription_id,
            recurring_parent_id,
            created_at: Utc::now().naive_utc(),
        };
        self.state.lock().await.payments.push(payment.clone());
        payment
    }

    pub async fn add_payment_item(&self, data: PaymentItemCreateRequest) -> PaymentItem {
        self.state.lock().await.insert_payment_item(data)
    }

    pub async fn set_payment_meta(&self, payment_id: Uuid, key: &str, value: &str) {
        self.state
            .lock()
            .await
            .payment_meta
            .insert((payment_id, key.to_string()), value.to_string());
    }

    pub async fn set_subscription_meta(&self, subscription_id: Uuid, key: &str, value: &str) {
        self.state
            .lock()
            .await
            .subscription_meta
            .insert((subscription_id, key.to_string()), value.to_string());
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    type Tx = MemoryTx;

    async fn begin(&self) -> Res<MemoryTx> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(MemoryTx { guard, work })
    }

    async fn commit(&self, tx: MemoryTx) -> Res<()> {
        let MemoryTx { mut guard, work } = tx;
        *guard = work;
        Ok(())
    }
}

#[async_trait]
impl RequestStore for MemoryTx {
    async fn request_by_id(&mut self, request_id: Uuid) -> Res<Option<FamilyRequest>> {
        Ok(self.work.request(request_id).cloned())
    }

    async fn request_for_update(&mut self, request_id: Uuid) -> Res<Option<FamilyRequest>> {
        Ok(self.work.request(request_id).cloned())
    }

    async fn request_by_code(&mut self, code: &str) -> Res<Option<FamilyRequest>> {
        Ok(self.work.requests.iter().find(|r| r.code == code).cloned())
    }

    async fn requests_by_master(
        &mut self,
        master_subscription_id: Uuid,
    ) -> Res<Vec<FamilyRequest>> {
        Ok(self.work.requests_of(master_subscription_id))
    }

    async fn request_by_slave_subscription(
        &mut self,
        slave_subscription_id: Uuid,
    ) -> Res<Option<FamilyRequest>> {
        Ok(self
            .work
            .requests
            .iter()
            .find(|r| r.slave_subscription_id == Some(slave_subscription_id))
            .cloned())
    }

    async fn has_accepted_request(
        &mut self,
        master_subscription_id: Uuid,
        slave_user_id: Uuid,
    ) -> Res<bool> {
        Ok(self.work.requests.iter().any(|r| {
            r.master_subscription_id == master_subscription_id
                && r.slave_user_id == Some(slave_user_id)
                && r.status == RequestStatus::Accepted
        }))
    }

    async fn insert_request(&mut self, data: RequestCreateRequest) -> Res<FamilyRequest> {
        if self.work.requests.iter().any(|r| r.code == data.code) {
            return Err(AppError::Internal(format!(
                "Duplicate family request code {}",
                data.code
            )));
        }
        let request = FamilyRequest {
            id: Uuid::new_v4(),
            code: data.code,
            master_user_id: data.master_user_id,
            master_subscription_id: data.master_subscription_id,
            slave_plan_id: data.slave_plan_id,
            slave_subscription_id: None,
            slave_user_id: None,
            status: RequestStatus::Created,
            note: None,
            created_at: data.now,
            updated_at: data.now,
            opened_at: None,
            accepted_at: None,
            canceled_at: None,
            expires_at: data.expires_at,
        };
        self.work.requests.push(request.clone());
        Ok(request)
    }

    async fn accept_request(
        &mut self,
        request_id: Uuid,
        data: RequestAcceptRequest,
    ) -> Res<Option<FamilyRequest>> {
        let request = self.work.request_mut(request_id)?;
        if request.status != RequestStatus::Created {
            return Ok(None);
        }
        request.status = RequestStatus::Accepted;
        request.slave_user_id = Some(data.slave_user_id);
        request.accepted_at = Some(data.now);
        request.updated_at = data.now;
        Ok(Some(request.clone()))
    }

    async fn link_slave_subscription(
        &mut self,
        request_id: Uuid,
        slave_subscription_id: Uuid,
    ) -> Res<FamilyRequest> {
        let request = self.work.request_mut(request_id)?;
        request.slave_subscription_id = Some(slave_subscription_id);
        Ok(request.clone())
    }

    async fn cancel_request(
        &mut self,
        request_id: Uuid,
        now: NaiveDateTime,
    ) -> Res<Option<FamilyRequest>> {
        let request = self.work.request_mut(request_id)?;
        if request.status != RequestStatus::Accepted {
            return Ok(None);
        }
        request.status = RequestStatus::Canceled;
        request.canceled_at = Some(now);
        request.updated_at = now;
        Ok(Some(request.clone()))
    }

    async fn mark_opened(&mut self, request_id: Uuid, now: NaiveDateTime) -> Res<FamilyRequest> {
        let request = self.work.request_mut(request_id)?;
        request.opened_at.get_or_insert(now);
        Ok(request.clone())
    }

    async fn update_note(
        &mut self,
        request_id: Uuid,
        note: Option<String>,
        now: NaiveDateTime,
    ) -> Res<FamilyRequest> {
        let request = self.work.request_mut(request_id)?;
        request.note = note;
        request.updated_at = now;
        Ok(request.clone())
    }

    async fn update_expiry(
        &mut self,
        request_id: Uuid,
        expires_at: Option<NaiveDateTime>,
        now: NaiveDateTime,
    ) -> Res<FamilyRequest> {
        let request = self.work.request_mut(request_id)?;
        request.expires_at = expires_at;
        request.updated_at = now;
        Ok(request.clone())
    }
}

#[async_trait]
impl PlanRegistry for MemoryTx {
    async fn plan_link(&mut self, master_plan_id: Uuid) -> Res<Option<PlanLink>> {
        Ok(self
            .work
            .plan_links
            .iter()
            .find(|l| l.master_plan_id == master_plan_id)
            .cloned())
    }

    async fn master_plan_ids(&mut self) -> Res<Vec<Uuid>> {
        Ok(self
            .work
            .plan_links
            .iter()
            .map(|l| l.master_plan_id)
            .collect())
    }
}

#[async_trait]
impl Subscriptions for MemoryTx {
    async fn subscription(&mut self, subscription_id: Uuid) -> Res<Option<Subscription>> {
        Ok(self.work.subscription(subscription_id).cloned())
    }

    async fn lock_subscription(&mut self, _subscription_id: Uuid) -> Res<()> {
        Ok(())
    }

    async fn create_subscription(&mut self, data: SubscriptionCreateRequest) -> Res<Subscription> {
        Ok(self.work.insert_subscription(data))
    }

    async fn update_subscription_range(
        &mut self,
        subscription_id: Uuid,
        data: SubscriptionRangeUpdate,
    ) -> Res<Subscription> {
        let subscription = self.work.subscription_mut(subscription_id)?;
        subscription.start_time = data.start_time;
        subscription.end_time = data.end_time;
        Ok(subscription.clone())
    }

    async fn stop_subscription(&mut self, subscription_id: Uuid, now: NaiveDateTime) -> Res<bool> {
        let subscription = self.work.subscription_mut(subscription_id)?;
        if subscription.end_time <= now {
            return Ok(false);
        }
        subscription.end_time = now.max(subscription.start_time);
        subscription.updated_at = now;
        Ok(true)
    }

    async fn extension_anchor(
        &mut self,
        plan_id: Uuid,
        user_id: Uuid,
        now: NaiveDateTime,
    ) -> Res<NaiveDateTime> {
        Ok(self
            .work
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id && s.plan_id == plan_id && s.end_time > now)
            .map(|s| s.end_time)
            .max()
            .unwrap_or(now))
    }

    async fn lineage_candidates(&mut self, filter: LineageFilter) -> Res<Vec<Subscription>> {
        let mut candidates: Vec<Subscription> = self
            .work
            .subscriptions
            .iter()
            .filter(|s| {
                s.user_id == filter.user_id
                    && s.id != filter.exclude_id
                    && filter.plan_ids.contains(&s.plan_id)
                    && s.end_time >= filter.ending_after
                    && s.end_time <= filter.ending_before
            })
            .cloned()
            .collect();
        candidates.sort_by(|a, b| b.end_time.cmp(&a.end_time));
        Ok(candidates)
    }
}

#[async_trait]
impl Payments for MemoryTx {
    async fn purchase_for(&mut self, subscription_id: Uuid) -> Res<Option<Payment>> {
        Ok(self
            .work
            .payments
            .iter()
            .filter(|p| p.subscription_id == Some(subscription_id))
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn payment(&mut self, payment_id: Uuid) -> Res<Option<Payment>> {
        Ok(self.work.payments.iter().find(|p| p.id == payment_id).cloned())
    }

    async fn line_items(&mut self, payment_id: Uuid, item_type: &str) -> Res<Vec<PaymentItem>> {
        Ok(self
            .work
            .payment_items
            .iter()
            .filter(|i| i.payment_id == payment_id && i.item_type == item_type)
            .cloned()
            .collect())
    }

    async fn payment_meta(&mut self, payment_id: Uuid, key: &str) -> Res<Option<String>> {
        Ok(self
            .work
            .payment_meta
            .get(&(payment_id, key.to_string()))
            .cloned())
    }

    async fn add_line_item(&mut self, data: PaymentItemCreateRequest) -> Res<PaymentItem> {
        Ok(self.work.insert_payment_item(data))
    }
}

#[async_trait]
impl SubscriptionMeta for MemoryTx {
    async fn subscription_meta(
        &mut self,
        subscription_id: Uuid,
        key: &str,
    ) -> Res<Option<String>> {
        Ok(self.work.meta(subscription_id, key).cloned())
    }

    async fn set_subscription_meta(
        &mut self,
        subscription_id: Uuid,
        key: &str,
        value: &str,
    ) -> Res<()> {
        self.work
            .subscription_meta
            .insert((subscription_id, key.to_string()), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let backend = MemoryBackend::new();
        let subscription_id = Uuid::new_v4();

        {
            let mut tx = backend.begin().await.unwrap();
            tx.set_subscription_meta(subscription_id, "k", "v")
                .await
                .unwrap();
        }
        assert!(backend.snapshot().await.meta(subscription_id, "k").is_none());

        let mut tx = backend.begin().await.unwrap();
        tx.set_subscription_meta(subscription_id, "k", "v")
            .await
            .unwrap();
        backend.commit(tx).await.unwrap();
        assert_eq!(
            backend.snapshot().await.meta(subscription_id, "k").map(String::as_str),
            Some("v")
        );
    }
}
