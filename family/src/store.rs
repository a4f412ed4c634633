//! Collaborator seams of the family engine.
//!
//! Every engine operation runs against one [`Backend::Tx`], a unit of work
//! that sees the request store, the plan registry and the subscription and
//! payment collaborators through the traits below. Nothing is visible to
//! other transactions until [`Backend::commit`]; dropping a transaction
//! discards it.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use common::error::Res;
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
use uuid::Uuid;

/// Persistence of family requests.
#[async_trait]
pub trait RequestStore: Send {
    async fn request_by_id(&mut self, request_id: Uuid) -> Res<Option<FamilyRequest>>;

    /// Reads a request and keeps it locked for the rest of the transaction.
    async fn request_for_update(&mut self, request_id: Uuid) -> Res<Option<FamilyRequest>>;

    async fn request_by_code(&mut self, code: &str) -> Res<Option<FamilyRequest>>;

    /// All requests of a payer subscription, oldest first.
    async fn requests_by_master(&mut self, master_subscription_id: Uuid)
    -> Res<Vec<FamilyRequest>>;

    async fn request_by_slave_subscription(
        &mut self,
        slave_subscription_id: Uuid,
    ) -> Res<Option<FamilyRequest>>;

    async fn has_accepted_request(
        &mut self,
        master_subscription_id: Uuid,
        slave_user_id: Uuid,
    ) -> Res<bool>;

    async fn insert_request(&mut self, data: RequestCreateRequest) -> Res<FamilyRequest>;

    /// Compare-and-swap `created -> accepted`. `None` means the request was
    /// not `created` anymore.
    async fn accept_request(
        &mut self,
        request_id: Uuid,
        data: RequestAcceptRequest,
    ) -> Res<Option<FamilyRequest>>;

    async fn link_slave_subscription(
        &mut self,
        request_id: Uuid,
        slave_subscription_id: Uuid,
    ) -> Res<FamilyRequest>;

    /// Compare-and-swap `accepted -> canceled`.
    async fn cancel_request(
        &mut self,
        request_id: Uuid,
        now: NaiveDateTime,
    ) -> Res<Option<FamilyRequest>>;

    async fn mark_opened(&mut self, request_id: Uuid, now: NaiveDateTime) -> Res<FamilyRequest>;

    async fn update_note(
        &mut self,
        request_id: Uuid,
        note: Option<String>,
        now: NaiveDateTime,
    ) -> Res<FamilyRequest>;

    async fn update_expiry(
        &mut self,
        request_id: Uuid,
        expires_at: Option<NaiveDateTime>,
        now: NaiveDateTime,
    ) -> Res<FamilyRequest>;
}

/// Which plans are shareable and how.
#[async_trait]
pub trait PlanRegistry: Send {
    async fn plan_link(&mut self, master_plan_id: Uuid) -> Res<Option<PlanLink>>;

    async fn master_plan_ids(&mut self) -> Res<Vec<Uuid>>;
}

/// The subscriptions collaborator.
#[async_trait]
pub trait Subscriptions: Send {
    async fn subscription(&mut self, subscription_id: Uuid) -> Res<Option<Subscription>>;

    /// Serializes work on one payer subscription for the rest of the transaction.
    async fn lock_subscription(&mut self, subscription_id: Uuid) -> Res<()>;

    async fn create_subscription(&mut self, data: SubscriptionCreateRequest) -> Res<Subscription>;

    async fn update_subscription_range(
        &mut self,
        subscription_id: Uuid,
        data: SubscriptionRangeUpdate,
    ) -> Res<Subscription>;

    /// Ends the subscription at `now`; `false` if it had already ended.
    async fn stop_subscription(&mut self, subscription_id: Uuid, now: NaiveDateTime) -> Res<bool>;

    /// Where a day-based extension for `user_id` on `plan_id` should start:
    /// the end of their latest running subscription, or `now`.
    async fn extension_anchor(
        &mut self,
        plan_id: Uuid,
        user_id: Uuid,
        now: NaiveDateTime,
    ) -> Res<NaiveDateTime>;

    async fn lineage_candidates(&mut self, filter: LineageFilter) -> Res<Vec<Subscription>>;
}

/// The payments collaborator. Read-mostly: charging is not our business.
#[async_trait]
pub trait Payments: Send {
    async fn purchase_for(&mut self, subscription_id: Uuid) -> Res<Option<Payment>>;

    async fn payment(&mut self, payment_id: Uuid) -> Res<Option<Payment>>;

    async fn line_items(&mut self, payment_id: Uuid, item_type: &str) -> Res<Vec<PaymentItem>>;

    async fn payment_meta(&mut self, payment_id: Uuid, key: &str) -> Res<Option<String>>;

    async fn add_line_item(&mut self, data: PaymentItemCreateRequest) -> Res<PaymentItem>;
}

/// Key/value metadata attached to subscriptions.
#[async_trait]
pub trait SubscriptionMeta: Send {
    async fn subscription_meta(&mut self, subscription_id: Uuid, key: &str)
    -> Res<Option<String>>;

    async fn set_subscription_meta(
        &mut self,
        subscription_id: Uuid,
        key: &str,
        value: &str,
    ) -> Res<()>;
}

/// Everything an engine operation may touch inside one transaction.
pub trait FamilyRepo: RequestStore + PlanRegistry + Subscriptions + Payments + SubscriptionMeta {}

impl<T> FamilyRepo for T where T: RequestStore + PlanRegistry + Subscriptions + Payments + SubscriptionMeta
{}

/// Hands out transactions over a [`FamilyRepo`].
#[async_trait]
pub trait Backend: Send + Sync {
    type Tx: FamilyRepo;

    async fn begin(&self) -> Res<Self::Tx>;

    async fn commit(&self, tx: Self::Tx) -> Res<()>;
}
