use std::sync::Arc;

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
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::store::{
    Backend, Payments, PlanRegistry, RequestStore, SubscriptionMeta, Subscriptions,
};

/// Postgres backend; one engine operation is one database transaction.
#[derive(Clone)]
pub struct PgBackend {
    pool: Arc<PgPool>,
}

impl PgBackend {
    pub fn new(pool: Arc<PgPool>) -> Self {
        PgBackend { pool }
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl Backend for PgBackend {
    type Tx = PgTx;

    async fn begin(&self) -> Res<PgTx> {
        let tx = self.pool.begin().await?;
        Ok(PgTx { tx })
    }

    async fn commit(&self, tx: PgTx) -> Res<()> {
        tx.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl RequestStore for PgTx {
    async fn request_by_id(&mut self, request_id: Uuid) -> Res<Option<FamilyRequest>> {
        db::request::get_request_by_id(&mut *self.tx, request_id).await
    }

    async fn request_for_update(&mut self, request_id: Uuid) -> Res<Option<FamilyRequest>> {
        db::request::get_request_for_update(&mut *self.tx, request_id).await
    }

    async fn request_by_code(&mut self, code: &str) -> Res<Option<FamilyRequest>> {
        db::request::get_request_by_code(&mut *self.tx, code).await
    }

    async fn requests_by_master(
        &mut self,
        master_subscription_id: Uuid,
    ) -> Res<Vec<FamilyRequest>> {
        db::request::get_requests_by_master_subscription(&mut *self.tx, master_subscription_id)
            .await
    }

    async fn request_by_slave_subscription(
        &mut self,
        slave_subscription_id: Uuid,
    ) -> Res<Option<FamilyRequest>> {
        db::request::get_request_by_slave_subscription(&mut *self.tx, slave_subscription_id).await
    }

    async fn has_accepted_request(
        &mut self,
        master_subscription_id: Uuid,
        slave_user_id: Uuid,
    ) -> Res<bool> {
        db::request::exists_accepted_request_for_user(
            &mut *self.tx,
            master_subscription_id,
            slave_user_id,
        )
        .await
    }

    async fn insert_request(&mut self, data: RequestCreateRequest) -> Res<FamilyRequest> {
        db::request::insert_request(&mut *self.tx, data).await
    }

    async fn accept_request(
        &mut self,
        request_id: Uuid,
        data: RequestAcceptRequest,
    ) -> Res<Option<FamilyRequest>> {
        db::request::accept_request(&mut *self.tx, request_id, data).await
    }

    async fn link_slave_subscription(
        &mut self,
        request_id: Uuid,
        slave_subscription_id: Uuid,
    ) -> Res<FamilyRequest> {
        db::request::link_request_slave_subscription(
            &mut *self.tx,
            request_id,
            slave_subscription_id,
        )
        .await
    }

    async fn cancel_request(
        &mut self,
        request_id: Uuid,
        now: NaiveDateTime,
    ) -> Res<Option<FamilyRequest>> {
        db::request::cancel_request(&mut *self.tx, request_id, now).await
    }

    async fn mark_opened(&mut self, request_id: Uuid, now: NaiveDateTime) -> Res<FamilyRequest> {
        db::request::mark_request_opened(&mut *self.tx, request_id, now).await
    }

    async fn update_note(
        &mut self,
        request_id: Uuid,
        note: Option<String>,
        now: NaiveDateTime,
    ) -> Res<FamilyRequest> {
        db::request::update_request_note(&mut *self.tx, request_id, note, now).await
    }

    async fn update_expiry(
        &mut self,
        request_id: Uuid,
        expires_at: Option<NaiveDateTime>,
        now: NaiveDateTime,
    ) -> Res<FamilyRequest> {
        db::request::update_request_expiry(&mut *self.tx, request_id, expires_at, now).await
    }
}

#[async_trait]
impl PlanRegistry for PgTx {
    async fn plan_link(&mut self, master_plan_id: Uuid) -> Res<Option<PlanLink>> {
        db::plan_link::get_plan_link_by_master_plan(&mut *self.tx, master_plan_id).await
    }

    async fn master_plan_ids(&mut self) -> Res<Vec<Uuid>> {
        db::plan_link::get_master_plan_ids(&mut *self.tx).await
    }
}

#[async_trait]
impl Subscriptions for PgTx {
    async fn subscription(&mut self, subscription_id: Uuid) -> Res<Option<Subscription>> {
        db::subscription::get_subscription_by_id(&mut *self.tx, subscription_id).await
    }

    async fn lock_subscription(&mut self, subscription_id: Uuid) -> Res<()> {
        db::subscription::lock_subscription(&mut *self.tx, subscription_id).await
    }

    async fn create_subscription(&mut self, data: SubscriptionCreateRequest) -> Res<Subscription> {
        db::subscription::insert_subscription(&mut *self.tx, data).await
    }

    async fn update_subscription_range(
        &mut self,
        subscription_id: Uuid,
        data: SubscriptionRangeUpdate,
    ) -> Res<Subscription> {
        db::subscription::update_subscription_range(&mut *self.tx, subscription_id, data).await
    }

    async fn stop_subscription(&mut self, subscription_id: Uuid, now: NaiveDateTime) -> Res<bool> {
        db::subscription::stop_subscription(&mut *self.tx, subscription_id, now).await
    }

    async fn extension_anchor(
        &mut self,
        plan_id: Uuid,
        user_id: Uuid,
        now: NaiveDateTime,
    ) -> Res<NaiveDateTime> {
        let latest =
            db::subscription::get_latest_running_end_time(&mut *self.tx, user_id, plan_id, now)
                .await?;
        Ok(latest.unwrap_or(now))
    }

    async fn lineage_candidates(&mut self, filter: LineageFilter) -> Res<Vec<Subscription>> {
        db::subscription::get_lineage_candidates(&mut *self.tx, filter).await
    }
}

#[async_trait]
impl Payments for PgTx {
    async fn purchase_for(&mut self, subscription_id: Uuid) -> Res<Option<Payment>> {
        db::payment::get_payment_by_subscription(&mut *self.tx, subscription_id).await
    }

    async fn payment(&mut self, payment_id: Uuid) -> Res<Option<Payment>> {
        db::payment::get_payment_by_id(&mut *self.tx, payment_id).await
    }

    async fn line_items(&mut self, payment_id: Uuid, item_type: &str) -> Res<Vec<PaymentItem>> {
        db::payment::get_payment_items(&mut *self.tx, payment_id, item_type).await
    }

    async fn payment_meta(&mut self, payment_id: Uuid, key: &str) -> Res<Option<String>> {
        db::payment::get_payment_meta(&mut *self.tx, payment_id, key).await
    }

    async fn add_line_item(&mut self, data: PaymentItemCreateRequest) -> Res<PaymentItem> {
        db::payment::insert_payment_item(&mut *self.tx, data).await
    }
}

#[async_trait]
impl SubscriptionMeta for PgTx {
    async fn subscription_meta(
        &mut self,
        subscription_id: Uuid,
        key: &str,
    ) -> Res<Option<String>> {
        db::meta::get_subscription_meta(&mut *self.tx, subscription_id, key).await
    }

    async fn set_subscription_meta(
        &mut self,
        subscription_id: Uuid,
        key: &str,
        value: &str,
    ) -> Res<()> {
        db::meta::set_subscription_meta(&mut *self.tx, subscription_id, key, value).await
    }
}
