use std::sync::Arc;

use chrono::NaiveDateTime;
use common::{
    clock::{Clock, SystemClock},
    env_config::FamilyConfig,
    error::{AppError, Res},
    misc::RequestStatus,
};
use db::models::{payment::PaymentItem, request::FamilyRequest, subscription::Subscription};
use uuid::Uuid;

use crate::{
    context::Ctx,
    events::{EventBus, LogEventBus},
    items::PaymentItemsConfig,
    services::{
        donation::{self, Donation},
        generator,
        lifecycle::{self, ShortenOutcome},
        renewal::{self, RenewalOutcome},
    },
    store::{Backend, FamilyRepo, Payments, RequestStore},
};

const MAX_NOTE_LEN: usize = 500;

/// Entry point of the family engine.
///
/// Every operation runs in one transaction of the backend; the events it
/// produced are published after that transaction committed.
pub struct FamilyService<B: Backend> {
    backend: B,
    config: FamilyConfig,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventBus>,
}

impl<B: Backend> FamilyService<B> {
    pub fn new(backend: B, config: FamilyConfig) -> Self {
        FamilyService {
            backend,
            config,
            clock: Arc::new(SystemClock),
            events: Arc::new(LogEventBus),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_bus(mut self, events: Arc<dyn EventBus>) -> Self {
        self.events = events;
        self
    }

    fn ctx(&self) -> Ctx<'_> {
        Ctx::new(&self.config, self.clock.now())
    }

    async fn finish(&self, tx: B::Tx, ctx: Ctx<'_>) -> Res<()> {
        self.backend.commit(tx).await?;
        for event in &ctx.events {
            self.events.publish(event);
        }
        Ok(())
    }

    /// Tops up the requests of a payer subscription. Fails with
    /// [`AppError::MissingPlanLink`] when its plan is not shareable.
    pub async fn generate(&self, subscription_id: Uuid) -> Res<Vec<FamilyRequest>> {
        let mut ctx = self.ctx();
        let mut tx = self.backend.begin().await?;
        let subscription = load_subscription(&mut tx, subscription_id).await?;
        let created = generator::generate(&mut tx, &mut ctx, &subscription).await?;
        self.finish(tx, ctx).await?;
        Ok(created)
    }

    /// Tops up, then lists every request of the subscription. Subscriptions
    /// of unshareable plans simply have none.
    pub async fn ensure_requests(&self, subscription_id: Uuid) -> Res<Vec<FamilyRequest>> {
        let mut ctx = self.ctx();
        let mut tx = self.backend.begin().await?;
        let subscription = load_subscription(&mut tx, subscription_id).await?;
        match generator::generate(&mut tx, &mut ctx, &subscription).await {
            Ok(_) => {}
            Err(e) if e.is_missing_plan_link() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        }
        let requests = tx.requests_by_master(subscription.id).await?;
        self.finish(tx, ctx).await?;
        Ok(requests)
    }

    pub async fn subscription(&self, subscription_id: Uuid) -> Res<Subscription> {
        let mut tx = self.backend.begin().await?;
        load_subscription(&mut tx, subscription_id).await
    }

    pub async fn requests_for(&self, subscription_id: Uuid) -> Res<Vec<FamilyRequest>> {
        let mut tx = self.backend.begin().await?;
        tx.requests_by_master(subscription_id).await
    }

    pub async fn request(&self, request_id: Uuid) -> Res<FamilyRequest> {
        let mut tx = self.backend.begin().await?;
        load_request(&mut tx, request_id).await
    }

    pub async fn find_by_code(&self, code: &str) -> Res<FamilyRequest> {
        let mut tx = self.backend.begin().await?;
        load_request_by_code(&mut tx, code).await
    }

    /// Looks a request up by code on behalf of a recipient viewing the
    /// invitation, recording the first view.
    pub async fn open(&self, code: &str) -> Res<FamilyRequest> {
        let ctx = self.ctx();
        let mut tx = self.backend.begin().await?;
        let request = load_request_by_code(&mut tx, code).await?;
        if request.opened_at.is_some() {
            return Ok(request);
        }
        let request = tx.mark_opened(request.id, ctx.now).await?;
        self.finish(tx, ctx).await?;
        Ok(request)
    }

    pub async fn donate(&self, recipient: Uuid, request_id: Uuid) -> Res<Donation> {
        let mut ctx = self.ctx();
        let mut tx = self.backend.begin().await?;
        let donation = donation::donate(&mut tx, &mut ctx, recipient, request_id).await?;
        self.finish(tx, ctx).await?;
        Ok(donation)
    }

    pub async fn donate_code(&self, recipient: Uuid, code: &str) -> Res<Donation> {
        let mut ctx = self.ctx();
        let mut tx = self.backend.begin().await?;
        let request = load_request_by_code(&mut tx, code).await?;
        let donation = donation::donate(&mut tx, &mut ctx, recipient, request.id).await?;
        self.finish(tx, ctx).await?;
        Ok(donation)
    }

    pub async fn release(&self, request_id: Uuid) -> Res<FamilyRequest> {
        let mut ctx = self.ctx();
        let mut tx = self.backend.begin().await?;
        let request = donation::release(&mut tx, &mut ctx, request_id).await?;
        self.finish(tx, ctx).await?;
        Ok(request)
    }

    /// Sets the payer's note on a request; blank clears it.
    pub async fn set_note(&self, request_id: Uuid, note: Option<String>) -> Res<FamilyRequest> {
        let note = note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        if note.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTE_LEN) {
            return Err(AppError::BadRequest(format!(
                "Note is longer than {} characters",
                MAX_NOTE_LEN
            )));
        }

        let ctx = self.ctx();
        let mut tx = self.backend.begin().await?;
        let request = lock_request(&mut tx, request_id).await?;
        let request = tx.update_note(request.id, note, ctx.now).await?;
        self.finish(tx, ctx).await?;
        Ok(request)
    }

    /// Sets or clears the redemption deadline of an unredeemed request.
    pub async fn set_expiry(
        &self,
        request_id: Uuid,
        expires_at: Option<NaiveDateTime>,
    ) -> Res<FamilyRequest> {
        let ctx = self.ctx();
        let mut tx = self.backend.begin().await?;
        let request = lock_request(&mut tx, request_id).await?;
        if request.status != RequestStatus::Created {
            return Err(AppError::BadRequest(format!(
                "Family request {} is {}, its deadline cannot change",
                request.id, request.status
            )));
        }
        let request = tx.update_expiry(request.id, expires_at, ctx.now).await?;
        self.finish(tx, ctx).await?;
        Ok(request)
    }

    /// Stores the seat selection of a configurable purchase as its line items.
    pub async fn attach_payment_items(
        &self,
        payment_id: Uuid,
        items: &PaymentItemsConfig,
    ) -> Res<Vec<PaymentItem>> {
        let line_items = items.to_line_items(payment_id)?;

        let ctx = self.ctx();
        let mut tx = self.backend.begin().await?;
        if tx.payment(payment_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Payment {} not found", payment_id)));
        }
        let mut stored = Vec::with_capacity(line_items.len());
        for item in line_items {
            stored.push(tx.add_line_item(item).await?);
        }
        self.finish(tx, ctx).await?;
        Ok(stored)
    }

    /// A subscription was created: generate its requests, then carry the
    /// members of the previous period over.
    ///
    /// Generation commits on its own, so a failed chaining attempt keeps
    /// the new requests and leaves nothing half migrated.
    pub async fn on_subscription_created(&self, subscription_id: Uuid) -> Res<RenewalOutcome> {
        let mut ctx = self.ctx();
        let mut tx = self.backend.begin().await?;
        let subscription = load_subscription(&mut tx, subscription_id).await?;
        match generator::generate(&mut tx, &mut ctx, &subscription).await {
            Ok(_) => self.finish(tx, ctx).await?,
            Err(e) if e.is_missing_plan_link() => return Ok(RenewalOutcome::NotShareable),
            Err(e) => return Err(e),
        }

        let mut ctx = self.ctx();
        let mut tx = self.backend.begin().await?;
        let outcome = renewal::chain(&mut tx, &mut ctx, &subscription).await?;
        self.finish(tx, ctx).await?;
        Ok(outcome)
    }

    /// A subscription's range changed: mirror it onto `copy` dependents.
    pub async fn on_subscription_updated(&self, subscription_id: Uuid) -> Res<Vec<Subscription>> {
        let mut ctx = self.ctx();
        let mut tx = self.backend.begin().await?;
        let updated = match lifecycle::on_updated(&mut tx, &mut ctx, subscription_id).await {
            Ok(updated) => updated,
            Err(e) if e.is_missing_plan_link() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        self.finish(tx, ctx).await?;
        Ok(updated)
    }

    pub async fn on_subscription_shortened(&self, subscription_id: Uuid) -> Res<ShortenOutcome> {
        let mut ctx = self.ctx();
        let mut tx = self.backend.begin().await?;
        let outcome = lifecycle::on_shortened(&mut tx, &mut ctx, subscription_id).await?;
        self.finish(tx, ctx).await?;
        Ok(outcome)
    }
}

async fn load_subscription<R: FamilyRepo>(repo: &mut R, subscription_id: Uuid) -> Res<Subscription> {
    repo.subscription(subscription_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Subscription {} not found", subscription_id)))
}

async fn load_request<R: FamilyRepo>(repo: &mut R, request_id: Uuid) -> Res<FamilyRequest> {
    repo.request_by_id(request_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Family request {} not found", request_id)))
}

async fn lock_request<R: FamilyRepo>(repo: &mut R, request_id: Uuid) -> Res<FamilyRequest> {
    repo.request_for_update(request_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Family request {} not found", request_id)))
}

async fn load_request_by_code<R: FamilyRepo>(repo: &mut R, code: &str) -> Res<FamilyRequest> {
    repo.request_by_code(code.trim())
        .await?
        .ok_or_else(|| AppError::NotFound("No family request with this code".to_string()))
}
