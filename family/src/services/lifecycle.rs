use common::{
    error::{AppError, Res},
    misc::RequestStatus,
};
use db::{
    dtos::subscription::SubscriptionRangeUpdate,
    models::{request::FamilyRequest, subscription::Subscription},
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    context::Ctx,
    provisioning::{self, Provisioning},
    services::donation::release,
    store::FamilyRepo,
};

/// What shortening a subscription did to the family around it.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ShortenOutcome {
    /// A dependent subscription was cut short; its seat is given back.
    Released { request: FamilyRequest },
    /// A payer subscription was cut short; these dependents were stopped.
    Stopped { subscriptions: Vec<Uuid> },
    Unaffected,
}

async fn load<R: FamilyRepo>(repo: &mut R, subscription_id: Uuid) -> Res<Subscription> {
    repo.subscription(subscription_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Subscription {} not found", subscription_id)))
}

/// Mirrors a changed payer range onto the dependents of its accepted
/// requests. Only `copy` subscriptions follow their payer.
pub(crate) async fn on_updated<R: FamilyRepo>(
    repo: &mut R,
    ctx: &mut Ctx<'_>,
    subscription_id: Uuid,
) -> Res<Vec<Subscription>> {
    let master = load(repo, subscription_id).await?;
    let link = repo.plan_link(master.plan_id).await?.ok_or_else(|| {
        AppError::MissingPlanLink(format!("Plan {} is not shareable", master.plan_id))
    })?;
    if provisioning::resolve(repo, &link, &master, ctx.config).await? != Provisioning::Copy {
        return Ok(Vec::new());
    }

    repo.lock_subscription(master.id).await?;
    let mut updated = Vec::new();
    for request in repo.requests_by_master(master.id).await? {
        if request.status != RequestStatus::Accepted {
            continue;
        }
        let Some(slave_id) = request.slave_subscription_id else {
            continue;
        };
        let Some(slave) = repo.subscription(slave_id).await? else {
            log::warn!(
                "Dependent subscription {} of request {} is gone",
                slave_id,
                request.id
            );
            continue;
        };
        if slave.same_range(&master) {
            continue;
        }
        let slave = repo
            .update_subscription_range(
                slave.id,
                SubscriptionRangeUpdate {
                    start_time: master.start_time,
                    end_time: master.end_time,
                },
            )
            .await?;
        updated.push(slave);
    }

    if !updated.is_empty() {
        log::info!(
            "Synchronized {} dependent subscriptions with subscription {}",
            updated.len(),
            master.id
        );
    }
    Ok(updated)
}

/// Reacts to a subscription that ended early.
pub(crate) async fn on_shortened<R: FamilyRepo>(
    repo: &mut R,
    ctx: &mut Ctx<'_>,
    subscription_id: Uuid,
) -> Res<ShortenOutcome> {
    let subscription = load(repo, subscription_id).await?;

    if let Some(request) = repo.request_by_slave_subscription(subscription.id).await? {
        if request.status != RequestStatus::Accepted {
            return Ok(ShortenOutcome::Unaffected);
        }
        let master = load(repo, request.master_subscription_id).await?;
        if master.has_ended_at(ctx.now) {
            return Ok(ShortenOutcome::Unaffected);
        }
        let request = release(repo, ctx, request.id).await?;
        return Ok(ShortenOutcome::Released { request });
    }

    let requests = repo.requests_by_master(subscription.id).await?;
    if requests.is_empty() {
        return Ok(ShortenOutcome::Unaffected);
    }

    repo.lock_subscription(subscription.id).await?;
    let mut stopped = Vec::new();
    for request in requests {
        if request.status != RequestStatus::Accepted {
            continue;
        }
        if let Some(slave_id) = request.slave_subscription_id {
            if repo.stop_subscription(slave_id, ctx.now).await? {
                stopped.push(slave_id);
            }
        }
    }

    log::info!(
        "Subscription {} was shortened, stopped {} dependent subscriptions",
        subscription.id,
        stopped.len()
    );
    Ok(ShortenOutcome::Stopped {
        subscriptions: stopped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        memory::{MemoryBackend, MemoryTx},
        provisioning::META_SUBSCRIPTION_TYPE,
        services::{donation::donate, generator::generate},
        store::{Backend, RequestStore},
        testing::*,
    };
    use common::{env_config::FamilyConfig, misc::ProvisioningMethod};

    struct Setup {
        backend: MemoryBackend,
        config: FamilyConfig,
        master: Subscription,
        slaves: Vec<Subscription>,
    }

    async fn setup(members: usize) -> Setup {
        let backend = MemoryBackend::new();
        let config = FamilyConfig::default();
        let plan = Uuid::new_v4();
        backend
            .link_plan(plan, Some(Uuid::new_v4()), ProvisioningMethod::Copy, 3, true)
            .await;
        let master = running_subscription(&backend, Uuid::new_v4(), plan).await;

        let mut ctx = Ctx::new(&config, now());
        let mut tx = backend.begin().await.unwrap();
        let requests = generate(&mut tx, &mut ctx, &master).await.unwrap();
        let mut slaves = Vec::new();
        for request in requests.iter().take(members) {
            let donation = donate(&mut tx, &mut ctx, Uuid::new_v4(), request.id)
                .await
                .unwrap();
            slaves.push(donation.link.slave_subscription);
        }
        backend.commit(tx).await.unwrap();

        Setup {
            backend,
            config,
            master,
            slaves,
        }
    }

    impl Setup {
        async fn ctx_tx(&self) -> (Ctx<'_>, MemoryTx) {
            (Ctx::new(&self.config, now()), self.backend.begin().await.unwrap())
        }

        async fn updated(&self, subscription_id: Uuid) -> Res<Vec<Subscription>> {
            let (mut ctx, mut tx) = self.ctx_tx().await;
            let updated = on_updated(&mut tx, &mut ctx, subscription_id).await?;
            self.backend.commit(tx).await?;
            Ok(updated)
        }

        async fn shortened(&self, subscription_id: Uuid) -> Res<ShortenOutcome> {
            let (mut ctx, mut tx) = self.ctx_tx().await;
            let outcome = on_shortened(&mut tx, &mut ctx, subscription_id).await?;
            self.backend.commit(tx).await?;
            Ok(outcome)
        }

        async fn release_slave(&self, slave_subscription_id: Uuid) -> Res<FamilyRequest> {
            let (mut ctx, mut tx) = self.ctx_tx().await;
            let request = tx
                .request_by_slave_subscription(slave_subscription_id)
                .await?
                .unwrap();
            let released = release(&mut tx, &mut ctx, request.id).await?;
            self.backend.commit(tx).await?;
            Ok(released)
        }
    }

    #[tokio::test]
    async fn range_change_reaches_accepted_but_not_canceled() {
        let s = setup(2).await;
        let master_id = s.master.id;
        let canceled = s.slaves[1].id;
        let released = s.release_slave(canceled).await.unwrap();
        let canceled_end = s.backend.snapshot().await.subscription(canceled).unwrap().end_time;
        assert_eq!(released.status, RequestStatus::Canceled);

        s.backend
            .set_subscription_range(master_id, day(1), day(45))
            .await
            .unwrap();
        let updated = s.updated(master_id).await.unwrap();

        assert_eq!(updated.len(), 1);
        let state = s.backend.snapshot().await;
        let active = state.subscription(s.slaves[0].id).unwrap();
        assert_eq!((active.start_time, active.end_time), (day(1), day(45)));
        assert_eq!(state.subscription(canceled).unwrap().end_time, canceled_end);
    }

    #[tokio::test]
    async fn day_based_dependents_keep_their_range() {
        let s = setup(1).await;
        let master_id = s.master.id;
        s.backend
            .set_subscription_meta(master_id, META_SUBSCRIPTION_TYPE, "days")
            .await;
        s.backend
            .set_subscription_range(master_id, day(1), day(45))
            .await
            .unwrap();

        let updated = s.updated(master_id).await.unwrap();
        assert!(updated.is_empty());
    }

    #[tokio::test]
    async fn shortened_dependent_gives_seat_back() {
        let s = setup(1).await;
        let slave_id = s.slaves[0].id;
        s.backend
            .set_subscription_range(slave_id, day(1), day(15))
            .await
            .unwrap();

        let outcome = s.shortened(slave_id).await.unwrap();
        let ShortenOutcome::Released { request } = outcome else {
            panic!("expected a release, got {:?}", outcome);
        };
        assert_eq!(request.status, RequestStatus::Canceled);
        assert_eq!(request.slave_subscription_id, Some(slave_id));
    }

    #[tokio::test]
    async fn shortened_dependent_of_ended_payer_is_left_alone() {
        let s = setup(1).await;
        let slave_id = s.slaves[0].id;
        s.backend
            .set_subscription_range(s.master.id, day(1), day(10))
            .await
            .unwrap();

        let outcome = s.shortened(slave_id).await.unwrap();
        assert!(matches!(outcome, ShortenOutcome::Unaffected));
    }

    #[tokio::test]
    async fn shortened_payer_stops_dependents() {
        let s = setup(2).await;
        let master_id = s.master.id;

        let outcome = s.shortened(master_id).await.unwrap();
        let ShortenOutcome::Stopped { mut subscriptions } = outcome else {
            panic!("expected stopped dependents, got {:?}", outcome);
        };
        let mut expected: Vec<_> = s.slaves.iter().map(|s| s.id).collect();
        subscriptions.sort();
        expected.sort();
        assert_eq!(subscriptions, expected);

        let state = s.backend.snapshot().await;
        assert!(s.slaves.iter().all(|slave| state.subscription(slave.id).unwrap().end_time == now()));
    }
}
