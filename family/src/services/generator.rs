use std::collections::BTreeMap;

use common::{
    error::{AppError, Res},
    misc::RequestStatus,
};
use db::{
    dtos::request::RequestCreateRequest,
    models::{payment::PaymentItem, request::FamilyRequest, subscription::Subscription},
};
use uuid::Uuid;

use crate::{
    context::Ctx,
    events::FamilyEvent,
    provisioning::ITEM_TYPE_FAMILY,
    services::count::resolve_count,
    store::FamilyRepo,
};

/// Tops up the requests of a payer subscription to what its purchase grants.
///
/// Only ever adds: canceled requests do not count toward the target, so a
/// released seat is handed out again as a fresh request. Returns the
/// requests created by this call.
pub(crate) async fn generate<R: FamilyRepo>(
    repo: &mut R,
    ctx: &mut Ctx<'_>,
    subscription: &Subscription,
) -> Res<Vec<FamilyRequest>> {
    let link = repo.plan_link(subscription.plan_id).await?.ok_or_else(|| {
        AppError::MissingPlanLink(format!(
            "Plan {} of subscription {} has no family link",
            subscription.plan_id, subscription.id
        ))
    })?;

    // concurrent top-ups of the same subscription must not both see the shortfall
    repo.lock_subscription(subscription.id).await?;

    let targets = match link.slave_plan_id {
        Some(slave_plan_id) => {
            let count = resolve_count(repo, &link, subscription).await?;
            BTreeMap::from([(slave_plan_id, count)])
        }
        None => configurable_targets(repo, subscription).await?,
    };

    let existing = repo.requests_by_master(subscription.id).await?;
    let mut created = Vec::new();

    for (slave_plan_id, target) in targets {
        let live = existing
            .iter()
            .filter(|r| r.slave_plan_id == slave_plan_id && r.status != RequestStatus::Canceled)
            .count();

        for _ in live..target {
            let request = repo
                .insert_request(RequestCreateRequest {
                    code: generate_code(),
                    master_user_id: subscription.user_id,
                    master_subscription_id: subscription.id,
                    slave_plan_id,
                    expires_at: None,
                    now: ctx.now,
                })
                .await?;
            ctx.events.push(FamilyEvent::RequestCreated {
                request_id: request.id,
                master_subscription_id: subscription.id,
                code: request.code.clone(),
            });
            created.push(request);
        }
    }

    if !created.is_empty() {
        log::info!(
            "Generated {} family requests for subscription {}",
            created.len(),
            subscription.id
        );
    }

    Ok(created)
}

/// Seats per dependent plan for a configurable payer plan: one per unit of
/// every seat line item of the originating purchase.
async fn configurable_targets<R: FamilyRepo>(
    repo: &mut R,
    subscription: &Subscription,
) -> Res<BTreeMap<Uuid, usize>> {
    let payment = repo.purchase_for(subscription.id).await?.ok_or_else(|| {
        AppError::InvalidConfiguration(format!(
            "Configurable family subscription {} has no purchase",
            subscription.id
        ))
    })?;

    let mut targets = BTreeMap::new();
    for item in repo.line_items(payment.id, ITEM_TYPE_FAMILY).await? {
        if item.unit_count <= 0 {
            continue;
        }
        let Some(plan_id) = item_plan(&item) else {
            log::warn!(
                "Family line item {} of payment {} names no plan",
                item.id,
                payment.id
            );
            continue;
        };
        *targets.entry(plan_id).or_insert(0) += item.unit_count as usize;
    }

    if targets.is_empty() {
        return Err(AppError::InvalidConfiguration(format!(
            "Purchase {} of subscription {} has no family seat items",
            payment.id, subscription.id
        )));
    }
    Ok(targets)
}

/// The plan a seat line item grants: its own plan, else `subscription_plan_id` in its meta.
fn item_plan(item: &PaymentItem) -> Option<Uuid> {
    item.plan_id.or_else(|| {
        item.meta
            .get("subscription_plan_id")
            .and_then(|v| v.as_str())
            .and_then(|raw| raw.parse().ok())
    })
}

/// Redemption codes are v4 UUIDs (122 random bits) without dashes.
fn generate_code() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{memory::MemoryBackend, store::Backend, testing::*};
    use common::{env_config::FamilyConfig, misc::ProvisioningMethod};

    async fn run(backend: &MemoryBackend, sub: &Subscription) -> Res<Vec<FamilyRequest>> {
        let config = FamilyConfig::default();
        let mut ctx = Ctx::new(&config, now());
        let mut tx = backend.begin().await?;
        let created = generate(&mut tx, &mut ctx, sub).await?;
        backend.commit(tx).await?;
        Ok(created)
    }

    #[tokio::test]
    async fn tops_up_to_fixed_count_once() {
        let backend = MemoryBackend::new();
        let master_plan = Uuid::new_v4();
        backend
            .link_plan(master_plan, Some(Uuid::new_v4()), ProvisioningMethod::Copy, 3, true)
            .await;
        let sub = running_subscription(&backend, Uuid::new_v4(), master_plan).await;

        assert_eq!(run(&backend, &sub).await.unwrap().len(), 3);
        assert!(run(&backend, &sub).await.unwrap().is_empty());

        let requests = backend.snapshot().await.requests_of(sub.id);
        assert_eq!(requests.len(), 3);
        assert!(requests.iter().all(|r| r.master_user_id == sub.user_id));
        let mut codes: Vec<_> = requests.iter().map(|r| r.code.clone()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), 3);
    }

    #[tokio::test]
    async fn unlinked_plan_is_missing_link() {
        let backend = MemoryBackend::new();
        let sub = running_subscription(&backend, Uuid::new_v4(), Uuid::new_v4()).await;

        let err = run(&backend, &sub).await.unwrap_err();
        assert!(err.is_missing_plan_link());
    }

    #[tokio::test]
    async fn configurable_plan_uses_seat_items() {
        let backend = MemoryBackend::new();
        let master_plan = Uuid::new_v4();
        let (kids, adults) = (Uuid::new_v4(), Uuid::new_v4());
        backend
            .link_plan(master_plan, None, ProvisioningMethod::Copy, 0, true)
            .await;
        let sub = running_subscription(&backend, Uuid::new_v4(), master_plan).await;
        let payment = backend.add_payment(sub.user_id, Some(sub.id), None).await;
        backend.add_payment_item(family_item(payment.id, kids, 2)).await;
        backend.add_payment_item(family_item(payment.id, adults, 1)).await;

        let created = run(&backend, &sub).await.unwrap();
        assert_eq!(created.len(), 3);
        assert_eq!(created.iter().filter(|r| r.slave_plan_id == kids).count(), 2);
        assert_eq!(created.iter().filter(|r| r.slave_plan_id == adults).count(), 1);
        assert!(run(&backend, &sub).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn configurable_plan_without_items_is_invalid() {
        let backend = MemoryBackend::new();
        let master_plan = Uuid::new_v4();
        backend
            .link_plan(master_plan, None, ProvisioningMethod::Copy, 0, true)
            .await;
        let sub = running_subscription(&backend, Uuid::new_v4(), master_plan).await;
        backend.add_payment(sub.user_id, Some(sub.id), None).await;

        let err = run(&backend, &sub).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidConfiguration(_)));
    }

    #[test]
    fn codes_are_unique_hex() {
        let (a, b) = (generate_code(), generate_code());
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
