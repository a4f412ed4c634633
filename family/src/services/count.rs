use common::error::{AppError, Res};
use db::models::{plan_link::PlanLink, subscription::Subscription};

use crate::{
    provisioning::{ITEM_TYPE_SUBSCRIPTION, PAYMENT_META_COUNT},
    store::Payments,
};

/// Number of seats a payer subscription grants.
///
/// In order of precedence: the fixed count on the plan link, the
/// `family_subscriptions_count` meta of the originating purchase, the
/// quantity bought of the payer plan itself.
pub(crate) async fn resolve_count<R: Payments>(
    repo: &mut R,
    link: &PlanLink,
    subscription: &Subscription,
) -> Res<usize> {
    if link.seat_count > 0 {
        return Ok(link.seat_count as usize);
    }

    let payment = repo.purchase_for(subscription.id).await?.ok_or_else(|| {
        AppError::InvalidConfiguration(format!(
            "Subscription {} has no purchase to derive a seat count from",
            subscription.id
        ))
    })?;

    if let Some(raw) = repo.payment_meta(payment.id, PAYMENT_META_COUNT).await? {
        let count = raw.trim().parse::<i64>().map_err(|_| {
            AppError::InvalidConfiguration(format!(
                "Payment {} has invalid {} '{}'",
                payment.id, PAYMENT_META_COUNT, raw
            ))
        })?;
        if count > 0 {
            return Ok(count as usize);
        }
    }

    let quantity: i64 = repo
        .line_items(payment.id, ITEM_TYPE_SUBSCRIPTION)
        .await?
        .iter()
        .filter(|item| item.plan_id == Some(link.master_plan_id))
        .map(|item| i64::from(item.unit_count))
        .sum();

    if quantity > 0 {
        Ok(quantity as usize)
    } else {
        Err(AppError::InvalidConfiguration(format!(
            "Cannot resolve family seat count for subscription {}",
            subscription.id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{memory::MemoryBackend, store::Backend, testing::*};
    use common::misc::ProvisioningMethod;
    use uuid::Uuid;

    async fn resolve(backend: &MemoryBackend, link: &PlanLink, sub: &Subscription) -> Res<usize> {
        let mut tx = backend.begin().await.unwrap();
        resolve_count(&mut tx, link, sub).await
    }

    #[tokio::test]
    async fn fixed_count_wins_over_purchase() {
        let backend = MemoryBackend::new();
        let (master_plan, slave_plan) = (Uuid::new_v4(), Uuid::new_v4());
        let link = backend
            .link_plan(master_plan, Some(slave_plan), ProvisioningMethod::Copy, 7, true)
            .await;
        let sub = running_subscription(&backend, Uuid::new_v4(), master_plan).await;
        let payment = backend.add_payment(sub.user_id, Some(sub.id), None).await;
        backend
            .add_payment_item(plan_item(payment.id, master_plan, 3))
            .await;

        assert_eq!(resolve(&backend, &link, &sub).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn payment_meta_overrides_line_items() {
        let backend = MemoryBackend::new();
        let master_plan = Uuid::new_v4();
        let link = backend
            .link_plan(master_plan, Some(Uuid::new_v4()), ProvisioningMethod::Copy, 0, true)
            .await;
        let sub = running_subscription(&backend, Uuid::new_v4(), master_plan).await;
        let payment = backend.add_payment(sub.user_id, Some(sub.id), None).await;
        backend
            .add_payment_item(plan_item(payment.id, master_plan, 2))
            .await;
        backend
            .set_payment_meta(payment.id, PAYMENT_META_COUNT, "4")
            .await;

        assert_eq!(resolve(&backend, &link, &sub).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn line_item_quantity_of_master_plan() {
        let backend = MemoryBackend::new();
        let master_plan = Uuid::new_v4();
        let link = backend
            .link_plan(master_plan, Some(Uuid::new_v4()), ProvisioningMethod::Copy, 0, true)
            .await;
        let sub = running_subscription(&backend, Uuid::new_v4(), master_plan).await;
        let payment = backend.add_payment(sub.user_id, Some(sub.id), None).await;
        backend
            .add_payment_item(plan_item(payment.id, master_plan, 7))
            .await;
        backend
            .add_payment_item(plan_item(payment.id, Uuid::new_v4(), 5))
            .await;

        assert_eq!(resolve(&backend, &link, &sub).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn zero_quantity_is_invalid() {
        let backend = MemoryBackend::new();
        let master_plan = Uuid::new_v4();
        let link = backend
            .link_plan(master_plan, Some(Uuid::new_v4()), ProvisioningMethod::Copy, 0, true)
            .await;
        let sub = running_subscription(&backend, Uuid::new_v4(), master_plan).await;
        let payment = backend.add_payment(sub.user_id, Some(sub.id), None).await;
        backend
            .add_payment_item(plan_item(payment.id, master_plan, 0))
            .await;

        let err = resolve(&backend, &link, &sub).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn no_purchase_and_no_fixed_count_is_invalid() {
        let backend = MemoryBackend::new();
        let master_plan = Uuid::new_v4();
        let link = backend
            .link_plan(master_plan, Some(Uuid::new_v4()), ProvisioningMethod::Copy, 0, true)
            .await;
        let sub = running_subscription(&backend, Uuid::new_v4(), master_plan).await;

        let err = resolve(&backend, &link, &sub).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidConfiguration(_)));
    }
}
