mod support;

use common::misc::{ProvisioningMethod, RequestStatus};
use family::ShortenOutcome;
use uuid::Uuid;

use support::{Harness, day};

#[tokio::test]
async fn payer_range_change_skips_canceled_seats() {
    let h = Harness::new();
    let (plan, _) = h.plan(ProvisioningMethod::Copy, 3).await;
    let sub = h.subscription(plan, 1, 32).await;
    let requests = h.service.generate(sub.id).await.unwrap();
    let kept = h.service.donate(Uuid::new_v4(), requests[0].id).await.unwrap();
    let dropped = h.service.donate(Uuid::new_v4(), requests[1].id).await.unwrap();
    h.service.release(requests[1].id).await.unwrap();

    h.backend
        .set_subscription_range(sub.id, day(3), day(50))
        .await
        .unwrap();
    let updated = h.service.on_subscription_updated(sub.id).await.unwrap();

    assert_eq!(updated.len(), 1);
    let state = h.backend.snapshot().await;
    let kept = state.subscription(kept.link.slave_subscription.id).unwrap();
    assert_eq!((kept.start_time, kept.end_time), (day(3), day(50)));
    let dropped = state.subscription(dropped.link.slave_subscription.id).unwrap();
    assert_eq!((dropped.start_time, dropped.end_time), (day(1), day(15)));
    assert_eq!(
        state.request(requests[1].id).unwrap().status,
        RequestStatus::Canceled
    );
}

#[tokio::test]
async fn unshareable_update_is_ignored() {
    let h = Harness::new();
    let sub = h.subscription(Uuid::new_v4(), 1, 32).await;

    assert!(h.service.on_subscription_updated(sub.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn shortened_dependent_frees_its_seat() {
    let h = Harness::new();
    let (plan, _) = h.plan(ProvisioningMethod::Copy, 1).await;
    let sub = h.subscription(plan, 1, 32).await;
    let request = h.service.generate(sub.id).await.unwrap().remove(0);
    let donation = h.service.donate(Uuid::new_v4(), request.id).await.unwrap();
    let dependent = donation.link.slave_subscription.id;

    h.backend
        .set_subscription_range(dependent, day(1), day(15))
        .await
        .unwrap();
    let outcome = h.service.on_subscription_shortened(dependent).await.unwrap();
    assert!(matches!(outcome, ShortenOutcome::Released { .. }));

    let fresh = h.service.generate(sub.id).await.unwrap();
    assert_eq!(fresh.len(), 1);
}

#[tokio::test]
async fn shortened_payer_stops_members() {
    let h = Harness::new();
    let (plan, _) = h.plan(ProvisioningMethod::Copy, 2).await;
    let sub = h.subscription(plan, 1, 32).await;
    let requests = h.service.generate(sub.id).await.unwrap();
    for request in &requests {
        h.service.donate(Uuid::new_v4(), request.id).await.unwrap();
    }

    h.backend
        .set_subscription_range(sub.id, day(1), day(15))
        .await
        .unwrap();
    let outcome = h.service.on_subscription_shortened(sub.id).await.unwrap();
    let ShortenOutcome::Stopped { subscriptions } = outcome else {
        panic!("expected stopped members, got {:?}", outcome);
    };
    assert_eq!(subscriptions.len(), 2);

    let state = h.backend.snapshot().await;
    for id in subscriptions {
        assert_eq!(state.subscription(id).unwrap().end_time, day(15));
    }
}

#[tokio::test]
async fn stopping_a_prepaid_period_keeps_member_ranges_ordered() {
    let h = Harness::new();
    let (plan, _) = h.plan(ProvisioningMethod::Copy, 2).await;
    let current = h.subscription(plan, 1, 32).await;
    let request = h.service.generate(current.id).await.unwrap().remove(0);
    h.service.donate(Uuid::new_v4(), request.id).await.unwrap();
    let prepaid = h.subscription(plan, 32, 60).await;
    h.service.on_subscription_created(prepaid.id).await.unwrap();

    let outcome = h.service.on_subscription_shortened(prepaid.id).await.unwrap();
    let ShortenOutcome::Stopped { subscriptions } = outcome else {
        panic!("expected stopped members, got {:?}", outcome);
    };
    assert_eq!(subscriptions.len(), 1);

    let stopped = h.backend.snapshot().await.subscription(subscriptions[0]).cloned().unwrap();
    assert_eq!((stopped.start_time, stopped.end_time), (day(32), day(32)));
}
