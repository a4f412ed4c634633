mod support;

use common::{
    error::AppError,
    misc::{ProvisioningMethod, RequestStatus},
};
use family::{FamilyEvent, PaymentItemConfig, PaymentItemsConfig};
use uuid::Uuid;

use support::Harness;

#[tokio::test]
async fn fixed_seat_count_is_topped_up_once() {
    let h = Harness::new();
    let (plan, _) = h.plan(ProvisioningMethod::Copy, 4).await;
    let sub = h.subscription(plan, 1, 32).await;

    assert_eq!(h.service.generate(sub.id).await.unwrap().len(), 4);
    for _ in 0..3 {
        assert!(h.service.generate(sub.id).await.unwrap().is_empty());
    }

    let requests = h.service.requests_for(sub.id).await.unwrap();
    h.service.donate(Uuid::new_v4(), requests[0].id).await.unwrap();
    assert!(h.service.generate(sub.id).await.unwrap().is_empty());

    let live = h
        .service
        .requests_for(sub.id)
        .await
        .unwrap()
        .iter()
        .filter(|r| r.status != RequestStatus::Canceled)
        .count();
    assert_eq!(live, 4);

    let created_events = h
        .events
        .events()
        .iter()
        .filter(|e| matches!(e, FamilyEvent::RequestCreated { .. }))
        .count();
    assert_eq!(created_events, 4);
}

#[tokio::test]
async fn released_seat_is_handed_out_again() {
    let h = Harness::new();
    let (plan, _) = h.plan(ProvisioningMethod::Copy, 2).await;
    let sub = h.subscription(plan, 1, 32).await;
    let requests = h.service.generate(sub.id).await.unwrap();

    h.service.donate(Uuid::new_v4(), requests[0].id).await.unwrap();
    h.service.release(requests[0].id).await.unwrap();

    let fresh = h.service.generate(sub.id).await.unwrap();
    assert_eq!(fresh.len(), 1);
    assert_eq!(h.service.requests_for(sub.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn plan_seat_count_beats_purchased_quantity() {
    let h = Harness::new();
    let (plan, _) = h.plan(ProvisioningMethod::Copy, 7).await;
    let sub = h.subscription(plan, 1, 32).await;
    h.purchase(&sub, plan, 3).await;

    assert_eq!(h.service.generate(sub.id).await.unwrap().len(), 7);
}

#[tokio::test]
async fn purchased_quantity_sets_seat_count() {
    let h = Harness::new();
    let (plan, _) = h.plan(ProvisioningMethod::Copy, 0).await;
    let sub = h.subscription(plan, 1, 32).await;
    h.purchase(&sub, plan, 7).await;

    assert_eq!(h.service.generate(sub.id).await.unwrap().len(), 7);
}

#[tokio::test]
async fn zero_quantity_cannot_be_resolved() {
    let h = Harness::new();
    let (plan, _) = h.plan(ProvisioningMethod::Copy, 0).await;
    let sub = h.subscription(plan, 1, 32).await;
    h.purchase(&sub, plan, 0).await;

    let err = h.service.generate(sub.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidConfiguration(_)));
    assert!(h.service.requests_for(sub.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn unshareable_subscription_has_no_requests() {
    let h = Harness::new();
    let sub = h.subscription(Uuid::new_v4(), 1, 32).await;

    assert!(h.service.generate(sub.id).await.unwrap_err().is_missing_plan_link());
    assert!(h.service.ensure_requests(sub.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn configurable_plan_follows_chosen_seats() {
    let h = Harness::new();
    let plan = Uuid::new_v4();
    let (kids, adults) = (Uuid::new_v4(), Uuid::new_v4());
    h.backend
        .link_plan(plan, None, ProvisioningMethod::Copy, 0, false)
        .await;
    let sub = h.subscription(plan, 1, 32).await;
    let payment = h.backend.add_payment(h.payer, Some(sub.id), None).await;

    let selection = PaymentItemsConfig::new(vec![
        PaymentItemConfig::new(kids, 3).with_price(300),
        PaymentItemConfig::new(adults, 1).with_price(800),
    ]);
    let stored = h
        .service
        .attach_payment_items(payment.id, &selection)
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);

    let requests = h.service.ensure_requests(sub.id).await.unwrap();
    assert_eq!(requests.len(), 4);
    assert_eq!(requests.iter().filter(|r| r.slave_plan_id == kids).count(), 3);

    let donation = h.service.donate(Uuid::new_v4(), requests[0].id).await.unwrap();
    assert!(!donation.link.slave_subscription.is_paid);
}

#[tokio::test]
async fn seat_items_need_an_existing_payment() {
    let h = Harness::new();
    let selection = PaymentItemsConfig::new(vec![PaymentItemConfig::new(Uuid::new_v4(), 1)]);

    let err = h
        .service
        .attach_payment_items(Uuid::new_v4(), &selection)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
