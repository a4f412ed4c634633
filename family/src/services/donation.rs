use std::collections::HashSet;

use chrono::Duration;
use common::{
    error::{AppError, Res},
    misc::RequestStatus,
};
use db::{
    dtos::{request::RequestAcceptRequest, subscription::SubscriptionCreateRequest},
    models::{request::FamilyRequest, subscription::Subscription},
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    context::Ctx,
    events::FamilyEvent,
    provisioning::{self, META_NEXT_SUBSCRIPTION, Provisioning, SLAVE_ORIGIN},
    store::FamilyRepo,
};

/// A redeemed seat and the dependent subscription it produced.
#[derive(Debug, Clone, Serialize)]
pub struct DonationLink {
    pub request: FamilyRequest,
    pub master_subscription_id: Uuid,
    pub slave_subscription: Subscription,
}

/// Outcome of a redemption: the seat itself plus the seats redeemed on the
/// recipient's behalf in already purchased successor periods.
#[derive(Debug, Clone, Serialize)]
pub struct Donation {
    pub link: DonationLink,
    pub chained: Vec<DonationLink>,
}

/// Redeems one request for `recipient` without following renewal links.
pub(crate) async fn donate_one<R: FamilyRepo>(
    repo: &mut R,
    ctx: &mut Ctx<'_>,
    recipient: Uuid,
    request_id: Uuid,
) -> Res<DonationLink> {
    let request = repo
        .request_by_id(request_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Family request {} not found", request_id)))?;

    // same lock order as the generator: payer subscription, then the request row
    repo.lock_subscription(request.master_subscription_id).await?;
    let request = repo
        .request_for_update(request_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Family request {} not found", request_id)))?;

    let master = repo
        .subscription(request.master_subscription_id)
        .await?
        .ok_or_else(|| {
            AppError::Internal(format!(
                "Family request {} points to missing subscription {}",
                request.id, request.master_subscription_id
            ))
        })?;
    let link = repo.plan_link(master.plan_id).await?.ok_or_else(|| {
        AppError::MissingPlanLink(format!("Plan {} is not shareable", master.plan_id))
    })?;
    let provisioning = provisioning::resolve(repo, &link, &master, ctx.config).await?;

    if provisioning == Provisioning::Copy && repo.has_accepted_request(master.id, recipient).await? {
        return Err(AppError::AlreadyUsed(
            "You already use a seat of this subscription".to_string(),
        ));
    }
    if matches!(provisioning, Provisioning::Days(_)) && recipient == master.user_id {
        return Err(AppError::SelfUseForbidden(
            "You cannot redeem a seat of your own subscription".to_string(),
        ));
    }
    if master.has_ended_at(ctx.now) || request.is_expired_at(ctx.now) {
        return Err(AppError::MasterExpired(
            "This invitation has expired".to_string(),
        ));
    }
    if request.status != RequestStatus::Created {
        return Err(AppError::AlreadyUsed(
            "This invitation has already been used".to_string(),
        ));
    }

    let accepted = repo
        .accept_request(
            request.id,
            RequestAcceptRequest {
                slave_user_id: recipient,
                now: ctx.now,
            },
        )
        .await?
        .ok_or_else(|| AppError::AlreadyUsed("This invitation has already been used".to_string()))?;

    let (start_time, end_time) = match provisioning {
        Provisioning::Copy => (master.start_time, master.end_time),
        Provisioning::Days(days) => {
            let anchor = repo
                .extension_anchor(accepted.slave_plan_id, recipient, ctx.now)
                .await?;
            (anchor, anchor + Duration::days(days))
        }
    };

    let slave_subscription = repo
        .create_subscription(SubscriptionCreateRequest {
            user_id: recipient,
            plan_id: accepted.slave_plan_id,
            start_time,
            end_time,
            is_paid: link.is_paid,
            origin: SLAVE_ORIGIN.to_string(),
        })
        .await?;
    let request = repo
        .link_slave_subscription(accepted.id, slave_subscription.id)
        .await?;

    log::info!(
        "Family request {} of subscription {} redeemed by user {}",
        request.id,
        master.id,
        recipient
    );
    ctx.events.push(FamilyEvent::RequestAccepted {
        request_id: request.id,
        master_subscription_id: master.id,
        slave_user_id: recipient,
        slave_subscription_id: slave_subscription.id,
    });

    Ok(DonationLink {
        request,
        master_subscription_id: master.id,
        slave_subscription,
    })
}

/// Redeems a request and carries the recipient into every successor period
/// the payer has already paid for, at most `max_renewal_hops` deep.
///
/// The successor seats are best effort: a missing seat or a rejection is
/// logged and the redemption itself still succeeds.
pub(crate) async fn donate<R: FamilyRepo>(
    repo: &mut R,
    ctx: &mut Ctx<'_>,
    recipient: Uuid,
    request_id: Uuid,
) -> Res<Donation> {
    let link = donate_one(repo, ctx, recipient, request_id).await?;

    let slave_plan_id = link.request.slave_plan_id;
    let mut chained = Vec::new();
    let mut visited = HashSet::from([link.master_subscription_id]);
    let mut current = link.master_subscription_id;

    for _ in 0..ctx.config.max_renewal_hops {
        let Some(next) = next_period(repo, current).await? else {
            break;
        };
        if !visited.insert(next) {
            log::warn!(
                "Renewal links of subscription {} form a cycle at {}",
                link.master_subscription_id,
                next
            );
            break;
        }
        current = next;

        let Some(request) = unused_request(repo, ctx, next, slave_plan_id).await? else {
            log::warn!(
                "No free family seat of plan {} left in successor subscription {} for user {}",
                slave_plan_id,
                next,
                recipient
            );
            continue;
        };
        match donate_one(repo, ctx, recipient, request.id).await {
            Ok(successor) => chained.push(successor),
            Err(e) if e.is_rejection() => {
                log::warn!(
                    "Skipping successor subscription {} for user {}: {}",
                    next,
                    recipient,
                    e
                );
            }
            Err(e) => return Err(e),
        }
    }

    Ok(Donation { link, chained })
}

/// Cancels an accepted request and ends its dependent subscription now.
pub(crate) async fn release<R: FamilyRepo>(
    repo: &mut R,
    ctx: &mut Ctx<'_>,
    request_id: Uuid,
) -> Res<FamilyRequest> {
    let request = repo
        .request_for_update(request_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Family request {} not found", request_id)))?;
    if request.status != RequestStatus::Accepted {
        return Err(AppError::BadRequest(format!(
            "Only accepted requests can be released, {} is {}",
            request.id, request.status
        )));
    }

    let canceled = repo
        .cancel_request(request.id, ctx.now)
        .await?
        .ok_or_else(|| {
            AppError::BadRequest(format!("Family request {} is no longer accepted", request.id))
        })?;

    if let Some(slave_subscription_id) = canceled.slave_subscription_id {
        if !repo.stop_subscription(slave_subscription_id, ctx.now).await? {
            log::debug!(
                "Dependent subscription {} had already ended",
                slave_subscription_id
            );
        }
    }

    log::info!(
        "Released family request {} of subscription {}",
        canceled.id,
        canceled.master_subscription_id
    );
    ctx.events.push(FamilyEvent::RequestCanceled {
        request_id: canceled.id,
        master_subscription_id: canceled.master_subscription_id,
        slave_user_id: canceled.slave_user_id,
    });
    Ok(canceled)
}

/// The successor recorded on a payer subscription, if any.
pub(crate) async fn next_period<R: FamilyRepo>(repo: &mut R, subscription_id: Uuid) -> Res<Option<Uuid>> {
    let Some(raw) = repo
        .subscription_meta(subscription_id, META_NEXT_SUBSCRIPTION)
        .await?
    else {
        return Ok(None);
    };
    match raw.trim().parse::<Uuid>() {
        Ok(id) => Ok(Some(id)),
        Err(_) => {
            log::warn!(
                "Subscription {} has invalid {} '{}'",
                subscription_id,
                META_NEXT_SUBSCRIPTION,
                raw
            );
            Ok(None)
        }
    }
}

/// A redeemable request of `master_subscription_id` granting `slave_plan_id`.
pub(crate) async fn unused_request<R: FamilyRepo>(
    repo: &mut R,
    ctx: &Ctx<'_>,
    master_subscription_id: Uuid,
    slave_plan_id: Uuid,
) -> Res<Option<FamilyRequest>> {
    Ok(repo
        .requests_by_master(master_subscription_id)
        .await?
        .into_iter()
        .find(|r| r.slave_plan_id == slave_plan_id && r.is_unused() && !r.is_expired_at(ctx.now)))
}
