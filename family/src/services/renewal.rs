use std::collections::{BTreeMap, HashMap};

use chrono::Duration;
use common::{
    error::{AppError, Res},
    misc::RequestStatus,
};
use db::{dtos::subscription::LineageFilter, models::subscription::Subscription};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    context::Ctx,
    provisioning::META_NEXT_SUBSCRIPTION,
    services::donation::{DonationLink, donate_one, next_period, unused_request},
    store::FamilyRepo,
};

/// What chaining a new payer period did.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RenewalOutcome {
    /// The plan of the new subscription is not shareable.
    NotShareable,
    NoPrevious,
    /// Several earlier periods match; nothing is migrated.
    Ambiguous { candidates: Vec<Uuid> },
    AlreadyChained { previous: Uuid },
    /// The new period has fewer free seats of a plan than the previous one
    /// has members on it.
    Insufficient {
        previous: Uuid,
        slave_plan_id: Uuid,
        needed: usize,
        available: usize,
    },
    Chained {
        previous: Uuid,
        renewed: Vec<DonationLink>,
    },
}

enum Lineage {
    Found(Uuid),
    None,
    Ambiguous(Vec<Uuid>),
}

/// Links a freshly generated payer period to the previous one and moves
/// every member of the previous period into it.
///
/// Either every member is carried over or nothing is: any failure while
/// re-donating is a [`AppError::ChildRenewalFailure`] and the caller must
/// roll the transaction back.
pub(crate) async fn chain<R: FamilyRepo>(
    repo: &mut R,
    ctx: &mut Ctx<'_>,
    subscription: &Subscription,
) -> Res<RenewalOutcome> {
    if repo.plan_link(subscription.plan_id).await?.is_none() {
        return Ok(RenewalOutcome::NotShareable);
    }

    let previous = match find_previous(repo, ctx, subscription).await? {
        Lineage::Found(previous) => previous,
        Lineage::None => return Ok(RenewalOutcome::NoPrevious),
        Lineage::Ambiguous(candidates) => {
            log::warn!(
                "Ambiguous previous period for subscription {}: {:?}, not chaining",
                subscription.id,
                candidates
            );
            return Ok(RenewalOutcome::Ambiguous { candidates });
        }
    };

    repo.lock_subscription(previous).await?;
    if let Some(next) = next_period(repo, previous).await? {
        if next != subscription.id {
            log::warn!(
                "Subscription {} is already followed by {}, not chaining {}",
                previous,
                next,
                subscription.id
            );
        }
        return Ok(RenewalOutcome::AlreadyChained { previous });
    }

    let members: Vec<_> = repo
        .requests_by_master(previous)
        .await?
        .into_iter()
        .filter(|r| r.status == RequestStatus::Accepted)
        .filter_map(|r| r.slave_user_id.map(|user| (user, r.slave_plan_id)))
        .collect();
    let mut needed: BTreeMap<Uuid, usize> = BTreeMap::new();
    for (_, slave_plan_id) in &members {
        *needed.entry(*slave_plan_id).or_default() += 1;
    }
    let mut free: HashMap<Uuid, usize> = HashMap::new();
    for request in repo.requests_by_master(subscription.id).await? {
        if request.is_unused() && !request.is_expired_at(ctx.now) {
            *free.entry(request.slave_plan_id).or_default() += 1;
        }
    }

    // seats are matched per dependent plan
    let short = needed.iter().find_map(|(plan, &count)| {
        let available = free.get(plan).copied().unwrap_or(0);
        (available < count).then_some((*plan, count, available))
    });
    if let Some((slave_plan_id, needed, available)) = short {
        log::warn!(
            "Subscription {} has {} free seats of plan {} but {} members to carry over from {}, not chaining",
            subscription.id,
            available,
            slave_plan_id,
            needed,
            previous
        );
        return Ok(RenewalOutcome::Insufficient {
            previous,
            slave_plan_id,
            needed,
            available,
        });
    }

    repo.set_subscription_meta(previous, META_NEXT_SUBSCRIPTION, &subscription.id.to_string())
        .await?;

    let mut renewed = Vec::with_capacity(members.len());
    for (recipient, slave_plan_id) in members {
        let donated = match unused_request(repo, ctx, subscription.id, slave_plan_id).await? {
            Some(request) => donate_one(repo, ctx, recipient, request.id).await,
            None => Err(AppError::Internal(format!(
                "No free seat of plan {} left in subscription {}",
                slave_plan_id, subscription.id
            ))),
        };
        match donated {
            Ok(link) => renewed.push(link),
            Err(e) => {
                log::error!(
                    "Carrying user {} from subscription {} into {} failed: {}",
                    recipient,
                    previous,
                    subscription.id,
                    e
                );
                return Err(AppError::ChildRenewalFailure(format!(
                    "User {} could not be moved into subscription {}: {}",
                    recipient, subscription.id, e
                )));
            }
        }
    }

    log::info!(
        "Chained subscription {} after {}, {} members carried over",
        subscription.id,
        previous,
        renewed.len()
    );
    Ok(RenewalOutcome::Chained { previous, renewed })
}

/// The previous period: the subscription of the purchase this recurring
/// charge renews, else the single one of the user's payer subscriptions that
/// ended within the renewal gap before `subscription` started.
async fn find_previous<R: FamilyRepo>(
    repo: &mut R,
    ctx: &Ctx<'_>,
    subscription: &Subscription,
) -> Res<Lineage> {
    if let Some(payment) = repo.purchase_for(subscription.id).await? {
        if let Some(parent_id) = payment.recurring_parent_id {
            let previous = repo
                .payment(parent_id)
                .await?
                .and_then(|parent| parent.subscription_id)
                .filter(|id| *id != subscription.id);
            if let Some(previous) = previous {
                return Ok(Lineage::Found(previous));
            }
            log::debug!(
                "Recurring parent {} of payment {} has no subscription",
                parent_id,
                payment.id
            );
        }
    }

    let plan_ids = repo.master_plan_ids().await?;
    let candidates = repo
        .lineage_candidates(LineageFilter {
            user_id: subscription.user_id,
            plan_ids,
            ending_after: subscription.start_time - Duration::hours(ctx.config.renewal_gap_hours),
            ending_before: subscription.start_time,
            exclude_id: subscription.id,
        })
        .await?;

    let mut open = Vec::new();
    for candidate in candidates {
        match next_period(repo, candidate.id).await? {
            Some(next) if next == subscription.id => return Ok(Lineage::Found(candidate.id)),
            Some(_) => continue,
            None => open.push(candidate.id),
        }
    }

    Ok(match open.len() {
        0 => Lineage::None,
        1 => Lineage::Found(open[0]),
        _ => Lineage::Ambiguous(open),
    })
}
