use common::{
    env_config::FamilyConfig,
    error::{AppError, Res},
    misc::ProvisioningMethod,
};
use db::models::{plan_link::PlanLink, subscription::Subscription};

use crate::store::SubscriptionMeta;

/// Subscription meta: id of the next payer period in the same lineage.
pub const META_NEXT_SUBSCRIPTION: &str = "next_family_subscription_id";
/// Subscription meta: overrides the link's method, only `days` is meaningful.
pub const META_SUBSCRIPTION_TYPE: &str = "family_subscription_type";
/// Subscription meta: length of a `days` seat.
pub const META_SUBSCRIPTION_DAYS: &str = "family_subscription_days";
/// Payment meta: seat count chosen at purchase time.
pub const PAYMENT_META_COUNT: &str = "family_subscriptions_count";

/// Line items buying the payer plan itself.
pub const ITEM_TYPE_SUBSCRIPTION: &str = "subscription";
/// Line items buying seats of a configurable plan.
pub const ITEM_TYPE_FAMILY: &str = "family_subscription";

pub const SLAVE_ORIGIN: &str = "family";

/// How a redeemed seat turns into a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioning {
    /// Same start and end as the payer subscription.
    Copy,
    /// This many days, starting at the recipient's extension anchor.
    Days(i64),
}

/// Resolves the provisioning of a payer subscription from its plan link and
/// its per-subscription meta.
pub(crate) async fn resolve<R: SubscriptionMeta>(
    repo: &mut R,
    link: &PlanLink,
    master: &Subscription,
    config: &FamilyConfig,
) -> Res<Provisioning> {
    let override_type = repo
        .subscription_meta(master.id, META_SUBSCRIPTION_TYPE)
        .await?;

    let method = match override_type.as_deref() {
        None => link.provisioning_method,
        Some(raw) => raw.parse::<ProvisioningMethod>().map_err(|_| {
            log::error!(
                "Subscription {} has unknown {} '{}'",
                master.id,
                META_SUBSCRIPTION_TYPE,
                raw
            );
            AppError::Internal(format!("Unknown family subscription type '{}'", raw))
        })?,
    };

    match method {
        ProvisioningMethod::Copy => Ok(Provisioning::Copy),
        ProvisioningMethod::Days => {
            let days = match repo
                .subscription_meta(master.id, META_SUBSCRIPTION_DAYS)
                .await?
            {
                Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
                    AppError::Internal(format!(
                        "Invalid {} '{}' on subscription {}",
                        META_SUBSCRIPTION_DAYS, raw, master.id
                    ))
                })?,
                None => config.days_per_seat,
            };
            if days <= 0 {
                log::error!("Subscription {} provisions {} days per seat", master.id, days);
                return Err(AppError::Internal(format!(
                    "Day based family subscription {} has no positive day count",
                    master.id
                )));
            }
            Ok(Provisioning::Days(days))
        }
    }
}
