use actix_web::{
    Responder, post,
    web::{self},
};
use common::{error::Res, http::Success};

use crate::{Family, dtos::hook::SubscriptionHookRequest};

/// A subscription was created: generate its seats and chain it to the
/// previous period of the same payer.
#[post("/subscription-created")]
pub async fn post_subscription_created(
    family: web::Data<Family>,
    req: web::Json<SubscriptionHookRequest>,
) -> Res<impl Responder> {
    let outcome = family.on_subscription_created(req.subscription_id).await?;
    Success::ok(outcome)
}

#[post("/subscription-updated")]
pub async fn post_subscription_updated(
    family: web::Data<Family>,
    req: web::Json<SubscriptionHookRequest>,
) -> Res<impl Responder> {
    let updated = family.on_subscription_updated(req.subscription_id).await?;
    Success::ok(updated)
}

#[post("/subscription-shortened")]
pub async fn post_subscription_shortened(
    family: web::Data<Family>,
    req: web::Json<SubscriptionHookRequest>,
) -> Res<impl Responder> {
    let outcome = family.on_subscription_shortened(req.subscription_id).await?;
    Success::ok(outcome)
}
