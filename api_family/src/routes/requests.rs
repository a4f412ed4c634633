use actix_web::{
    Responder, get, post, put,
    web::{self},
};
use common::{
    error::{AppError, Res},
    http::Success,
    jwt::JwtClaims,
};
use db::models::request::FamilyRequest;
use uuid::Uuid;

use crate::{
    Family,
    dtos::request::{InvitationResponse, NoteRequest},
};

/// Loads a request and makes sure the caller is the payer it belongs to.
async fn owned_request(family: &Family, claims: &JwtClaims, request_id: Uuid) -> Res<FamilyRequest> {
    let request = family.request(request_id).await?;
    if request.master_user_id != claims.user_id {
        return Err(AppError::Forbidden(
            "Only the payer can manage this seat".to_string(),
        ));
    }
    Ok(request)
}

/// Shows an invitation to the person holding its code.
#[get("/requests/{code}")]
pub async fn get_request(
    claims: web::ReqData<JwtClaims>,
    family: web::Data<Family>,
    path: web::Path<String>,
) -> Res<impl Responder> {
    let request = family.open(&path.into_inner()).await?;
    Success::ok(InvitationResponse::for_viewer(request, claims.user_id))
}

/// Redeems an invitation for the signed in user.
///
/// Rejections (used, own subscription, expired) come back as 409, 400 and
/// 410 with the reason in the body.
#[post("/requests/{code}/accept")]
pub async fn post_accept(
    claims: web::ReqData<JwtClaims>,
    family: web::Data<Family>,
    path: web::Path<String>,
) -> Res<impl Responder> {
    let donation = family.donate_code(claims.user_id, &path.into_inner()).await?;
    Success::created(donation)
}

#[post("/requests/{id}/release")]
pub async fn post_release(
    claims: web::ReqData<JwtClaims>,
    family: web::Data<Family>,
    path: web::Path<Uuid>,
) -> Res<impl Responder> {
    let request = owned_request(&family, &claims, path.into_inner()).await?;
    let request = family.release(request.id).await?;
    Success::ok(request)
}

#[put("/requests/{id}/note")]
pub async fn put_note(
    claims: web::ReqData<JwtClaims>,
    family: web::Data<Family>,
    path: web::Path<Uuid>,
    req: web::Json<NoteRequest>,
) -> Res<impl Responder> {
    let request = owned_request(&family, &claims, path.into_inner()).await?;
    let request = family.set_note(request.id, req.into_inner().note).await?;
    Success::ok(request)
}

/// Lists the seats of one of the caller's subscriptions, topping them up first.
#[get("/subscriptions/{id}/requests")]
pub async fn get_subscription_requests(
    claims: web::ReqData<JwtClaims>,
    family: web::Data<Family>,
    path: web::Path<Uuid>,
) -> Res<impl Responder> {
    let subscription = family.subscription(path.into_inner()).await?;
    if subscription.user_id != claims.user_id {
        return Err(AppError::Forbidden(
            "This subscription belongs to someone else".to_string(),
        ));
    }
    let requests = family.ensure_requests(subscription.id).await?;
    Success::ok(requests)
}
