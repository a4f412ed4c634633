use actix_web::web;
use common::env_config::Config;
use family::{FamilyService, PgBackend};
use middleware::{auth::AuthMiddleware, hook_key::HookKeyMiddleware};

pub mod routes {
    pub mod hooks;
    pub mod requests;
}
pub mod middleware {
    pub mod auth;
    pub mod hook_key;
}
mod dtos {
    pub(crate) mod hook;
    pub(crate) mod request;
}

/// The engine as the routes see it.
pub type Family = FamilyService<PgBackend>;

/// Redemption and seat management, for signed in users.
pub fn mount_family() -> actix_web::Scope {
    web::scope("/family")
        .service(routes::requests::get_request)
        .service(routes::requests::post_accept)
        .service(routes::requests::post_release)
        .service(routes::requests::put_note)
        .service(routes::requests::get_subscription_requests)
}

/// Subscription lifecycle hooks, for the subscriptions service.
pub fn mount_hooks() -> actix_web::Scope {
    web::scope("/family/hooks")
        .service(routes::hooks::post_subscription_created)
        .service(routes::hooks::post_subscription_updated)
        .service(routes::hooks::post_subscription_shortened)
}

pub fn auth_middleware(config: &Config) -> AuthMiddleware {
    AuthMiddleware::new(config.jwt_config.secret.clone())
}

pub fn hook_key_middleware(config: &Config) -> HookKeyMiddleware {
    HookKeyMiddleware::new(config.hooks_api_keys.clone())
}
