use std::{future::Future, pin::Pin, rc::Rc, sync::Arc};

use actix_web::{
    Error,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use common::error::AppError;
use futures::future::{Ready, ok};
use subtle::ConstantTimeEq;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Lets a request through only when its `X-API-Key` is one of the
/// configured hook keys.
pub struct HookKeyMiddleware {
    keys: Rc<Vec<String>>,
}

impl HookKeyMiddleware {
    pub fn new(keys: Vec<String>) -> Self {
        if keys.is_empty() {
            log::warn!("No hook API keys configured, subscription hooks will reject every call");
        }
        HookKeyMiddleware {
            keys: Rc::new(keys),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for HookKeyMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Transform = HookKeyMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(HookKeyMiddlewareService {
            service: Arc::new(service),
            keys: self.keys.clone(),
        })
    }
}

pub struct HookKeyMiddlewareService<S> {
    service: Arc<S>,
    keys: Rc<Vec<String>>,
}

impl<S, B> Service<ServiceRequest> for HookKeyMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let presented = req
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let allowed = is_allowed(&self.keys, presented.as_deref());
        let srv = Arc::clone(&self.service);

        Box::pin(async move {
            if !allowed {
                log::warn!("Rejected hook call to {} with a bad API key", req.path());
                return Ok(req.error_response(AppError::Unauthorized("Invalid key".to_string())));
            }
            srv.call(req).await.map(|res| res.map_into_boxed_body())
        })
    }
}

fn is_allowed(keys: &[String], presented: Option<&str>) -> bool {
    match presented.map(str::trim) {
        Some(key) if !key.is_empty() => keys
            .iter()
            .any(|k| bool::from(k.as_bytes().ct_eq(key.as_bytes()))),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_configured_keys_pass() {
        let keys = vec!["alpha".to_string(), "beta".to_string()];
        assert!(is_allowed(&keys, Some("beta")));
        assert!(is_allowed(&keys, Some(" alpha ")));
        assert!(!is_allowed(&keys, Some("alph")));
        assert!(!is_allowed(&keys, Some("")));
        assert!(!is_allowed(&keys, None));
        assert!(!is_allowed(&[], Some("alpha")));
    }
}
