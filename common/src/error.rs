use actix_web::HttpResponse;
use thiserror::Error;

pub type Res<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    // === CONVERSION ERRORS ===
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("JWT error: {0}")]
    JWT(#[from] jsonwebtoken::errors::Error),

    // === APPLICATION ERRORS ===
    #[error("Authorization error: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),

    // === FAMILY ERRORS ===
    #[error("Subscription plan is not shareable: {0}")]
    MissingPlanLink(String),

    #[error("Invalid family configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Request already used: {0}")]
    AlreadyUsed(String),

    #[error("You cannot use your own family subscription: {0}")]
    SelfUseForbidden(String),

    #[error("Family subscription expired: {0}")]
    MasterExpired(String),

    #[error("Renewal of family members failed: {0}")]
    ChildRenewalFailure(String),
}

impl AppError {
    /// Expected redemption rejections the recipient should be told about.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            AppError::AlreadyUsed(_) | AppError::SelfUseForbidden(_) | AppError::MasterExpired(_)
        )
    }

    pub fn is_missing_plan_link(&self) -> bool {
        matches!(self, AppError::MissingPlanLink(_))
    }

    pub fn to_http_response(&self) -> HttpResponse {
        let is_dev = cfg!(debug_assertions);

        let to_internal_json = |err_msg: &str| {
            if is_dev {
                serde_json::json!({ "error": err_msg })
            } else {
                serde_json::json!({ "error": "Internal server error" })
            }
        };
        let to_json = || serde_json::json!({ "error": self.to_string() });

        match self {
            // === CONVERSION ERRORS ===
            AppError::Database(sqlx::Error::RowNotFound) => {
                HttpResponse::NotFound().json(serde_json::json!({ "error": "Resource not found" }))
            }
            AppError::Database(error) => {
                log::error!("Database error: {}", error);
                HttpResponse::InternalServerError().json(to_internal_json(&error.to_string()))
            }
            AppError::Migration(error) => {
                log::error!("Migration error: {}", error);
                HttpResponse::InternalServerError().json(to_internal_json(&error.to_string()))
            }
            AppError::JWT(error) => {
                log::warn!("JWT error: {}", error);
                HttpResponse::Unauthorized().json(serde_json::json!({ "error": "Invalid token" }))
            }

            // === APPLICATION ERRORS ===
            AppError::Unauthorized(_) => HttpResponse::Unauthorized().json(to_json()),
            AppError::Forbidden(_) => HttpResponse::Forbidden().json(to_json()),
            AppError::NotFound(_) | AppError::MissingPlanLink(_) => {
                HttpResponse::NotFound().json(to_json())
            }
            AppError::BadRequest(_) | AppError::SelfUseForbidden(_) => {
                HttpResponse::BadRequest().json(to_json())
            }
            AppError::AlreadyUsed(_) => HttpResponse::Conflict().json(to_json()),
            AppError::MasterExpired(_) => HttpResponse::Gone().json(to_json()),

            AppError::InvalidConfiguration(error) => {
                log::error!("Invalid family configuration: {}", error);
                HttpResponse::InternalServerError().json(to_internal_json(&self.to_string()))
            }
            AppError::ChildRenewalFailure(error) => {
                log::error!("Child renewal failure: {}", error);
                HttpResponse::InternalServerError().json(to_internal_json(&self.to_string()))
            }
            AppError::Internal(error) => {
                log::error!("Internal error: {}", error);
                HttpResponse::InternalServerError().json(to_internal_json(error))
            }
        }
    }
}

impl actix_web::ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        self.to_http_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn rejections_map_to_client_errors() {
        let cases = [
            (AppError::AlreadyUsed("x".into()), StatusCode::CONFLICT),
            (AppError::SelfUseForbidden("x".into()), StatusCode::BAD_REQUEST),
            (AppError::MasterExpired("x".into()), StatusCode::GONE),
            (AppError::MissingPlanLink("x".into()), StatusCode::NOT_FOUND),
        ];
        for (error, status) in cases {
            assert!(error.is_rejection() || error.is_missing_plan_link());
            assert_eq!(error.to_http_response().status(), status);
        }
    }

    #[test]
    fn renewal_failure_is_server_error() {
        let error = AppError::ChildRenewalFailure("not enough requests".into());
        assert!(!error.is_rejection());
        assert_eq!(
            error.to_http_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
