use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

use crate::publish::PublishError;
use crate::webhook::WebhookError;

impl ResponseError for WebhookError {
    fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            // 5xx makes the provider redeliver
            WebhookError::Processing { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "success": false,
            "error": self.to_string(),
        }))
    }
}

impl ResponseError for PublishError {
    fn status_code(&self) -> StatusCode {
        match self {
            PublishError::NotFound(_) => StatusCode::NOT_FOUND,
            PublishError::AlreadyPublished(_) | PublishError::InProgress(_) => StatusCode::CONFLICT,
            PublishError::MissingDesign(_) | PublishError::NoEnabledVariants(_) => StatusCode::BAD_REQUEST,
            PublishError::Provider { .. } => StatusCode::BAD_GATEWAY,
            PublishError::CatalogPending(_) => StatusCode::SERVICE_UNAVAILABLE,
            PublishError::Pricing(_) | PublishError::Unrecorded { .. } | PublishError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            tracing::error!(error = %self, "Publish request failed");
        }
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string(),
        }))
    }
}
