use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::publish::{PublishError, PublishOrchestrator};

/// Bearer token guarding the publish endpoints. `None` refuses every call.
#[derive(Debug, Clone)]
pub struct AdminToken(pub Option<String>);

impl AdminToken {
    pub(crate) fn admits(&self, req: &HttpRequest) -> bool {
        let Some(expected) = self.0.as_deref().filter(|t| !t.is_empty()) else {
            return false;
        };
        req.headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token.trim() == expected)
    }
}

pub(super) fn unauthorized() -> HttpResponse {
    HttpResponse::Unauthorized().json(serde_json::json!({ "error": "admin token required" }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub product_id: Uuid,
    pub subcategory: Option<String>,
}

pub async fn publish(
    orchestrator: web::Data<PublishOrchestrator>,
    token: web::Data<AdminToken>,
    req: HttpRequest,
    body: web::Json<PublishRequest>,
) -> Result<HttpResponse, PublishError> {
    if !token.admits(&req) {
        return Ok(unauthorized());
    }
    let PublishRequest { product_id, subcategory } = body.into_inner();
    let outcome = orchestrator.publish(product_id, subcategory).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

pub async fn status(
    orchestrator: web::Data<PublishOrchestrator>,
    token: web::Data<AdminToken>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, PublishError> {
    if !token.admits(&req) {
        return Ok(unauthorized());
    }
    let view = orchestrator.status(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(view))
}
