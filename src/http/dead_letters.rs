use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::store::DeadLetterStore;

use super::publish::unauthorized;
use super::AdminToken;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

/// Failed webhook deliveries awaiting manual triage.
pub async fn list(
    store: web::Data<dyn DeadLetterStore>,
    token: web::Data<AdminToken>,
    req: HttpRequest,
    query: web::Query<ListQuery>,
) -> HttpResponse {
    if !token.admits(&req) {
        return unauthorized();
    }
    let limit = query.limit.unwrap_or(50).min(500);
    match store.list(limit).await {
        Ok(letters) => HttpResponse::Ok().json(letters),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list dead letters");
            HttpResponse::InternalServerError().finish()
        }
    }
}
