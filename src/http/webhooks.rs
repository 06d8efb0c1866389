use actix_web::{web, HttpRequest, HttpResponse};

use crate::webhook::{WebhookError, WebhookGateway, SIGNATURE_HEADER};

pub async fn receive(
    gateway: web::Data<WebhookGateway>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, WebhookError> {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let ack = gateway.ingest(&body, signature).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "received": ack.received,
    })))
}

/// The provider pings the endpoint with GET when a webhook is registered.
pub async fn liveness() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "endpoint": "provider-webhook",
    }))
}
