use actix_web::web;

mod dead_letters;
mod errors;
pub mod publish;
pub mod webhooks;

pub use publish::AdminToken;

// ============================================================================
// HTTP surface
// ============================================================================
//
// POST/GET /webhooks/provider        provider deliveries + liveness
// POST     /api/pod/publish          start (or resume) a publish saga
// GET      /api/pod/publish/{id}     publish and sync status
// GET      /api/pod/dead-letters     failed deliveries for triage
// GET      /metrics, /health
//
// App data: web::Data<WebhookGateway>, web::Data<PublishOrchestrator>,
// web::Data<dyn DeadLetterStore>, web::Data<AdminToken>,
// web::Data<Arc<Metrics>>.
//
// ============================================================================

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/webhooks/provider")
            .route(web::post().to(webhooks::receive))
            .route(web::get().to(webhooks::liveness)),
    )
    .service(
        web::scope("/api/pod")
            .route("/publish", web::post().to(publish::publish))
            .route("/publish/{product_id}", web::get().to(publish::status))
            .route("/dead-letters", web::get().to(dead_letters::list)),
    )
    .configure(crate::metrics::configure);
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::domain::catalog::design_request::tests::design_request;
    use crate::domain::order::OrderCommandHandler;
    use crate::domain::pricing::FixedRateProvider;
    use crate::metrics::Metrics;
    use crate::provider::fake::FakeProvider;
    use crate::publish::{PublishOrchestrator, PublishSettings};
    use crate::store::memory::{
        MemoryCatalogStore, MemoryDeadLetterStore, MemoryDesignRequestStore, MemoryEarningsLedger,
        MemoryOrderStore,
    };
    use crate::store::{DeadLetterStore, DesignRequestStore};
    use crate::utils::RetryConfig;
    use crate::webhook::signature::sign;
    use crate::webhook::{GatewaySettings, WebhookGateway, SIGNATURE_HEADER};

    const SECRET: &str = "whsec_http";
    const ADMIN: &str = "admin-token";

    struct State {
        gateway: web::Data<WebhookGateway>,
        orchestrator: web::Data<PublishOrchestrator>,
        metrics: Arc<Metrics>,
        designs: Arc<MemoryDesignRequestStore>,
        dead_letters: Arc<dyn DeadLetterStore>,
    }

    fn state() -> State {
        let metrics = Arc::new(Metrics::new().unwrap());
        let catalog = Arc::new(MemoryCatalogStore::new());
        let designs = Arc::new(MemoryDesignRequestStore::new());
        let rates = Arc::new(FixedRateProvider::new());
        let dead_letters: Arc<dyn DeadLetterStore> = Arc::new(MemoryDeadLetterStore::new());

        let handler = Arc::new(OrderCommandHandler::new(
            Arc::new(MemoryOrderStore::new()),
            Arc::new(MemoryEarningsLedger::new()),
        ));
        let gateway = WebhookGateway::new(
            handler,
            catalog.clone(),
            rates.clone(),
            dead_letters.clone(),
            metrics.clone(),
            GatewaySettings {
                webhook_secret: Some(SECRET.to_string()),
                provider_currency: "USD".to_string(),
                local_currency: "USD".to_string(),
            },
        );
        let orchestrator = PublishOrchestrator::new(
            Arc::new(FakeProvider::with_mockups(&["m.png"])),
            designs.clone(),
            catalog,
            rates,
            metrics.clone(),
            PublishSettings {
                shop_id: 1,
                mockup_wait: Duration::ZERO,
                store_base_url: "https://shop.example.com".to_string(),
                provider_currency: "USD".to_string(),
                local_currency: "USD".to_string(),
                catalog_retry: RetryConfig::default().with_max_attempts(1),
            },
        );

        State {
            gateway: web::Data::new(gateway),
            orchestrator: web::Data::new(orchestrator),
            metrics,
            designs,
            dead_letters,
        }
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data($state.gateway.clone())
                    .app_data($state.orchestrator.clone())
                    .app_data(web::Data::from($state.dead_letters.clone()))
                    .app_data(web::Data::new(AdminToken(Some(ADMIN.to_string()))))
                    .app_data(web::Data::new($state.metrics.clone()))
                    .configure(configure),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_webhook_liveness() {
        let state = state();
        let app = app!(state);
        let resp = test::call_service(&app, test::TestRequest::get().uri("/webhooks/provider").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_signed_webhook_is_acknowledged() {
        let state = state();
        let app = app!(state);
        let body = json!({ "type": "shop:disconnected", "resource": { "id": "shop-1" } }).to_string();

        let req = test::TestRequest::post()
            .uri("/webhooks/provider")
            .insert_header((SIGNATURE_HEADER, sign(SECRET, body.as_bytes())))
            .set_payload(body)
            .to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(resp["success"], true);
        assert_eq!(resp["received"], "shop:disconnected");
    }

    #[actix_web::test]
    async fn test_bad_signature_is_401() {
        let state = state();
        let app = app!(state);
        let req = test::TestRequest::post()
            .uri("/webhooks/provider")
            .insert_header((SIGNATURE_HEADER, "deadbeef"))
            .set_payload(r#"{"type":"order:created","resource":{"id":"o-1"}}"#)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_publish_requires_admin_token() {
        let state = state();
        let app = app!(state);
        let req = test::TestRequest::post()
            .uri("/api/pod/publish")
            .set_json(json!({ "productId": uuid::Uuid::new_v4() }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_publish_and_status() {
        let state = state();
        let request = design_request("creator-1");
        state.designs.save(&request).await.unwrap();
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/pod/publish")
            .insert_header(("Authorization", format!("Bearer {}", ADMIN)))
            .set_json(json!({ "productId": request.id, "subcategory": "tees" }))
            .to_request();
        let resp: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["podProductId"], request.id.to_string());
        assert_eq!(resp["providerProductId"], "prov-prod-1");
        assert!(resp["storeUrl"].as_str().unwrap().starts_with("https://shop.example.com/products/"));

        let again = test::TestRequest::post()
            .uri("/api/pod/publish")
            .insert_header(("Authorization", format!("Bearer {}", ADMIN)))
            .set_json(json!({ "productId": request.id }))
            .to_request();
        assert_eq!(test::call_service(&app, again).await.status(), StatusCode::CONFLICT);

        let status = test::TestRequest::get()
            .uri(&format!("/api/pod/publish/{}", request.id))
            .insert_header(("Authorization", format!("Bearer {}", ADMIN)))
            .to_request();
        let view: Value = test::call_and_read_body_json(&app, status).await;
        assert_eq!(view["status"], "published");
        assert_eq!(view["syncStatus"], "synced");
    }

    #[actix_web::test]
    async fn test_publish_unknown_request_is_404() {
        let state = state();
        let app = app!(state);
        let req = test::TestRequest::post()
            .uri("/api/pod/publish")
            .insert_header(("Authorization", format!("Bearer {}", ADMIN)))
            .set_json(json!({ "productId": uuid::Uuid::new_v4() }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_metrics_and_health_are_mounted() {
        let state = state();
        let app = app!(state);
        for uri in ["/metrics", "/health"] {
            let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
            assert_eq!(resp.status(), StatusCode::OK, "{}", uri);
        }
    }

    #[actix_web::test]
    async fn test_failed_delivery_shows_up_in_dead_letters() {
        let state = state();
        let app = app!(state);

        // no EUR rate is configured, so processing fails and the provider is asked to retry
        let body = json!({
            "type": "order:created",
            "resource": { "id": "o-eur", "data": { "currency": "EUR", "line_items": [] } }
        })
        .to_string();
        let req = test::TestRequest::post()
            .uri("/webhooks/provider")
            .insert_header((SIGNATURE_HEADER, sign(SECRET, body.as_bytes())))
            .set_payload(body)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let anonymous = test::TestRequest::get().uri("/api/pod/dead-letters").to_request();
        assert_eq!(test::call_service(&app, anonymous).await.status(), StatusCode::UNAUTHORIZED);

        let listing = test::TestRequest::get()
            .uri("/api/pod/dead-letters?limit=10")
            .insert_header(("Authorization", format!("Bearer {}", ADMIN)))
            .to_request();
        let letters: Value = test::call_and_read_body_json(&app, listing).await;
        assert_eq!(letters.as_array().unwrap().len(), 1);
        assert_eq!(letters[0]["event_type"], "order:created");
        assert_eq!(letters[0]["resource_id"], "o-eur");
    }
}
