use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::catalog::{ProductCatalogEntry, SyncStatus};
use crate::domain::earnings::EarningsLedger;
use crate::domain::order::{OrderCommandHandler, OrderStatus};
use crate::domain::pricing::FixedRateProvider;
use crate::metrics::Metrics;
use crate::store::memory::{
    MemoryCatalogStore, MemoryDeadLetterStore, MemoryEarningsLedger, MemoryOrderStore,
};
use crate::store::{CatalogStore, DeadLetterStore, OrderStore};

use super::gateway::{Disposition, GatewaySettings, WebhookError, WebhookGateway};
use super::signature::sign;

// ============================================================================
// End-to-end webhook scenarios against the in-memory stores
// ============================================================================

const SECRET: &str = "whsec_test";

struct Harness {
    gateway: Arc<WebhookGateway>,
    orders: Arc<MemoryOrderStore>,
    ledger: Arc<MemoryEarningsLedger>,
    catalog: Arc<MemoryCatalogStore>,
    dead_letters: Arc<MemoryDeadLetterStore>,
}

fn d(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn listing(provider_product_id: &str, creator_id: &str, selling: &str, cost_cents: i64) -> ProductCatalogEntry {
    let design_request_id = Uuid::new_v4();
    ProductCatalogEntry {
        sku: ProductCatalogEntry::sku_for(design_request_id),
        design_request_id,
        store_product_id: Uuid::new_v4(),
        provider_product_id: provider_product_id.to_string(),
        title: "Lecture Notes Tee".to_string(),
        description: String::new(),
        images: Vec::new(),
        selling_price: d(selling),
        base_cost_cents: cost_cents,
        provider_currency: "USD".to_string(),
        commission_rate: d("70"),
        creator_id: creator_id.to_string(),
        subcategory: None,
        sync_status: SyncStatus::Synced,
        store_url: format!("https://shop.example.com/products/{}", design_request_id),
        updated_at: Utc::now(),
    }
}

async fn harness_with(settings: GatewaySettings, rates: FixedRateProvider) -> Harness {
    let orders = Arc::new(MemoryOrderStore::new());
    let ledger = Arc::new(MemoryEarningsLedger::new());
    let catalog = Arc::new(MemoryCatalogStore::new());
    let dead_letters = Arc::new(MemoryDeadLetterStore::new());
    let metrics = Arc::new(Metrics::new().unwrap());

    catalog.upsert_by_sku(&listing("prod-1", "creator-1", "150.00", 6000)).await.unwrap();
    catalog.upsert_by_sku(&listing("prod-2", "creator-2", "40.00", 1500)).await.unwrap();

    let handler = Arc::new(
        OrderCommandHandler::new(orders.clone(), ledger.clone()).with_metrics(metrics.clone()),
    );
    let gateway = Arc::new(WebhookGateway::new(
        handler,
        catalog.clone(),
        Arc::new(rates),
        dead_letters.clone(),
        metrics,
        settings,
    ));

    Harness {
        gateway,
        orders,
        ledger,
        catalog,
        dead_letters,
    }
}

async fn harness() -> Harness {
    harness_with(
        GatewaySettings {
            webhook_secret: Some(SECRET.to_string()),
            provider_currency: "USD".to_string(),
            local_currency: "USD".to_string(),
        },
        FixedRateProvider::new(),
    )
    .await
}

fn order_created(order_id: &str, lines: Value) -> Value {
    json!({
        "type": "order:created",
        "resource": {
            "id": order_id,
            "data": {
                "status": "pending",
                "address_to": {
                    "first_name": "Asha", "last_name": "Rao", "email": "asha@example.com",
                    "country": "IN", "city": "Pune", "zip": "411001", "address1": "12 MG Road"
                },
                "line_items": lines,
                "total_price": 15000,
                "total_shipping": 500
            }
        }
    })
}

fn one_line(order_id: &str) -> Value {
    order_created(order_id, json!([{"id": "li-1", "product_id": "prod-1", "variant_id": 17887, "quantity": 1}]))
}

fn event(event_type: &str, order_id: &str, data: Value) -> Value {
    json!({"type": event_type, "resource": {"id": order_id, "data": data}})
}

impl Harness {
    async fn send(&self, payload: &Value) -> Result<Disposition, WebhookError> {
        let body = serde_json::to_vec(payload).unwrap();
        let signature = sign(SECRET, &body);
        self.gateway
            .ingest(&body, Some(&signature))
            .await
            .map(|ack| ack.disposition)
    }

    async fn status(&self, order_id: &str) -> OrderStatus {
        self.orders.load(order_id).await.unwrap().unwrap().status
    }
}

#[tokio::test]
async fn test_scenario_a_order_created_accrues_commission() {
    let h = harness().await;
    let disposition = h.send(&one_line("ord-a")).await.unwrap();
    assert_eq!(disposition, Disposition::Processed);

    let order = h.orders.load("ord-a").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);
    let item = &order.items[0];
    assert_eq!(item.profit, d("90.00"));
    assert_eq!(item.creator_commission, d("63.00"));
    assert_eq!(item.platform_fee, d("27.00"));
    assert_eq!(order.totals.shipping, d("5.00"));
    assert_eq!(order.charges.len(), 2);

    let earnings = h.ledger.earnings("creator-1").await.unwrap();
    assert_eq!(earnings.pending_earnings, d("63.00"));
    assert_eq!(earnings.total_earnings, Decimal::ZERO);
}

#[tokio::test]
async fn test_scenario_b_delivery_realizes_commission() {
    let h = harness().await;
    h.send(&one_line("ord-b")).await.unwrap();
    h.send(&event("shipment:delivered", "ord-b", json!({"carrier": {"code": "usps", "tracking_number": "9400"}})))
        .await
        .unwrap();

    assert_eq!(h.status("ord-b").await, OrderStatus::Delivered);
    let earnings = h.ledger.earnings("creator-1").await.unwrap();
    assert_eq!(earnings.pending_earnings, Decimal::ZERO);
    assert_eq!(earnings.total_earnings, d("63.00"));
}

#[tokio::test]
async fn test_scenario_c_has_issues_is_terminal() {
    let h = harness().await;
    h.send(&one_line("ord-c")).await.unwrap();
    h.send(&event("order:updated", "ord-c", json!({"status": "in-production"}))).await.unwrap();
    assert_eq!(h.status("ord-c").await, OrderStatus::InProduction);

    h.send(&event("order:updated", "ord-c", json!({"status": "has-issues"}))).await.unwrap();
    assert_eq!(h.status("ord-c").await, OrderStatus::Failed);

    let ignored = h.send(&event("order:updated", "ord-c", json!({"status": "in-production"}))).await.unwrap();
    assert!(matches!(ignored, Disposition::Ignored(_)));
    assert_eq!(h.status("ord-c").await, OrderStatus::Failed);
}

#[tokio::test]
async fn test_scenario_d_concurrent_duplicates_apply_once() {
    let h = harness().await;
    let payload = one_line("ord-d");

    let (first, second) = tokio::join!(h.send(&payload), h.send(&payload));
    first.unwrap();
    second.unwrap();

    assert_eq!(h.orders.len().await, 1);
    assert_eq!(h.ledger.applied_count().await, 1);
    let earnings = h.ledger.earnings("creator-1").await.unwrap();
    assert_eq!(earnings.pending_earnings, d("63.00"));
    assert_eq!(earnings.total_orders, 1);
}

#[tokio::test]
async fn test_duplicate_order_created_is_noop() {
    let h = harness().await;
    h.send(&one_line("ord-dup")).await.unwrap();
    let before = h.orders.load("ord-dup").await.unwrap().unwrap();

    let again = h.send(&one_line("ord-dup")).await.unwrap();
    assert!(matches!(again, Disposition::Ignored(_)));
    assert_eq!(h.orders.load("ord-dup").await.unwrap().unwrap(), before);
    assert_eq!(h.ledger.earnings("creator-1").await.unwrap().total_orders, 1);
}

#[tokio::test]
async fn test_delivered_and_fulfilled_converge_in_either_order() {
    let h = harness().await;
    let delivered = event("shipment:delivered", "ord-x", json!({}));
    let fulfilled = event("order:updated", "ord-x", json!({"status": "fulfilled"}));

    h.send(&one_line("ord-x")).await.unwrap();
    h.send(&delivered).await.unwrap();
    h.send(&fulfilled).await.unwrap();
    assert_eq!(h.status("ord-x").await, OrderStatus::Delivered);

    let delivered = event("shipment:delivered", "ord-y", json!({}));
    let fulfilled = event("order:updated", "ord-y", json!({"status": "fulfilled"}));
    h.send(&one_line("ord-y")).await.unwrap();
    h.send(&fulfilled).await.unwrap();
    h.send(&delivered).await.unwrap();
    assert_eq!(h.status("ord-y").await, OrderStatus::Delivered);

    // realized exactly once per order
    let earnings = h.ledger.earnings("creator-1").await.unwrap();
    assert_eq!(earnings.total_earnings, d("126.00"));
    assert_eq!(earnings.pending_earnings, Decimal::ZERO);
}

#[tokio::test]
async fn test_cancelled_order_is_sticky() {
    let h = harness().await;
    h.send(&one_line("ord-s")).await.unwrap();
    h.send(&event("order:updated", "ord-s", json!({"status": "canceled"}))).await.unwrap();

    for payload in [
        event("order:updated", "ord-s", json!({"status": "fulfilled"})),
        event("order:sent-to-production", "ord-s", json!({})),
        event("shipment:delivered", "ord-s", json!({})),
        event("shipment:created", "ord-s", json!({"carrier": {"tracking_number": "1Z"}})),
    ] {
        h.send(&payload).await.unwrap();
        assert_eq!(h.status("ord-s").await, OrderStatus::Cancelled);
    }

    // the late parcel is still on record
    let order = h.orders.load("ord-s").await.unwrap().unwrap();
    assert_eq!(order.shipments.len(), 1);
}

#[tokio::test]
async fn test_ledger_conservation() {
    let h = harness().await;
    // creator-1 earns 63.00 per order
    for id in ["c-1", "c-2", "c-3", "c-4"] {
        h.send(&one_line(id)).await.unwrap();
    }
    h.send(&event("shipment:delivered", "c-1", json!({}))).await.unwrap();
    h.send(&event("order:updated", "c-2", json!({"status": "canceled"}))).await.unwrap();
    h.send(&event("order:updated", "c-3", json!({"status": "has-issues"}))).await.unwrap();

    let earnings = h.ledger.earnings("creator-1").await.unwrap();
    assert_eq!(earnings.total_earnings, d("63.00"));
    // c-3 (failed) and c-4 (confirmed) stay pending; c-2 contributes nothing
    assert_eq!(earnings.pending_earnings, d("126.00"));
    assert_eq!(earnings.pending_earnings + earnings.total_earnings, d("189.00"));
    assert_eq!(earnings.total_orders, 4);
}

#[tokio::test]
async fn test_cancel_after_partial_delivery_keeps_delivered_commission() {
    let h = harness().await;
    let lines = json!([
        {"id": "li-1", "product_id": "prod-1", "variant_id": 17887, "quantity": 1},
        {"id": "li-2", "product_id": "prod-1", "variant_id": 17887, "quantity": 1}
    ]);
    h.send(&order_created("ord-p", lines)).await.unwrap();
    h.send(&event("order:sent-to-production", "ord-p", json!({}))).await.unwrap();
    h.send(&event("shipment:delivered", "ord-p", json!({"line_items": ["li-1"]}))).await.unwrap();
    assert_eq!(h.status("ord-p").await, OrderStatus::Shipped);

    h.send(&event("order:updated", "ord-p", json!({"status": "canceled"}))).await.unwrap();
    assert_eq!(h.status("ord-p").await, OrderStatus::Cancelled);

    let order = h.orders.load("ord-p").await.unwrap().unwrap();
    assert_eq!(order.items[0].status, OrderStatus::Delivered);
    assert_eq!(order.items[1].status, OrderStatus::Cancelled);
    assert!(order.unposted.is_empty());

    // li-1 was delivered before the cancel, so its 63.00 is realized
    let earnings = h.ledger.earnings("creator-1").await.unwrap();
    assert_eq!(earnings.pending_earnings, Decimal::ZERO);
    assert_eq!(earnings.total_earnings, d("63.00"));
}

#[tokio::test]
async fn test_main_line_via_provider_events() {
    let h = harness().await;
    h.send(&one_line("ord-m")).await.unwrap();
    h.send(&event("order:sent-to-production", "ord-m", json!({}))).await.unwrap();
    assert_eq!(h.status("ord-m").await, OrderStatus::InProduction);

    let shipment = json!({"carrier": {"code": "usps", "tracking_number": "9400", "tracking_url": "https://t.example/9400"}});
    h.send(&event("shipment:created", "ord-m", shipment.clone())).await.unwrap();
    assert_eq!(h.status("ord-m").await, OrderStatus::Shipped);

    let again = h.send(&event("shipment:created", "ord-m", shipment)).await.unwrap();
    assert!(matches!(again, Disposition::Ignored(_)));
    let order = h.orders.load("ord-m").await.unwrap().unwrap();
    assert_eq!(order.shipments.len(), 1);
}

#[tokio::test]
async fn test_missing_catalog_product_skips_line_only() {
    let h = harness().await;
    let payload = order_created(
        "ord-r",
        json!([
            {"id": "li-1", "product_id": "prod-unknown", "quantity": 1},
            {"id": "li-2", "product_id": "prod-2", "quantity": 2, "cost": 1000}
        ]),
    );
    h.send(&payload).await.unwrap();

    let order = h.orders.load("ord-r").await.unwrap().unwrap();
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].line_id, "li-2");
    // 2 x (40.00 - 10.00) = 60.00 profit, 70% to the creator
    assert_eq!(order.items[0].creator_commission, d("42.00"));
    assert_eq!(h.ledger.earnings("creator-2").await.unwrap().total_sales, d("80.00"));
}

#[tokio::test]
async fn test_order_with_no_known_products_is_acknowledged() {
    let h = harness().await;
    let payload = order_created("ord-none", json!([{"product_id": "nope", "quantity": 1}]));
    let disposition = h.send(&payload).await.unwrap();
    assert!(matches!(disposition, Disposition::Ignored(_)));
    assert_eq!(h.orders.len().await, 0);
}

#[tokio::test]
async fn test_bad_signature_mutates_nothing() {
    let h = harness().await;
    let body = serde_json::to_vec(&one_line("ord-sig")).unwrap();

    let result = h.gateway.ingest(&body, Some("deadbeef")).await;
    assert!(matches!(result, Err(WebhookError::Unauthorized(_))));
    let result = h.gateway.ingest(&body, None).await;
    assert!(matches!(result, Err(WebhookError::Unauthorized(_))));

    assert_eq!(h.orders.len().await, 0);
}

#[tokio::test]
async fn test_missing_secret_skips_verification() {
    let h = harness_with(
        GatewaySettings {
            webhook_secret: None,
            provider_currency: "USD".to_string(),
            local_currency: "USD".to_string(),
        },
        FixedRateProvider::new(),
    )
    .await;
    let body = serde_json::to_vec(&one_line("ord-open")).unwrap();
    h.gateway.ingest(&body, None).await.unwrap();
    assert_eq!(h.orders.len().await, 1);
}

#[tokio::test]
async fn test_unknown_events_are_acknowledged() {
    let h = harness().await;
    let ack = h.send(&event("shop:disconnected", "shop-1", json!({}))).await.unwrap();
    assert!(matches!(ack, Disposition::Ignored(_)));

    let ack = h.send(&event("order:updated", "ord-missing", json!({"status": "fulfilled"}))).await.unwrap();
    assert!(matches!(ack, Disposition::Ignored(_)));

    let ack = h.send(&event("order:updated", "ord-missing", json!({"status": "warp-speed"}))).await.unwrap();
    assert!(matches!(ack, Disposition::Ignored(_)));
}

#[tokio::test]
async fn test_product_events_touch_sync_status_only() {
    let h = harness().await;
    h.send(&event("product:publish:started", "prod-1", json!({}))).await.unwrap();
    let entry = h.catalog.product_by_provider_id("prod-1").await.unwrap().unwrap();
    assert_eq!(entry.sync_status, SyncStatus::Publishing);

    h.send(&event("product:deleted", "prod-1", json!({}))).await.unwrap();
    let entry = h.catalog.product_by_provider_id("prod-1").await.unwrap().unwrap();
    assert_eq!(entry.sync_status, SyncStatus::Deleted);
    assert_eq!(entry.selling_price, d("150.00"));
}

#[tokio::test]
async fn test_converted_order_keeps_its_rate_snapshot() {
    let h = harness_with(
        GatewaySettings {
            webhook_secret: Some(SECRET.to_string()),
            provider_currency: "USD".to_string(),
            local_currency: "INR".to_string(),
        },
        FixedRateProvider::new().with_rate("USD", "INR", d("83")),
    )
    .await;
    // listing price is treated as local currency
    let payload = order_created("ord-inr", json!([{"product_id": "prod-1", "quantity": 1, "cost": 100}]));
    h.send(&payload).await.unwrap();

    let order = h.orders.load("ord-inr").await.unwrap().unwrap();
    assert_eq!(order.exchange_rate.rate, d("83"));
    assert_eq!(order.items[0].base_cost, d("83.00"));
    assert_eq!(order.totals.currency, "INR");
    assert_eq!(order.totals.shipping, d("415.00"));
}

#[tokio::test]
async fn test_processing_failure_is_dead_lettered() {
    let h = harness_with(
        GatewaySettings {
            webhook_secret: Some(SECRET.to_string()),
            provider_currency: "USD".to_string(),
            local_currency: "INR".to_string(),
        },
        FixedRateProvider::new(),
    )
    .await;

    let result = h.send(&one_line("ord-fail")).await;
    assert!(matches!(result, Err(WebhookError::Processing { .. })));
    assert_eq!(h.orders.len().await, 0);

    let letters = h.dead_letters.list(10).await.unwrap();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].event_type, "order:created");
    assert_eq!(letters[0].resource_id, "ord-fail");
}
