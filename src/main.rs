use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod domain;
mod http;
mod metrics;
mod provider;
mod publish;
mod store;
mod utils;
mod webhook;

use config::{AppConfig, StoreBackend};
use domain::earnings::EarningsLedger;
use domain::order::OrderCommandHandler;
use domain::pricing::{ExchangeRateProvider, FixedRateProvider, HttpRateProvider};
use provider::{HttpProviderClient, ProviderClient};
use publish::{PublishOrchestrator, PublishSettings};
use store::{CatalogStore, DeadLetterStore, DesignRequestStore, OrderStore};
use webhook::{GatewaySettings, WebhookGateway};

struct Stores {
    orders: Arc<dyn OrderStore>,
    ledger: Arc<dyn EarningsLedger>,
    catalog: Arc<dyn CatalogStore>,
    designs: Arc<dyn DesignRequestStore>,
    dead_letters: Arc<dyn DeadLetterStore>,
}

async fn open_stores(config: &AppConfig) -> anyhow::Result<Stores> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("⚠️ Using in-memory stores; all state is lost on restart");
            Ok(Stores {
                orders: Arc::new(store::memory::MemoryOrderStore::new()),
                ledger: Arc::new(store::memory::MemoryEarningsLedger::new()),
                catalog: Arc::new(store::memory::MemoryCatalogStore::new()),
                designs: Arc::new(store::memory::MemoryDesignRequestStore::new()),
                dead_letters: Arc::new(store::memory::MemoryDeadLetterStore::new()),
            })
        }
        StoreBackend::Scylla => {
            use store::scylla_db::*;

            let session = connect(&config.scylla_node, &config.scylla_keyspace).await?;
            Ok(Stores {
                orders: Arc::new(ScyllaOrderStore::new(session.clone())),
                ledger: Arc::new(ScyllaEarningsLedger::new(session.clone())),
                catalog: Arc::new(ScyllaCatalogStore::new(session.clone())),
                designs: Arc::new(ScyllaDesignRequestStore::new(session.clone())),
                dead_letters: Arc::new(ScyllaDeadLetterStore::new(session)),
            })
        }
    }
}

fn rate_provider(config: &AppConfig) -> Arc<dyn ExchangeRateProvider> {
    let fixed = config.fallback_exchange_rate.map(|rate| {
        FixedRateProvider::new().with_rate(&config.provider_currency, &config.local_currency, rate)
    });

    match (&config.exchange_rate_api_url, fixed) {
        (Some(url), fallback) => Arc::new(HttpRateProvider::new(url.clone(), chrono::Duration::from_std(config.exchange_rate_ttl).unwrap_or(chrono::Duration::MAX), fallback)),
        (None, Some(fixed)) => Arc::new(fixed),
        (None, None) => {
            tracing::warn!(
                from = %config.provider_currency,
                to = %config.local_currency,
                "No exchange rate source configured; only same-currency orders can be priced"
            );
            Arc::new(FixedRateProvider::new())
        }
    }
}

/// Use the configured shop, or the first one the token can see.
async fn resolve_shop_id(provider: &dyn ProviderClient, configured: u64) -> u64 {
    if configured != 0 {
        return configured;
    }
    match provider.list_shops().await {
        Ok(shops) => match shops.first() {
            Some(shop) => {
                tracing::info!(shop_id = shop.id, title = %shop.title, "🏪 Using first provider shop");
                shop.id
            }
            None => {
                tracing::warn!("Provider account has no shops; publishing will fail");
                0
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "Could not list provider shops; set PROVIDER_SHOP_ID");
            0
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO, overridable with RUST_LOG
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,pod_fulfillment=debug"))
        )
        .init();

    tracing::info!("🚀 Starting POD fulfillment service");

    let config = AppConfig::from_env()?;

    let metrics = Arc::new(metrics::Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    let stores = open_stores(&config).await?;
    let rates = rate_provider(&config);

    if config.provider_api_token.is_empty() {
        tracing::warn!("PROVIDER_API_TOKEN is not set; provider calls will be rejected");
    }
    let provider: Arc<dyn ProviderClient> = Arc::new(
        HttpProviderClient::new(&config.provider_api_url, &config.provider_api_token)
            .with_metrics(metrics.clone()),
    );
    let shop_id = resolve_shop_id(provider.as_ref(), config.provider_shop_id).await;

    let orders = Arc::new(
        OrderCommandHandler::new(stores.orders.clone(), stores.ledger.clone())
            .with_metrics(metrics.clone())
            .with_retry(config.conflict_retry()),
    );

    let gateway = web::Data::new(WebhookGateway::new(
        orders,
        stores.catalog.clone(),
        rates.clone(),
        stores.dead_letters.clone(),
        metrics.clone(),
        GatewaySettings {
            webhook_secret: config.webhook_secret.clone(),
            provider_currency: config.provider_currency.clone(),
            local_currency: config.local_currency.clone(),
        },
    ));

    let orchestrator = web::Data::new(PublishOrchestrator::new(
        provider,
        stores.designs.clone(),
        stores.catalog.clone(),
        rates,
        metrics.clone(),
        PublishSettings {
            shop_id,
            mockup_wait: config.mockup_wait,
            store_base_url: config.store_base_url.clone(),
            provider_currency: config.provider_currency.clone(),
            local_currency: config.local_currency.clone(),
            catalog_retry: config.catalog_retry(),
        },
    ));

    if config.admin_api_token.is_none() {
        tracing::warn!("ADMIN_API_TOKEN is not set; publish endpoints will refuse every request");
    }
    let admin = web::Data::new(http::AdminToken(config.admin_api_token.clone()));
    let dead_letters = web::Data::from(stores.dead_letters.clone());
    let metrics_data = web::Data::new(metrics);

    tracing::info!(bind = %config.bind_addr, port = config.port, "🌐 HTTP server listening");

    HttpServer::new(move || {
        App::new()
            .app_data(gateway.clone())
            .app_data(orchestrator.clone())
            .app_data(admin.clone())
            .app_data(dead_letters.clone())
            .app_data(metrics_data.clone())
            .configure(http::configure)
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await?;

    tracing::info!("👋 Shutdown complete");
    Ok(())
}
