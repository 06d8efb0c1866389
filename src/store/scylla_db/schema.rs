use anyhow::Result;
use scylla::client::session::Session;

const TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS pod_orders (
        provider_order_id text PRIMARY KEY,
        order_number text,
        version bigint,
        status text,
        document text,
        updated_at timestamp
    )",
    "CREATE TABLE IF NOT EXISTS creator_earnings (
        creator_id text PRIMARY KEY,
        pending_cents counter,
        total_cents counter,
        sales_cents counter,
        order_count counter
    )",
    "CREATE TABLE IF NOT EXISTS applied_postings (
        posting_id uuid PRIMARY KEY,
        creator_id text,
        order_number text,
        kind text,
        applied_at timestamp
    )",
    "CREATE TABLE IF NOT EXISTS catalog_products (
        sku text PRIMARY KEY,
        provider_product_id text,
        sync_status text,
        document text,
        updated_at timestamp
    )",
    "CREATE TABLE IF NOT EXISTS catalog_by_provider_product (
        provider_product_id text PRIMARY KEY,
        sku text
    )",
    "CREATE TABLE IF NOT EXISTS design_requests (
        id uuid PRIMARY KEY,
        status text,
        document text,
        updated_at timestamp
    )",
    "CREATE TABLE IF NOT EXISTS webhook_dead_letters (
        event_type text,
        resource_id text,
        payload text,
        error text,
        failure_count int,
        first_failed_at timestamp,
        last_failed_at timestamp,
        PRIMARY KEY ((event_type), resource_id)
    )",
];

pub(super) async fn ensure_schema(session: &Session, keyspace: &str) -> Result<()> {
    session
        .query_unpaged(
            format!(
                "CREATE KEYSPACE IF NOT EXISTS {} WITH REPLICATION = \
                 {{'class': 'SimpleStrategy', 'replication_factor': 1}}",
                keyspace
            ),
            &[],
        )
        .await?;

    for ddl in TABLES {
        session
            .query_unpaged(ddl.replacen("IF NOT EXISTS ", &format!("IF NOT EXISTS {}.", keyspace), 1), &[])
            .await?;
    }

    tracing::debug!(keyspace = %keyspace, tables = TABLES.len(), "Schema ensured");
    Ok(())
}
