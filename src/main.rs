use std::sync::Arc;
use chrono::Utc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use delivery_lifecycle::config::AppConfig;
use delivery_lifecycle::domain::delivery::{OrderRef, ProductRef, UnitType};
use delivery_lifecycle::metrics::Metrics;
use delivery_lifecycle::{
    ConfirmInput, Delivery, DeliveryCommandHandler, DeliveryStore, HttpDeliveryStore, InMemoryDeliveryStore,
    PaymentMethod, ProductItem,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides the default filter, e.g. RUST_LOG=debug
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,delivery_lifecycle=debug")),
        )
        .init();

    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    let metrics = Arc::new(Metrics::new()?);

    match &config.api_url {
        Some(url) => {
            let delivery_id = std::env::args()
                .nth(1)
                .ok_or_else(|| anyhow::anyhow!("usage: delivery_lifecycle <delivery-id>"))?
                .parse::<Uuid>()?;

            tracing::info!(api_url = %url, %delivery_id, "Inspecting delivery on remote store");
            let store: Arc<dyn DeliveryStore> = Arc::new(HttpDeliveryStore::new(
                url,
                config.request_timeout,
                config.circuit_breaker(),
            )?);
            let handler = DeliveryCommandHandler::new(store)
                .with_metrics(Arc::clone(&metrics))
                .with_request_timeout(config.request_timeout);

            let delivery = handler.load(delivery_id).await?;
            log_pricing(&delivery);
        }
        None => run_demo(&config, Arc::clone(&metrics)).await?,
    }

    let snapshot = metrics.render()?;
    tracing::debug!(metrics = %snapshot, "Metrics snapshot");
    Ok(())
}

/// Walk one delivery through its lifecycle against the in-memory store.
async fn run_demo(config: &AppConfig, metrics: Arc<Metrics>) -> anyhow::Result<()> {
    tracing::info!("No DELIVERY_API_URL set, running against the in-memory store");

    let store = Arc::new(InMemoryDeliveryStore::new());
    let handler = DeliveryCommandHandler::new(Arc::clone(&store))
        .with_metrics(metrics)
        .with_request_timeout(config.request_timeout);

    let items = vec![
        ProductItem::new(
            2,
            90.0,
            10.0,
            ProductRef {
                id: Uuid::new_v4(),
                name: "Queso cremoso".to_string(),
                unit_type: UnitType::Kilo,
            },
        )?,
        ProductItem::new(
            12,
            4.5,
            0.0,
            ProductRef {
                id: Uuid::new_v4(),
                name: "Yogur bebible".to_string(),
                unit_type: UnitType::Unit,
            },
        )?,
    ];
    let delivery = Delivery::pending(Uuid::new_v4(), Utc::now(), items).with_order(OrderRef { crates: 4 });
    store.insert(delivery.clone()).await;

    log_pricing(&delivery);

    // Amount without a method is refused before anything is sent
    if let Err(err) = handler
        .confirm(&delivery, ConfirmInput::new(50.0, None, 0))
        .await
    {
        for field_error in err.field_errors() {
            tracing::info!(field = %field_error.field, message = %field_error.message, "Form error");
        }
    }

    let total = delivery.pricing().total;
    let confirmed = handler
        .confirm(&delivery, ConfirmInput::new(total, Some(PaymentMethod::Cash), 3))
        .await?;
    tracing::info!(
        delivery_id = %confirmed.id,
        status = %confirmed.status,
        crates_outstanding = ?confirmed.crates_outstanding(),
        "Delivery confirmed"
    );

    // Terminal: a second transition is refused locally
    if let Err(err) = handler.cancel(&confirmed).await {
        tracing::info!(error = %err, "Cancel refused as expected");
    }

    Ok(())
}

fn log_pricing(delivery: &Delivery) {
    let pricing = delivery.pricing();
    for (item, line) in delivery.product_items.iter().zip(&pricing.per_item) {
        tracing::info!(
            product = %item.product().name,
            quantity = line.quantity,
            original_unit_price = line.original_unit_price,
            unit_price = line.unit_price,
            discount_amount = line.discount_amount,
            "Line"
        );
    }
    tracing::info!(
        subtotal = pricing.subtotal,
        total_discount = pricing.total_discount,
        total = pricing.total,
        total_kilos = pricing.total_kilos,
        "Delivery pricing"
    );
}
