use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use salestream::domain::catalog::{ProductCommand, ProductCommandHandler, ProductEvent};
use salestream::domain::customer::{CustomerCommand, CustomerCommandHandler, CustomerEvent};
use salestream::domain::sale::{SaleCommand, SaleCommandHandler, SaleEvent, SaleLine};
use salestream::event_sourcing::core::SystemClock;
use salestream::event_sourcing::store::{EventStore, InMemoryStore};
use salestream::messaging::{InMemoryPublisher, KafkaPublisher, MessagePublisher};
use salestream::metrics::{start_metrics_server, Metrics};
use salestream::outbox::{OutboxProcessor, OutboxProcessorConfig};
use salestream::projection::{
    ProjectionConfig, ProjectionEngine, SaleSummaryProjection, StockLevelProjection,
};
use salestream::saga::{action, SagaContext, SagaDefinition, SagaOrchestrator, SagaStepError};

// ============================================================================
// Demo - Full Sale Lifecycle with Outbox, Projections and a Saga
// ============================================================================

fn payload_uuid(ctx: &SagaContext, field: &str) -> Result<Uuid, SagaStepError> {
    serde_json::from_value(ctx.payload[field].clone())
        .map_err(|e| SagaStepError::new(format!("bad '{field}' in saga payload: {e}")))
}

fn sale_fulfillment_definition(
    products: Arc<ProductCommandHandler>,
    sales: Arc<SaleCommandHandler>,
) -> SagaDefinition {
    // The saga id doubles as the stock reservation id, so a redelivered
    // trigger maps onto the same reservation instead of a second hold.
    let reserve = {
        let products = products.clone();
        action(move |ctx: SagaContext| {
            let products = products.clone();
            async move {
                let product_id = payload_uuid(&ctx, "product_id")?;
                let quantity = ctx.payload["quantity"].as_i64().unwrap_or(0) as i32;
                products
                    .handle(
                        product_id,
                        ProductCommand::ReserveStock {
                            reservation_id: ctx.saga_id,
                            quantity,
                        },
                        ctx.saga_id,
                    )
                    .await
                    .map(|_| ())
                    .map_err(|e| SagaStepError::new(e.to_string()))
            }
        })
    };

    let release = {
        let products = products.clone();
        action(move |ctx: SagaContext| {
            let products = products.clone();
            async move {
                let product_id = payload_uuid(&ctx, "product_id")?;
                products
                    .handle(
                        product_id,
                        ProductCommand::ReleaseStock {
                            reservation_id: ctx.saga_id,
                        },
                        ctx.saga_id,
                    )
                    .await
                    .map(|_| ())
                    .map_err(|e| SagaStepError::new(e.to_string()))
            }
        })
    };

    // Stand-in for an external payment provider; the demo payload decides
    // whether it accepts or rejects the charge
    let charge = action(|ctx: SagaContext| async move {
        if ctx.payload["fail_payment"].as_bool().unwrap_or(false) {
            Err(SagaStepError::new("payment provider declined the charge"))
        } else {
            tracing::info!(saga_id = %ctx.saga_id, "Payment charged");
            Ok(())
        }
    });

    let refund = action(|ctx: SagaContext| async move {
        tracing::info!(saga_id = %ctx.saga_id, "Payment refunded");
        Ok(())
    });

    let confirm = {
        action(move |ctx: SagaContext| {
            let sales = sales.clone();
            async move {
                let sale_id = payload_uuid(&ctx, "sale_id")?;
                sales
                    .handle(sale_id, SaleCommand::FinalizeSale, ctx.saga_id)
                    .await
                    .map(|_| ())
                    .map_err(|e| SagaStepError::new(e.to_string()))
            }
        })
    };

    SagaDefinition::new("sale-fulfillment")
        .compensated_step("reserve-stock", reserve, release)
        .compensated_step("charge-payment", charge, refund)
        .step("confirm-sale", confirm)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,salestream=debug")),
        )
        .init();

    tracing::info!("🚀 Starting salestream demo");

    // === 1. Metrics registry and scrape endpoint ===
    let metrics = Arc::new(Metrics::new()?);
    let metrics_registry = Arc::new(metrics.registry().clone());
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().expect("metrics runtime");
        rt.block_on(async {
            if let Err(e) = start_metrics_server(metrics_registry, 9090).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    });

    // === 2. Storage, clock, broker ===
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(SystemClock);

    let publisher: Arc<dyn MessagePublisher> = match std::env::var("KAFKA_BROKERS") {
        Ok(brokers) => {
            tracing::info!(brokers = %brokers, "Publishing through Kafka");
            Arc::new(KafkaPublisher::new(&brokers)?)
        }
        Err(_) => {
            tracing::info!("KAFKA_BROKERS not set, publishing in-memory");
            Arc::new(InMemoryPublisher::new())
        }
    };

    // === 3. Typed event stores and command handlers ===
    let sale_store = Arc::new(EventStore::<SaleEvent>::new(
        store.clone(),
        clock.clone(),
        "Sale",
        "sale-events",
    ));
    let customer_store = Arc::new(EventStore::<CustomerEvent>::new(
        store.clone(),
        clock.clone(),
        "Customer",
        "customer-events",
    ));
    let product_store = Arc::new(EventStore::<ProductEvent>::new(
        store.clone(),
        clock.clone(),
        "Product",
        "product-events",
    ));

    let sales = Arc::new(SaleCommandHandler::new(sale_store, metrics.clone()));
    let customers = Arc::new(CustomerCommandHandler::new(customer_store, metrics.clone()));
    let products = Arc::new(ProductCommandHandler::new(product_store, metrics.clone()));

    // === 4. Background workers: outbox processor and projection engine ===
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let processor = Arc::new(OutboxProcessor::new(
        store.clone(),
        publisher,
        clock.clone(),
        OutboxProcessorConfig {
            poll_interval: std::time::Duration::from_millis(500),
            ..Default::default()
        },
        metrics.clone(),
    ));
    let outbox_task = {
        let processor = processor.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { processor.run(shutdown).await })
    };

    let sale_summaries = Arc::new(SaleSummaryProjection::new());
    let stock_levels = Arc::new(StockLevelProjection::new());
    let engine = Arc::new(
        ProjectionEngine::new(
            store.clone(),
            store.clone(),
            ProjectionConfig {
                poll_interval: std::time::Duration::from_millis(500),
                ..Default::default()
            },
            metrics.clone(),
        )
        .register(sale_summaries.clone())
        .register(stock_levels.clone()),
    );
    let projection_task = {
        let engine = engine.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { engine.run(shutdown).await })
    };

    // === 5. Seed the catalog and a customer ===
    let customer_id = Uuid::new_v4();
    customers
        .handle(
            customer_id,
            CustomerCommand::RegisterCustomer {
                customer_id,
                name: "Ada Lovelace".to_string(),
                email: "ada@example.com".to_string(),
            },
            Uuid::new_v4(),
        )
        .await?;
    tracing::info!("✅ Customer registered: {}", customer_id);

    let product_id = Uuid::new_v4();
    products
        .handle(
            product_id,
            ProductCommand::ListProduct {
                product_id,
                name: "Espresso Beans 1kg".to_string(),
                price_cents: 1899,
                initial_stock: 20,
            },
            Uuid::new_v4(),
        )
        .await?;
    tracing::info!("✅ Product listed: {}", product_id);

    // === 6. A sale that fulfills cleanly ===
    let sale_id = Uuid::new_v4();
    let correlation_id = Uuid::new_v4();
    sales
        .handle(
            sale_id,
            SaleCommand::StartSale { sale_id, customer_id },
            correlation_id,
        )
        .await?;
    sales
        .handle(
            sale_id,
            SaleCommand::AddLine {
                line: SaleLine {
                    product_id,
                    quantity: 3,
                    unit_price_cents: 1899,
                },
            },
            correlation_id,
        )
        .await?;
    sales
        .handle(
            sale_id,
            SaleCommand::ApplyDiscount { percent: 10 },
            correlation_id,
        )
        .await?;
    tracing::info!("✅ Sale opened with one line and a discount: {}", sale_id);

    let mut orchestrator = SagaOrchestrator::new(store.clone(), clock.clone(), metrics.clone());
    orchestrator.register(sale_fulfillment_definition(products.clone(), sales.clone()));

    let status = orchestrator
        .start(
            Uuid::new_v4(),
            "sale-fulfillment",
            serde_json::json!({
                "sale_id": sale_id,
                "product_id": product_id,
                "quantity": 3,
            }),
        )
        .await?;
    tracing::info!("✅ Fulfillment saga finished: {:?}", status);

    // === 7. A sale whose payment is declined, rolled back by compensation ===
    let doomed_sale_id = Uuid::new_v4();
    let correlation_id = Uuid::new_v4();
    sales
        .handle(
            doomed_sale_id,
            SaleCommand::StartSale {
                sale_id: doomed_sale_id,
                customer_id,
            },
            correlation_id,
        )
        .await?;
    sales
        .handle(
            doomed_sale_id,
            SaleCommand::AddLine {
                line: SaleLine {
                    product_id,
                    quantity: 5,
                    unit_price_cents: 1899,
                },
            },
            correlation_id,
        )
        .await?;

    let status = orchestrator
        .start(
            Uuid::new_v4(),
            "sale-fulfillment",
            serde_json::json!({
                "sale_id": doomed_sale_id,
                "product_id": product_id,
                "quantity": 5,
                "fail_payment": true,
            }),
        )
        .await?;
    tracing::info!("↩️  Declined-payment saga finished: {:?}", status);

    // Give the pollers a couple of ticks to publish and project
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;

    // === 8. Query the read models ===
    if let Some(summary) = sale_summaries.get(sale_id) {
        tracing::info!(
            sale_id = %summary.sale_id,
            status = ?summary.status,
            lines = summary.line_count,
            quantity = summary.total_quantity,
            discount = summary.discount_percent,
            total_cents = ?summary.total_cents,
            "📊 Sale summary"
        );
    }
    if let Some(stock) = stock_levels.get(product_id) {
        tracing::info!(
            product = %stock.name,
            on_hand = stock.on_hand,
            held = stock.held,
            available = stock.available(),
            "📊 Stock level"
        );
    }

    // === 9. Graceful shutdown ===
    shutdown_tx.send(true)?;
    outbox_task.await?;
    projection_task.await?;

    tracing::info!("🎉 Demo complete");
    Ok(())
}
